//! Availability model
//!
//! Normalizes a poll snapshot into days, shifts and the person × shift
//! availability relation.
//!
//! - Slots are grouped by calendar date; days keep the order in which their
//!   date first appears in the slot list.
//! - Within a day, shifts are sorted by time of day.
//! - Two slots with the same date and time are the same shift.
//! - A score `> 0` means available; the magnitude is ignored.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc};
use shiftplan_core::{
    Day, Person, PollSnapshot, Shift, ShiftId, ShiftplanError, SlotTime, UnassignableShift,
};
use std::collections::{HashMap, HashSet};

/// Text timestamp layouts accepted besides RFC 3339
const TEXT_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Options for building an availability model
#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    /// Offset used to turn epoch-millisecond slots into local wall-clock times
    pub utc_offset: FixedOffset,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
        }
    }
}

impl BuildOptions {
    /// Options with a fixed offset given in minutes east of UTC
    pub fn with_offset_minutes(minutes: i32) -> Result<Self, ShiftplanError> {
        let utc_offset = minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ShiftplanError::MalformedInput(format!(
                    "UTC offset of {minutes} minutes is out of range"
                ))
            })?;
        Ok(Self { utc_offset })
    }
}

/// Immutable day → shift → eligible-people structure
#[derive(Clone, Debug)]
pub struct AvailabilityModel {
    title: Option<String>,
    people: Vec<Person>,
    days: Vec<Day>,
    shifts: Vec<Shift>,
    /// Shift of every raw slot, in slot order
    slot_shifts: Vec<ShiftId>,
    /// Eligible person indices per shift, ascending
    eligible: Vec<Vec<usize>>,
}

impl AvailabilityModel {
    /// Build the model from a poll snapshot
    pub fn build(snapshot: &PollSnapshot, options: &BuildOptions) -> Result<Self, ShiftplanError> {
        let times = snapshot
            .slots
            .iter()
            .enumerate()
            .map(|(i, slot)| parse_slot(slot, options.utc_offset).map_err(|e| with_slot(e, i)))
            .collect::<Result<Vec<_>, _>>()?;

        // Days in first-appearance order, each with its distinct times
        let mut day_index: HashMap<NaiveDate, usize> = HashMap::new();
        let mut day_times: Vec<(NaiveDate, Vec<NaiveTime>)> = Vec::new();
        for dt in &times {
            let idx = *day_index.entry(dt.date()).or_insert_with(|| {
                day_times.push((dt.date(), Vec::new()));
                day_times.len() - 1
            });
            let slot_times = &mut day_times[idx].1;
            if !slot_times.contains(&dt.time()) {
                slot_times.push(dt.time());
            }
        }

        let mut days = Vec::with_capacity(day_times.len());
        let mut shifts = Vec::with_capacity(times.len());
        let mut shift_index: HashMap<(NaiveDate, NaiveTime), ShiftId> = HashMap::new();
        for (date, mut slot_times) in day_times {
            slot_times.sort();
            let mut ids = Vec::with_capacity(slot_times.len());
            for time in slot_times {
                let id = ShiftId(shifts.len());
                shifts.push(Shift {
                    id,
                    day: date,
                    time,
                });
                shift_index.insert((date, time), id);
                ids.push(id);
            }
            days.push(Day { date, shifts: ids });
        }

        let slot_shifts: Vec<ShiftId> = times
            .iter()
            .map(|dt| shift_index[&(dt.date(), dt.time())])
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        let mut people = Vec::with_capacity(snapshot.participants.len());
        let mut eligible = vec![Vec::new(); shifts.len()];
        for (person_idx, participant) in snapshot.participants.iter().enumerate() {
            if !seen.insert(participant.id.as_str()) {
                return Err(ShiftplanError::MalformedInput(format!(
                    "participant id '{}' appears more than once",
                    participant.id
                )));
            }
            if participant.preferences.len() != slot_shifts.len() {
                return Err(ShiftplanError::MalformedInput(format!(
                    "participant '{}' has {} preference score(s) for {} slot(s)",
                    participant.id,
                    participant.preferences.len(),
                    slot_shifts.len()
                )));
            }
            for (slot, &score) in participant.preferences.iter().enumerate() {
                if !score.is_finite() {
                    return Err(ShiftplanError::MalformedInput(format!(
                        "participant '{}' has a non-numeric score for slot {slot}",
                        participant.id
                    )));
                }
                if score > 0.0 {
                    let shift_eligible: &mut Vec<usize> = &mut eligible[slot_shifts[slot].0];
                    if shift_eligible.last() != Some(&person_idx) {
                        shift_eligible.push(person_idx);
                    }
                }
            }
            people.push(Person::new(participant.id.clone(), participant.name.clone()));
        }

        Ok(Self {
            title: snapshot.title.clone(),
            people,
            days,
            shifts,
            slot_shifts,
            eligible,
        })
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// People in input order
    pub fn people(&self) -> &[Person] {
        &self.people
    }

    /// Index of a person by identifier
    pub fn person_index(&self, id: &str) -> Option<usize> {
        self.people.iter().position(|p| p.id == id)
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn shift(&self, id: ShiftId) -> &Shift {
        &self.shifts[id.0]
    }

    /// Shift a raw slot was folded into
    pub fn shift_for_slot(&self, slot: usize) -> Option<ShiftId> {
        self.slot_shifts.get(slot).copied()
    }

    /// Indices of the people available for a shift, ascending
    pub fn eligible(&self, id: ShiftId) -> &[usize] {
        &self.eligible[id.0]
    }

    pub fn is_available(&self, person: usize, id: ShiftId) -> bool {
        self.eligible[id.0].binary_search(&person).is_ok()
    }

    /// Number of shifts a person is available for
    pub fn eligible_count(&self, person: usize) -> usize {
        self.eligible
            .iter()
            .filter(|e| e.binary_search(&person).is_ok())
            .count()
    }

    /// Shifts nobody is available for, in model order
    pub fn unassignable_shifts(&self) -> Vec<UnassignableShift> {
        self.shifts
            .iter()
            .filter(|s| self.eligible[s.id.0].is_empty())
            .map(UnassignableShift::from)
            .collect()
    }
}

fn with_slot(err: ShiftplanError, slot: usize) -> ShiftplanError {
    match err {
        ShiftplanError::MalformedInput(msg) => {
            ShiftplanError::MalformedInput(format!("slot {slot}: {msg}"))
        }
        other => other,
    }
}

/// Parse a slot into local wall-clock time, truncated to the minute
fn parse_slot(slot: &SlotTime, offset: FixedOffset) -> Result<NaiveDateTime, ShiftplanError> {
    let parsed = match slot {
        SlotTime::Millis(ms) => DateTime::<Utc>::from_timestamp_millis(*ms)
            .map(|dt| dt.with_timezone(&offset).naive_local())
            .ok_or_else(|| {
                ShiftplanError::MalformedInput(format!("timestamp {ms}ms is out of range"))
            })?,
        SlotTime::Text(text) => parse_text(text.trim()).ok_or_else(|| {
            ShiftplanError::MalformedInput(format!("cannot parse timestamp \"{text}\""))
        })?,
    };

    let time = parsed.time();
    let minute = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
    Ok(parsed.date().and_time(minute))
}

fn parse_text(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    TEXT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}
