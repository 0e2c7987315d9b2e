//! # shiftplan-core
//!
//! Core domain model and traits for the shiftplan assignment engine.
//!
//! This crate provides:
//! - Input types: `PollSnapshot`, `Participant`, `SlotTime`, `BoundsInput`, `LoadBound`
//! - Domain types: `Person`, `Day`, `Shift`
//! - The projected result: `Calendar` with per-person load summary
//! - Diagnostics, error types and the `Renderer` trait
//!
//! ## Example
//!
//! ```rust
//! use shiftplan_core::{BoundsInput, LoadBound, Participant, PollSnapshot, SlotTime};
//!
//! let snapshot = PollSnapshot::new("Lab shifts")
//!     .slot(SlotTime::text("2025-03-03 09:00"))
//!     .slot(SlotTime::text("2025-03-04 09:00"))
//!     .participant(Participant::new("alice", "Alice").preferences(vec![1.0, 1.0]))
//!     .participant(Participant::new("bob", "Bob").preferences(vec![0.0, 2.0]));
//!
//! let bounds = BoundsInput::new().person("alice", LoadBound::new().max(1));
//! assert_eq!(snapshot.slots.len(), 2);
//! assert_eq!(bounds.people["alice"].max, Some(1));
//! ```

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Type Aliases
// ============================================================================

/// Unique identifier for a person
pub type PersonId = String;

/// Position of a shift inside an availability model
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShiftId(pub usize);

impl ShiftId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Poll Snapshot (input)
// ============================================================================

/// A retrieved availability poll: slot start times plus one score row per person
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PollSnapshot {
    /// Poll title, used as the default problem name
    #[serde(default)]
    pub title: Option<String>,
    /// Slot start times in poll order
    pub slots: Vec<SlotTime>,
    /// Participants with one score per slot
    pub participants: Vec<Participant>,
}

impl PollSnapshot {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            slots: Vec::new(),
            participants: Vec::new(),
        }
    }

    /// Append a slot
    pub fn slot(mut self, slot: SlotTime) -> Self {
        self.slots.push(slot);
        self
    }

    /// Append a participant
    pub fn participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }
}

/// Start time of a poll slot as delivered by the poll service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotTime {
    /// Milliseconds since the Unix epoch
    Millis(i64),
    /// Textual timestamp (RFC 3339 or `YYYY-MM-DD HH:MM`)
    Text(String),
}

impl SlotTime {
    pub fn text(value: impl Into<String>) -> Self {
        SlotTime::Text(value.into())
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotTime::Millis(ms) => write!(f, "{ms}ms"),
            SlotTime::Text(text) => write!(f, "\"{text}\""),
        }
    }
}

/// One poll participant
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identifier (JSON strings and integers are both accepted)
    #[serde(deserialize_with = "deserialize_person_id")]
    pub id: PersonId,
    /// Display name
    pub name: String,
    /// One score per slot, same order as `PollSnapshot::slots`
    #[serde(default)]
    pub preferences: Vec<f64>,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            preferences: Vec::new(),
        }
    }

    /// Set the score row
    pub fn preferences(mut self, scores: Vec<f64>) -> Self {
        self.preferences = scores;
        self
    }
}

fn deserialize_person_id<'de, D>(deserializer: D) -> Result<PersonId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(n) => n.to_string(),
    })
}

// ============================================================================
// Load Bounds (input)
// ============================================================================

/// Requested minimum/maximum shift count for one person.
///
/// Values are signed so that negative input can be reported as an error
/// instead of being rejected by the deserializer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBound {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

impl LoadBound {
    pub const fn new() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    pub const fn range(min: i64, max: i64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub const fn min(mut self, min: i64) -> Self {
        self.min = Some(min);
        self
    }

    pub const fn max(mut self, max: i64) -> Self {
        self.max = Some(max);
        self
    }
}

/// Load bounds for a run: per-person bounds plus the global per-day cap
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundsInput {
    /// Bounds by person identifier; people not listed get defaults
    #[serde(default)]
    pub people: BTreeMap<PersonId, LoadBound>,
    /// Max shifts assigned to the same person on one day (default 1)
    #[serde(default)]
    pub max_shifts_per_day: Option<i64>,
}

impl BoundsInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bound for one person
    pub fn person(mut self, id: impl Into<String>, bound: LoadBound) -> Self {
        self.people.insert(id.into(), bound);
        self
    }

    /// Set the per-day cap
    pub fn max_shifts_per_day(mut self, cap: i64) -> Self {
        self.max_shifts_per_day = Some(cap);
        self
    }
}

/// Problem variant: decides how missing minimums are filled and which
/// objective the optimization strategy minimizes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Missing minimum = 0; minimize the spread of assigned counts
    #[default]
    Balanced,
    /// Missing minimum = even split of the remaining shifts; minimize trips
    MinimizeTrips,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Balanced, Variant::MinimizeTrips];

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Balanced => "balanced",
            Variant::MinimizeTrips => "minimize-trips",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(Variant::Balanced),
            "minimize-trips" | "min-trips" | "trips" => Ok(Variant::MinimizeTrips),
            other => Err(format!("unknown variant '{other}'")),
        }
    }
}

// ============================================================================
// Domain
// ============================================================================

/// A person who can be assigned shifts
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
}

impl Person {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The atomic schedulable unit: a time on a given day
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    pub id: ShiftId,
    pub day: NaiveDate,
    pub time: NaiveTime,
}

impl Shift {
    /// Time label, formatted `HH:MM`
    pub fn label(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.label())
    }
}

/// A calendar day and its shifts in time order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Day {
    pub date: NaiveDate,
    pub shifts: Vec<ShiftId>,
}

// ============================================================================
// Outcome
// ============================================================================

/// Verdict of a solve invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolveStatus {
    Solved,
    Infeasible,
    Timeout,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Solved => write!(f, "SOLVED"),
            SolveStatus::Infeasible => write!(f, "INFEASIBLE"),
            SolveStatus::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// A shift nobody is available for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnassignableShift {
    pub shift: ShiftId,
    pub day: NaiveDate,
    pub label: String,
}

impl From<&Shift> for UnassignableShift {
    fn from(shift: &Shift) -> Self {
        Self {
            shift: shift.id,
            day: shift.day,
            label: shift.label(),
        }
    }
}

impl fmt::Display for UnassignableShift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.day, self.label)
    }
}

// ============================================================================
// Calendar (result)
// ============================================================================

/// The projected assignment: day → shift → assignee
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calendar {
    /// Problem name
    pub name: String,
    /// Variant that produced this calendar
    pub variant: Variant,
    /// Days in model order
    pub days: Vec<CalendarDay>,
    /// Every person of the run, in input order
    pub people: Vec<Person>,
    /// Objective value, when the optimization strategy was used
    pub objective: Option<i64>,
}

/// One day of the calendar
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub shifts: Vec<CalendarEntry>,
}

/// One shift of the calendar and who covers it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub shift: ShiftId,
    pub label: String,
    /// `None` when nobody was available for the shift
    pub assignee: Option<PersonId>,
}

/// Number of shifts assigned to one person
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonLoad {
    pub person: PersonId,
    pub name: String,
    pub shifts: usize,
}

impl Calendar {
    /// Look up a person by identifier
    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|p| p.id == id)
    }

    /// Display name of an assignee, falling back to the identifier
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.person(id).map(|p| p.name.as_str()).unwrap_or(id)
    }

    /// Iterate over every (day, shift) entry in calendar order
    pub fn entries(&self) -> impl Iterator<Item = (&CalendarDay, &CalendarEntry)> {
        self.days
            .iter()
            .flat_map(|day| day.shifts.iter().map(move |entry| (day, entry)))
    }

    /// Who covers the shift at `label` on `date`
    pub fn assignee(&self, date: NaiveDate, label: &str) -> Option<&Person> {
        self.days
            .iter()
            .find(|d| d.date == date)?
            .shifts
            .iter()
            .find(|e| e.label == label)?
            .assignee
            .as_deref()
            .and_then(|id| self.person(id))
    }

    /// Distinct shift labels over all days, sorted
    pub fn shift_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.entries().map(|(_, e)| e.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Shifts left without assignee
    pub fn unassigned(&self) -> Vec<(NaiveDate, &str)> {
        self.entries()
            .filter(|(_, e)| e.assignee.is_none())
            .map(|(d, e)| (d.date, e.label.as_str()))
            .collect()
    }

    /// Shift count per person, every person included
    pub fn loads(&self) -> Vec<PersonLoad> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (_, entry) in self.entries() {
            if let Some(id) = &entry.assignee {
                *counts.entry(id.as_str()).or_insert(0) += 1;
            }
        }
        self.people
            .iter()
            .map(|p| PersonLoad {
                person: p.id.clone(),
                name: p.name.clone(),
                shifts: counts.get(p.id.as_str()).copied().unwrap_or(0),
            })
            .collect()
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Diagnostic severity, most severe first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        };
        f.write_str(s)
    }
}

/// Stable diagnostic codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    /// Nobody is available for a shift
    S001UnassignableShift,
    /// A missing bound was filled with a default
    S002BoundDefaulted,
    /// Solve succeeded
    S003Solved,
    /// No assignment satisfies the constraints
    S004Infeasible,
    /// Search budget exhausted without a solution
    S005Timeout,
    /// Best solution found but optimality not proven
    S006NotProvenOptimal,
    /// Input rejected before solving
    S007InvalidInput,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::S001UnassignableShift => "S001",
            DiagnosticCode::S002BoundDefaulted => "S002",
            DiagnosticCode::S003Solved => "S003",
            DiagnosticCode::S004Infeasible => "S004",
            DiagnosticCode::S005Timeout => "S005",
            DiagnosticCode::S006NotProvenOptimal => "S006",
            DiagnosticCode::S007InvalidInput => "S007",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            DiagnosticCode::S001UnassignableShift | DiagnosticCode::S006NotProvenOptimal => {
                Severity::Warning
            }
            DiagnosticCode::S002BoundDefaulted | DiagnosticCode::S003Solved => Severity::Info,
            DiagnosticCode::S004Infeasible
            | DiagnosticCode::S005Timeout
            | DiagnosticCode::S007InvalidInput => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message about the run, compiler style
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    pub notes: Vec<String>,
    pub hints: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            notes: Vec::new(),
            hints: Vec::new(),
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Warning for a shift nobody can cover
    pub fn unassignable(shift: &UnassignableShift) -> Self {
        Diagnostic::new(
            DiagnosticCode::S001UnassignableShift,
            format!("No participant is available for shift {shift}"),
        )
        .hint("the shift is left unassigned; ask participants to add availability")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.code, self.message)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Output rendering
pub trait Renderer {
    type Output;

    /// Render a calendar to the output format
    fn render(&self, calendar: &Calendar) -> Result<Self::Output, RenderError>;
}

/// Sink for diagnostics (terminal, JSON, test collectors)
pub trait DiagnosticEmitter {
    fn emit(&mut self, diagnostic: Diagnostic);

    fn emit_all(&mut self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            self.emit(diagnostic.clone());
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Fatal pipeline error, raised before or instead of a solve
#[derive(Debug, Error)]
pub enum ShiftplanError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    #[error("Solver unavailable: {0}")]
    SolverUnavailable(String),
}

/// A valid model without a usable assignment
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("No assignment satisfies the constraints")]
    Infeasible { unassignable: Vec<UnassignableShift> },

    #[error("Search budget exhausted after {nodes} nodes without a solution")]
    Timeout {
        nodes: u64,
        unassignable: Vec<UnassignableShift>,
    },
}

impl SolveError {
    /// Shifts nobody was available for, the usual root cause of infeasibility
    pub fn unassignable(&self) -> &[UnassignableShift] {
        match self {
            SolveError::Infeasible { unassignable } | SolveError::Timeout { unassignable, .. } => {
                unassignable
            }
        }
    }

    pub fn status(&self) -> SolveStatus {
        match self {
            SolveError::Infeasible { .. } => SolveStatus::Infeasible,
            SolveError::Timeout { .. } => SolveStatus::Timeout,
        }
    }
}

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

// ============================================================================
// Tests
// ============================================================================
