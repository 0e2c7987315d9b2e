//! Problem builder
//!
//! Derives the decision model from an availability model and load bounds:
//!
//! - **Variables**: one per shift with at least one eligible person; the
//!   domain is that shift's eligible set, ordered by person identifier
//! - **Constraints**:
//!   - Per day: all-different (cap 1) or a per-person daily cap (cap > 1)
//!   - Per person: `min <= assigned shifts <= max`
//!
//! Missing bounds are filled according to the [`Variant`].

use crate::availability::AvailabilityModel;
use chrono::NaiveDate;
use shiftplan_core::{
    BoundsInput, Diagnostic, DiagnosticCode, Person, ShiftId, ShiftplanError, UnassignableShift,
    Variant,
};
use tracing::{debug, warn};

/// Resolved load bound of one person
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedBound {
    pub min: u32,
    pub max: u32,
    /// The minimum was filled by the variant's default policy
    pub min_defaulted: bool,
    /// The maximum was filled with the eligible shift count
    pub max_defaulted: bool,
}

/// A decision variable: who covers `shift`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShiftVariable {
    pub shift: ShiftId,
    /// Index into `ProblemSpec::days`
    pub day: usize,
    /// Eligible person indices, ascending (= ascending identifier)
    pub domain: Vec<usize>,
}

/// A day of the problem with its variables in time order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProblemDay {
    pub date: NaiveDate,
    pub variables: Vec<usize>,
    /// Previous day in problem order, when it is the previous calendar date
    pub continues: Option<usize>,
}

/// Hard structural constraint
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StructuralConstraint {
    /// Same-day variables take pairwise distinct people
    AllDifferent { day: NaiveDate, variables: Vec<usize> },
    /// Nobody covers more than `cap` of these same-day variables
    DailyCap {
        day: NaiveDate,
        variables: Vec<usize>,
        cap: u32,
    },
    /// Person's total load lies in `[min, max]`
    Load { person: usize, min: u32, max: u32 },
}

/// The complete decision model handed to a solve engine
#[derive(Clone, Debug)]
pub struct ProblemSpec {
    pub variant: Variant,
    /// People sorted by identifier; all person indices refer to this list
    pub people: Vec<Person>,
    pub days: Vec<ProblemDay>,
    /// Variables in chronological (day, time) order
    pub variables: Vec<ShiftVariable>,
    /// Shifts with no eligible person, excluded from `variables`
    pub unassignable: Vec<UnassignableShift>,
    /// Resolved bound per person
    pub bounds: Vec<ResolvedBound>,
    /// Number of variables each person is eligible for
    pub eligible_counts: Vec<u32>,
    pub max_shifts_per_day: u32,
    pub constraints: Vec<StructuralConstraint>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ProblemSpec {
    pub fn num_people(&self) -> usize {
        self.people.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn person_index(&self, id: &str) -> Option<usize> {
        self.people.binary_search_by(|p| p.id.as_str().cmp(id)).ok()
    }

    /// Variable covering `shift`, if the shift is assignable
    pub fn variable_for(&self, shift: ShiftId) -> Option<usize> {
        self.variables.iter().position(|v| v.shift == shift)
    }

    /// People who can take at least one shift
    pub fn active_people(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.people.len()).filter(|&p| self.eligible_counts[p] > 0)
    }
}

/// Builds a [`ProblemSpec`]
#[derive(Clone, Debug, Default)]
pub struct ProblemBuilder {
    variant: Variant,
    max_shifts_per_day: Option<i64>,
}

impl ProblemBuilder {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            max_shifts_per_day: None,
        }
    }

    /// Override the per-day cap given in the bounds input
    pub fn max_shifts_per_day(mut self, cap: i64) -> Self {
        self.max_shifts_per_day = Some(cap);
        self
    }

    pub fn build(
        &self,
        model: &AvailabilityModel,
        input: &BoundsInput,
    ) -> Result<ProblemSpec, ShiftplanError> {
        let cap = self
            .max_shifts_per_day
            .or(input.max_shifts_per_day)
            .unwrap_or(1);
        if cap < 1 {
            return Err(ShiftplanError::InvalidBounds(format!(
                "max shifts per day must be at least 1, got {cap}"
            )));
        }
        let cap = to_u32(cap);

        // Problem person order is identifier order
        let mut order: Vec<usize> = (0..model.people().len()).collect();
        order.sort_by(|&a, &b| model.people()[a].id.cmp(&model.people()[b].id));
        let mut problem_index = vec![0; order.len()];
        for (pi, &mi) in order.iter().enumerate() {
            problem_index[mi] = pi;
        }
        let people: Vec<Person> = order.iter().map(|&mi| model.people()[mi].clone()).collect();

        let mut days = Vec::with_capacity(model.days().len());
        let mut variables = Vec::new();
        let mut unassignable = Vec::new();
        let mut diagnostics = Vec::new();
        let mut eligible_counts = vec![0u32; people.len()];

        for (day_idx, day) in model.days().iter().enumerate() {
            let mut day_vars = Vec::with_capacity(day.shifts.len());
            for &shift in &day.shifts {
                let eligible = model.eligible(shift);
                if eligible.is_empty() {
                    let gap = UnassignableShift::from(model.shift(shift));
                    warn!(shift = %gap, "no participant available, shift excluded");
                    diagnostics.push(Diagnostic::unassignable(&gap));
                    unassignable.push(gap);
                    continue;
                }
                let mut domain: Vec<usize> = eligible.iter().map(|&mi| problem_index[mi]).collect();
                domain.sort_unstable();
                for &p in &domain {
                    eligible_counts[p] += 1;
                }
                day_vars.push(variables.len());
                variables.push(ShiftVariable {
                    shift,
                    day: day_idx,
                    domain,
                });
            }

            let continues = day_idx
                .checked_sub(1)
                .filter(|&prev| model.days()[prev].date.succ_opt() == Some(day.date));
            days.push(ProblemDay {
                date: day.date,
                variables: day_vars,
                continues,
            });
        }

        let bounds = self.resolve_bounds(input, &people, &eligible_counts, variables.len(), &mut diagnostics)?;

        let mut constraints = Vec::new();
        for day in &days {
            if cap == 1 && day.variables.len() > 1 {
                constraints.push(StructuralConstraint::AllDifferent {
                    day: day.date,
                    variables: day.variables.clone(),
                });
            } else if cap > 1 && day.variables.len() > cap as usize {
                constraints.push(StructuralConstraint::DailyCap {
                    day: day.date,
                    variables: day.variables.clone(),
                    cap,
                });
            }
        }
        for (person, bound) in bounds.iter().enumerate() {
            constraints.push(StructuralConstraint::Load {
                person,
                min: bound.min,
                max: bound.max,
            });
        }

        Ok(ProblemSpec {
            variant: self.variant,
            people,
            days,
            variables,
            unassignable,
            bounds,
            eligible_counts,
            max_shifts_per_day: cap,
            constraints,
            diagnostics,
        })
    }

    fn resolve_bounds(
        &self,
        input: &BoundsInput,
        people: &[Person],
        eligible_counts: &[u32],
        total: usize,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<ResolvedBound>, ShiftplanError> {
        if let Some(unknown) = input
            .people
            .keys()
            .find(|id| !people.iter().any(|p| &p.id == *id))
        {
            return Err(ShiftplanError::InvalidBounds(format!(
                "bounds given for unknown person '{unknown}'"
            )));
        }

        let total = total as u32;
        let mut explicit_min_sum: u64 = 0;
        for (idx, person) in people.iter().enumerate() {
            let Some(bound) = input.people.get(&person.id) else {
                continue;
            };
            for value in [bound.min, bound.max].into_iter().flatten() {
                if value < 0 {
                    return Err(ShiftplanError::InvalidBounds(format!(
                        "negative bound {value} for '{}'",
                        person.id
                    )));
                }
            }
            if let (Some(min), Some(max)) = (bound.min, bound.max) {
                if min > max {
                    return Err(ShiftplanError::InvalidBounds(format!(
                        "minimum {min} exceeds maximum {max} for '{}'",
                        person.id
                    )));
                }
            }
            if let Some(min) = bound.min {
                if min > i64::from(eligible_counts[idx]) {
                    return Err(ShiftplanError::InvalidBounds(format!(
                        "minimum {min} for '{}' exceeds the {} shift(s) they are available for",
                        person.id, eligible_counts[idx]
                    )));
                }
                explicit_min_sum += min as u64;
            }
        }
        if explicit_min_sum > u64::from(total) {
            return Err(ShiftplanError::InvalidBounds(format!(
                "minimums add up to {explicit_min_sum} but only {total} shift(s) can be assigned"
            )));
        }

        let default_min = match self.variant {
            Variant::Balanced => 0,
            Variant::MinimizeTrips if people.is_empty() => 0,
            Variant::MinimizeTrips => {
                (total - explicit_min_sum as u32) / people.len() as u32
            }
        };

        let mut defaulted = 0usize;
        let bounds: Vec<ResolvedBound> = people
            .iter()
            .enumerate()
            .map(|(idx, person)| {
                let bound = input.people.get(&person.id).copied().unwrap_or_default();
                let max = bound.max.map(to_u32).unwrap_or(total);
                let (min, min_defaulted) = match bound.min {
                    Some(min) => (to_u32(min), false),
                    None => (default_min.min(max).min(eligible_counts[idx]), true),
                };
                if min_defaulted && min > 0 {
                    defaulted += 1;
                }
                ResolvedBound {
                    min,
                    max,
                    min_defaulted,
                    max_defaulted: bound.max.is_none(),
                }
            })
            .collect();

        if defaulted > 0 {
            debug!(default_min, people = defaulted, "filled missing minimums");
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::S002BoundDefaulted,
                    format!(
                        "Minimum of up to {default_min} shift(s) applied to {defaulted} person(s) without an explicit bound"
                    ),
                )
                .note(format!("{} variant splits the remaining shifts evenly", self.variant)),
            );
        }

        Ok(bounds)
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
