//! Result projection
//!
//! Turns a solved outcome back into a day → shift → assignee [`Calendar`]
//! over the full availability model, including the shifts that were never
//! part of the decision model.

use crate::availability::AvailabilityModel;
use crate::engine::SolveOutcome;
use shiftplan_core::{Calendar, CalendarDay, CalendarEntry, SolveError, SolveStatus};

/// Calendar name when the poll carries no title
pub const DEFAULT_CALENDAR_NAME: &str = "Shift plan";

/// Projects solve outcomes onto the availability model
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultProjector;

impl ResultProjector {
    pub fn project(
        outcome: &SolveOutcome,
        model: &AvailabilityModel,
    ) -> Result<Calendar, SolveError> {
        let assignment = match (outcome.status, &outcome.assignment) {
            (SolveStatus::Solved, Some(assignment)) => assignment,
            (SolveStatus::Timeout, _) => {
                return Err(SolveError::Timeout {
                    nodes: outcome.stats.nodes,
                    unassignable: outcome.unassignable.clone(),
                })
            }
            _ => {
                return Err(SolveError::Infeasible {
                    unassignable: outcome.unassignable.clone(),
                })
            }
        };

        let days = model
            .days()
            .iter()
            .map(|day| CalendarDay {
                date: day.date,
                shifts: day
                    .shifts
                    .iter()
                    .map(|&id| CalendarEntry {
                        shift: id,
                        label: model.shift(id).label(),
                        assignee: assignment.get(id).map(str::to_string),
                    })
                    .collect(),
            })
            .collect();

        Ok(Calendar {
            name: model.title().unwrap_or(DEFAULT_CALENDAR_NAME).to_string(),
            variant: outcome.variant,
            days,
            people: model.people().to_vec(),
            objective: outcome.objective,
        })
    }
}
