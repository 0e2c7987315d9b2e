//! # shiftplan-solver
//!
//! Availability-driven shift assignment.
//!
//! This crate provides:
//! - Availability modeling from a poll snapshot
//! - Problem construction with per-variant load-bound defaults
//! - A native branch-and-bound engine and an optional CP engine
//! - Projection of the assignment onto a calendar
//!
//! ## Example
//!
//! ```rust,ignore
//! use shiftplan_core::{BoundsInput, PollSnapshot};
//! use shiftplan_solver::{PlanOptions, Planner};
//!
//! let snapshot: PollSnapshot = serde_json::from_str(&json)?;
//! let report = Planner::new(PlanOptions::default()).plan(&snapshot, &BoundsInput::new())?;
//! println!("{}", report.status);
//! ```

pub mod availability;
pub mod engine;
pub mod objective;
#[cfg(feature = "cp-solver")]
pub mod optimal;
pub mod problem;
pub mod projector;
pub mod search;

pub use availability::{AvailabilityModel, BuildOptions};
pub use engine::{
    engine_for, Assignment, EngineKind, SearchStats, SolveEngine, SolveOptions, SolveOutcome,
    Strategy, DEFAULT_NODE_LIMIT,
};
#[cfg(feature = "cp-solver")]
pub use optimal::CpEngine;
pub use problem::{ProblemBuilder, ProblemSpec, ResolvedBound, StructuralConstraint};
pub use projector::ResultProjector;
pub use search::NativeEngine;

use shiftplan_core::{
    BoundsInput, Calendar, Diagnostic, DiagnosticCode, PersonId, PollSnapshot, ShiftplanError,
    SolveError, SolveStatus, UnassignableShift, Variant,
};
use thiserror::Error;
use tracing::{info, info_span, warn};

/// Settings of one planning run
#[derive(Clone, Debug, Default)]
pub struct PlanOptions {
    pub variant: Variant,
    pub engine: EngineKind,
    pub solve: SolveOptions,
    /// Overrides the per-day cap of the bounds input
    pub max_shifts_per_day: Option<i64>,
    pub build: BuildOptions,
}

/// Successful planning run
#[derive(Clone, Debug)]
pub struct PlanReport {
    pub calendar: Calendar,
    pub status: SolveStatus,
    pub objective: Option<i64>,
    pub proven_optimal: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: SearchStats,
}

/// Model summary produced without solving
#[derive(Clone, Debug)]
pub struct CheckReport {
    pub title: Option<String>,
    pub people: usize,
    pub days: usize,
    pub shifts: usize,
    /// Shifts that became decision variables
    pub variables: usize,
    pub unassignable: Vec<UnassignableShift>,
    /// Resolved bounds in identifier order
    pub bounds: Vec<(PersonId, ResolvedBound)>,
    pub max_shifts_per_day: u32,
    pub diagnostics: Vec<Diagnostic>,
}

/// Failed planning run, with everything reported up to the failure
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{error}")]
    Rejected {
        #[source]
        error: ShiftplanError,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("{error}")]
    Unsolved {
        #[source]
        error: SolveError,
        diagnostics: Vec<Diagnostic>,
    },
}

impl PlanError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            PlanError::Rejected { diagnostics, .. } | PlanError::Unsolved { diagnostics, .. } => {
                diagnostics
            }
        }
    }

    fn rejected(error: ShiftplanError, mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.push(Diagnostic::new(DiagnosticCode::S007InvalidInput, error.to_string()));
        PlanError::Rejected { error, diagnostics }
    }
}

/// Runs availability modeling, problem building, search and projection
#[derive(Clone, Debug, Default)]
pub struct Planner {
    options: PlanOptions,
}

impl Planner {
    pub fn new(options: PlanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    /// Build model and problem without searching
    pub fn check(
        &self,
        snapshot: &PollSnapshot,
        bounds: &BoundsInput,
    ) -> Result<CheckReport, PlanError> {
        let _span = info_span!("check", variant = %self.options.variant).entered();
        let (model, problem) = self.prepare(snapshot, bounds)?;

        Ok(CheckReport {
            title: model.title().map(str::to_string),
            people: model.people().len(),
            days: model.days().len(),
            shifts: model.shifts().len(),
            variables: problem.num_variables(),
            unassignable: problem.unassignable.clone(),
            bounds: problem
                .people
                .iter()
                .zip(&problem.bounds)
                .map(|(p, b)| (p.id.clone(), *b))
                .collect(),
            max_shifts_per_day: problem.max_shifts_per_day,
            diagnostics: problem.diagnostics,
        })
    }

    /// Run the full pipeline
    pub fn plan(
        &self,
        snapshot: &PollSnapshot,
        bounds: &BoundsInput,
    ) -> Result<PlanReport, PlanError> {
        let _span = info_span!(
            "plan",
            variant = %self.options.variant,
            engine = %self.options.engine
        )
        .entered();

        let (model, problem) = self.prepare(snapshot, bounds)?;
        let mut diagnostics = problem.diagnostics.clone();

        let engine = match engine_for(self.options.engine) {
            Ok(engine) => engine,
            Err(error) => return Err(PlanError::rejected(error, diagnostics)),
        };
        let outcome = {
            let _span = info_span!("solve", engine = engine.name()).entered();
            match engine.solve(&problem, &self.options.solve) {
                Ok(outcome) => outcome,
                Err(error) => return Err(PlanError::rejected(error, diagnostics)),
            }
        };

        let calendar = match ResultProjector::project(&outcome, &model) {
            Ok(calendar) => calendar,
            Err(error) => {
                warn!(status = %error.status(), "no assignment found");
                diagnostics.push(unsolved_diagnostic(&error));
                return Err(PlanError::Unsolved { error, diagnostics });
            }
        };

        diagnostics.push(solved_diagnostic(&outcome));
        if outcome.objective.is_some() && !outcome.proven_optimal {
            warn!(objective = ?outcome.objective, "budget exhausted before optimality was proven");
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticCode::S006NotProvenOptimal,
                    "Best assignment found is not proven optimal",
                )
                .note(format!("search stopped after {} node(s)", outcome.stats.nodes))
                .hint("raise the node or time budget to continue the search"),
            );
        }

        Ok(PlanReport {
            calendar,
            status: outcome.status,
            objective: outcome.objective,
            proven_optimal: outcome.proven_optimal,
            diagnostics,
            stats: outcome.stats,
        })
    }

    fn prepare(
        &self,
        snapshot: &PollSnapshot,
        bounds: &BoundsInput,
    ) -> Result<(AvailabilityModel, ProblemSpec), PlanError> {
        let model = AvailabilityModel::build(snapshot, &self.options.build)
            .map_err(|error| PlanError::rejected(error, Vec::new()))?;
        info!(
            people = model.people().len(),
            days = model.days().len(),
            shifts = model.shifts().len(),
            "availability model built"
        );

        let mut builder = ProblemBuilder::new(self.options.variant);
        if let Some(cap) = self.options.max_shifts_per_day {
            builder = builder.max_shifts_per_day(cap);
        }
        let problem = builder.build(&model, bounds).map_err(|error| {
            let gaps = model
                .unassignable_shifts()
                .iter()
                .map(Diagnostic::unassignable)
                .collect();
            PlanError::rejected(error, gaps)
        })?;
        info!(
            variables = problem.num_variables(),
            unassignable = problem.unassignable.len(),
            constraints = problem.constraints.len(),
            "problem built"
        );

        Ok((model, problem))
    }
}

fn solved_diagnostic(outcome: &SolveOutcome) -> Diagnostic {
    let message = match outcome.objective {
        Some(value) => format!(
            "Solved {} variant with objective {value} ({} node(s))",
            outcome.variant, outcome.stats.nodes
        ),
        None => format!(
            "Found a feasible {} assignment ({} node(s))",
            outcome.variant, outcome.stats.nodes
        ),
    };
    Diagnostic::new(DiagnosticCode::S003Solved, message)
}

fn unsolved_diagnostic(error: &SolveError) -> Diagnostic {
    let gaps = error.unassignable().len();
    match error {
        SolveError::Infeasible { .. } => {
            let diagnostic = Diagnostic::new(DiagnosticCode::S004Infeasible, error.to_string())
                .hint("relax the load bounds or raise the per-day cap");
            if gaps > 0 {
                diagnostic.note(format!("{gaps} shift(s) have no available participant"))
            } else {
                diagnostic
            }
        }
        SolveError::Timeout { .. } => Diagnostic::new(DiagnosticCode::S005Timeout, error.to_string())
            .hint("raise the node or time budget, or use the satisfaction strategy"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use shiftplan_core::{LoadBound, Participant, SlotTime};

    fn snapshot() -> PollSnapshot {
        PollSnapshot::new("Lab")
            .slot(SlotTime::text("2025-03-03 09:00"))
            .slot(SlotTime::text("2025-03-04 09:00"))
            .slot(SlotTime::text("2025-03-04 14:00"))
            .participant(Participant::new("alice", "Alice").preferences(vec![1.0, 1.0, 0.0]))
            .participant(Participant::new("bob", "Bob").preferences(vec![1.0, 1.0, 0.0]))
    }

    #[test]
    fn plan_reports_gaps_and_success() {
        let report = Planner::default()
            .plan(&snapshot(), &BoundsInput::new())
            .unwrap();

        assert_eq!(report.status, SolveStatus::Solved);
        assert_eq!(report.objective, Some(0));
        assert!(report.proven_optimal);
        assert_eq!(report.calendar.name, "Lab");
        let codes: Vec<DiagnosticCode> = report.diagnostics.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![DiagnosticCode::S001UnassignableShift, DiagnosticCode::S003Solved]
        );
    }

    #[test]
    fn check_summarizes_model() {
        let report = Planner::default()
            .check(&snapshot(), &BoundsInput::new())
            .unwrap();

        assert_eq!(report.people, 2);
        assert_eq!(report.days, 2);
        assert_eq!(report.shifts, 3);
        assert_eq!(report.variables, 2);
        assert_eq!(report.unassignable.len(), 1);
        assert_eq!(report.bounds[0].0, "alice");
    }

    #[test]
    fn invalid_bounds_keep_gap_diagnostics() {
        let bounds = BoundsInput::new().person("alice", LoadBound::new().min(5));
        let err = Planner::default().plan(&snapshot(), &bounds).unwrap_err();

        assert!(matches!(
            err,
            PlanError::Rejected {
                error: ShiftplanError::InvalidBounds(_),
                ..
            }
        ));
        let codes: Vec<DiagnosticCode> = err.diagnostics().iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![DiagnosticCode::S001UnassignableShift, DiagnosticCode::S007InvalidInput]
        );
    }

    #[test]
    fn infeasible_plan_is_unsolved() {
        let bounds = BoundsInput::new()
            .person("alice", LoadBound::new().max(0))
            .person("bob", LoadBound::new().max(1));
        let err = Planner::default().plan(&snapshot(), &bounds).unwrap_err();

        match &err {
            PlanError::Unsolved { error, .. } => assert_eq!(error.status(), SolveStatus::Infeasible),
            other => panic!("expected unsolved, got {other:?}"),
        }
        assert!(err
            .diagnostics()
            .iter()
            .any(|d| d.code == DiagnosticCode::S004Infeasible));
    }

    #[test]
    fn planner_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Planner>();
    }
}
