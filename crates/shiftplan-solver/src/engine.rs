//! Solve engines
//!
//! A [`SolveEngine`] turns a [`ProblemSpec`] into a [`SolveOutcome`]. Two
//! engines exist: the built-in [`NativeEngine`](crate::search::NativeEngine)
//! and, with the `cp-solver` feature, a constraint-programming engine backed
//! by pumpkin.

use crate::problem::ProblemSpec;
use shiftplan_core::{PersonId, ShiftId, ShiftplanError, SolveStatus, UnassignableShift, Variant};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default node budget of the native engine
pub const DEFAULT_NODE_LIMIT: u64 = 1_000_000;

/// What the engine searches for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// First assignment meeting all hard constraints
    Satisfy,
    /// Best assignment under the variant's objective
    #[default]
    Optimize,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "satisfy" | "csp" => Ok(Strategy::Satisfy),
            "optimize" | "optimise" => Ok(Strategy::Optimize),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Which engine runs the search
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EngineKind {
    #[default]
    Native,
    /// Pumpkin constraint solver (`cp-solver` feature)
    Cp,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Native => write!(f, "native"),
            EngineKind::Cp => write!(f, "cp"),
        }
    }
}

/// Search settings and budget
#[derive(Clone, Debug)]
pub struct SolveOptions {
    pub strategy: Strategy,
    /// Maximum search nodes (native engine)
    pub node_limit: Option<u64>,
    /// Wall-clock budget
    pub time_limit: Option<Duration>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Optimize,
            node_limit: Some(DEFAULT_NODE_LIMIT),
            time_limit: None,
        }
    }
}

impl SolveOptions {
    pub fn satisfy() -> Self {
        Self {
            strategy: Strategy::Satisfy,
            ..Self::default()
        }
    }

    pub fn optimize() -> Self {
        Self::default()
    }

    pub fn node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = Some(nodes);
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }
}

/// Shift → person mapping produced by a successful solve
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
    by_shift: BTreeMap<ShiftId, PersonId>,
}

impl Assignment {
    /// Build from one person index per problem variable
    pub fn from_values(problem: &ProblemSpec, values: &[usize]) -> Self {
        let by_shift = problem
            .variables
            .iter()
            .zip(values)
            .map(|(var, &person)| (var.shift, problem.people[person].id.clone()))
            .collect();
        Self { by_shift }
    }

    pub fn get(&self, shift: ShiftId) -> Option<&str> {
        self.by_shift.get(&shift).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_shift.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_shift.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShiftId, &str)> {
        self.by_shift.iter().map(|(&s, p)| (s, p.as_str()))
    }

    /// Number of shifts assigned to `person`
    pub fn count_for(&self, person: &str) -> usize {
        self.by_shift.values().filter(|p| p.as_str() == person).count()
    }
}

/// Search statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Search nodes visited
    pub nodes: u64,
    /// Complete assignments found (incumbents for optimization)
    pub solutions: u64,
    pub elapsed: Duration,
}

/// Result of one solve invocation
#[derive(Clone, Debug)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub variant: Variant,
    /// Present iff `status == Solved`
    pub assignment: Option<Assignment>,
    /// Objective value (optimization strategy only)
    pub objective: Option<i64>,
    /// The objective is known to be optimal
    pub proven_optimal: bool,
    pub unassignable: Vec<UnassignableShift>,
    pub stats: SearchStats,
}

impl SolveOutcome {
    pub fn solved(
        problem: &ProblemSpec,
        assignment: Assignment,
        objective: Option<i64>,
        proven_optimal: bool,
        stats: SearchStats,
    ) -> Self {
        Self {
            status: SolveStatus::Solved,
            variant: problem.variant,
            assignment: Some(assignment),
            objective,
            proven_optimal,
            unassignable: problem.unassignable.clone(),
            stats,
        }
    }

    pub fn unsolved(problem: &ProblemSpec, status: SolveStatus, stats: SearchStats) -> Self {
        debug_assert_ne!(status, SolveStatus::Solved);
        Self {
            status,
            variant: problem.variant,
            assignment: None,
            objective: None,
            proven_optimal: false,
            unassignable: problem.unassignable.clone(),
            stats,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.status == SolveStatus::Solved
    }
}

/// Solving abstraction shared by all engines
pub trait SolveEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve the problem within the options' budget.
    ///
    /// `Infeasible` and `Timeout` are outcomes; `Err` is reserved for an
    /// engine that cannot run at all.
    fn solve(&self, problem: &ProblemSpec, options: &SolveOptions)
        -> Result<SolveOutcome, ShiftplanError>;
}

/// Instantiate the engine for `kind`
pub fn engine_for(kind: EngineKind) -> Result<Box<dyn SolveEngine>, ShiftplanError> {
    match kind {
        EngineKind::Native => Ok(Box::new(crate::search::NativeEngine::new())),
        #[cfg(feature = "cp-solver")]
        EngineKind::Cp => Ok(Box::new(crate::optimal::CpEngine::new())),
        #[cfg(not(feature = "cp-solver"))]
        EngineKind::Cp => Err(ShiftplanError::SolverUnavailable(
            "the CP engine requires building with the `cp-solver` feature".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parsing() {
        assert_eq!("satisfy".parse::<Strategy>(), Ok(Strategy::Satisfy));
        assert_eq!("Optimise".parse::<Strategy>(), Ok(Strategy::Optimize));
        assert!("anneal".parse::<Strategy>().is_err());
    }

    #[test]
    fn default_budget() {
        let options = SolveOptions::default();
        assert_eq!(options.strategy, Strategy::Optimize);
        assert_eq!(options.node_limit, Some(DEFAULT_NODE_LIMIT));
        assert!(options.time_limit.is_none());

        let options = SolveOptions::satisfy().node_limit(10);
        assert_eq!(options.strategy, Strategy::Satisfy);
        assert_eq!(options.node_limit, Some(10));
    }

    #[test]
    fn native_engine_is_always_available() {
        assert_eq!(engine_for(EngineKind::Native).unwrap().name(), "native");
    }

    #[cfg(not(feature = "cp-solver"))]
    #[test]
    fn cp_engine_without_feature_is_unavailable() {
        assert!(matches!(
            engine_for(EngineKind::Cp),
            Err(ShiftplanError::SolverUnavailable(_))
        ));
    }
}
