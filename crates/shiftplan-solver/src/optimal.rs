//! Constraint-programming engine
//!
//! Formulates the shift problem for the Pumpkin solver. Requires the
//! `cp-solver` feature:
//!
//! ```toml
//! shiftplan-solver = { version = "0.3", features = ["cp-solver"] }
//! ```
//!
//! # Model
//!
//! - **Variables**: `x[v][k] ∈ {0, 1}`, variable `v` goes to the `k`-th person
//!   of its domain
//! - **Constraints**:
//!   - Exactly one person per variable: `Σ_k x[v][k] = 1`
//!   - Daily cap: `Σ_{v ∈ day} x[v][p] <= cap`
//!   - Load: `min[p] <= Σ_v x[v][p] <= max[p]`
//! - **Objective**:
//!   - `balanced`: `obj = hi - lo` with `lo <= load[p] <= hi` for active people
//!   - `minimize-trips`: `w[p][d] >= x` for each shift of `p` on day `d`,
//!     `t[p][d] >= w[p][d] - w[p][d-1]`, `obj = Σ t`
//!
//! The satisfaction strategy minimizes a constant, so the first solution found
//! is returned. The node limit does not apply; the time limit does.

use crate::engine::{Assignment, SearchStats, SolveEngine, SolveOptions, SolveOutcome, Strategy};
use crate::objective;
use crate::problem::ProblemSpec;
use pumpkin_solver::constraints as cp;
use pumpkin_solver::optimisation::linear_sat_unsat::LinearSatUnsat;
use pumpkin_solver::optimisation::OptimisationDirection;
use pumpkin_solver::results::{OptimisationResult, ProblemSolution};
use pumpkin_solver::termination::TimeBudget;
use pumpkin_solver::variables::TransformableVariable;
use pumpkin_solver::Solver;
use shiftplan_core::{ShiftplanError, SolveStatus, Variant};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wall-clock budget when the options carry none
pub const DEFAULT_CP_TIME_LIMIT: Duration = Duration::from_secs(30);

/// Pumpkin-backed engine
#[derive(Clone, Debug, Default)]
pub struct CpEngine;

impl CpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl SolveEngine for CpEngine {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn solve(
        &self,
        problem: &ProblemSpec,
        options: &SolveOptions,
    ) -> Result<SolveOutcome, ShiftplanError> {
        let start = Instant::now();
        let mut solver = Solver::default();
        let tag = solver.new_constraint_tag();
        let n = problem.num_people();
        let total = problem.num_variables() as i32;

        // x[v][k] with the matching person index
        let x: Vec<Vec<_>> = problem
            .variables
            .iter()
            .map(|var| {
                var.domain
                    .iter()
                    .map(|_| solver.new_bounded_integer(0, 1))
                    .collect()
            })
            .collect();

        for row in &x {
            let terms: Vec<_> = row.iter().map(|v| v.scaled(1)).collect();
            let _ = solver.add_constraint(cp::equals(terms, 1, tag)).post();
        }

        // terms[p] / day_terms[p][d]
        let mut terms = vec![Vec::new(); n];
        let mut day_terms = vec![vec![Vec::new(); problem.days.len()]; n];
        for (var, row) in problem.variables.iter().zip(&x) {
            for (&person, &decision) in var.domain.iter().zip(row) {
                terms[person].push(decision);
                day_terms[person][var.day].push(decision);
            }
        }

        let cap = problem.max_shifts_per_day as i32;
        for days in &day_terms {
            for decisions in days.iter().filter(|d| d.len() > cap as usize) {
                let sum: Vec<_> = decisions.iter().map(|v| v.scaled(1)).collect();
                let _ = solver
                    .add_constraint(cp::less_than_or_equals(sum, cap, tag))
                    .post();
            }
        }

        for (person, bound) in problem.bounds.iter().enumerate() {
            let sum: Vec<_> = terms[person].iter().map(|v| v.scaled(1)).collect();
            if bound.min > 0 {
                let _ = solver
                    .add_constraint(cp::greater_than_or_equals(sum.clone(), bound.min as i32, tag))
                    .post();
            }
            if (bound.max as usize) < terms[person].len() {
                let _ = solver
                    .add_constraint(cp::less_than_or_equals(sum, bound.max as i32, tag))
                    .post();
            }
        }

        let goal = match options.strategy {
            Strategy::Satisfy => None,
            Strategy::Optimize => Some(problem.variant),
        };

        let obj = match goal {
            None => solver.new_bounded_integer(0, 0),
            Some(Variant::Balanced) => {
                let hi = solver.new_bounded_integer(0, total);
                let lo = solver.new_bounded_integer(0, total);
                for person in problem.active_people() {
                    let mut above: Vec<_> = terms[person].iter().map(|v| v.scaled(-1)).collect();
                    above.push(hi.scaled(1));
                    let _ = solver
                        .add_constraint(cp::greater_than_or_equals(above, 0, tag))
                        .post();

                    let mut below: Vec<_> = terms[person].iter().map(|v| v.scaled(1)).collect();
                    below.push(lo.scaled(-1));
                    let _ = solver
                        .add_constraint(cp::greater_than_or_equals(below, 0, tag))
                        .post();
                }
                let obj = solver.new_bounded_integer(0, total);
                let _ = solver
                    .add_constraint(cp::equals(
                        vec![obj.scaled(1), hi.scaled(-1), lo.scaled(1)],
                        0,
                        tag,
                    ))
                    .post();
                obj
            }
            Some(Variant::MinimizeTrips) => {
                let mut trip_terms = Vec::new();
                for days in &day_terms {
                    let mut worked = vec![None; problem.days.len()];
                    for (d, decisions) in days.iter().enumerate() {
                        if decisions.is_empty() {
                            continue;
                        }
                        let w = solver.new_bounded_integer(0, 1);
                        for decision in decisions {
                            let _ = solver
                                .add_constraint(cp::greater_than_or_equals(
                                    vec![w.scaled(1), decision.scaled(-1)],
                                    0,
                                    tag,
                                ))
                                .post();
                        }
                        worked[d] = Some(w);

                        let t = solver.new_bounded_integer(0, 1);
                        let mut starts = vec![t.scaled(1), w.scaled(-1)];
                        if let Some(prev) = problem.days[d].continues.and_then(|prev| worked[prev]) {
                            starts.push(prev.scaled(1));
                        }
                        let _ = solver
                            .add_constraint(cp::greater_than_or_equals(starts, 0, tag))
                            .post();
                        trip_terms.push(t.scaled(1));
                    }
                }
                let obj = solver.new_bounded_integer(0, trip_terms.len() as i32);
                trip_terms.push(obj.scaled(-1));
                let _ = solver.add_constraint(cp::equals(trip_terms, 0, tag)).post();
                obj
            }
        };

        debug!(
            variables = problem.num_variables(),
            decisions = x.iter().map(Vec::len).sum::<usize>(),
            "cp model posted"
        );

        let mut brancher = solver.default_brancher();
        let mut termination =
            TimeBudget::starting_now(options.time_limit.unwrap_or(DEFAULT_CP_TIME_LIMIT));

        fn noop_callback<B>(_: &Solver, _: pumpkin_solver::results::SolutionReference, _: &B) {}
        let result = solver.optimise(
            &mut brancher,
            &mut termination,
            LinearSatUnsat::new(OptimisationDirection::Minimise, obj, noop_callback),
        );

        let decode = |value: &dyn Fn(usize, usize) -> i32| -> Vec<usize> {
            problem
                .variables
                .iter()
                .enumerate()
                .map(|(v, var)| {
                    let k = (0..var.domain.len()).find(|&k| value(v, k) == 1).unwrap_or(0);
                    var.domain[k]
                })
                .collect()
        };

        let (values, proven) = match result {
            OptimisationResult::Optimal(solution) => (
                Some(decode(&|v, k| solution.get_integer_value(x[v][k]))),
                true,
            ),
            OptimisationResult::Satisfiable(solution) => (
                Some(decode(&|v, k| solution.get_integer_value(x[v][k]))),
                false,
            ),
            OptimisationResult::Unsatisfiable => (None, true),
            OptimisationResult::Unknown => (None, false),
        };

        let stats = SearchStats {
            nodes: 0,
            solutions: u64::from(values.is_some()),
            elapsed: start.elapsed(),
        };
        let outcome = match values {
            Some(values) => {
                let value = goal.map(|_| objective::evaluate(problem, &values));
                let assignment = Assignment::from_values(problem, &values);
                SolveOutcome::solved(problem, assignment, value, goal.is_some() && proven, stats)
            }
            None if proven => SolveOutcome::unsolved(problem, SolveStatus::Infeasible, stats),
            None => SolveOutcome::unsolved(problem, SolveStatus::Timeout, stats),
        };

        info!(
            status = %outcome.status,
            objective = ?outcome.objective,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "cp search finished"
        );
        Ok(outcome)
    }
}
