//! Native search engine
//!
//! Depth-first search over the shift variables in chronological order with
//! forward checking:
//!
//! - a person is a candidate only while under their maximum and under the
//!   per-day cap
//! - after each decision, every person touched by the variable must still be
//!   able to reach their minimum, and the open minimums must fit in the
//!   unassigned variables
//!
//! The satisfaction strategy stops at the first complete assignment. The
//! optimization strategy runs branch and bound, pruning nodes whose lower
//! bound cannot beat the incumbent, and stops early once the incumbent meets
//! the root lower bound. Chronological order keeps the trip count monotone,
//! so the current count is an admissible bound.
//!
//! Value order is deterministic (ties broken by person index, i.e. by
//! identifier): the same problem always yields the same assignment.

use crate::engine::{Assignment, SearchStats, SolveEngine, SolveOptions, SolveOutcome, Strategy};
use crate::objective;
use crate::problem::ProblemSpec;
use shiftplan_core::{ShiftplanError, SolveStatus, Variant};
use std::cmp::Reverse;
use std::time::Instant;
use tracing::{debug, info};

/// Built-in depth-first / branch-and-bound engine
#[derive(Clone, Debug)]
pub struct NativeEngine {
    clock_check_mask: u64,
}

impl NativeEngine {
    /// Check the clock every 1024 nodes
    const DEFAULT_CLOCK_CHECK_MASK: u64 = 0x3FF;

    pub fn new() -> Self {
        Self {
            clock_check_mask: Self::DEFAULT_CLOCK_CHECK_MASK,
        }
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SolveEngine for NativeEngine {
    fn name(&self) -> &'static str {
        "native"
    }

    fn solve(
        &self,
        problem: &ProblemSpec,
        options: &SolveOptions,
    ) -> Result<SolveOutcome, ShiftplanError> {
        let start = Instant::now();
        let goal = match options.strategy {
            Strategy::Satisfy => None,
            Strategy::Optimize => Some(problem.variant),
        };
        let budget = Budget {
            node_limit: options.node_limit,
            deadline: options.time_limit.map(|limit| start + limit),
            clock_check_mask: self.clock_check_mask,
            nodes: 0,
            exhausted: false,
        };

        let mut search = Search::new(problem, goal, budget);
        if search.root_consistent() {
            search.descend(0);
        }

        let stats = SearchStats {
            nodes: search.budget.nodes,
            solutions: search.solutions,
            elapsed: start.elapsed(),
        };
        let exhausted = search.budget.exhausted;

        let outcome = match search.best {
            Some((values, value)) => {
                let assignment = Assignment::from_values(problem, &values);
                SolveOutcome::solved(
                    problem,
                    assignment,
                    goal.map(|_| value),
                    goal.is_some() && !exhausted,
                    stats,
                )
            }
            None if exhausted => SolveOutcome::unsolved(problem, SolveStatus::Timeout, stats),
            None => SolveOutcome::unsolved(problem, SolveStatus::Infeasible, stats),
        };

        info!(
            status = %outcome.status,
            objective = ?outcome.objective,
            nodes = stats.nodes,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "native search finished"
        );
        Ok(outcome)
    }
}

/// Node and wall-clock budget
#[derive(Debug)]
struct Budget {
    node_limit: Option<u64>,
    deadline: Option<Instant>,
    clock_check_mask: u64,
    nodes: u64,
    exhausted: bool,
}

impl Budget {
    /// Count one node; false once the budget is spent
    #[inline]
    fn step(&mut self) -> bool {
        self.nodes += 1;
        if self.node_limit.is_some_and(|limit| self.nodes > limit) {
            self.exhausted = true;
        } else if self.nodes & self.clock_check_mask == 0
            && self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
        {
            self.exhausted = true;
        }
        !self.exhausted
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct Search<'a> {
    problem: &'a ProblemSpec,
    /// `None` for the satisfaction strategy
    goal: Option<Variant>,
    budget: Budget,
    /// Person chosen per variable (valid up to the current depth)
    values: Vec<usize>,
    counts: Vec<u32>,
    /// `[person][day]` shifts taken
    day_counts: Vec<Vec<u32>>,
    /// Unassigned variables whose domain contains the person
    remaining: Vec<u32>,
    /// Sum of `min - count` over people below their minimum
    deficit: u32,
    trips: i64,
    best: Option<(Vec<usize>, i64)>,
    target: i64,
    solutions: u64,
}

impl<'a> Search<'a> {
    fn new(problem: &'a ProblemSpec, goal: Option<Variant>, budget: Budget) -> Self {
        let people = problem.num_people();
        Self {
            problem,
            goal,
            budget,
            values: vec![0; problem.num_variables()],
            counts: vec![0; people],
            day_counts: vec![vec![0; problem.days.len()]; people],
            remaining: problem.eligible_counts.clone(),
            deficit: problem.bounds.iter().map(|b| b.min).sum(),
            trips: 0,
            best: None,
            target: objective::root_lower_bound(problem),
            solutions: 0,
        }
    }

    fn root_consistent(&self) -> bool {
        self.deficit as usize <= self.problem.num_variables()
            && self
                .problem
                .bounds
                .iter()
                .zip(&self.remaining)
                .all(|(b, &r)| b.min <= r && b.min <= b.max)
    }

    fn descend(&mut self, depth: usize) -> Flow {
        if !self.budget.step() {
            return Flow::Stop;
        }
        let problem = self.problem;
        if depth == problem.num_variables() {
            return self.complete();
        }

        for person in self.candidates(depth) {
            let new_trip = self.assign(depth, person);
            let flow = if self.consistent(depth) {
                self.descend(depth + 1)
            } else {
                Flow::Continue
            };
            self.unassign(depth, person, new_trip);
            if flow == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn complete(&mut self) -> Flow {
        if self.deficit > 0 {
            return Flow::Continue;
        }
        self.solutions += 1;
        let Some(variant) = self.goal else {
            self.best = Some((self.values.clone(), 0));
            return Flow::Stop;
        };

        let value = match variant {
            Variant::Balanced => objective::spread(self.problem, &self.counts),
            Variant::MinimizeTrips => self.trips,
        };
        if self.best.as_ref().map_or(true, |(_, best)| value < *best) {
            debug!(objective = value, nodes = self.budget.nodes, "new incumbent");
            self.best = Some((self.values.clone(), value));
        }
        if value <= self.target {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Feasible people for the variable, most promising first
    fn candidates(&self, depth: usize) -> Vec<usize> {
        let var = &self.problem.variables[depth];
        let cap = self.problem.max_shifts_per_day;
        let mut people: Vec<usize> = var
            .domain
            .iter()
            .copied()
            .filter(|&p| {
                self.counts[p] < self.problem.bounds[p].max && self.day_counts[p][var.day] < cap
            })
            .collect();

        match self.goal {
            None => people.sort_by_key(|&p| (self.slack(p), self.counts[p], p)),
            Some(Variant::Balanced) => people.sort_by_key(|&p| (self.counts[p], self.slack(p), p)),
            Some(Variant::MinimizeTrips) => people.sort_by_key(|&p| {
                (
                    Reverse(self.continues_run(p, var.day)),
                    self.slack(p),
                    p,
                )
            }),
        }
        people
    }

    /// Spare eligible variables beyond what the minimum still needs
    fn slack(&self, person: usize) -> i64 {
        let need = self.problem.bounds[person].min.saturating_sub(self.counts[person]);
        i64::from(self.remaining[person]) - i64::from(need)
    }

    fn continues_run(&self, person: usize, day: usize) -> bool {
        self.day_counts[person][day] > 0
            || self.problem.days[day]
                .continues
                .is_some_and(|prev| self.day_counts[person][prev] > 0)
    }

    /// Returns whether the decision opened a new trip
    fn assign(&mut self, depth: usize, person: usize) -> bool {
        let var = &self.problem.variables[depth];
        let new_trip = !self.continues_run(person, var.day);
        if self.counts[person] < self.problem.bounds[person].min {
            self.deficit -= 1;
        }
        self.counts[person] += 1;
        self.day_counts[person][var.day] += 1;
        self.values[depth] = person;
        for &q in &var.domain {
            self.remaining[q] -= 1;
        }
        if new_trip {
            self.trips += 1;
        }
        new_trip
    }

    fn unassign(&mut self, depth: usize, person: usize, new_trip: bool) {
        let var = &self.problem.variables[depth];
        self.counts[person] -= 1;
        if self.counts[person] < self.problem.bounds[person].min {
            self.deficit += 1;
        }
        self.day_counts[person][var.day] -= 1;
        for &q in &var.domain {
            self.remaining[q] += 1;
        }
        if new_trip {
            self.trips -= 1;
        }
    }

    fn consistent(&self, depth: usize) -> bool {
        let unassigned = self.problem.num_variables() - depth - 1;
        if self.deficit as usize > unassigned {
            return false;
        }
        let var = &self.problem.variables[depth];
        let reachable = var
            .domain
            .iter()
            .all(|&q| self.counts[q] + self.remaining[q] >= self.problem.bounds[q].min);
        if !reachable {
            return false;
        }
        match &self.best {
            Some((_, best)) => self.lower_bound() < *best,
            None => true,
        }
    }

    fn lower_bound(&self) -> i64 {
        match self.goal {
            None => 0,
            Some(Variant::MinimizeTrips) => self.trips,
            Some(Variant::Balanced) => {
                let mut max_lo = 0u32;
                let mut min_hi = u32::MAX;
                for p in self.problem.active_people() {
                    let bound = &self.problem.bounds[p];
                    let lo = self.counts[p].max(bound.min);
                    let hi = (self.counts[p] + self.remaining[p]).min(bound.max);
                    max_lo = max_lo.max(lo);
                    min_hi = min_hi.min(hi);
                }
                (i64::from(max_lo) - i64::from(min_hi)).max(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{AvailabilityModel, BuildOptions};
    use crate::problem::ProblemBuilder;
    use pretty_assertions::assert_eq;
    use shiftplan_core::{BoundsInput, LoadBound, Participant, PollSnapshot, SlotTime};

    fn problem(
        slots: &[&str],
        people: &[(&str, Vec<f64>)],
        variant: Variant,
        bounds: &BoundsInput,
    ) -> ProblemSpec {
        let mut snapshot = PollSnapshot::new("Search");
        for slot in slots {
            snapshot = snapshot.slot(SlotTime::text(*slot));
        }
        for (id, prefs) in people {
            snapshot = snapshot.participant(Participant::new(*id, *id).preferences(prefs.clone()));
        }
        let model = AvailabilityModel::build(&snapshot, &BuildOptions::default()).unwrap();
        ProblemBuilder::new(variant).build(&model, bounds).unwrap()
    }

    fn weekdays(n: usize) -> Vec<String> {
        (0..n).map(|d| format!("2025-03-{:02} 09:00", 3 + d)).collect()
    }

    fn counts_of(outcome: &SolveOutcome, problem: &ProblemSpec) -> Vec<usize> {
        let assignment = outcome.assignment.as_ref().unwrap();
        problem
            .people
            .iter()
            .map(|p| assignment.count_for(&p.id))
            .collect()
    }

    #[test]
    fn two_shifts_same_day_single_candidate_is_infeasible() {
        let p = problem(
            &["2025-03-03 09:00", "2025-03-03 14:00"],
            &[("a", vec![1.0, 1.0]), ("b", vec![0.0, 0.0])],
            Variant::Balanced,
            &BoundsInput::new(),
        );
        for options in [SolveOptions::satisfy(), SolveOptions::optimize()] {
            let outcome = NativeEngine::new().solve(&p, &options).unwrap();
            assert_eq!(outcome.status, SolveStatus::Infeasible);
            assert!(outcome.assignment.is_none());
            assert!(outcome.objective.is_none());
        }
    }

    #[test]
    fn satisfy_respects_minimums() {
        let days = weekdays(4);
        let slots: Vec<&str> = days.iter().map(String::as_str).collect();
        let bounds = BoundsInput::new().person("c", LoadBound::new().min(2));
        let p = problem(
            &slots,
            &[("a", vec![1.0; 4]), ("b", vec![1.0; 4]), ("c", vec![0.0, 1.0, 1.0, 0.0])],
            Variant::Balanced,
            &bounds,
        );

        let outcome = NativeEngine::new().solve(&p, &SolveOptions::satisfy()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Solved);
        assert_eq!(outcome.objective, None);
        let assignment = outcome.assignment.unwrap();
        assert_eq!(assignment.len(), 4);
        assert_eq!(assignment.count_for("c"), 2);
    }

    #[test]
    fn balanced_optimum_spreads_evenly() {
        let days = weekdays(6);
        let slots: Vec<&str> = days.iter().map(String::as_str).collect();
        let p = problem(
            &slots,
            &[("a", vec![1.0; 6]), ("b", vec![1.0; 6]), ("c", vec![1.0; 6])],
            Variant::Balanced,
            &BoundsInput::new(),
        );

        let outcome = NativeEngine::new().solve(&p, &SolveOptions::optimize()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Solved);
        assert_eq!(outcome.objective, Some(0));
        assert!(outcome.proven_optimal);
        assert_eq!(counts_of(&outcome, &p), vec![2, 2, 2]);
    }

    #[test]
    fn balanced_objective_matches_evaluation() {
        let days = weekdays(5);
        let slots: Vec<&str> = days.iter().map(String::as_str).collect();
        let p = problem(
            &slots,
            &[
                ("a", vec![1.0; 5]),
                ("b", vec![1.0, 0.0, 0.0, 0.0, 0.0]),
                ("c", vec![0.0, 1.0, 1.0, 1.0, 1.0]),
            ],
            Variant::Balanced,
            &BoundsInput::new(),
        );

        let outcome = NativeEngine::new().solve(&p, &SolveOptions::optimize()).unwrap();
        // b can only take one shift: best split is 2/1/2
        assert_eq!(outcome.objective, Some(1));
        assert!(outcome.proven_optimal);
        assert_eq!(counts_of(&outcome, &p), vec![2, 1, 2]);
    }

    #[test]
    fn minimize_trips_groups_consecutive_days() {
        let days = weekdays(4);
        let slots: Vec<&str> = days.iter().map(String::as_str).collect();
        let bounds = BoundsInput::new()
            .person("a", LoadBound::range(2, 2))
            .person("b", LoadBound::range(2, 2));
        let p = problem(
            &slots,
            &[("a", vec![1.0; 4]), ("b", vec![1.0; 4])],
            Variant::MinimizeTrips,
            &bounds,
        );

        let outcome = NativeEngine::new().solve(&p, &SolveOptions::optimize()).unwrap();
        assert_eq!(outcome.objective, Some(2));
        assert!(outcome.proven_optimal);
        let assignment = outcome.assignment.unwrap();
        let owner: Vec<&str> = p
            .variables
            .iter()
            .map(|v| assignment.get(v.shift).unwrap())
            .collect();
        assert_eq!(owner, vec!["a", "a", "b", "b"]);
    }

    #[test]
    fn daily_cap_allows_double_shifts() {
        let p = problem(
            &["2025-03-03 09:00", "2025-03-03 14:00"],
            &[("a", vec![1.0, 1.0]), ("b", vec![0.0, 0.0])],
            Variant::Balanced,
            &BoundsInput::new().max_shifts_per_day(2),
        );
        let outcome = NativeEngine::new().solve(&p, &SolveOptions::satisfy()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Solved);
        assert_eq!(outcome.assignment.unwrap().count_for("a"), 2);
    }

    #[test]
    fn node_budget_reports_timeout() {
        let days = weekdays(3);
        let slots: Vec<&str> = days.iter().map(String::as_str).collect();
        let p = problem(
            &slots,
            &[("a", vec![1.0; 3]), ("b", vec![1.0; 3])],
            Variant::Balanced,
            &BoundsInput::new(),
        );

        let outcome = NativeEngine::new()
            .solve(&p, &SolveOptions::satisfy().node_limit(1))
            .unwrap();
        assert_eq!(outcome.status, SolveStatus::Timeout);
        assert!(outcome.assignment.is_none());
        assert_eq!(outcome.stats.nodes, 2);
    }

    #[test]
    fn repeated_solves_are_identical() {
        let days = weekdays(5);
        let slots: Vec<&str> = days.iter().map(String::as_str).collect();
        let p = problem(
            &slots,
            &[
                ("a", vec![1.0, 1.0, 0.0, 1.0, 1.0]),
                ("b", vec![1.0, 0.0, 1.0, 1.0, 0.0]),
                ("c", vec![0.0, 1.0, 1.0, 0.0, 1.0]),
            ],
            Variant::MinimizeTrips,
            &BoundsInput::new(),
        );
        let engine = NativeEngine::new();
        let first = engine.solve(&p, &SolveOptions::optimize()).unwrap();
        let second = engine.solve(&p, &SolveOptions::optimize()).unwrap();

        assert_eq!(first.assignment, second.assignment);
        assert_eq!(first.objective, second.objective);
        assert_eq!(first.stats.nodes, second.stats.nodes);
    }

    #[test]
    fn empty_problem_is_trivially_solved() {
        let p = problem(
            &["2025-03-03 09:00"],
            &[("a", vec![0.0])],
            Variant::Balanced,
            &BoundsInput::new(),
        );
        let outcome = NativeEngine::new().solve(&p, &SolveOptions::optimize()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Solved);
        assert!(outcome.assignment.unwrap().is_empty());
        assert_eq!(outcome.unassignable.len(), 1);
    }
}
