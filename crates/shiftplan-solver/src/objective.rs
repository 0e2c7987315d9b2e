//! Objective functions of the two problem variants
//!
//! - `balanced`: spread = max count − min count over people who can take at
//!   least one shift
//! - `minimize-trips`: number of maximal runs of worked days, where a day
//!   continues a run when it follows the previous problem day on the calendar

use crate::problem::ProblemSpec;
use shiftplan_core::Variant;

/// Shifts per person for a complete assignment
pub fn counts(problem: &ProblemSpec, values: &[usize]) -> Vec<u32> {
    let mut counts = vec![0u32; problem.num_people()];
    for &person in values {
        counts[person] += 1;
    }
    counts
}

/// Spread of `counts` over active people
pub fn spread(problem: &ProblemSpec, counts: &[u32]) -> i64 {
    let mut active = problem.active_people().map(|p| counts[p]);
    let Some(first) = active.next() else {
        return 0;
    };
    let (lo, hi) = active.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c)));
    i64::from(hi - lo)
}

/// Total trips of a complete assignment
pub fn trips(problem: &ProblemSpec, values: &[usize]) -> i64 {
    let mut worked = vec![vec![false; problem.days.len()]; problem.num_people()];
    for (var, &person) in problem.variables.iter().zip(values) {
        worked[person][var.day] = true;
    }

    let mut total = 0;
    for row in &worked {
        for (d, day) in problem.days.iter().enumerate() {
            if row[d] && !day.continues.is_some_and(|prev| row[prev]) {
                total += 1;
            }
        }
    }
    total
}

/// Objective of the problem's variant
pub fn evaluate(problem: &ProblemSpec, values: &[usize]) -> i64 {
    match problem.variant {
        Variant::Balanced => spread(problem, &counts(problem, values)),
        Variant::MinimizeTrips => trips(problem, values),
    }
}

/// A bound no assignment can beat; reaching it ends the search
pub fn root_lower_bound(problem: &ProblemSpec) -> i64 {
    match problem.variant {
        Variant::Balanced => {
            let active = problem.active_people().count();
            if active > 0 && problem.num_variables() % active != 0 {
                1
            } else {
                0
            }
        }
        // Everyone with a positive minimum travels at least once
        Variant::MinimizeTrips => problem.bounds.iter().filter(|b| b.min > 0).count() as i64,
    }
}
