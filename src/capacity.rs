use crate::model::{Grader, GraderId};
use anyhow::{ensure, Result};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Per-grader submission quotas for one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityPlan {
    /// floor(submissions / graders)
    pub min_assignments: usize,
    /// ceil(submissions / graders)
    pub max_assignments: usize,
    /// capacity of every grader from the last attempt, feasible or not
    pub capacities: HashMap<GraderId, usize>,
    /// workload reduction factor the capacities were computed with
    pub workload_reduction_factor: f64,
    /// number of times the factor was lowered
    pub relaxations: u32,
    /// total capacity covers every submission
    pub feasible: bool,
}

impl CapacityPlan {
    pub fn total(&self) -> usize {
        self.capacities.values().sum()
    }

    #[inline]
    pub fn capacity_of(&self, grader: &GraderId) -> usize {
        self.capacities.get(grader).copied().unwrap_or(0)
    }
}

/// Capacity of a single grader: the fair-share ceiling lowered by the weighted historical
/// workload, clamped to `[1, max_assignments]`.
pub fn grader_capacity(max_assignments: usize, historical_workload: u32, factor: f64) -> usize {
    let penalty = (f64::from(historical_workload) * factor).floor() as i64;
    let ceiling = max_assignments as i64;
    (ceiling - penalty).min(ceiling).max(1) as usize
}

/// Computes grader capacities, lowering `reduction_factor` by `reduction_step` until the total
/// capacity covers `num_submissions`.
///
/// The last attempt is always made at factor zero. The returned plan is marked infeasible when
/// even that attempt falls short, which can only happen when there are submissions but no
/// graders.
pub fn plan_capacities(
    graders: &[Grader],
    num_submissions: usize,
    historical_workload: &HashMap<GraderId, u32>,
    reduction_factor: f64,
    reduction_step: f64,
) -> Result<CapacityPlan> {
    ensure!(
        reduction_factor.is_finite() && reduction_factor >= 0.,
        "workload reduction factor must be a non-negative number, got {}",
        reduction_factor
    );
    ensure!(
        reduction_step.is_finite() && reduction_step > 0.,
        "reduction step must be positive, got {}",
        reduction_step
    );

    let num_graders = graders.len();
    let (min_assignments, max_assignments) = if num_graders == 0 {
        (0, 0)
    } else {
        (
            num_submissions / num_graders,
            (num_submissions + num_graders - 1) / num_graders,
        )
    };
    trace!(
        "fair share: min {} max {} for {} submissions over {} graders",
        min_assignments,
        max_assignments,
        num_submissions,
        num_graders
    );

    let mut plan = CapacityPlan {
        min_assignments,
        max_assignments,
        capacities: HashMap::with_capacity(num_graders),
        workload_reduction_factor: reduction_factor,
        relaxations: 0,
        feasible: false,
    };

    let mut factor = reduction_factor;
    loop {
        plan.capacities.clear();
        plan.capacities.extend(graders.iter().map(|grader| {
            let workload = historical_workload.get(&grader.id).copied().unwrap_or(0);
            (
                grader.id.clone(),
                grader_capacity(max_assignments, workload, factor),
            )
        }));
        plan.workload_reduction_factor = factor;

        let total = plan.total();
        if total >= num_submissions {
            plan.feasible = true;
            debug!(
                "capacity {} covers {} submissions at workload factor {:.2}",
                total, num_submissions, factor
            );
            return Ok(plan);
        }

        if factor <= 0. {
            warn!(
                "capacity {} cannot cover {} submissions even without workload reduction",
                total, num_submissions
            );
            return Ok(plan);
        }
        // the last step always lands on exactly zero, where no grader is penalized
        factor = (factor - reduction_step).max(0.);
        plan.relaxations += 1;
        debug!(
            "capacity {} short of {} submissions, relaxing workload factor to {:.2}",
            total, num_submissions, factor
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{grader_capacity, plan_capacities};
    use crate::model::{Grader, GraderId};
    use std::collections::HashMap;

    fn graders(n: usize) -> Vec<Grader> {
        (0..n).map(|i| Grader::new(format!("g{}", i))).collect()
    }

    #[test]
    fn test_grader_capacity_clamps() {
        assert_eq!(grader_capacity(3, 0, 1.0), 3);
        assert_eq!(grader_capacity(3, 1, 1.0), 2);
        // never below one
        assert_eq!(grader_capacity(3, 10, 1.0), 1);
        assert_eq!(grader_capacity(0, 0, 1.0), 1);
        assert_eq!(grader_capacity(3, 5, 0.3), 2);
        assert_eq!(grader_capacity(3, 5, 0.0), 3);
    }

    #[test]
    fn test_even_split() {
        let plan = plan_capacities(&graders(3), 9, &HashMap::new(), 1.0, 0.1).unwrap();
        assert!(plan.feasible);
        assert_eq!(plan.min_assignments, 3);
        assert_eq!(plan.max_assignments, 3);
        assert_eq!(plan.total(), 9);
        assert_eq!(plan.relaxations, 0);
    }

    #[test]
    fn test_uneven_split() {
        let plan = plan_capacities(&graders(3), 10, &HashMap::new(), 1.0, 0.1).unwrap();
        assert_eq!(plan.min_assignments, 3);
        assert_eq!(plan.max_assignments, 4);
        assert!(plan.capacities.values().all(|&capacity| capacity == 4));
    }

    #[test]
    fn test_history_reduces_capacity_without_relaxing() {
        let workload = HashMap::from([(GraderId::from("g0"), 1)]);
        let plan = plan_capacities(&graders(3), 5, &workload, 1.0, 0.1).unwrap();
        assert!(plan.feasible);
        assert_eq!(plan.capacity_of(&GraderId::from("g0")), 1);
        assert_eq!(plan.capacity_of(&GraderId::from("g1")), 2);
        assert_eq!(plan.capacity_of(&GraderId::from("g2")), 2);
        assert_eq!(plan.relaxations, 0);
    }

    #[test]
    fn test_history_penalty_lifted_by_relaxation() {
        let workload = HashMap::from([(GraderId::from("g0"), 2)]);
        let plan = plan_capacities(&graders(3), 6, &workload, 1.0, 0.1).unwrap();
        assert!(plan.feasible);
        // 1 + 2 + 2 < 6 until floor(2 * factor) drops to zero
        assert_eq!(plan.capacity_of(&GraderId::from("g0")), 2);
        assert_eq!(plan.total(), 6);
        assert_eq!(plan.relaxations, 6);
    }

    #[test]
    fn test_relaxation_until_feasible() {
        let workload = HashMap::from([(GraderId::from("g0"), 2), (GraderId::from("g1"), 2)]);
        let plan = plan_capacities(&graders(2), 4, &workload, 1.0, 0.1).unwrap();
        assert!(plan.feasible);
        assert_eq!(plan.total(), 4);
        assert_eq!(plan.relaxations, 6);
        assert!((plan.workload_reduction_factor - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_relaxation_reaches_zero_from_any_seed() {
        let workload = HashMap::from([(GraderId::from("g0"), 100), (GraderId::from("g1"), 100)]);
        for (seed, step) in [(0.3, 0.1), (1.5, 0.1), (1.0, 0.3), (0.0, 0.1)] {
            let plan = plan_capacities(&graders(2), 4, &workload, seed, step).unwrap();
            assert!(plan.feasible, "seed {} step {}", seed, step);
            assert_eq!(plan.workload_reduction_factor, 0.);
            assert_eq!(plan.total(), 4);
        }
    }

    #[test]
    fn test_no_graders_is_infeasible() {
        let plan = plan_capacities(&[], 3, &HashMap::new(), 1.0, 0.1).unwrap();
        assert!(!plan.feasible);
        assert_eq!(plan.total(), 0);
        assert_eq!(plan.workload_reduction_factor, 0.);

        let empty = plan_capacities(&[], 0, &HashMap::new(), 1.0, 0.1).unwrap();
        assert!(empty.feasible);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(plan_capacities(&graders(1), 1, &HashMap::new(), -0.5, 0.1).is_err());
        assert!(plan_capacities(&graders(1), 1, &HashMap::new(), f64::NAN, 0.1).is_err());
        assert!(plan_capacities(&graders(1), 1, &HashMap::new(), 1.0, 0.0).is_err());
    }
}
