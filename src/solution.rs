use crate::model::{GraderId, SubmissionId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Stages of a solve, in the order they complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SolvePhase {
    Initialized,
    CapacityValidated,
    PreferencesApplied,
    FlowCompleted,
    BalanceVerified,
}

/// Why a solve did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// total capacity stays below the number of submissions even without workload reduction
    CapacityInfeasible,
    /// conflicts and capacities leave `uncovered` submissions without a grader
    FlowInfeasible { uncovered: usize },
    /// every submission is assigned but these graders are outside their expected load
    Unbalanced { graders: Vec<GraderId> },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::CapacityInfeasible => write!(f, "capacity infeasible"),
            FailureKind::FlowInfeasible { uncovered } => {
                write!(f, "{} submissions could not be covered", uncovered)
            }
            FailureKind::Unbalanced { graders } => {
                write!(f, "{} graders outside their expected load", graders.len())
            }
        }
    }
}

///
/// Result of assigning graders to submissions
///
#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub success: bool,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    /// every grader mapped to its submissions in input order.
    ///
    /// `None` when the solve failed before a complete assignment existed.
    pub assignments: Option<BTreeMap<GraderId, Vec<SubmissionId>>>,
    pub min_assignments: usize,
    pub max_assignments: usize,
    /// flow pushed through the network; zero when preferences covered everything
    pub total_flow: usize,
    pub grader_capacities: HashMap<GraderId, usize>,
    /// workload reduction factor the capacities were computed with
    pub workload_reduction_factor: f64,
    pub preferences_honored: usize,
    /// phases that completed, in order; the flow phase is absent when preferences covered
    /// every submission
    pub phases: Vec<SolvePhase>,
}

impl AssignmentResult {
    /// Last phase that completed.
    pub fn reached(&self) -> SolvePhase {
        self.phases.last().copied().unwrap_or(SolvePhase::Initialized)
    }

    /// Every submission is assigned, balanced or not.
    pub fn is_complete(&self) -> bool {
        self.assignments.is_some()
    }

    /// Complete assignment that violates the balance band and should be reviewed by hand.
    pub fn needs_review(&self) -> bool {
        self.is_complete() && matches!(self.failure, Some(FailureKind::Unbalanced { .. }))
    }

    /// (grader, submissions) pairs sorted by grader id; empty for failed solves.
    pub fn iter(&self) -> impl Iterator<Item = (&GraderId, &Vec<SubmissionId>)> {
        self.assignments.iter().flat_map(|assignments| assignments.iter())
    }

    pub fn grader_for(&self, submission: &SubmissionId) -> Option<&GraderId> {
        self.iter()
            .find(|(_, assigned)| assigned.contains(submission))
            .map(|(grader, _)| grader)
    }

    pub fn assigned_count(&self, grader: &GraderId) -> usize {
        self.assignments
            .as_ref()
            .and_then(|assignments| assignments.get(grader))
            .map_or(0, Vec::len)
    }

    /// Difference between the largest and smallest load across graders.
    pub fn spread(&self) -> Option<usize> {
        let loads = self.iter().map(|(_, assigned)| assigned.len());
        let (min, max) = loads.fold((usize::MAX, 0), |(min, max), load| {
            (min.min(load), max.max(load))
        });
        if min == usize::MAX {
            None
        } else {
            Some(max - min)
        }
    }
}

/// Sums the submissions each grader received across earlier results, for use as the
/// historical workload of a later solve.
pub fn historical_workload_from<'a, It>(results: It) -> HashMap<GraderId, u32>
where
    It: IntoIterator<Item = &'a AssignmentResult>,
{
    let mut workload = HashMap::new();
    for (grader, assigned) in results.into_iter().flat_map(AssignmentResult::iter) {
        *workload.entry(grader.clone()).or_insert(0) += assigned.len() as u32;
    }
    workload
}
