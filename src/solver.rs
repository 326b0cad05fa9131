use crate::capacity::{plan_capacities, CapacityPlan};
use crate::flow::FlowNetwork;
use crate::model::{Authorship, Grader, GraderId, StudentId, Submission, SubmissionId};
use crate::preference::{apply_preferences, PreferencePass};
use crate::solution::{AssignmentResult, FailureKind, SolvePhase};
use anyhow::{ensure, Result};
use num_traits::AsPrimitive;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Optional overrides of the solver constants.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolverParams {
    /// initial workload reduction factor, lowered automatically when capacity is short
    pub workload_reduction_factor: Option<f64>,
    /// amount the workload reduction factor is lowered by per relaxation
    pub reduction_step: Option<f64>,
    /// when set, the difference between the most and least loaded grader may not exceed it
    pub max_spread: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Source,
    Sink,
    Grader(usize),
    Submission(usize),
}

/// Assigns graders to submissions.
///
/// Capacities are derived from an even split adjusted by historical workload, explicit
/// preferences are honored first, and the remaining submissions are distributed by maximum
/// flow over a Source -> Grader -> Submission -> Sink network that omits conflicting pairs.
///
/// Infeasible inputs are reported through the returned [`AssignmentResult`]; `solve` only
/// errors on malformed input such as duplicate ids.
#[derive(Debug, Clone)]
pub struct AssignmentSolver {
    graders: Vec<Grader>,
    submissions: Vec<Submission>,
    historical_workload: HashMap<GraderId, u32>,
    grader_preferences: HashMap<StudentId, GraderId>,
    params: SolverParams,
}

impl AssignmentSolver {
    pub const DEFAULT_WORKLOAD_REDUCTION_FACTOR: f64 = 1.0;
    pub const REDUCTION_STEP: f64 = 0.1;

    pub fn new(graders: Vec<Grader>, submissions: Vec<Submission>) -> Self {
        Self {
            graders,
            submissions,
            historical_workload: HashMap::new(),
            grader_preferences: HashMap::new(),
            params: SolverParams::default(),
        }
    }

    pub fn with_historical_workload(mut self, historical_workload: HashMap<GraderId, u32>) -> Self {
        self.historical_workload = historical_workload;
        self
    }

    pub fn with_grader_preferences(
        mut self,
        grader_preferences: HashMap<StudentId, GraderId>,
    ) -> Self {
        self.grader_preferences = grader_preferences;
        self
    }

    pub fn with_params(mut self, params: SolverParams) -> Self {
        self.params = params;
        self
    }

    pub fn graders(&self) -> &[Grader] {
        &self.graders
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    fn validate_input(&self) -> Result<()> {
        let mut grader_ids = HashSet::with_capacity(self.graders.len());
        for grader in self.graders.iter() {
            ensure!(grader_ids.insert(&grader.id), "duplicate grader {}", grader.id);
        }
        let mut submission_ids = HashSet::with_capacity(self.submissions.len());
        for submission in self.submissions.iter() {
            ensure!(
                submission_ids.insert(&submission.id),
                "duplicate submission {}",
                submission.id
            );
            if let Authorship::Group(members) = &submission.authorship {
                ensure!(!members.is_empty(), "group submission {} has no members", submission.id);
            }
        }
        Ok(())
    }

    pub fn solve(&self) -> Result<AssignmentResult> {
        self.validate_input()?;
        let mut phases = vec![SolvePhase::Initialized];

        let plan = plan_capacities(
            &self.graders,
            self.submissions.len(),
            &self.historical_workload,
            self.params
                .workload_reduction_factor
                .unwrap_or(Self::DEFAULT_WORKLOAD_REDUCTION_FACTOR),
            self.params.reduction_step.unwrap_or(Self::REDUCTION_STEP),
        )?;
        if !plan.feasible {
            let error = format!(
                "Negative workload factor was needed to cover {} submissions with {} graders",
                self.submissions.len(),
                self.graders.len()
            );
            warn!("{}", error);
            return Ok(self.failed(
                &plan,
                FailureKind::CapacityInfeasible,
                error,
                0,
                0,
                phases,
            ));
        }
        phases.push(SolvePhase::CapacityValidated);

        let capacities: Vec<usize> = self
            .graders
            .iter()
            .map(|grader| plan.capacity_of(&grader.id))
            .collect();
        let mut pass = apply_preferences(
            &self.graders,
            &self.submissions,
            &capacities,
            &self.grader_preferences,
        );
        phases.push(SolvePhase::PreferencesApplied);

        let unassigned = pass.num_unassigned();
        let total_flow = if unassigned == 0 {
            debug!("preferences covered every submission, skipping max flow");
            0
        } else {
            let total_flow = self.assign_by_flow(&mut pass)?;
            if total_flow < unassigned {
                let uncovered = unassigned - total_flow;
                let error = format!(
                    "{} submissions could not be covered by any grader",
                    uncovered
                );
                warn!("{}", error);
                return Ok(self.failed(
                    &plan,
                    FailureKind::FlowInfeasible { uncovered },
                    error,
                    total_flow,
                    pass.honored,
                    phases,
                ));
            }
            phases.push(SolvePhase::FlowCompleted);
            total_flow
        };

        let mut assignments: BTreeMap<GraderId, Vec<SubmissionId>> = self
            .graders
            .iter()
            .map(|grader| (grader.id.clone(), Vec::new()))
            .collect();
        for (submission, grader) in self.submissions.iter().zip(pass.submission_to_grader.iter()) {
            if let Some(g) = grader {
                if let Some(assigned) = assignments.get_mut(&self.graders[*g].id) {
                    assigned.push(submission.id.clone());
                }
            }
        }

        let out_of_band = self.verify_balance(&plan, &assignments);
        phases.push(SolvePhase::BalanceVerified);
        let (success, failure, error) = if out_of_band.is_empty() {
            info!(
                "assigned {} submissions to {} graders",
                self.submissions.len(),
                self.graders.len()
            );
            (true, None, None)
        } else {
            let failure = FailureKind::Unbalanced {
                graders: out_of_band,
            };
            let error = format!("assignment is complete but unbalanced: {}", failure);
            info!("{}", error);
            (false, Some(failure), Some(error))
        };

        Ok(AssignmentResult {
            success,
            error,
            failure,
            assignments: Some(assignments),
            min_assignments: plan.min_assignments,
            max_assignments: plan.max_assignments,
            total_flow,
            grader_capacities: plan.capacities,
            workload_reduction_factor: plan.workload_reduction_factor,
            preferences_honored: pass.honored,
            phases,
        })
    }

    /// Distributes the submissions left over by the preference pass. Returns the flow achieved;
    /// `pass` is updated with every submission that received a grader.
    fn assign_by_flow(&self, pass: &mut PreferencePass) -> Result<usize> {
        let unassigned: Vec<usize> = pass.unassigned().collect();
        let mut network: FlowNetwork<Node, i64> = FlowNetwork::with_capacity(
            self.graders.len() + unassigned.len() + 2,
            self.graders.len() * (unassigned.len() + 1) + unassigned.len(),
        );
        network.add_node(Node::Source);
        network.add_node(Node::Sink);

        for (g, grader) in self.graders.iter().enumerate() {
            let remaining = pass.remaining_capacity[g];
            if remaining > 0 {
                network.add_edge(Node::Source, Node::Grader(g), remaining as i64);
            }
            for &s in unassigned.iter() {
                if !grader.conflicts_with(&self.submissions[s]) {
                    network.add_edge(Node::Grader(g), Node::Submission(s), 1);
                }
            }
        }
        for &s in unassigned.iter() {
            network.add_edge(Node::Submission(s), Node::Sink, 1);
        }
        debug!(
            "flow network with {} nodes and {} edges for {} submissions",
            network.num_nodes(),
            network.num_edges(),
            unassigned.len()
        );

        let total_flow: usize = network.max_flow(&Node::Source, &Node::Sink)?.as_();
        if total_flow < unassigned.len() {
            return Ok(total_flow);
        }

        for g in 0..self.graders.len() {
            for (target, _, flow) in network.edges_from(&Node::Grader(g)) {
                if let Node::Submission(s) = *target {
                    if flow > 0 {
                        debug_assert!(pass.submission_to_grader[s].is_none());
                        pass.submission_to_grader[s] = Some(g);
                        pass.remaining_capacity[g] -= 1;
                    }
                }
            }
        }
        Ok(total_flow)
    }

    /// Graders whose load falls outside `[min(min_assignments, capacity), capacity]`, or every
    /// grader at the extremes when the optional spread limit is exceeded.
    fn verify_balance(
        &self,
        plan: &CapacityPlan,
        assignments: &BTreeMap<GraderId, Vec<SubmissionId>>,
    ) -> Vec<GraderId> {
        let mut out_of_band = Vec::new();
        for (grader, assigned) in assignments.iter() {
            let capacity = plan.capacity_of(grader);
            let lower = plan.min_assignments.min(capacity);
            if assigned.len() < lower || assigned.len() > capacity {
                warn!(
                    "grader {} has {} submissions, expected between {} and {}",
                    grader,
                    assigned.len(),
                    lower,
                    capacity
                );
                out_of_band.push(grader.clone());
            }
        }

        if let Some(max_spread) = self.params.max_spread {
            let loads = assignments.values().map(Vec::len);
            let (least, most) = (loads.clone().min(), loads.max());
            if let (Some(least), Some(most)) = (least, most) {
                if most - least > max_spread {
                    warn!(
                        "grader loads range from {} to {}, allowed spread is {}",
                        least, most, max_spread
                    );
                    for (grader, assigned) in assignments.iter() {
                        let load = assigned.len();
                        if (load == least || load == most) && !out_of_band.contains(grader) {
                            out_of_band.push(grader.clone());
                        }
                    }
                }
            }
        }
        out_of_band
    }

    fn failed(
        &self,
        plan: &CapacityPlan,
        failure: FailureKind,
        error: String,
        total_flow: usize,
        preferences_honored: usize,
        phases: Vec<SolvePhase>,
    ) -> AssignmentResult {
        AssignmentResult {
            success: false,
            error: Some(error),
            failure: Some(failure),
            assignments: None,
            min_assignments: plan.min_assignments,
            max_assignments: plan.max_assignments,
            total_flow,
            grader_capacities: plan.capacities.clone(),
            workload_reduction_factor: plan.workload_reduction_factor,
            preferences_honored,
            phases,
        }
    }
}
