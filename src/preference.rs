use crate::model::{Grader, GraderId, StudentId, Submission, SubmissionId};
use crate::solution::AssignmentResult;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Outcome of greedily honoring grader preferences.
///
/// Graders and submissions are referred to by their index in the solver input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferencePass {
    /// index i gives the grader assigned to submission i, if any
    pub submission_to_grader: Vec<Option<usize>>,
    /// index g gives how many more submissions grader g may receive
    pub remaining_capacity: Vec<usize>,
    pub honored: usize,
}

impl PreferencePass {
    pub fn unassigned(&self) -> impl Iterator<Item = usize> + '_ {
        self.submission_to_grader
            .iter()
            .enumerate()
            .filter(|(_, grader)| grader.is_none())
            .map(|(submission, _)| submission)
    }

    pub fn num_unassigned(&self) -> usize {
        self.submission_to_grader
            .iter()
            .filter(|grader| grader.is_none())
            .count()
    }
}

/// Single in-order pass over `submissions`: a submission goes to the grader preferred by its
/// primary author when that grader exists, has no conflict with it and still has capacity.
/// Earlier submissions win when a grader's capacity is contended.
pub fn apply_preferences(
    graders: &[Grader],
    submissions: &[Submission],
    capacities: &[usize],
    grader_preferences: &HashMap<StudentId, GraderId>,
) -> PreferencePass {
    debug_assert_eq!(graders.len(), capacities.len());
    let mut pass = PreferencePass {
        submission_to_grader: vec![None; submissions.len()],
        remaining_capacity: capacities.to_vec(),
        honored: 0,
    };
    if grader_preferences.is_empty() {
        return pass;
    }

    let grader_index: HashMap<&GraderId, usize> = graders
        .iter()
        .enumerate()
        .map(|(idx, grader)| (&grader.id, idx))
        .collect();

    for (s, submission) in submissions.iter().enumerate() {
        let preferred = match submission
            .authorship
            .primary_author()
            .and_then(|student| grader_preferences.get(student))
        {
            Some(preferred) => preferred,
            None => continue,
        };
        let g = match grader_index.get(preferred) {
            Some(&g) => g,
            None => {
                debug!(
                    "skipping preference of {} for unknown grader {}",
                    submission.id, preferred
                );
                continue;
            }
        };
        if pass.remaining_capacity[g] == 0 {
            trace!("preferred grader {} is full, {} falls through", preferred, submission.id);
            continue;
        }
        if graders[g].conflicts_with(submission) {
            trace!("preferred grader {} conflicts with {}", preferred, submission.id);
            continue;
        }

        pass.submission_to_grader[s] = Some(g);
        pass.remaining_capacity[g] -= 1;
        pass.honored += 1;
        trace!("{} assigned to preferred grader {}", submission.id, preferred);
    }
    debug!(
        "{} of {} submissions assigned by preference",
        pass.honored,
        submissions.len()
    );
    pass
}

/// Derives a `student -> grader` preference map from an earlier assignment, so a reassignment
/// keeps every student with the grader who reviewed them before.
///
/// Group submissions map every member to the group's grader.
pub fn grader_preferences_from(
    previous: &AssignmentResult,
    submissions: &[Submission],
) -> HashMap<StudentId, GraderId> {
    let by_id: HashMap<&SubmissionId, &Submission> = submissions
        .iter()
        .map(|submission| (&submission.id, submission))
        .collect();

    let mut preferences = HashMap::new();
    for (grader, assigned) in previous.iter() {
        for submission in assigned.iter().filter_map(|id| by_id.get(id)) {
            for student in submission.authorship.students() {
                preferences.insert(student.clone(), grader.clone());
            }
        }
    }
    preferences
}
