//! Assignment of graders to student submissions.
//!
//! Every grader receives a quota derived from an even split of the submissions, reduced by the
//! grader's historical workload. Explicit preferences (for instance "keep the grader of the
//! previous assignment") are honored first; the remaining submissions are distributed with an
//! Edmonds-Karp maximum flow that never pairs a grader with a student on their conflict list.
//! The result is finally checked against a per-grader balance band.
//!
//! ```
//! use grader_assignment::{AssignmentSolver, Grader, Submission};
//!
//! let graders = vec![Grader::new("ta-1").with_conflicts(["bob"]), Grader::new("ta-2")];
//! let submissions = vec![
//!     Submission::individual("hw-alice", "alice"),
//!     Submission::individual("hw-bob", "bob"),
//! ];
//! let result = AssignmentSolver::new(graders, submissions).solve()?;
//! assert!(result.success);
//! assert_eq!(result.grader_for(&"hw-bob".into()).unwrap().as_str(), "ta-2");
//! # Ok::<(), anyhow::Error>(())
//! ```
pub mod capacity;
pub mod flow;
pub mod model;
pub mod preference;
pub mod solution;
pub mod solver;

pub use capacity::{plan_capacities, CapacityPlan};
pub use flow::{EdgeId, FlowInt, FlowNetwork};
pub use model::{has_conflict, Authorship, Grader, GraderId, StudentId, Submission, SubmissionId};
pub use preference::{apply_preferences, grader_preferences_from, PreferencePass};
pub use solution::{historical_workload_from, AssignmentResult, FailureKind, SolvePhase};
pub use solver::{AssignmentSolver, SolverParams};
