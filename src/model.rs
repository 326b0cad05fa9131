use std::collections::HashSet;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Stable identifier of a grader (instructor or teaching assistant)
    GraderId
);
string_id!(
    /// Stable identifier of a submission
    SubmissionId
);
string_id!(
    /// Stable identifier of a student, used for authorship and conflicts
    StudentId
);

/// Who authored a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorship {
    Individual(StudentId),
    /// Group members in listing order. The first member is the primary author.
    Group(Vec<StudentId>),
}

impl Authorship {
    /// Student whose preference is consulted for the whole submission.
    pub fn primary_author(&self) -> Option<&StudentId> {
        match self {
            Authorship::Individual(student) => Some(student),
            Authorship::Group(members) => members.first(),
        }
    }

    pub fn students(&self) -> &[StudentId] {
        match self {
            Authorship::Individual(student) => std::slice::from_ref(student),
            Authorship::Group(members) => members.as_slice(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Grader {
    pub id: GraderId,
    /// students this grader must never review, alone or as part of a group
    pub conflicts: HashSet<StudentId>,
}

impl Grader {
    pub fn new(id: impl Into<GraderId>) -> Self {
        Self {
            id: id.into(),
            conflicts: HashSet::new(),
        }
    }

    pub fn with_conflicts<S, It>(mut self, students: It) -> Self
    where
        S: Into<StudentId>,
        It: IntoIterator<Item = S>,
    {
        self.conflicts.extend(students.into_iter().map(Into::into));
        self
    }

    /// Returns true if any author of the submission is on this grader's conflict list.
    #[inline]
    pub fn conflicts_with(&self, submission: &Submission) -> bool {
        has_conflict(self, submission)
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub id: SubmissionId,
    pub authorship: Authorship,
}

impl Submission {
    pub fn individual(id: impl Into<SubmissionId>, student: impl Into<StudentId>) -> Self {
        Self {
            id: id.into(),
            authorship: Authorship::Individual(student.into()),
        }
    }

    pub fn group<S, It>(id: impl Into<SubmissionId>, members: It) -> Self
    where
        S: Into<StudentId>,
        It: IntoIterator<Item = S>,
    {
        Self {
            id: id.into(),
            authorship: Authorship::Group(members.into_iter().map(Into::into).collect()),
        }
    }
}

/// Conflict predicate: a grader is ineligible for the whole submission as soon as
/// one of its authors is on the grader's conflict list.
pub fn has_conflict(grader: &Grader, submission: &Submission) -> bool {
    if grader.conflicts.is_empty() {
        return false;
    }
    submission
        .authorship
        .students()
        .iter()
        .any(|student| grader.conflicts.contains(student))
}

#[cfg(test)]
mod tests {
    use super::{has_conflict, Authorship, Grader, StudentId, Submission};

    #[test]
    fn test_individual_conflict() {
        let grader = Grader::new("g1").with_conflicts(["alice"]);
        assert!(has_conflict(&grader, &Submission::individual("s1", "alice")));
        assert!(!has_conflict(&grader, &Submission::individual("s2", "bob")));
    }

    #[test]
    fn test_group_conflict_on_any_member() {
        let grader = Grader::new("g1").with_conflicts(["carol"]);
        let group = Submission::group("s1", ["alice", "bob", "carol"]);
        assert!(grader.conflicts_with(&group));

        let other = Submission::group("s2", ["alice", "bob"]);
        assert!(!grader.conflicts_with(&other));
    }

    #[test]
    fn test_no_conflicts_never_blocks() {
        let grader = Grader::new("g1");
        assert!(!grader.conflicts_with(&Submission::group("s1", ["alice", "bob"])));
    }

    #[test]
    fn test_primary_author() {
        let individual = Submission::individual("s1", "alice");
        assert_eq!(
            individual.authorship.primary_author(),
            Some(&StudentId::from("alice"))
        );
        let group = Submission::group("s2", ["bob", "carol"]);
        assert_eq!(
            group.authorship.primary_author(),
            Some(&StudentId::from("bob"))
        );
        assert_eq!(Authorship::Group(vec![]).primary_author(), None);
    }
}
