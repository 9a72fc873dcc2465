use serde::{Deserialize, Serialize};

use crate::{AgoraError, AgoraResult, Guid, Payload, Revision, Timestamp};

/// Typed label on a relation edge. ACL predicates share the vocabulary with
/// container-to-container predicates.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Predicate {
    ContributesTo,
    IsAdminOf,
    IsAffectedBy,
    IsCollaboratorOf,
    IsConcreteTargetOf,
    IsConsistentWith,
    IsCopyOf,
    IsCreatorOf,
    IsDuplicateOf,
    IsEquivalentTo,
    IsHeadOf,
    IsInconsistentWith,
    IsMeasuredBy,
    IsMemberOf,
    IsObjectiveFor,
    IsPartOf,
    IsPartOfMeasure,
    IsPartOfProgram,
    IsPartOfStrategy,
    IsPrerequisiteFor,
    IsSubTargetOf,
    IsSubtaskOf,
    IsSuperordinateOf,
}

impl Predicate {
    /// Predicates forming parent/child forests.
    pub const HIERARCHICAL: [Predicate; 4] = [
        Predicate::IsPartOf,
        Predicate::IsPartOfMeasure,
        Predicate::IsPartOfProgram,
        Predicate::IsPartOfStrategy,
    ];

    /// Predicates connecting a container revision to a user.
    pub const ACCESS_CONTROL: [Predicate; 5] = [
        Predicate::IsAdminOf,
        Predicate::IsCollaboratorOf,
        Predicate::IsCreatorOf,
        Predicate::IsHeadOf,
        Predicate::IsMemberOf,
    ];

    pub fn is_hierarchical(self) -> bool {
        Self::HIERARCHICAL.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Predicate::ContributesTo => "contributes-to",
            Predicate::IsAdminOf => "is-admin-of",
            Predicate::IsAffectedBy => "is-affected-by",
            Predicate::IsCollaboratorOf => "is-collaborator-of",
            Predicate::IsConcreteTargetOf => "is-concrete-target-of",
            Predicate::IsConsistentWith => "is-consistent-with",
            Predicate::IsCopyOf => "is-copy-of",
            Predicate::IsCreatorOf => "is-creator-of",
            Predicate::IsDuplicateOf => "is-duplicate-of",
            Predicate::IsEquivalentTo => "is-equivalent-to",
            Predicate::IsHeadOf => "is-head-of",
            Predicate::IsInconsistentWith => "is-inconsistent-with",
            Predicate::IsMeasuredBy => "is-measured-by",
            Predicate::IsMemberOf => "is-member-of",
            Predicate::IsObjectiveFor => "is-objective-for",
            Predicate::IsPartOf => "is-part-of",
            Predicate::IsPartOfMeasure => "is-part-of-measure",
            Predicate::IsPartOfProgram => "is-part-of-program",
            Predicate::IsPartOfStrategy => "is-part-of-strategy",
            Predicate::IsPrerequisiteFor => "is-prerequisite-for",
            Predicate::IsSubTargetOf => "is-sub-target-of",
            Predicate::IsSubtaskOf => "is-subtask-of",
            Predicate::IsSuperordinateOf => "is-superordinate-of",
        }
    }

    pub fn parse(value: &str) -> AgoraResult<Self> {
        match value {
            "contributes-to" => Ok(Predicate::ContributesTo),
            "is-admin-of" => Ok(Predicate::IsAdminOf),
            "is-affected-by" => Ok(Predicate::IsAffectedBy),
            "is-collaborator-of" => Ok(Predicate::IsCollaboratorOf),
            "is-concrete-target-of" => Ok(Predicate::IsConcreteTargetOf),
            "is-consistent-with" => Ok(Predicate::IsConsistentWith),
            "is-copy-of" => Ok(Predicate::IsCopyOf),
            "is-creator-of" => Ok(Predicate::IsCreatorOf),
            "is-duplicate-of" => Ok(Predicate::IsDuplicateOf),
            "is-equivalent-to" => Ok(Predicate::IsEquivalentTo),
            "is-head-of" => Ok(Predicate::IsHeadOf),
            "is-inconsistent-with" => Ok(Predicate::IsInconsistentWith),
            "is-measured-by" => Ok(Predicate::IsMeasuredBy),
            "is-member-of" => Ok(Predicate::IsMemberOf),
            "is-objective-for" => Ok(Predicate::IsObjectiveFor),
            "is-part-of" => Ok(Predicate::IsPartOf),
            "is-part-of-measure" => Ok(Predicate::IsPartOfMeasure),
            "is-part-of-program" => Ok(Predicate::IsPartOfProgram),
            "is-part-of-strategy" => Ok(Predicate::IsPartOfStrategy),
            "is-prerequisite-for" => Ok(Predicate::IsPrerequisiteFor),
            "is-sub-target-of" => Ok(Predicate::IsSubTargetOf),
            "is-subtask-of" => Ok(Predicate::IsSubtaskOf),
            "is-superordinate-of" => Ok(Predicate::IsSuperordinateOf),
            other => Err(AgoraError::validation(
                "predicate",
                format!("unknown predicate '{other}'"),
            )),
        }
    }
}

/// Edge between two container revisions. `position` orders siblings sharing
/// the same `(object, predicate)` group.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub object: Revision,
    pub predicate: Predicate,
    pub subject: Revision,
    pub position: i64,
}

/// Relation submitted with a create/update; an empty endpoint refers to the
/// revision being written.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewRelation {
    pub object: Option<Revision>,
    pub predicate: Predicate,
    pub subject: Option<Revision>,
    pub position: i64,
}

/// ACL edge from a container revision to a user.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserRelation {
    pub predicate: Predicate,
    pub subject: Guid,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TaskPriority {
    pub task: Guid,
    pub priority: i64,
}

/// One revision of a container together with its ACL rows and the currently
/// visible relations touching it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub revision: Revision,
    pub guid: Guid,
    pub realm: String,
    pub organization: Guid,
    pub organizational_unit: Option<Guid>,
    pub managed_by: Guid,
    pub payload: Payload,
    pub valid_currently: bool,
    pub deleted: bool,
    pub valid_from: Timestamp,
    #[serde(default)]
    pub relation: Vec<Relation>,
    #[serde(default)]
    pub user: Vec<UserRelation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewContainer {
    pub realm: String,
    pub organization: Guid,
    pub organizational_unit: Option<Guid>,
    pub managed_by: Guid,
    pub payload: Payload,
    pub user: Vec<UserRelation>,
    pub relation: Vec<NewRelation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModifiedContainer {
    pub guid: Guid,
    pub realm: String,
    pub organization: Guid,
    pub organizational_unit: Option<Guid>,
    pub managed_by: Guid,
    pub payload: Payload,
    pub user: Vec<UserRelation>,
    pub relation: Vec<NewRelation>,
    /// Optimistic-concurrency guard: when set, the update aborts with a
    /// conflict if the current revision differs.
    pub expected_revision: Option<Revision>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAction {
    Upsert,
    Delete,
}

impl IndexAction {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexAction::Upsert => "upsert",
            IndexAction::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> AgoraResult<Self> {
        match value {
            "upsert" => Ok(IndexAction::Upsert),
            "delete" => Ok(IndexAction::Delete),
            other => Err(AgoraError::validation(
                "action",
                format!("unknown index action '{other}'"),
            )),
        }
    }
}

/// Contract between a mutation and the index consumer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexEvent {
    pub action: IndexAction,
    pub guid: Guid,
    pub timestamp: Timestamp,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i16)]
pub enum JobStatus {
    Pending = 0,
    DeadLetter = 2,
}

impl JobStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(JobStatus::Pending),
            2 => Some(JobStatus::DeadLetter),
            _ => None,
        }
    }
}

/// Queued indexing event row. Action and guid stay unparsed so that poison
/// rows can travel to the dead-letter set instead of failing the lease.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexJob {
    pub job_id: i64,
    pub action: String,
    pub guid: String,
    pub enqueued_at: Timestamp,
    pub attempts: i32,
    pub next_run_after: Option<i64>,
    pub status: JobStatus,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::Predicate;

    #[test]
    fn predicate_strings_roundtrip() {
        for predicate in [
            Predicate::IsPartOf,
            Predicate::IsPartOfProgram,
            Predicate::IsCreatorOf,
            Predicate::IsSubTargetOf,
        ] {
            assert_eq!(Predicate::parse(predicate.as_str()).unwrap(), predicate);
        }
        assert!(Predicate::parse("is-banana-of").is_err());
    }

    #[test]
    fn hierarchical_subset_is_marked() {
        assert!(Predicate::IsPartOfMeasure.is_hierarchical());
        assert!(!Predicate::IsMeasuredBy.is_hierarchical());
    }
}
