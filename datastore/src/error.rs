//! Error types shared by stores, schema construction and commits.

use std::fmt;

use crate::entity::EntityId;
use crate::unit_of_work::ChangeOp;

/// Failure reported by a storage backend while executing one operation.
///
/// Missing records are not errors: updates and deletes against an unknown
/// identity are absorbed by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The storage driver rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A lock guarding shared in-memory data was poisoned by a panic.
    #[error("mutex poisoned")]
    Poisoned,

    /// No data store is registered for the requested entity type.
    #[error("no data store registered for `{0}`")]
    MissingStore(&'static str),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Invalid schema or navigation graph, detected while building a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("navigation `{binding}` references unregistered type `{type_name}`")]
    UnregisteredType {
        binding: &'static str,
        type_name: &'static str,
    },

    #[error("navigation cycle: {}", .0.join(" -> "))]
    NavigationCycle(Vec<&'static str>),

    #[error("navigation `{binding}` is registered twice on `{owner}`")]
    DuplicateBinding {
        owner: &'static str,
        binding: &'static str,
    },

    #[error("data store for `{0}` is registered twice")]
    DuplicateStore(&'static str),
}

/// One pending change, named by entity type and identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRef {
    pub entity_type: &'static str,
    pub id: EntityId,
    pub op: ChangeOp,
}

impl fmt::Display for ChangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}#{}", self.op.as_str(), self.entity_type, self.id)
    }
}

/// A commit stopped part-way through.
///
/// `applied` lists every store operation that took effect (cascaded ones
/// included); it is empty when the backend rolled the whole commit back.
/// `failed` is the tracked change being persisted when the backend failed and
/// `not_applied` the tracked changes that were never attempted.
#[derive(Debug, thiserror::Error)]
#[error(
    "commit failed at {failed} ({} applied, {} not applied, rolled back: {rolled_back}): {source}",
    .applied.len(),
    .not_applied.len()
)]
pub struct CommitFailure {
    pub applied: Vec<ChangeRef>,
    pub failed: ChangeRef,
    pub not_applied: Vec<ChangeRef>,
    pub rolled_back: bool,
    #[source]
    pub source: StoreError,
}

/// Errors surfaced to callers of a unit of work or data context.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Commit(Box<CommitFailure>),
}

impl From<CommitFailure> for PersistError {
    fn from(failure: CommitFailure) -> Self {
        PersistError::Commit(Box::new(failure))
    }
}

/// Result alias used by the unit of work and data context.
pub type PersistResult<T> = Result<T, PersistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_lists_path() {
        let err = ConfigError::NavigationCycle(vec!["Contact", "Phone", "Contact"]);
        assert_eq!(
            err.to_string(),
            "navigation cycle: Contact -> Phone -> Contact"
        );
    }

    #[test]
    fn commit_failure_names_failed_change() {
        let failure = CommitFailure {
            applied: vec![],
            failed: ChangeRef {
                entity_type: "Contact",
                id: 3,
                op: ChangeOp::Update,
            },
            not_applied: vec![],
            rolled_back: true,
            source: StoreError::Backend("disk full".into()),
        };
        assert!(std::error::Error::source(&failure).is_some());
        let msg = PersistError::from(failure).to_string();
        assert!(msg.contains("update Contact#3"));
        assert!(msg.contains("rolled back"));
    }
}
