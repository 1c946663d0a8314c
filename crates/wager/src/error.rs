use crate::types::{AccountId, MatchId, MatchTable};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a storage backend or account resolver.
///
/// Backends describe what went wrong; the lifecycle layer decides which
/// [`MatchError`] kind it becomes.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct StorageError {
    pub reason: String,
    #[source]
    pub source: Option<BoxError>,
}

impl StorageError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn with_source(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors surfaced by match lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A store create or update reported failure. In-memory state is unchanged.
    #[error("write failed: {reason}")]
    WriteFailure {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The archive row was written but the live row could not be deleted.
    /// Both rows exist for `match_id` until reconciled.
    #[error("match {match_id} archived but live row could not be deleted")]
    DeleteFailure {
        match_id: MatchId,
        #[source]
        source: Option<BoxError>,
    },

    #[error("match {match_id} not found in {table}")]
    NotFound { match_id: MatchId, table: MatchTable },

    /// An account id stored on a row could not be resolved.
    #[error("unable to resolve {role} account {account_id}")]
    ResolutionFailure {
        account_id: AccountId,
        role: &'static str,
        #[source]
        source: Option<BoxError>,
    },

    /// A store read errored (as opposed to finding no row).
    #[error("read failed: {reason}")]
    ReadFailure {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("match {match_id} has no winner and cannot be archived")]
    Unsettled { match_id: MatchId },

    #[error("match {match_id} is already archived")]
    Archived { match_id: MatchId },

    /// A live row and an archive row share `match_id` but describe
    /// different matches. Neither row is touched.
    #[error("match {match_id} conflicts with archive: {reason}")]
    Conflict { match_id: MatchId, reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl MatchError {
    pub(crate) fn write(reason: impl Into<String>, source: StorageError) -> Self {
        Self::WriteFailure {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn read(reason: impl Into<String>, source: StorageError) -> Self {
        Self::ReadFailure {
            reason: reason.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for the partially-archived state that needs reconciliation
    /// rather than a retry.
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Self::DeleteFailure { .. })
    }
}
