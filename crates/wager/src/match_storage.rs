use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::{AccountId, MatchId};

/// Fields for a live row about to be created. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMatch {
    pub amount: i64,
    pub active: bool,
    pub accepted: bool,
    pub challenger: AccountId,
    pub recipient: AccountId,
}

/// A row of the live `matches` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveMatchRow {
    pub id: MatchId,
    pub amount: i64,
    pub active: bool,
    pub accepted: bool,
    pub challenger: AccountId,
    pub recipient: AccountId,
}

impl LiveMatchRow {
    pub fn involves(&self, account: AccountId) -> bool {
        self.challenger == account || self.recipient == account
    }
}

/// A row of the archived `match_history` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMatchRow {
    pub id: MatchId,
    pub amount: i64,
    pub challenger: AccountId,
    pub recipient: AccountId,
    pub winner: AccountId,
    pub match_time: Option<DateTime<Utc>>,
}

impl HistoryMatchRow {
    pub fn involves(&self, account: AccountId) -> bool {
        self.challenger == account || self.recipient == account
    }
}

/// Live-row flags that may be updated in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchField {
    Active,
    Accepted,
}

impl MatchField {
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Accepted => "accepted",
        }
    }
}

impl std::fmt::Display for MatchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Persistent storage for live and archived matches.
///
/// Every method is a single store operation. Writes that touch a row which
/// does not exist are failures, as is archiving an id that is already in
/// `match_history`; the lifecycle layer relies on both to detect races
/// between processes holding stale copies of a match.
#[async_trait]
pub trait MatchStorage: Send + Sync {
    /// Insert a live row and return the id the store assigned.
    async fn create_live_match(&self, new: &NewMatch) -> Result<MatchId, StorageError>;

    async fn live_match(&self, id: MatchId) -> Result<Option<LiveMatchRow>, StorageError>;

    /// Live rows where `account` is challenger or recipient, ordered by id.
    async fn live_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<LiveMatchRow>, StorageError>;

    async fn update_live_match_field(
        &self,
        id: MatchId,
        field: MatchField,
        value: bool,
    ) -> Result<(), StorageError>;

    async fn create_history_match(&self, row: &HistoryMatchRow) -> Result<(), StorageError>;

    async fn delete_live_match(&self, id: MatchId) -> Result<(), StorageError>;

    async fn history_match(&self, id: MatchId) -> Result<Option<HistoryMatchRow>, StorageError>;

    /// Archived rows where `account` is challenger or recipient, ordered by id.
    async fn history_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<HistoryMatchRow>, StorageError>;
}
