//! The `Match` entity and its guarded mutators.
//!
//! Persisted mutators write to the store first and touch in-memory state only
//! once the write is confirmed. `winner`, `match_time` and `is_history` are
//! memory-only until [`Match::archive`] writes them to `match_history`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::MatchError;
use crate::match_storage::{HistoryMatchRow, MatchField, MatchStorage};
use crate::metrics::LifecycleMetrics;
use crate::types::{MatchId, MatchTable};

/// Plain data of a match, detached from any store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub amount: i64,
    pub active: bool,
    pub accepted: bool,
    pub challenger: Account,
    pub recipient: Account,
    pub winner: Option<Account>,
    pub match_time: Option<DateTime<Utc>>,
    pub is_history: bool,
}

impl MatchRecord {
    /// Whether `account` is the challenger or the recipient.
    pub fn involves(&self, account: &Account) -> bool {
        self.challenger.same_as(account) || self.recipient.same_as(account)
    }

    /// The table this record's row lives in.
    pub fn table(&self) -> MatchTable {
        if self.is_history {
            MatchTable::History
        } else {
            MatchTable::Live
        }
    }
}

/// A live or archived wagered challenge bound to the store it came from.
///
/// Obtain one through [`MatchLifecycle`](crate::lifecycle::MatchLifecycle).
/// Two `Match` values compare equal when their records do.
#[derive(Clone)]
pub struct Match {
    record: MatchRecord,
    storage: Arc<dyn MatchStorage>,
    metrics: Arc<LifecycleMetrics>,
}

impl Match {
    pub(crate) fn new(
        record: MatchRecord,
        storage: Arc<dyn MatchStorage>,
        metrics: Arc<LifecycleMetrics>,
    ) -> Self {
        Self {
            record,
            storage,
            metrics,
        }
    }

    pub fn id(&self) -> MatchId {
        self.record.id
    }

    pub fn amount(&self) -> i64 {
        self.record.amount
    }

    pub fn active(&self) -> bool {
        self.record.active
    }

    pub fn accepted(&self) -> bool {
        self.record.accepted
    }

    pub fn challenger(&self) -> &Account {
        &self.record.challenger
    }

    pub fn recipient(&self) -> &Account {
        &self.record.recipient
    }

    pub fn winner(&self) -> Option<&Account> {
        self.record.winner.as_ref()
    }

    pub fn match_time(&self) -> Option<DateTime<Utc>> {
        self.record.match_time
    }

    pub fn is_history(&self) -> bool {
        self.record.is_history
    }

    pub fn record(&self) -> &MatchRecord {
        &self.record
    }

    pub fn into_record(self) -> MatchRecord {
        self.record
    }

    /// Persist the activity flag, then update it in memory.
    pub async fn set_active(&mut self, active: bool) -> Result<(), MatchError> {
        tracing::debug!(match_id = %self.record.id, active, "set_active");
        self.update_flag(MatchField::Active, active).await?;
        self.record.active = active;
        Ok(())
    }

    /// Persist the acceptance flag, then update it in memory.
    pub async fn set_accepted(&mut self, accepted: bool) -> Result<(), MatchError> {
        tracing::debug!(match_id = %self.record.id, accepted, "set_accepted");
        self.update_flag(MatchField::Accepted, accepted).await?;
        self.record.accepted = accepted;
        Ok(())
    }

    /// Declare the winner. Only the challenger or the recipient is accepted;
    /// anyone else is ignored and the current winner is kept.
    ///
    /// Returns whether the candidate was accepted. Not persisted until
    /// [`archive`](Self::archive).
    pub fn set_winner(&mut self, candidate: &Account) -> bool {
        let winner = if self.record.challenger.same_as(candidate) {
            self.record.challenger.clone()
        } else if self.record.recipient.same_as(candidate) {
            self.record.recipient.clone()
        } else {
            tracing::debug!(
                match_id = %self.record.id,
                candidate = %candidate.id,
                challenger = %self.record.challenger.id,
                recipient = %self.record.recipient.id,
                "ignoring winner who is not a participant"
            );
            return false;
        };
        tracing::debug!(match_id = %self.record.id, winner = %winner.id, "set_winner");
        self.record.winner = Some(winner);
        true
    }

    /// Set the settlement time. Not persisted until [`archive`](Self::archive).
    pub fn set_match_time(&mut self, time: DateTime<Utc>) {
        tracing::debug!(match_id = %self.record.id, %time, "set_match_time");
        self.record.match_time = Some(time);
    }

    /// Flip the history flag. Once true it stays true; later calls are ignored.
    pub fn set_is_history(&mut self, history: bool) {
        if self.record.is_history {
            tracing::debug!(
                match_id = %self.record.id,
                "is_history already set, ignoring"
            );
            return;
        }
        self.record.is_history = history;
    }

    /// Settle the match: copy it into `match_history`, then delete the live row.
    ///
    /// If the history insert fails nothing has changed and the call may be
    /// retried. If the delete fails the match exists in both tables and
    /// [`MatchError::DeleteFailure`] is returned; retrying would collide with
    /// the existing history row, use
    /// [`MatchLifecycle::reconcile`](crate::lifecycle::MatchLifecycle::reconcile)
    /// instead.
    #[tracing::instrument(skip(self), fields(match_id = %self.record.id))]
    pub async fn archive(&mut self) -> Result<(), MatchError> {
        let id = self.record.id;
        self.ensure_live()?;
        let winner = self
            .record
            .winner
            .as_ref()
            .ok_or(MatchError::Unsettled { match_id: id })?;

        let row = HistoryMatchRow {
            id,
            amount: self.record.amount,
            challenger: self.record.challenger.id,
            recipient: self.record.recipient.id,
            winner: winner.id,
            match_time: self.record.match_time,
        };

        if let Err(e) = self.storage.create_history_match(&row).await {
            self.metrics.archive_write_failures.inc();
            tracing::error!(error = %e, "unable to write match to match_history");
            return Err(MatchError::write(
                format!("archive match {id} to match_history"),
                e,
            ));
        }
        tracing::debug!("wrote match to match_history");

        if let Err(e) = self.storage.delete_live_match(id).await {
            self.metrics.archive_delete_failures.inc();
            tracing::error!(
                error = %e,
                "match archived but live row remains; needs reconciliation"
            );
            return Err(MatchError::DeleteFailure {
                match_id: id,
                source: Some(Box::new(e)),
            });
        }

        self.metrics.archived.inc();
        self.set_is_history(true);
        tracing::debug!("match archived");
        Ok(())
    }

    async fn update_flag(&self, field: MatchField, value: bool) -> Result<(), MatchError> {
        self.ensure_live()?;
        let id = self.record.id;
        self.storage
            .update_live_match_field(id, field, value)
            .await
            .map_err(|e| {
                tracing::error!(match_id = %id, %field, error = %e, "unable to update match");
                MatchError::write(format!("update {field} on match {id}"), e)
            })
    }

    fn ensure_live(&self) -> Result<(), MatchError> {
        if self.record.is_history {
            return Err(MatchError::Archived {
                match_id: self.record.id,
            });
        }
        Ok(())
    }
}

impl PartialEq for Match {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl std::fmt::Debug for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Match")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}
