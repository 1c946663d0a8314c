//! Creating, reconstructing and listing matches.
//!
//! [`MatchLifecycle`] owns the store and account resolver handles and hands a
//! clone of the store to every [`Match`] it builds.

use std::sync::Arc;

use tracing::instrument;

use crate::account::{Account, AccountResolver};
use crate::entity::{Match, MatchRecord};
use crate::error::MatchError;
use crate::match_storage::{HistoryMatchRow, LiveMatchRow, MatchStorage, NewMatch};
use crate::metrics::LifecycleMetrics;
use crate::types::{AccountId, MatchId, MatchTable};

/// Outcome of [`MatchLifecycle::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The match was only in `match_history`; nothing to do.
    Clean,
    /// A leftover live row was deleted.
    RemovedLiveRow,
}

/// Entry point for match lifecycle operations.
#[derive(Clone)]
pub struct MatchLifecycle {
    storage: Arc<dyn MatchStorage>,
    accounts: Arc<dyn AccountResolver>,
    metrics: Arc<LifecycleMetrics>,
}

impl MatchLifecycle {
    pub fn new(storage: Arc<dyn MatchStorage>, accounts: Arc<dyn AccountResolver>) -> Self {
        Self {
            storage,
            accounts,
            metrics: Arc::new(LifecycleMetrics::unregistered()),
        }
    }

    /// Use registered metrics instead of the unregistered defaults.
    pub fn with_metrics(mut self, metrics: Arc<LifecycleMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Connect to PostgreSQL, run migrations if configured, and resolve
    /// accounts from the same database.
    #[cfg(feature = "sql")]
    pub async fn connect(config: &crate::config::StoreConfig) -> Result<Self, MatchError> {
        use crate::storage::sql_account::SqlAccountResolver;
        use crate::storage::sql_match::SqlMatchStorage;

        let pool = config.connect().await?;
        let storage = SqlMatchStorage::new(pool.clone());
        if config.run_migrations {
            tracing::info!("running match store migrations");
            storage.migrate().await?;
        }
        Ok(Self::new(
            Arc::new(storage),
            Arc::new(SqlAccountResolver::new(pool)),
        ))
    }

    pub fn storage(&self) -> &Arc<dyn MatchStorage> {
        &self.storage
    }

    pub fn metrics(&self) -> &Arc<LifecycleMetrics> {
        &self.metrics
    }

    /// Create an inactive, unaccepted match.
    pub async fn create_match(
        &self,
        amount: i64,
        challenger: &Account,
        recipient: &Account,
    ) -> Result<Match, MatchError> {
        self.create_match_with(amount, challenger, recipient, false, false)
            .await
    }

    /// Create a match and read it back from the store.
    ///
    /// The returned match carries participants resolved from the stored ids,
    /// not the references passed in. If the read-back fails the creation is
    /// reported as a [`MatchError::WriteFailure`] even though the row exists.
    #[instrument(skip(self, challenger, recipient), fields(challenger = %challenger.id, recipient = %recipient.id))]
    pub async fn create_match_with(
        &self,
        amount: i64,
        challenger: &Account,
        recipient: &Account,
        active: bool,
        accepted: bool,
    ) -> Result<Match, MatchError> {
        let new = NewMatch {
            amount,
            active,
            accepted,
            challenger: challenger.id,
            recipient: recipient.id,
        };
        let id = self.storage.create_live_match(&new).await.map_err(|e| {
            tracing::error!(error = %e, "unable to create match");
            MatchError::write("create match", e)
        })?;
        tracing::debug!(match_id = %id, "created live row");

        let created = self
            .get_match(id, MatchTable::Live)
            .await
            .map_err(|e| {
                tracing::error!(match_id = %id, error = %e, "created match could not be read back");
                MatchError::WriteFailure {
                    reason: format!("read back created match {id}"),
                    source: Some(Box::new(e)),
                }
            })?;
        self.metrics.created.inc();
        Ok(created)
    }

    /// Create `count` identical matches, stopping at the first failure.
    pub async fn create_matches(
        &self,
        amount: i64,
        challenger: &Account,
        recipient: &Account,
        count: usize,
        active: bool,
        accepted: bool,
    ) -> Result<Vec<Match>, MatchError> {
        let mut created = Vec::new();
        for _ in 0..count {
            created.push(
                self.create_match_with(amount, challenger, recipient, active, accepted)
                    .await?,
            );
        }
        Ok(created)
    }

    /// Reconstruct a match from the live table or the archive.
    ///
    /// Archived matches come back closed: not active, accepted.
    #[instrument(skip(self))]
    pub async fn get_match(&self, id: MatchId, table: MatchTable) -> Result<Match, MatchError> {
        match table {
            MatchTable::Live => {
                let row = self
                    .storage
                    .live_match(id)
                    .await
                    .map_err(|e| MatchError::read(format!("fetch match {id}"), e))?
                    .ok_or(MatchError::NotFound {
                        match_id: id,
                        table,
                    })?;
                self.build_live(row).await
            }
            MatchTable::History => {
                let row = self
                    .storage
                    .history_match(id)
                    .await
                    .map_err(|e| MatchError::read(format!("fetch archived match {id}"), e))?
                    .ok_or(MatchError::NotFound {
                        match_id: id,
                        table,
                    })?;
                self.build_history(row).await
            }
        }
    }

    /// Every live match `account` takes part in, ordered by id.
    ///
    /// All-or-nothing: if any participant fails to resolve, no list is
    /// returned.
    #[instrument(skip(self, account), fields(account = %account.id))]
    pub async fn matches_for_account(&self, account: &Account) -> Result<Vec<Match>, MatchError> {
        let rows = self.live_rows_for(account.id).await?;
        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            matches.push(self.build_live(row).await?);
        }
        Ok(matches)
    }

    /// Live matches between `a` and `b`, in either role.
    #[instrument(skip(self, a, b), fields(a = %a.id, b = %b.id))]
    pub async fn matches_between(&self, a: &Account, b: &Account) -> Result<Vec<Match>, MatchError> {
        let rows = self.live_rows_for(a.id).await?;
        let mut matches = Vec::new();
        for row in rows.into_iter().filter(|row| row.involves(b.id)) {
            matches.push(self.build_live(row).await?);
        }
        Ok(matches)
    }

    /// Archived matches `account` took part in, ordered by id. All-or-nothing.
    #[instrument(skip(self, account), fields(account = %account.id))]
    pub async fn history_for_account(&self, account: &Account) -> Result<Vec<Match>, MatchError> {
        let rows = self
            .storage
            .history_matches_for_participant(account.id)
            .await
            .map_err(|e| {
                MatchError::read(format!("fetch archived matches for {}", account.id), e)
            })?;
        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            matches.push(self.build_history(row).await?);
        }
        Ok(matches)
    }

    /// Clear the state left behind by a [`MatchError::DeleteFailure`].
    ///
    /// The live row is only deleted when an archive row for the same id
    /// exists and records the same stake and participants. Without an archive
    /// row this returns [`MatchError::NotFound`]; when the rows disagree it
    /// returns [`MatchError::Conflict`] and deletes nothing.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, id: MatchId) -> Result<Reconciled, MatchError> {
        let archived = self
            .storage
            .history_match(id)
            .await
            .map_err(|e| MatchError::read(format!("fetch archived match {id}"), e))?
            .ok_or(MatchError::NotFound {
                match_id: id,
                table: MatchTable::History,
            })?;

        let live = self
            .storage
            .live_match(id)
            .await
            .map_err(|e| MatchError::read(format!("fetch match {id}"), e))?;
        let Some(live) = live else {
            return Ok(Reconciled::Clean);
        };

        if let Some(reason) = archive_mismatch(&live, &archived) {
            tracing::error!(%reason, "live row does not match its archive row; leaving it");
            return Err(MatchError::Conflict {
                match_id: id,
                reason,
            });
        }

        self.storage.delete_live_match(id).await.map_err(|e| {
            tracing::error!(error = %e, "unable to delete leftover live row");
            MatchError::DeleteFailure {
                match_id: id,
                source: Some(Box::new(e)),
            }
        })?;
        self.metrics.reconciled.inc();
        tracing::info!("removed leftover live row for archived match");
        Ok(Reconciled::RemovedLiveRow)
    }

    async fn live_rows_for(&self, account: AccountId) -> Result<Vec<LiveMatchRow>, MatchError> {
        let rows = self
            .storage
            .live_matches_for_participant(account)
            .await
            .map_err(|e| MatchError::read(format!("fetch matches for {account}"), e))?;
        tracing::debug!(count = rows.len(), "fetched live rows");
        Ok(rows)
    }

    async fn build_live(&self, row: LiveMatchRow) -> Result<Match, MatchError> {
        let challenger = self.resolve(row.challenger, "challenger").await?;
        let recipient = self.resolve(row.recipient, "recipient").await?;
        Ok(Match::new(
            MatchRecord {
                id: row.id,
                amount: row.amount,
                active: row.active,
                accepted: row.accepted,
                challenger,
                recipient,
                winner: None,
                match_time: None,
                is_history: false,
            },
            self.storage.clone(),
            self.metrics.clone(),
        ))
    }

    async fn build_history(&self, row: HistoryMatchRow) -> Result<Match, MatchError> {
        // Same invariant the archive write relies on.
        if row.winner != row.challenger && row.winner != row.recipient {
            return Err(MatchError::ReadFailure {
                reason: format!(
                    "archived match {} names winner {} who did not play",
                    row.id, row.winner
                ),
                source: None,
            });
        }
        let challenger = self.resolve(row.challenger, "challenger").await?;
        let recipient = self.resolve(row.recipient, "recipient").await?;
        let winner = self.resolve(row.winner, "winner").await?;
        Ok(Match::new(
            MatchRecord {
                id: row.id,
                amount: row.amount,
                active: false,
                accepted: true,
                challenger,
                recipient,
                winner: Some(winner),
                match_time: row.match_time,
                is_history: true,
            },
            self.storage.clone(),
            self.metrics.clone(),
        ))
    }

    async fn resolve(&self, id: AccountId, role: &'static str) -> Result<Account, MatchError> {
        match self.accounts.resolve(id).await {
            Ok(Some(account)) => Ok(account),
            Ok(None) => {
                tracing::error!(account_id = %id, role, "unknown account");
                Err(MatchError::ResolutionFailure {
                    account_id: id,
                    role,
                    source: None,
                })
            }
            Err(e) => {
                tracing::error!(account_id = %id, role, error = %e, "account lookup failed");
                Err(MatchError::ResolutionFailure {
                    account_id: id,
                    role,
                    source: Some(Box::new(e)),
                })
            }
        }
    }
}

/// Describes how a live row differs from the archive row sharing its id.
fn archive_mismatch(live: &LiveMatchRow, archived: &HistoryMatchRow) -> Option<String> {
    if live.amount != archived.amount {
        return Some(format!(
            "amount {} != archived {}",
            live.amount, archived.amount
        ));
    }
    if live.challenger != archived.challenger || live.recipient != archived.recipient {
        return Some(format!(
            "participants {}/{} != archived {}/{}",
            live.challenger, live.recipient, archived.challenger, archived.recipient
        ));
    }
    None
}
