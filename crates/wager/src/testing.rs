//! Test helpers: a storage wrapper that fails selected operations on demand.
//!
//! ```ignore
//! let storage = Arc::new(FaultyMatchStorage::new(MemoryMatchStorage::new()));
//! storage.fail(StoreOp::DeleteLive);
//! let err = m.archive().await.unwrap_err(); // DeleteFailure
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::account::Account;
use crate::error::StorageError;
use crate::lifecycle::MatchLifecycle;
use crate::match_storage::{HistoryMatchRow, LiveMatchRow, MatchField, MatchStorage, NewMatch};
use crate::storage::memory_account::MemoryAccountResolver;
use crate::storage::memory_match::MemoryMatchStorage;
use crate::types::{AccountId, MatchId};

/// One [`MatchStorage`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateLive,
    ReadLive,
    ListLive,
    UpdateField,
    CreateHistory,
    DeleteLive,
    ReadHistory,
    ListHistory,
}

#[derive(Debug, Clone, Copy)]
enum FailMode {
    Once,
    Always,
}

/// Wraps a storage backend and fails chosen operations without touching it.
pub struct FaultyMatchStorage<S> {
    inner: S,
    faults: Mutex<HashMap<StoreOp, FailMode>>,
}

impl<S: MatchStorage> FaultyMatchStorage<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next call to `op`.
    pub fn fail(&self, op: StoreOp) {
        self.faults.lock().insert(op, FailMode::Once);
    }

    /// Fail every call to `op` until [`heal`](Self::heal) is called.
    pub fn fail_always(&self, op: StoreOp) {
        self.faults.lock().insert(op, FailMode::Always);
    }

    pub fn heal(&self) {
        self.faults.lock().clear();
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, op: StoreOp) -> Result<(), StorageError> {
        let mut faults = self.faults.lock();
        match faults.get(&op).copied() {
            None => Ok(()),
            Some(FailMode::Once) => {
                faults.remove(&op);
                Err(StorageError::new(format!("injected {op:?} failure")))
            }
            Some(FailMode::Always) => Err(StorageError::new(format!("injected {op:?} failure"))),
        }
    }
}

#[async_trait]
impl<S: MatchStorage> MatchStorage for FaultyMatchStorage<S> {
    async fn create_live_match(&self, new: &NewMatch) -> Result<MatchId, StorageError> {
        self.check(StoreOp::CreateLive)?;
        self.inner.create_live_match(new).await
    }

    async fn live_match(&self, id: MatchId) -> Result<Option<LiveMatchRow>, StorageError> {
        self.check(StoreOp::ReadLive)?;
        self.inner.live_match(id).await
    }

    async fn live_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<LiveMatchRow>, StorageError> {
        self.check(StoreOp::ListLive)?;
        self.inner.live_matches_for_participant(account).await
    }

    async fn update_live_match_field(
        &self,
        id: MatchId,
        field: MatchField,
        value: bool,
    ) -> Result<(), StorageError> {
        self.check(StoreOp::UpdateField)?;
        self.inner.update_live_match_field(id, field, value).await
    }

    async fn create_history_match(&self, row: &HistoryMatchRow) -> Result<(), StorageError> {
        self.check(StoreOp::CreateHistory)?;
        self.inner.create_history_match(row).await
    }

    async fn delete_live_match(&self, id: MatchId) -> Result<(), StorageError> {
        self.check(StoreOp::DeleteLive)?;
        self.inner.delete_live_match(id).await
    }

    async fn history_match(&self, id: MatchId) -> Result<Option<HistoryMatchRow>, StorageError> {
        self.check(StoreOp::ReadHistory)?;
        self.inner.history_match(id).await
    }

    async fn history_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<HistoryMatchRow>, StorageError> {
        self.check(StoreOp::ListHistory)?;
        self.inner.history_matches_for_participant(account).await
    }
}

/// An in-memory lifecycle with fault injection and a fixed set of accounts.
pub struct TestLedger {
    pub lifecycle: MatchLifecycle,
    pub storage: Arc<FaultyMatchStorage<MemoryMatchStorage>>,
    pub accounts: Arc<MemoryAccountResolver>,
}

impl TestLedger {
    pub fn new(accounts: impl IntoIterator<Item = Account>) -> Self {
        let storage = Arc::new(FaultyMatchStorage::new(MemoryMatchStorage::new()));
        let accounts = Arc::new(MemoryAccountResolver::with_accounts(accounts));
        let lifecycle = MatchLifecycle::new(storage.clone(), accounts.clone());
        Self {
            lifecycle,
            storage,
            accounts,
        }
    }
}
