use std::collections::BTreeMap;

use parking_lot::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::match_storage::{HistoryMatchRow, LiveMatchRow, MatchField, MatchStorage, NewMatch};
use crate::types::{AccountId, MatchId};

/// In-memory match storage for testing.
///
/// Ids are assigned from a counter starting at 1, like a SQL serial column.
/// Both tables share the id space, so an archived id is never reissued.
pub struct MemoryMatchStorage {
    inner: Mutex<Inner>,
}

struct Inner {
    next_id: i64,
    live: BTreeMap<MatchId, LiveMatchRow>,
    history: BTreeMap<MatchId, HistoryMatchRow>,
}

impl MemoryMatchStorage {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                live: BTreeMap::new(),
                history: BTreeMap::new(),
            }),
        }
    }

    /// Number of rows in the live table.
    pub fn live_len(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Number of rows in the archive table.
    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }
}

impl Default for MemoryMatchStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchStorage for MemoryMatchStorage {
    async fn create_live_match(&self, new: &NewMatch) -> Result<MatchId, StorageError> {
        let mut inner = self.inner.lock();
        let id = MatchId(inner.next_id);
        inner.next_id += 1;
        inner.live.insert(
            id,
            LiveMatchRow {
                id,
                amount: new.amount,
                active: new.active,
                accepted: new.accepted,
                challenger: new.challenger,
                recipient: new.recipient,
            },
        );
        Ok(id)
    }

    async fn live_match(&self, id: MatchId) -> Result<Option<LiveMatchRow>, StorageError> {
        Ok(self.inner.lock().live.get(&id).cloned())
    }

    async fn live_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<LiveMatchRow>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner
            .live
            .values()
            .filter(|row| row.involves(account))
            .cloned()
            .collect())
    }

    async fn update_live_match_field(
        &self,
        id: MatchId,
        field: MatchField,
        value: bool,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        let row = inner
            .live
            .get_mut(&id)
            .ok_or_else(|| StorageError::new(format!("no live match {id} to update {field}")))?;
        match field {
            MatchField::Active => row.active = value,
            MatchField::Accepted => row.accepted = value,
        }
        Ok(())
    }

    async fn create_history_match(&self, row: &HistoryMatchRow) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        if inner.history.contains_key(&row.id) {
            return Err(StorageError::new(format!(
                "match {} already exists in match_history",
                row.id
            )));
        }
        inner.next_id = inner.next_id.max(row.id.0.saturating_add(1));
        inner.history.insert(row.id, row.clone());
        Ok(())
    }

    async fn delete_live_match(&self, id: MatchId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        match inner.live.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StorageError::new(format!("no live match {id} to delete"))),
        }
    }

    async fn history_match(&self, id: MatchId) -> Result<Option<HistoryMatchRow>, StorageError> {
        Ok(self.inner.lock().history.get(&id).cloned())
    }

    async fn history_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<HistoryMatchRow>, StorageError> {
        let inner = self.inner.lock();
        Ok(inner
            .history
            .values()
            .filter(|row| row.involves(account))
            .cloned()
            .collect())
    }
}
