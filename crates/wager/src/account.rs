//! Participant references and the external account lookup seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::AccountId;

/// A resolved participant. The id is what match rows store; the rest is
/// display data owned by whoever resolved it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub nickname: String,
    pub server_id: i64,
}

impl Account {
    pub fn new(id: impl Into<AccountId>, nickname: impl Into<String>, server_id: i64) -> Self {
        Self {
            id: id.into(),
            nickname: nickname.into(),
            server_id,
        }
    }

    /// Two references name the same participant when their ids match.
    pub fn same_as(&self, other: &Account) -> bool {
        self.id == other.id
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.nickname, self.id)
    }
}

/// Resolves stored account ids to [`Account`]s.
///
/// `Ok(None)` means the id is unknown; `Err` means the lookup itself failed.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    async fn resolve(&self, id: AccountId) -> Result<Option<Account>, StorageError>;
}
