use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::account::{Account, AccountResolver};
use crate::error::StorageError;
use crate::types::AccountId;

/// In-memory account directory for testing.
#[derive(Default)]
pub struct MemoryAccountResolver {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl MemoryAccountResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver that knows the given accounts.
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let resolver = Self::new();
        for account in accounts {
            resolver.insert(account);
        }
        resolver
    }

    pub fn insert(&self, account: Account) {
        self.accounts.write().insert(account.id, account);
    }

    /// Forget an account, so later lookups of its id resolve to nothing.
    pub fn remove(&self, id: AccountId) -> Option<Account> {
        self.accounts.write().remove(&id)
    }
}

#[async_trait]
impl AccountResolver for MemoryAccountResolver {
    async fn resolve(&self, id: AccountId) -> Result<Option<Account>, StorageError> {
        Ok(self.accounts.read().get(&id).cloned())
    }
}
