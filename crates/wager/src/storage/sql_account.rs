//! Account lookup against the `accounts` table.
//!
//! This module is only available when the `sql` feature is enabled.

use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::account::{Account, AccountResolver};
use crate::error::StorageError;
use crate::storage::sql_match::try_get_column;
use crate::types::AccountId;

/// Resolves accounts from PostgreSQL.
pub struct SqlAccountResolver {
    pool: PgPool,
}

impl SqlAccountResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountResolver for SqlAccountResolver {
    async fn resolve(&self, id: AccountId) -> Result<Option<Account>, StorageError> {
        let row = sqlx::query("SELECT id, nickname, server_id FROM accounts WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                StorageError::with_source(format!("fetch account {id} failed: {e}"), e)
            })?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Account {
            id: AccountId(try_get_column(&row, "id")?),
            nickname: try_get_column(&row, "nickname")?,
            server_id: try_get_column(&row, "server_id")?,
        }))
    }
}
