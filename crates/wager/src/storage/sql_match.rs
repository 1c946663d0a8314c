//! SQL-backed match storage using PostgreSQL via sqlx.
//!
//! Tables:
//! - `matches` — live challenges, id assigned by a `BIGSERIAL`
//! - `match_history` — settled challenges keyed by the id they had while live
//!
//! This module is only available when the `sql` feature is enabled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::error::{MatchError, StorageError};
use crate::match_storage::{HistoryMatchRow, LiveMatchRow, MatchField, MatchStorage, NewMatch};
use crate::types::{AccountId, MatchId};

/// PostgreSQL-backed match storage.
pub struct SqlMatchStorage {
    pool: PgPool,
}

impl SqlMatchStorage {
    /// Create a new SQL match storage with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations. Safe to call more than once.
    pub async fn migrate(&self) -> Result<(), MatchError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| MatchError::WriteFailure {
                reason: format!("migration failed: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

#[async_trait]
impl MatchStorage for SqlMatchStorage {
    async fn create_live_match(&self, new: &NewMatch) -> Result<MatchId, StorageError> {
        let row = sqlx::query(
            r#"
            INSERT INTO matches (amount, active, accepted, challenger_id, recipient_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(new.amount)
        .bind(new.active)
        .bind(new.accepted)
        .bind(new.challenger.0)
        .bind(new.recipient.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::with_source(format!("create match failed: {e}"), e))?;

        let id: i64 = try_get_column(&row, "id")?;
        Ok(MatchId(id))
    }

    async fn live_match(&self, id: MatchId) -> Result<Option<LiveMatchRow>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, amount, active, accepted, challenger_id, recipient_id
            FROM matches
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::with_source(format!("fetch match {id} failed: {e}"), e))?;

        row.as_ref().map(row_to_live).transpose()
    }

    async fn live_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<LiveMatchRow>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, amount, active, accepted, challenger_id, recipient_id
            FROM matches
            WHERE challenger_id = $1 OR recipient_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(account.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            StorageError::with_source(format!("fetch matches for {account} failed: {e}"), e)
        })?;

        rows.iter().map(row_to_live).collect()
    }

    async fn update_live_match_field(
        &self,
        id: MatchId,
        field: MatchField,
        value: bool,
    ) -> Result<(), StorageError> {
        // Column comes from a closed enum, never from caller input.
        let sql = format!("UPDATE matches SET {} = $1 WHERE id = $2", field.column());
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                StorageError::with_source(format!("update {field} on match {id} failed: {e}"), e)
            })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::new(format!("no live match {id} to update {field}")));
        }
        Ok(())
    }

    async fn create_history_match(&self, row: &HistoryMatchRow) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO match_history
                (id, amount, challenger_id, recipient_id, winner_id, match_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(row.id.0)
        .bind(row.amount)
        .bind(row.challenger.0)
        .bind(row.recipient.0)
        .bind(row.winner.0)
        .bind(row.match_time)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            StorageError::with_source(format!("archive match {} failed: {e}", row.id), e)
        })?;

        if result.rows_affected() == 0 {
            return Err(StorageError::new(format!(
                "match {} already exists in match_history",
                row.id
            )));
        }
        Ok(())
    }

    async fn delete_live_match(&self, id: MatchId) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM matches WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::with_source(format!("delete match {id} failed: {e}"), e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::new(format!("no live match {id} to delete")));
        }
        Ok(())
    }

    async fn history_match(&self, id: MatchId) -> Result<Option<HistoryMatchRow>, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, amount, challenger_id, recipient_id, winner_id, match_time
            FROM match_history
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            StorageError::with_source(format!("fetch archived match {id} failed: {e}"), e)
        })?;

        row.as_ref().map(row_to_history).transpose()
    }

    async fn history_matches_for_participant(
        &self,
        account: AccountId,
    ) -> Result<Vec<HistoryMatchRow>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT id, amount, challenger_id, recipient_id, winner_id, match_time
            FROM match_history
            WHERE challenger_id = $1 OR recipient_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(account.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            StorageError::with_source(
                format!("fetch archived matches for {account} failed: {e}"),
                e,
            )
        })?;

        rows.iter().map(row_to_history).collect()
    }
}

pub(crate) fn try_get_column<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StorageError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| {
        StorageError::with_source(format!("failed to read '{column}' column: {e}"), e)
    })
}

fn row_to_live(row: &PgRow) -> Result<LiveMatchRow, StorageError> {
    Ok(LiveMatchRow {
        id: MatchId(try_get_column(row, "id")?),
        amount: try_get_column(row, "amount")?,
        active: try_get_column(row, "active")?,
        accepted: try_get_column(row, "accepted")?,
        challenger: AccountId(try_get_column(row, "challenger_id")?),
        recipient: AccountId(try_get_column(row, "recipient_id")?),
    })
}

fn row_to_history(row: &PgRow) -> Result<HistoryMatchRow, StorageError> {
    let match_time: Option<DateTime<Utc>> = try_get_column(row, "match_time")?;
    Ok(HistoryMatchRow {
        id: MatchId(try_get_column(row, "id")?),
        amount: try_get_column(row, "amount")?,
        challenger: AccountId(try_get_column(row, "challenger_id")?),
        recipient: AccountId(try_get_column(row, "recipient_id")?),
        winner: AccountId(try_get_column(row, "winner_id")?),
        match_time,
    })
}
