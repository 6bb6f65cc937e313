//! SQLite implementation of the account lock repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use turnstile_core::{
    Error, UserId,
    error::StorageError,
    repositories::{AccountLockRecord, AccountLockRepository, Page},
};

/// SQLite repository for account lock records.
pub struct SqliteAccountLockRepository {
    pool: SqlitePool,
}

impl SqliteAccountLockRepository {
    /// Create a new SQLite account lock repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteAccountLockRow {
    user_id: String,
    failure_count: i64,
    lockout_until: Option<i64>,
}

impl From<SqliteAccountLockRow> for AccountLockRecord {
    fn from(row: SqliteAccountLockRow) -> Self {
        AccountLockRecord {
            user_id: UserId::new(&row.user_id),
            failure_count: row.failure_count.max(0) as u32,
            lockout_until: row
                .lockout_until
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}

#[async_trait]
impl AccountLockRepository for SqliteAccountLockRepository {
    async fn record_failure(
        &self,
        user_id: &UserId,
        max_failed_attempts: u32,
        lockout_until: DateTime<Utc>,
    ) -> Result<AccountLockRecord, Error> {
        // The threshold decision happens inside the statement so that
        // concurrent failures serialize on the row: the increment, the
        // reset-to-zero, and the cooldown stamp are one write.
        let row = sqlx::query_as::<_, SqliteAccountLockRow>(
            r#"
            INSERT INTO account_locks (user_id, failure_count, lockout_until)
            VALUES (
                ?1,
                CASE WHEN 1 >= ?2 THEN 0 ELSE 1 END,
                CASE WHEN 1 >= ?2 THEN ?3 ELSE NULL END
            )
            ON CONFLICT(user_id) DO UPDATE SET
                failure_count = CASE
                    WHEN account_locks.failure_count + 1 >= ?2 THEN 0
                    ELSE account_locks.failure_count + 1
                END,
                lockout_until = CASE
                    WHEN account_locks.failure_count + 1 >= ?2 THEN ?3
                    ELSE account_locks.lockout_until
                END
            RETURNING user_id, failure_count, lockout_until
            "#,
        )
        .bind(user_id.as_str())
        .bind(max_failed_attempts as i64)
        .bind(lockout_until.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record account failure");
            StorageError::Database("Failed to record account failure".to_string())
        })?;

        Ok(row.into())
    }

    async fn get(&self, user_id: &UserId) -> Result<Option<AccountLockRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteAccountLockRow>(
            "SELECT user_id, failure_count, lockout_until FROM account_locks WHERE user_id = ?1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get account lock record");
            StorageError::Database("Failed to get account lock record".to_string())
        })?;

        Ok(row.map(Into::into))
    }

    async fn clear(&self, user_id: &UserId) -> Result<(), Error> {
        sqlx::query("DELETE FROM account_locks WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to clear account lock record");
                StorageError::Database("Failed to clear account lock record".to_string())
            })?;

        Ok(())
    }

    async fn list(&self, page: Page) -> Result<Vec<AccountLockRecord>, Error> {
        let rows = sqlx::query_as::<_, SqliteAccountLockRow>(
            r#"
            SELECT user_id, failure_count, lockout_until
            FROM account_locks
            ORDER BY lockout_until DESC, user_id ASC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(page.limit as i64)
        .bind(page.offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to list account lock records");
            StorageError::Database("Failed to list account lock records".to_string())
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
