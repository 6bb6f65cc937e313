//! SQLite implementation of the IP lock repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use turnstile_core::{
    Error,
    error::StorageError,
    repositories::{IpLockFilter, IpLockRecord, IpLockRepository, Page},
};

/// SQLite repository for IP lock audit records.
pub struct SqliteIpLockRepository {
    pool: SqlitePool,
}

impl SqliteIpLockRepository {
    /// Create a new SQLite IP lock repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteIpLockRow {
    ip_address: String,
    lockout_count: i64,
    latest_username: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<SqliteIpLockRow> for IpLockRecord {
    fn from(row: SqliteIpLockRow) -> Self {
        IpLockRecord {
            ip_address: row.ip_address,
            lockout_count: row.lockout_count,
            latest_username: row.latest_username,
            created_at: DateTime::from_timestamp(row.created_at, 0).expect("Invalid timestamp"),
            updated_at: DateTime::from_timestamp(row.updated_at, 0).expect("Invalid timestamp"),
        }
    }
}

#[async_trait]
impl IpLockRepository for SqliteIpLockRepository {
    async fn upsert(&self, ip: &str, latest_username: Option<&str>) -> Result<IpLockRecord, Error> {
        let now = Utc::now().timestamp();

        // Single-statement upsert: concurrent calls for one address
        // serialize on the row and each commits exactly one increment.
        let row = sqlx::query_as::<_, SqliteIpLockRow>(
            r#"
            INSERT INTO rate_limited_ips (ip_address, lockout_count, latest_username, created_at, updated_at)
            VALUES (?1, 1, ?2, ?3, ?3)
            ON CONFLICT(ip_address) DO UPDATE SET
                lockout_count = rate_limited_ips.lockout_count + 1,
                latest_username = excluded.latest_username,
                updated_at = excluded.updated_at
            RETURNING ip_address, lockout_count, latest_username, created_at, updated_at
            "#,
        )
        .bind(ip)
        .bind(latest_username)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to upsert IP lock record");
            StorageError::Database("Failed to upsert IP lock record".to_string())
        })?;

        Ok(row.into())
    }

    async fn get(&self, ip: &str) -> Result<Option<IpLockRecord>, Error> {
        let row = sqlx::query_as::<_, SqliteIpLockRow>(
            r#"
            SELECT ip_address, lockout_count, latest_username, created_at, updated_at
            FROM rate_limited_ips
            WHERE ip_address = ?1
            "#,
        )
        .bind(ip)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get IP lock record");
            StorageError::Database("Failed to get IP lock record".to_string())
        })?;

        Ok(row.map(Into::into))
    }

    async fn list(&self, filter: &IpLockFilter, page: Page) -> Result<Vec<IpLockRecord>, Error> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT ip_address, lockout_count, latest_username, created_at, updated_at \
             FROM rate_limited_ips WHERE 1 = 1",
        );

        if let Some(ip) = &filter.ip_address {
            query.push(" AND ip_address = ").push_bind(ip);
        }
        if let Some(username) = &filter.latest_username {
            query.push(" AND latest_username = ").push_bind(username);
        }

        query
            .push(" ORDER BY updated_at DESC LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset as i64);

        let rows: Vec<SqliteIpLockRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list IP lock records");
                StorageError::Database("Failed to list IP lock records".to_string())
            })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete(&self, ip: &str) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM rate_limited_ips WHERE ip_address = ?1")
            .bind(ip)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to delete IP lock record");
                StorageError::Database("Failed to delete IP lock record".to_string())
            })?;

        Ok(result.rows_affected() > 0)
    }
}
