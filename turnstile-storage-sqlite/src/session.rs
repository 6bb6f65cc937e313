//! SQLite-backed session liveness probe.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use turnstile_core::{Error, SessionProbe, error::StorageError};

/// Read-only probe against the platform's `sessions` table.
///
/// The table belongs to the session store; this type never writes to it,
/// and a row whose `expires_at` has passed reads as gone even before the
/// store reaps it.
pub struct SqliteSessionProbe {
    pool: SqlitePool,
}

impl SqliteSessionProbe {
    /// Create a new SQLite session probe.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionProbe for SqliteSessionProbe {
    async fn exists(&self, session_key: &str) -> Result<bool, Error> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sessions
                WHERE session_key = ?1
                  AND (expires_at IS NULL OR expires_at > ?2)
            )
            "#,
        )
        .bind(session_key)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to probe session");
            StorageError::Database("Failed to probe session".to_string())
        })?;

        Ok(row.0 != 0)
    }
}
