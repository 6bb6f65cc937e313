//! Schema setup for the SQLite backend.
//!
//! Statements are idempotent, so `apply` can run on every startup. The
//! `sessions` table mirrors what an external session store would own; it
//! is created here for embedded deployments and tests, and the probe only
//! ever reads it.

use sqlx::SqlitePool;
use turnstile_core::{Error, error::StorageError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS rate_limited_ips (
        ip_address TEXT PRIMARY KEY,
        lockout_count INTEGER NOT NULL DEFAULT 1,
        latest_username TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_rate_limited_ips_updated_at
        ON rate_limited_ips (updated_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_locks (
        user_id TEXT PRIMARY KEY,
        failure_count INTEGER NOT NULL DEFAULT 0,
        lockout_until INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_key TEXT PRIMARY KEY,
        expires_at INTEGER
    )
    "#,
];

/// Apply the schema to the pool.
pub async fn apply(pool: &SqlitePool) -> Result<(), Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to apply schema statement");
            StorageError::Migration("Failed to apply schema".to_string())
        })?;
    }

    tracing::debug!("SQLite schema up to date");
    Ok(())
}
