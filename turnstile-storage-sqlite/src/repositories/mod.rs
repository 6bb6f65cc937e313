//! SQLite repository implementations.

mod account_lock;
mod ip_lock;

pub use account_lock::SqliteAccountLockRepository;
pub use ip_lock::SqliteIpLockRepository;

use async_trait::async_trait;
use sqlx::SqlitePool;
use turnstile_core::{Error, error::StorageError, repositories::RepositoryProvider};

use crate::migrations;

/// Provider bundling the SQLite repositories over one shared pool.
pub struct SqliteRepositoryProvider {
    pool: SqlitePool,
    ip_lock: SqliteIpLockRepository,
    account_lock: SqliteAccountLockRepository,
}

impl SqliteRepositoryProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            ip_lock: SqliteIpLockRepository::new(pool.clone()),
            account_lock: SqliteAccountLockRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RepositoryProvider for SqliteRepositoryProvider {
    type IpLock = SqliteIpLockRepository;
    type AccountLock = SqliteAccountLockRepository;

    fn ip_lock(&self) -> &Self::IpLock {
        &self.ip_lock
    }

    fn account_lock(&self) -> &Self::AccountLock {
        &self.account_lock
    }

    async fn migrate(&self) -> Result<(), Error> {
        migrations::apply(&self.pool).await
    }

    async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "SQLite health check failed");
                StorageError::Connection("SQLite health check failed".to_string())
            })?;

        Ok(())
    }
}
