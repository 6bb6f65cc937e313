//! SQLite storage backend for the turnstile login-throttling ecosystem.
//!
//! Provides [`SqliteRepositoryProvider`] over the lock audit tables and
//! [`SqliteSessionProbe`] for read-only session liveness checks.
//!
//! ```rust,no_run
//! use sqlx::SqlitePool;
//! use turnstile_storage_sqlite::SqliteRepositoryProvider;
//! use turnstile_core::repositories::RepositoryProvider;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = SqlitePool::connect("sqlite://turnstile.db").await?;
//! let repositories = SqliteRepositoryProvider::new(pool);
//! repositories.migrate().await?;
//! # Ok(())
//! # }
//! ```

pub mod migrations;
pub mod repositories;
mod session;

pub use repositories::{
    SqliteAccountLockRepository, SqliteIpLockRepository, SqliteRepositoryProvider,
};
pub use session::SqliteSessionProbe;
