//! Repository traits for the durable lock audit trail
//!
//! The counters enforce the limit; these repositories only document it.
//! Storage backends implement the individual repository traits and expose
//! them through [`RepositoryProvider`], which also carries the lifecycle
//! methods the facade forwards to.

pub mod account_lock;
pub mod ip_lock;

pub use account_lock::{AccountLockRecord, AccountLockRepository};
pub use ip_lock::{IpLockFilter, IpLockRecord, IpLockRepository};

use async_trait::async_trait;

use crate::Error;

/// Pagination for admin listings.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Combined provider over the audit repositories plus storage lifecycle.
#[async_trait]
pub trait RepositoryProvider: Send + Sync + 'static {
    /// The IP lock repository implementation type
    type IpLock: IpLockRepository;

    /// The account lock repository implementation type
    type AccountLock: AccountLockRepository;

    /// Get the IP lock repository
    fn ip_lock(&self) -> &Self::IpLock;

    /// Get the account lock repository
    fn account_lock(&self) -> &Self::AccountLock;

    /// Apply the storage schema.
    async fn migrate(&self) -> Result<(), Error>;

    /// Storage health check
    async fn health_check(&self) -> Result<(), Error>;
}
