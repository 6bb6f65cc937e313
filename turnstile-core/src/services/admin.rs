//! Operator-facing lock inspection and reset.

use std::sync::Arc;

use crate::{
    Error,
    counter::CounterStore,
    policy::RateLimitPolicy,
    repositories::{
        AccountLockRecord, AccountLockRepository, IpLockFilter, IpLockRecord, IpLockRepository,
        Page, RepositoryProvider,
    },
    user::UserId,
};

/// Service behind the operator endpoints: list current locks, clear them.
pub struct LockAdminService<R, C>
where
    R: RepositoryProvider,
    C: CounterStore,
{
    repositories: Arc<R>,
    policy: RateLimitPolicy<C>,
}

impl<R, C> LockAdminService<R, C>
where
    R: RepositoryProvider,
    C: CounterStore,
{
    pub fn new(repositories: Arc<R>, policy: RateLimitPolicy<C>) -> Self {
        Self {
            repositories,
            policy,
        }
    }

    /// List IP lock records, most recently updated first.
    pub async fn list_ip_locks(
        &self,
        filter: &IpLockFilter,
        page: Page,
    ) -> Result<Vec<IpLockRecord>, Error> {
        self.repositories.ip_lock().list(filter, page).await
    }

    /// Clear an address: its window counters and its audit record.
    ///
    /// Counters go first; if the record delete then fails, the address is
    /// already unblocked and the stale row merely resurfaces in the
    /// listing. Returns whether an audit record existed.
    pub async fn reset_ip_lock(&self, ip: &str) -> Result<bool, Error> {
        self.policy.reset(ip).await?;
        let existed = self.repositories.ip_lock().delete(ip).await?;

        tracing::info!(ip = ip, existed = existed, "Reset IP lock");
        Ok(existed)
    }

    /// List accounts with failures or cooldowns on record.
    pub async fn list_account_locks(&self, page: Page) -> Result<Vec<AccountLockRecord>, Error> {
        self.repositories.account_lock().list(page).await
    }

    /// Clear an account's failure count and cooldown.
    pub async fn clear_account_lock(&self, user_id: &UserId) -> Result<(), Error> {
        self.repositories.account_lock().clear(user_id).await?;
        tracing::info!(user_id = %user_id, "Cleared account lock");
        Ok(())
    }
}
