//! Repository trait for per-account login failure tracking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Error, repositories::Page, user::UserId};

/// Failure tally and cooldown state for one account.
///
/// While `lockout_until` is in the future the account is locked no matter
/// what the window counters say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountLockRecord {
    pub user_id: UserId,

    /// Failures since the last lockout or clear. Reset to zero the moment
    /// the threshold trips.
    pub failure_count: u32,

    /// End of the current cooldown, if one is running.
    pub lockout_until: Option<DateTime<Utc>>,
}

impl AccountLockRecord {
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| until > now)
    }

    /// Seconds until the cooldown ends, if locked.
    pub fn retry_after_seconds(&self, now: DateTime<Utc>) -> Option<i64> {
        self.lockout_until
            .filter(|until| *until > now)
            .map(|until| (until - now).num_seconds())
    }
}

/// Repository for account lock records.
#[async_trait]
pub trait AccountLockRepository: Send + Sync + 'static {
    /// Record one failed login for the account.
    ///
    /// Atomically increments `failure_count`; when the incremented count
    /// reaches `max_failed_attempts`, zeroes the count and stamps
    /// `lockout_until` instead. The whole read-modify-write must happen
    /// under the row, not in the caller.
    async fn record_failure(
        &self,
        user_id: &UserId,
        max_failed_attempts: u32,
        lockout_until: DateTime<Utc>,
    ) -> Result<AccountLockRecord, Error>;

    async fn get(&self, user_id: &UserId) -> Result<Option<AccountLockRecord>, Error>;

    /// Forget the account's failures and any running cooldown.
    async fn clear(&self, user_id: &UserId) -> Result<(), Error>;

    /// List accounts with failures or cooldowns on record.
    async fn list(&self, page: Page) -> Result<Vec<AccountLockRecord>, Error>;
}
