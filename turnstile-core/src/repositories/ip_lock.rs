//! Repository trait for IP-based lock audit records.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{Error, repositories::Page};

/// Durable record of an address tripping the login window.
///
/// Created the first time an address goes over the limit, bumped on every
/// later trip, and destroyed only by an operator reset. The record never
/// enforces anything; the counters do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpLockRecord {
    /// Canonical address, the primary key.
    pub ip_address: String,

    /// How many times this address went over the limit. Only ever
    /// increases while the record exists.
    pub lockout_count: i64,

    /// Most recent username observed on an over-limit attempt, if any.
    /// Informational weak reference; may name a since-deleted user.
    pub latest_username: Option<String>,

    /// The timestamp when the record was created.
    pub created_at: DateTime<Utc>,

    /// The timestamp of the most recent over-limit event.
    pub updated_at: DateTime<Utc>,
}

impl IpLockRecord {
    /// How long this address has been tripping the limit.
    pub fn lockout_duration(&self) -> Duration {
        self.updated_at - self.created_at
    }

    /// When the window stops limiting this address, given the policy
    /// window length.
    pub fn unlock_time(&self, window: Duration) -> DateTime<Utc> {
        self.updated_at + window
    }
}

/// Filters for the admin listing.
#[derive(Debug, Clone, Default)]
pub struct IpLockFilter {
    pub ip_address: Option<String>,
    pub latest_username: Option<String>,
}

/// Repository for IP lock audit records.
#[async_trait]
pub trait IpLockRepository: Send + Sync + 'static {
    /// Record one over-limit event for `ip`.
    ///
    /// Inserts with `lockout_count = 1` on first sight, otherwise
    /// atomically increments the count, replaces `latest_username`, and
    /// refreshes `updated_at`. Concurrent upserts for the same address
    /// must serialize; the count equals the number of committed upserts.
    async fn upsert(&self, ip: &str, latest_username: Option<&str>) -> Result<IpLockRecord, Error>;

    async fn get(&self, ip: &str) -> Result<Option<IpLockRecord>, Error>;

    /// List records, most recently updated first.
    async fn list(&self, filter: &IpLockFilter, page: Page) -> Result<Vec<IpLockRecord>, Error>;

    /// Remove the record. Returns whether one existed. Callers coordinate
    /// the counter reset; deleting the row alone does not lift the limit.
    async fn delete(&self, ip: &str) -> Result<bool, Error>;
}
