//! Fixed-window failure counters
//!
//! This module defines the counter primitive behind the rate-limit policy:
//! keys scoped to an IP or an account, bucketed by the minute the window
//! started in, each carrying a TTL equal to the window length. Counters
//! only ever grow; resetting one means deleting its key.
//!
//! [`MemoryCounterStore`] is the bundled implementation. It is shared
//! across request workers through an `Arc` and linearizes increments per
//! key via the map's entry lock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::Error;

/// What a counter key is counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// Failed attempts from one remote address.
    Ip,
    /// Failed attempts against one account.
    Account,
}

impl KeyScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyScope::Ip => "ip",
            KeyScope::Account => "account",
        }
    }
}

/// Identifies one fixed-window counter.
///
/// `bucket` is the minute (unix epoch / 60) the counted events fall into,
/// so a window of N minutes is read back as N consecutive bucket keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub scope: KeyScope,
    pub identifier: String,
    pub bucket: i64,
}

impl CounterKey {
    pub fn new(scope: KeyScope, identifier: impl Into<String>, bucket: i64) -> Self {
        Self {
            scope,
            identifier: identifier.into(),
            bucket,
        }
    }

    /// The string form used as the storage key.
    pub fn cache_key(&self) -> String {
        format!("rl:{}:{}:{}", self.scope.as_str(), self.identifier, self.bucket)
    }
}

impl std::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

/// Shared ephemeral store for window counters.
///
/// Implementations must make `incr` linearizable per key. TTL expiry may
/// lag by a bounded number of seconds but an expired key must never be
/// visible through `get`.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    /// Atomically create the key with value 1 and the given TTL if absent,
    /// otherwise increment it. The TTL is fixed at creation and is not
    /// refreshed by later increments.
    async fn incr(&self, key: &CounterKey, ttl: Duration) -> Result<u64, Error>;

    /// Current value, or `None` once the TTL has passed.
    async fn get(&self, key: &CounterKey) -> Result<Option<u64>, Error>;

    /// Best-effort batch removal; missing keys are ignored.
    async fn delete_many(&self, keys: &[CounterKey]) -> Result<(), Error>;
}

struct CounterEntry {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// In-process counter store backed by a concurrent map.
pub struct MemoryCounterStore {
    entries: DashMap<String, CounterEntry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Drop entries whose TTL has passed. Returns the number removed.
    ///
    /// `get` already hides expired entries, so this only reclaims memory.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    /// Start the background sweep task.
    ///
    /// The task wakes once a minute and removes expired entries until the
    /// shutdown signal flips.
    pub fn start_sweep_task(
        self: Arc<Self>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let store = self;

        const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(SWEEP_INTERVAL);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            tracing::debug!(removed = removed, "Swept expired counter entries");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down counter sweep task");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &CounterKey, ttl: Duration) -> Result<u64, Error> {
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry(key.cache_key())
            .or_insert_with(|| CounterEntry {
                count: 0,
                expires_at: now + ttl,
            });

        // A dead entry the sweep has not reclaimed yet counts as absent.
        if entry.expires_at <= now {
            entry.count = 0;
            entry.expires_at = now + ttl;
        }

        entry.count += 1;
        Ok(entry.count)
    }

    async fn get(&self, key: &CounterKey) -> Result<Option<u64>, Error> {
        let now = Utc::now();
        match self.entries.get(&key.cache_key()) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.count)),
            _ => Ok(None),
        }
    }

    async fn delete_many(&self, keys: &[CounterKey]) -> Result<(), Error> {
        for key in keys {
            self.entries.remove(&key.cache_key());
        }
        Ok(())
    }
}
