//! Rate-limit policy over the counter store
//!
//! Translates window counters into allow/limit decisions. The policy is
//! deliberately read/write split: `check` never increments, and only the
//! authentication flow calls `record_failure` after a credential rejection,
//! so the counters stay authoritative even if the audit trail lags.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::time::timeout;

use crate::{
    Error,
    client::ClientId,
    counter::{CounterKey, CounterStore, KeyScope},
    error::StorageError,
};

/// Policy knobs, immutable after construction.
///
/// The request ceiling is intentionally permissive: whole universities
/// often sit behind one shared address, and the account cooldown catches
/// targeted attacks long before the window does.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Length of the fixed counting window.
    pub window: Duration,
    /// Failed attempts tolerated within the window before limiting.
    pub max_requests: u64,
    /// Which counter scopes to maintain and consult.
    pub scopes: Vec<KeyScope>,
    /// Per-call deadline for counter store I/O.
    pub op_timeout: std::time::Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::minutes(5),
            max_requests: 10_000,
            scopes: vec![KeyScope::Ip],
            op_timeout: std::time::Duration::from_secs(2),
        }
    }
}

/// Outcome of a policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ok,
    Limited,
}

/// Allow/limit decisions backed by a [`CounterStore`].
pub struct RateLimitPolicy<C: CounterStore> {
    store: Arc<C>,
    config: RateLimitConfig,
}

impl<C: CounterStore> Clone for RateLimitPolicy<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<C: CounterStore> RateLimitPolicy<C> {
    pub fn new(store: Arc<C>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Whether the client is already over budget. Read-only.
    ///
    /// Sums every scope key across the window's buckets. A store error or
    /// timeout on this path fails open: a counter outage must not turn
    /// into a site-wide lockout.
    pub async fn check(&self, client: &ClientId) -> Decision {
        let mut total: u64 = 0;

        for key in self.window_keys(client, Utc::now()) {
            match timeout(self.config.op_timeout, self.store.get(&key)).await {
                Ok(Ok(Some(count))) => total += count,
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, key = %key, "Counter read failed; allowing request");
                    return Decision::Ok;
                }
                Err(_) => {
                    tracing::error!(key = %key, "Counter read timed out; allowing request");
                    return Decision::Ok;
                }
            }
        }

        if total >= self.config.max_requests {
            Decision::Limited
        } else {
            Decision::Ok
        }
    }

    /// Record one failed attempt against every scope key for the current
    /// bucket. Errors and timeouts propagate so the caller can fail closed.
    pub async fn record_failure(&self, client: &ClientId) -> Result<(), Error> {
        let now = Utc::now();
        for key in self.current_keys(client, now) {
            timeout(self.config.op_timeout, self.store.incr(&key, self.config.window))
                .await
                .map_err(|_| {
                    StorageError::Timeout(format!("counter increment timed out for {key}"))
                })??;
        }
        Ok(())
    }

    /// Every IP-scoped key that could currently hold a live counter for
    /// `ip`. Pure key arithmetic; the admin reset deletes exactly these.
    pub fn keys_for(&self, ip: &str) -> Vec<CounterKey> {
        let bucket = bucket_for(Utc::now());
        let window_minutes = self.config.window.num_minutes().max(1);

        (0..=window_minutes)
            .map(|age| CounterKey::new(KeyScope::Ip, ip, bucket - age))
            .collect()
    }

    /// Delete every counter the policy maintains for `ip`.
    pub async fn reset(&self, ip: &str) -> Result<(), Error> {
        let keys = self.keys_for(ip);
        timeout(self.config.op_timeout, self.store.delete_many(&keys))
            .await
            .map_err(|_| StorageError::Timeout("counter reset timed out".to_string()))??;
        Ok(())
    }

    /// Keys written by a failure happening at `now`.
    fn current_keys(&self, client: &ClientId, now: DateTime<Utc>) -> Vec<CounterKey> {
        let bucket = bucket_for(now);
        self.scope_keys(client, bucket)
    }

    /// Keys read by a check happening at `now`: every bucket the window
    /// spans, for every configured scope.
    fn window_keys(&self, client: &ClientId, now: DateTime<Utc>) -> Vec<CounterKey> {
        let bucket = bucket_for(now);
        let window_minutes = self.config.window.num_minutes().max(1);

        (0..=window_minutes)
            .flat_map(|age| self.scope_keys(client, bucket - age))
            .collect()
    }

    fn scope_keys(&self, client: &ClientId, bucket: i64) -> Vec<CounterKey> {
        self.config
            .scopes
            .iter()
            .filter_map(|scope| match scope {
                KeyScope::Ip => Some(CounterKey::new(KeyScope::Ip, client.ip(), bucket)),
                KeyScope::Account => client
                    .username()
                    .map(|name| CounterKey::new(KeyScope::Account, name, bucket)),
            })
            .collect()
    }
}

fn bucket_for(now: DateTime<Utc>) -> i64 {
    now.timestamp() / 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::MemoryCounterStore;

    fn policy(max_requests: u64) -> RateLimitPolicy<MemoryCounterStore> {
        RateLimitPolicy::new(
            Arc::new(MemoryCounterStore::new()),
            RateLimitConfig {
                window: Duration::minutes(1),
                max_requests,
                ..RateLimitConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_under_budget_is_ok() {
        let policy = policy(3);
        let client = ClientId::from_parts("203.0.113.7", None);

        assert_eq!(policy.check(&client).await, Decision::Ok);
        policy.record_failure(&client).await.unwrap();
        policy.record_failure(&client).await.unwrap();
        assert_eq!(policy.check(&client).await, Decision::Ok);
    }

    #[tokio::test]
    async fn test_limited_at_threshold() {
        let policy = policy(3);
        let client = ClientId::from_parts("203.0.113.7", None);

        for _ in 0..3 {
            policy.record_failure(&client).await.unwrap();
        }
        assert_eq!(policy.check(&client).await, Decision::Limited);
    }

    #[tokio::test]
    async fn test_distinct_ips_independent() {
        let policy = policy(2);
        let first = ClientId::from_parts("203.0.113.7", None);
        let second = ClientId::from_parts("203.0.113.8", None);

        for _ in 0..2 {
            policy.record_failure(&first).await.unwrap();
        }
        assert_eq!(policy.check(&first).await, Decision::Limited);
        assert_eq!(policy.check(&second).await, Decision::Ok);
    }

    #[tokio::test]
    async fn test_account_scope_counts_username() {
        let store = Arc::new(MemoryCounterStore::new());
        let policy = RateLimitPolicy::new(
            Arc::clone(&store),
            RateLimitConfig {
                window: Duration::minutes(1),
                max_requests: 100,
                scopes: vec![KeyScope::Ip, KeyScope::Account],
                ..RateLimitConfig::default()
            },
        );
        let client = ClientId::from_parts("203.0.113.7", Some("Alice"));

        policy.record_failure(&client).await.unwrap();

        let bucket = bucket_for(Utc::now());
        let account_key = CounterKey::new(KeyScope::Account, "alice", bucket);
        assert_eq!(store.get(&account_key).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_missing_username_yields_ip_only_keys() {
        let policy = RateLimitPolicy::new(
            Arc::new(MemoryCounterStore::new()),
            RateLimitConfig {
                scopes: vec![KeyScope::Ip, KeyScope::Account],
                ..RateLimitConfig::default()
            },
        );
        let client = ClientId::from_parts("203.0.113.7", None);

        let keys = policy.current_keys(&client, Utc::now());
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].scope, KeyScope::Ip);
    }

    #[tokio::test]
    async fn test_unparseable_address_still_bounded() {
        let policy = policy(2);
        let client = ClientId::from_parts("garbage", None);

        for _ in 0..2 {
            policy.record_failure(&client).await.unwrap();
        }
        assert_eq!(policy.check(&client).await, Decision::Limited);
    }

    #[tokio::test]
    async fn test_reset_clears_all_window_keys() {
        let policy = policy(1);
        let client = ClientId::from_parts("203.0.113.7", None);

        policy.record_failure(&client).await.unwrap();
        assert_eq!(policy.check(&client).await, Decision::Limited);

        policy.reset("203.0.113.7").await.unwrap();
        assert_eq!(policy.check(&client).await, Decision::Ok);
    }

    #[test]
    fn test_keys_for_is_pure_ip_arithmetic() {
        let policy = policy(10);
        let keys = policy.keys_for("203.0.113.7");

        // One key per bucket the one-minute window can span.
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.scope == KeyScope::Ip));
        assert!(keys.iter().all(|k| k.identifier == "203.0.113.7"));
    }
}
