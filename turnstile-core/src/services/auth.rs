//! Login flow: window check, account cooldown, credential verification.
//!
//! The service wraps the external user directory with both throttles. The
//! ordering is load-bearing: the window check runs before any credential
//! work, the account cooldown runs before password verification, and on a
//! credential failure the counter increment commits before the audit
//! upsert so a crash between the two leaves the counter authoritative.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::{
    Error,
    client::ClientId,
    counter::CounterStore,
    policy::{Decision, RateLimitPolicy},
    repositories::{AccountLockRepository, IpLockRepository, RepositoryProvider},
    user::{Credentials, User, UserDirectory},
};

/// Account cooldown knobs, immutable after construction.
#[derive(Debug, Clone)]
pub struct AccountLockConfig {
    pub enabled: bool,
    /// Failures that trip the cooldown.
    pub max_failed_attempts: u32,
    /// How long a tripped account stays locked.
    pub lockout_duration: Duration,
}

impl Default for AccountLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_failed_attempts: 6,
            lockout_duration: Duration::minutes(30),
        }
    }
}

impl AccountLockConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Which throttle rejected the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// The per-address window tripped.
    IpWindow,
    /// The account is inside its failure cooldown.
    AccountCooldown,
}

/// Result of one authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(User),
    /// Wrong username or password.
    Failure,
    /// Rejected before credentials were considered.
    RateLimited(LimitKind),
}

/// Service wrapping credential verification with rate limiting and the
/// lock audit trail.
///
/// # Thread Safety
///
/// The service is thread-safe and meant to be shared across request
/// workers; all cross-request state lives in the counter store and the
/// repositories.
pub struct AuthService<R, C, D>
where
    R: RepositoryProvider,
    C: CounterStore,
    D: UserDirectory,
{
    repositories: Arc<R>,
    policy: RateLimitPolicy<C>,
    directory: Arc<D>,
    lock_config: AccountLockConfig,
}

impl<R, C, D> AuthService<R, C, D>
where
    R: RepositoryProvider,
    C: CounterStore,
    D: UserDirectory,
{
    pub fn new(
        repositories: Arc<R>,
        policy: RateLimitPolicy<C>,
        directory: Arc<D>,
        lock_config: AccountLockConfig,
    ) -> Self {
        Self {
            repositories,
            policy,
            directory,
            lock_config,
        }
    }

    pub fn lock_config(&self) -> &AccountLockConfig {
        &self.lock_config
    }

    /// Authenticate one login attempt.
    ///
    /// Returns `Err` only for faults outside the bounded outcome set, such
    /// as a user directory outage. Audit-store trouble never surfaces
    /// here; it is logged and the decision stands.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        client: &ClientId,
    ) -> Result<AuthOutcome, Error> {
        // 1. Window check. Over-budget attempts are recorded in the audit
        //    trail but never reach credential verification.
        if self.policy.check(client).await == Decision::Limited {
            if let Err(e) = self
                .repositories
                .ip_lock()
                .upsert(client.ip(), client.username())
                .await
            {
                tracing::error!(error = %e, ip = client.ip(), "Failed to record IP lock event");
            }
            tracing::info!(ip = client.ip(), "Login rejected - rate limited");
            return Ok(AuthOutcome::RateLimited(LimitKind::IpWindow));
        }

        let username = credentials.normalized_username();
        let user = self.directory.find_by_username(&username).await?;

        // 2. Account cooldown, checked before any password work.
        if self.lock_config.enabled {
            if let Some(ref user) = user {
                match self.repositories.account_lock().get(&user.id).await {
                    Ok(Some(record)) if record.is_locked_at(Utc::now()) => {
                        tracing::info!(user_id = %user.id, "Login rejected - account in cooldown");
                        return Ok(AuthOutcome::RateLimited(LimitKind::AccountCooldown));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(error = %e, "Account lock lookup failed; not blocking login");
                    }
                }
            }
        }

        // 3. Credentials.
        let Some(user) = user else {
            // Unknown usernames still count toward the window, and the
            // response is indistinguishable from a bad password.
            return self.record_failure(client, None).await;
        };

        if self.directory.verify_password(&user, &credentials.password).await? {
            if self.lock_config.enabled {
                if let Err(e) = self.repositories.account_lock().clear(&user.id).await {
                    tracing::error!(error = %e, user_id = %user.id, "Failed to clear account failures");
                }
            }
            return Ok(AuthOutcome::Authenticated(user));
        }

        // 4. Credential failure.
        self.record_failure(client, Some(&user)).await
    }

    /// Record a failed attempt: counter first, audit second.
    ///
    /// A counter write failure fails closed; the caller sees the attempt
    /// as rate limited rather than slipping under an unincremented window.
    async fn record_failure(
        &self,
        client: &ClientId,
        user: Option<&User>,
    ) -> Result<AuthOutcome, Error> {
        if let Err(e) = self.policy.record_failure(client).await {
            tracing::error!(error = %e, ip = client.ip(), "Counter increment failed; treating attempt as limited");
            return Ok(AuthOutcome::RateLimited(LimitKind::IpWindow));
        }

        match user {
            Some(user) => {
                if self.lock_config.enabled {
                    let lockout_until = Utc::now() + self.lock_config.lockout_duration;
                    if let Err(e) = self
                        .repositories
                        .account_lock()
                        .record_failure(
                            &user.id,
                            self.lock_config.max_failed_attempts,
                            lockout_until,
                        )
                        .await
                    {
                        tracing::error!(error = %e, user_id = %user.id, "Failed to record account failure");
                    }
                }
                tracing::warn!(user_id = %user.id, "Login failed - password invalid");
            }
            None => {
                tracing::warn!(ip = client.ip(), "Login failed - unknown username");
            }
        }

        Ok(AuthOutcome::Failure)
    }
}
