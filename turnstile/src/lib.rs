//! # Turnstile
//!
//! Turnstile throttles interactive logins for learning platforms and
//! exchanges session-bound refresh tokens for short-lived access tokens.
//! It keeps the enforcement state (fixed-window counters) separate from
//! the audit state (durable lock records), so an operator can always see
//! why an address was limited and clear it in one step.
//!
//! What you get:
//! - IP-window rate limiting in front of credential verification
//! - Per-account failure cooldowns with automatic lockout
//! - Durable audit records for both, with operator listing and reset
//! - A refresh → access token exchange gated on session liveness
//!
//! The platform's user directory and session store stay external; they
//! are wired in through the [`UserDirectory`] and [`SessionProbe`]
//! capabilities at construction time.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use turnstile::{Turnstile, TokenConfig};
//! use turnstile_storage_sqlite::{SqliteRepositoryProvider, SqliteSessionProbe};
//! # use turnstile::{Error, User};
//! # struct Directory;
//! # #[async_trait::async_trait]
//! # impl turnstile::UserDirectory for Directory {
//! #     async fn find_by_username(&self, _: &str) -> Result<Option<User>, Error> { Ok(None) }
//! #     async fn verify_password(&self, _: &User, _: &str) -> Result<bool, Error> { Ok(false) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = sqlx::SqlitePool::connect("sqlite::memory:").await?;
//!     let repositories = Arc::new(SqliteRepositoryProvider::new(pool.clone()));
//!     let probe = Arc::new(SqliteSessionProbe::new(pool));
//!     let directory = Arc::new(Directory);
//!
//!     let turnstile = Turnstile::new(
//!         repositories,
//!         directory,
//!         probe,
//!         TokenConfig::new(b"shared-signing-secret".to_vec()),
//!     );
//!     turnstile.migrate().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use turnstile_core::{
    policy::RateLimitPolicy,
    services::{AuthService, LockAdminService, TokenService},
};

/// Re-export core types from turnstile_core
///
/// These types are commonly used when working with the Turnstile API.
pub use turnstile_core::{
    AccountLockConfig, AccountLockRecord, AuthOutcome, ClientId, CounterKey, CounterStore,
    Credentials, Decision, Error, IpLockFilter, IpLockRecord, KeyScope, LimitKind,
    MemoryCounterStore, Page, RateLimitConfig, RepositoryProvider, SessionProbe, TokenClaims,
    TokenConfig, TokenExchangeError, User, UserDirectory, UserId,
};

/// Re-export the claim verification helpers for callers that need to
/// inspect issued tokens (tests, protected-endpoint middleware).
pub use turnstile_core::token;

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding
/// feature is enabled.
#[cfg(feature = "sqlite")]
pub use turnstile_storage_sqlite::{SqliteRepositoryProvider, SqliteSessionProbe};

/// The main entry point: login throttling, token exchange, and lock
/// administration behind one handle.
///
/// `Turnstile` is cheap to share behind an `Arc` and safe to call from
/// many request workers concurrently; all cross-request coordination
/// flows through the counter store and the repositories.
pub struct Turnstile<R, D, P, C = MemoryCounterStore>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    repositories: Arc<R>,
    directory: Arc<D>,
    probe: Arc<P>,
    counter_store: Arc<C>,
    rate_limit_config: RateLimitConfig,
    account_lock_config: AccountLockConfig,
    token_config: TokenConfig,

    auth_service: AuthService<R, C, D>,
    token_service: TokenService<P>,
    admin_service: LockAdminService<R, C>,
}

impl<R, D, P> Turnstile<R, D, P, MemoryCounterStore>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
{
    /// Create a new Turnstile instance with the in-memory counter store
    /// and default policy knobs.
    ///
    /// # Arguments
    ///
    /// * `repositories` - Lock audit storage
    /// * `directory` - The platform's user directory
    /// * `probe` - Read-only session liveness checks
    /// * `token_config` - Signing secret and token lifetimes
    pub fn new(
        repositories: Arc<R>,
        directory: Arc<D>,
        probe: Arc<P>,
        token_config: TokenConfig,
    ) -> Self {
        Self::assemble(
            repositories,
            directory,
            probe,
            Arc::new(MemoryCounterStore::new()),
            RateLimitConfig::default(),
            AccountLockConfig::default(),
            token_config,
        )
    }
}

impl<R, D, P, C> Turnstile<R, D, P, C>
where
    R: RepositoryProvider,
    D: UserDirectory,
    P: SessionProbe,
    C: CounterStore,
{
    fn assemble(
        repositories: Arc<R>,
        directory: Arc<D>,
        probe: Arc<P>,
        counter_store: Arc<C>,
        rate_limit_config: RateLimitConfig,
        account_lock_config: AccountLockConfig,
        token_config: TokenConfig,
    ) -> Self {
        let policy = RateLimitPolicy::new(Arc::clone(&counter_store), rate_limit_config.clone());

        let auth_service = AuthService::new(
            Arc::clone(&repositories),
            policy.clone(),
            Arc::clone(&directory),
            account_lock_config.clone(),
        );
        let token_service = TokenService::new(Arc::clone(&probe), token_config.clone());
        let admin_service = LockAdminService::new(Arc::clone(&repositories), policy);

        Self {
            repositories,
            directory,
            probe,
            counter_store,
            rate_limit_config,
            account_lock_config,
            token_config,
            auth_service,
            token_service,
            admin_service,
        }
    }

    /// Swap in a different counter store, e.g. one shared across hosts.
    pub fn with_counter_store<C2: CounterStore>(self, store: Arc<C2>) -> Turnstile<R, D, P, C2> {
        Turnstile::assemble(
            self.repositories,
            self.directory,
            self.probe,
            store,
            self.rate_limit_config,
            self.account_lock_config,
            self.token_config,
        )
    }

    /// Set the rate-limit policy knobs.
    pub fn with_rate_limit_config(self, config: RateLimitConfig) -> Self {
        Self::assemble(
            self.repositories,
            self.directory,
            self.probe,
            self.counter_store,
            config,
            self.account_lock_config,
            self.token_config,
        )
    }

    /// Set the account cooldown knobs.
    pub fn with_account_lock_config(self, config: AccountLockConfig) -> Self {
        Self::assemble(
            self.repositories,
            self.directory,
            self.probe,
            self.counter_store,
            self.rate_limit_config,
            config,
            self.token_config,
        )
    }

    pub fn rate_limit_config(&self) -> &RateLimitConfig {
        &self.rate_limit_config
    }

    pub fn account_lock_config(&self) -> &AccountLockConfig {
        &self.account_lock_config
    }

    pub fn token_config(&self) -> &TokenConfig {
        &self.token_config
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), Error> {
        self.repositories.migrate().await
    }

    /// Check the health of the audit storage
    pub async fn health_check(&self) -> Result<(), Error> {
        self.repositories.health_check().await
    }

    /// Authenticate one login attempt.
    ///
    /// See [`AuthService::authenticate`](turnstile_core::services::AuthService::authenticate)
    /// for the outcome set and ordering guarantees.
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        client: &ClientId,
    ) -> Result<AuthOutcome, Error> {
        self.auth_service.authenticate(credentials, client).await
    }

    /// Issue a refresh token bound to the user's live session.
    pub fn issue_refresh(&self, user: &User, session_key: &str) -> Result<String, Error> {
        self.token_service.issue_refresh(user, session_key)
    }

    /// Wrap a refresh token in the signed outer request envelope.
    pub fn seal_request(&self, refresh_token: &str) -> Result<String, Error> {
        self.token_service.seal_request(refresh_token)
    }

    /// Exchange a signed request envelope for a fresh access token.
    pub async fn exchange(&self, request_token: &str) -> Result<String, Error> {
        self.token_service.exchange(request_token).await
    }

    /// Whether a session key is still live, failing closed on probe
    /// trouble.
    pub async fn session_exists(&self, session_key: &str) -> bool {
        self.token_service.session_exists(session_key).await
    }

    /// List IP lock records, most recently updated first.
    pub async fn list_ip_locks(
        &self,
        filter: &IpLockFilter,
        page: Page,
    ) -> Result<Vec<IpLockRecord>, Error> {
        self.admin_service.list_ip_locks(filter, page).await
    }

    /// Clear an address's counters and audit record. Returns whether a
    /// record existed.
    pub async fn reset_ip_lock(&self, ip: &str) -> Result<bool, Error> {
        self.admin_service.reset_ip_lock(ip).await
    }

    /// List accounts with failures or cooldowns on record.
    pub async fn list_account_locks(&self, page: Page) -> Result<Vec<AccountLockRecord>, Error> {
        self.admin_service.list_account_locks(page).await
    }

    /// Clear an account's failure count and cooldown.
    pub async fn clear_account_lock(&self, user_id: &UserId) -> Result<(), Error> {
        self.admin_service.clear_account_lock(user_id).await
    }
}
