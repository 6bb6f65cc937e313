//! Ready-to-use Axum routes for the Turnstile login-throttling framework.
//!
//! Exposes the token exchange endpoint, a throttled login endpoint, and
//! the operator lock-administration endpoints:
//!
//! - `POST /login` - JSON credentials; `401` on bad credentials, `429`
//!   when a throttle rejects the attempt
//! - `POST /access_token` - form field `request_access_token`; `200`
//!   with a fresh access token or `400` with a reason message
//! - `GET /health`
//! - `GET/DELETE /admin/ip_locks[/{ip}]` and
//!   `GET/DELETE /admin/account_locks[/{user_id}]`, guarded by a bearer
//!   token
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! # use turnstile::Turnstile;
//! use turnstile_axum::{AdminAuthConfig, CookieConfig, create_router};
//! # async fn example<R, D, P>(turnstile: Arc<Turnstile<R, D, P>>)
//! # where
//! #     R: turnstile::RepositoryProvider,
//! #     D: turnstile::UserDirectory,
//! #     P: turnstile::SessionProbe,
//! # {
//! let app = create_router(
//!     turnstile,
//!     CookieConfig::default(),
//!     AdminAuthConfig::new("operator-secret"),
//! );
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//! axum::serve(listener, app).await.unwrap();
//! # }
//! ```

mod error;
mod routes;
mod types;

pub use error::{ApiError, STALE_SESSION_LOGOUT_MESSAGE, exchange_failure_message};
pub use routes::{AppState, create_router};
pub use types::{
    AccessTokenRequest, AccessTokenResponse, AccountLockListQuery, AccountLockSummary,
    AdminAuthConfig, ConnectionInfo, CookieConfig, HealthResponse, IpLockListQuery, IpLockSummary,
    LoginRequest, LoginResponse, MessageResponse,
};
