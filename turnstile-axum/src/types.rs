use axum::{
    RequestPartsExt,
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use turnstile::{AccountLockRecord, IpLockRecord, User};
use turnstile_core::helpers::humanize_delta;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub user: User,
}

/// Form body of `POST /access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    #[serde(default)]
    pub request_access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Query parameters for the IP lock listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpLockListQuery {
    pub ip: Option<String>,
    pub username: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Query parameters for the account lock listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountLockListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One row of the operator's IP lock listing.
#[derive(Debug, Clone, Serialize)]
pub struct IpLockSummary {
    pub ip_address: String,
    pub lockout_count: i64,
    pub latest_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// How long the address has been tripping the limit, humanized.
    pub lockout_duration: String,
    /// When the window stops limiting the address, absent new failures.
    pub unlock_time: DateTime<Utc>,
}

impl IpLockSummary {
    pub fn from_record(record: IpLockRecord, window: Duration) -> Self {
        Self {
            lockout_duration: humanize_delta(Some(record.lockout_duration())),
            unlock_time: record.unlock_time(window),
            ip_address: record.ip_address,
            lockout_count: record.lockout_count,
            latest_username: record.latest_username,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// One row of the operator's account lock listing.
#[derive(Debug, Clone, Serialize)]
pub struct AccountLockSummary {
    pub user_id: String,
    pub failure_count: u32,
    pub lockout_until: Option<DateTime<Utc>>,
    pub retry_after_seconds: Option<i64>,
}

impl From<AccountLockRecord> for AccountLockSummary {
    fn from(record: AccountLockRecord) -> Self {
        let retry_after_seconds = record.retry_after_seconds(Utc::now());
        Self {
            user_id: record.user_id.into_inner(),
            failure_count: record.failure_count,
            lockout_until: record.lockout_until,
            retry_after_seconds,
        }
    }
}

/// Remote connection details for the request being handled.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    pub ip: Option<String>,
}

impl<S> FromRequestParts<S> for ConnectionInfo
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = parts
            .extract::<ConnectInfo<SocketAddr>>()
            .await
            .ok()
            .map(|addr| addr.ip().to_string());

        Ok(ConnectionInfo { ip })
    }
}

/// Session cookie settings for the logout side effect.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "session_id".to_string(),
        }
    }
}

impl CookieConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Bearer token guarding the operator endpoints.
#[derive(Debug, Clone)]
pub struct AdminAuthConfig {
    pub token: String,
}

impl AdminAuthConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}
