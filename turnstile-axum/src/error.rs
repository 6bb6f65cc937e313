use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use turnstile::TokenExchangeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Email or password is incorrect.")]
    InvalidCredentials,

    #[error("Too many failed login attempts. Try again later.")]
    IpRateLimited,

    #[error("This account has been temporarily locked due to excessive login failures. Try again later.")]
    AccountLocked,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::IpRateLimited | ApiError::AccountLocked => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            // Never echo internals to the client.
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Client-facing message for each exchange rejection.
///
/// Input and signature problems stay generic; expiry and staleness use
/// the platform's established wording.
pub fn exchange_failure_message(error: &TokenExchangeError) -> &'static str {
    match error {
        TokenExchangeError::MissingInput => "Invalid request",
        TokenExchangeError::BadSignature => "Invalid token",
        TokenExchangeError::Expired => "Expired Refresh-token used",
        TokenExchangeError::WrongType(_) => "Invalid token type",
        TokenExchangeError::StaleSession => "Old Refresh-token used",
    }
}

/// Message used instead of [`exchange_failure_message`] when a stale
/// session rejection also logs the caller out.
pub const STALE_SESSION_LOGOUT_MESSAGE: &str = "Logging out because of an old Refresh-token";

pub type Result<T> = std::result::Result<T, ApiError>;
