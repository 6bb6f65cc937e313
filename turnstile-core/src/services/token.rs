//! Refresh-token issuance and the access-token exchange.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::timeout;

use crate::{
    Error,
    error::TokenExchangeError,
    session::SessionProbe,
    token::{self, RequestClaims, TYPE_REFRESH, TokenClaims, TokenConfig},
    user::User,
};

/// Service signing refresh tokens and exchanging them for access tokens.
///
/// A refresh token stays reusable until its expiry passes or its bound
/// session disappears; exchanging it never consumes it. Rotation is
/// explicit: a fresh refresh token is issued at login.
pub struct TokenService<P: SessionProbe> {
    probe: Arc<P>,
    config: TokenConfig,
}

impl<P: SessionProbe> TokenService<P> {
    pub fn new(probe: Arc<P>, config: TokenConfig) -> Self {
        Self { probe, config }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue a refresh token bound to the user's live session.
    pub fn issue_refresh(&self, user: &User, session_key: &str) -> Result<String, Error> {
        let claims = TokenClaims::refresh(user, session_key, Utc::now(), self.config.refresh_ttl);
        token::sign(&claims, &self.config)
    }

    /// Wrap a refresh token in the signed outer request envelope clients
    /// post to the exchange endpoint.
    pub fn seal_request(&self, refresh_token: &str) -> Result<String, Error> {
        let claims = RequestClaims::new(refresh_token, Utc::now(), self.config.request_ttl);
        token::sign(&claims, &self.config)
    }

    /// Exchange a signed request envelope for a fresh access token.
    ///
    /// Every expected rejection comes back as
    /// [`Error::Token`]; anything else is a programming or backend fault
    /// for the transport layer's 500 handler.
    pub async fn exchange(&self, request_token: &str) -> Result<String, Error> {
        if request_token.trim().is_empty() {
            tracing::info!("Token exchange rejected - empty request token");
            return Err(TokenExchangeError::MissingInput.into());
        }

        let now = Utc::now();

        // Outer envelope: signature, then expiry, then the payload field.
        let outer: RequestClaims = token::verify(request_token, &self.config)
            .map_err(|e| self.rejected("request envelope", e))?;

        if outer.is_expired_at(now) {
            tracing::info!("Token exchange rejected - expired request envelope");
            return Err(TokenExchangeError::Expired.into());
        }

        let Some(refresh_token) = outer.refresh_token else {
            tracing::info!("Token exchange rejected - envelope missing refresh_token");
            return Err(TokenExchangeError::MissingInput.into());
        };

        // Inner refresh token: signature, expiry, kind.
        let claims: TokenClaims = token::verify(&refresh_token, &self.config)
            .map_err(|e| self.rejected("refresh token", e))?;

        if claims.is_expired_at(now) {
            tracing::info!(username = %claims.username, "Token exchange rejected - expired refresh token");
            return Err(TokenExchangeError::Expired.into());
        }

        if claims.token_type != TYPE_REFRESH {
            // Session key redacted; the rest of the payload is not secret.
            tracing::warn!(
                token_type = %claims.token_type,
                username = %claims.username,
                "Token exchange rejected - wrong token type"
            );
            return Err(TokenExchangeError::WrongType(claims.token_type).into());
        }

        // Session liveness, failing closed on probe trouble.
        if !self.session_exists(&claims.session_key).await {
            tracing::info!(username = %claims.username, "Token exchange rejected - session gone");
            return Err(TokenExchangeError::StaleSession.into());
        }

        let access = claims.to_access(now, self.config.access_ttl);
        token::sign(&access, &self.config)
    }

    /// Whether the session is still live. Probe errors and timeouts read
    /// as `false` so an outage cannot resurrect orphaned tokens.
    pub async fn session_exists(&self, session_key: &str) -> bool {
        match timeout(self.config.probe_timeout, self.probe.exists(session_key)).await {
            Ok(Ok(live)) => live,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Session probe failed; treating session as gone");
                false
            }
            Err(_) => {
                tracing::error!("Session probe timed out; treating session as gone");
                false
            }
        }
    }

    fn rejected(&self, stage: &str, error: TokenExchangeError) -> Error {
        match error {
            TokenExchangeError::BadSignature => {
                // No token contents in the log.
                tracing::warn!(stage = stage, "Token exchange rejected - bad signature");
            }
            ref e => {
                tracing::info!(stage = stage, error = %e, "Token exchange rejected");
            }
        }
        error.into()
    }
}
