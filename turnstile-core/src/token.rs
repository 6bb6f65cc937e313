//! Token formats and signing
//!
//! Two token kinds share one payload shape: a `refresh` token bound to a
//! server-side session, and the short-lived stateless `access` token minted
//! from it. Both are compact three-segment JWS envelopes signed HS256 with
//! the process-wide shared secret. The exchange endpoint additionally
//! accepts a signed outer envelope whose payload carries the refresh token,
//! acting as a short-lived proof-of-intent nonce under the same secret.
//!
//! Expiry is checked by the token service itself rather than by the JWT
//! library so that expired, malformed, and mis-typed tokens each surface
//! as their own [`TokenExchangeError`](crate::error::TokenExchangeError)
//! variant.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Error,
    error::{TokenExchangeError, ValidationError},
    user::User,
};

/// `type` claim of a session-bound refresh token.
pub const TYPE_REFRESH: &str = "refresh";

/// `type` claim of a stateless access token.
pub const TYPE_ACCESS: &str = "access";

/// Claims shared by refresh and access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Token kind: [`TYPE_REFRESH`] or [`TYPE_ACCESS`].
    #[serde(rename = "type")]
    pub token_type: String,
    pub username: String,
    pub email: String,
    /// Issue time in epoch seconds; copied unchanged into minted access
    /// tokens.
    pub issued_at: i64,
    /// Expiry in epoch seconds.
    pub exp: i64,
    /// The server-side session this token's validity hangs off.
    pub session_key: String,
}

impl TokenClaims {
    /// Build refresh claims for a user and their live session.
    pub fn refresh(user: &User, session_key: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_type: TYPE_REFRESH.to_string(),
            username: user.username.clone(),
            email: user.email.clone(),
            issued_at: now.timestamp(),
            exp: (now + ttl).timestamp(),
            session_key: session_key.to_string(),
        }
    }

    /// Derive access claims: same payload, `access` type, fresh expiry.
    pub fn to_access(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_type: TYPE_ACCESS.to_string(),
            exp: (now + ttl).timestamp(),
            ..self.clone()
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Payload of the outer request envelope accepted by the exchange
/// endpoint: `{refresh_token, iat, exp}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestClaims {
    /// The serialized signed refresh token; absent means a malformed
    /// request rather than a signature problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

impl RequestClaims {
    pub fn new(refresh_token: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            refresh_token: Some(refresh_token.to_string()),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

/// Token signing configuration, immutable after startup.
#[derive(Clone)]
pub struct TokenConfig {
    /// Shared HS256 secret.
    pub secret: Vec<u8>,
    /// Lifetime of issued refresh tokens.
    pub refresh_ttl: Duration,
    /// Lifetime of minted access tokens.
    pub access_ttl: Duration,
    /// Lifetime of the outer request envelope.
    pub request_ttl: Duration,
    /// Per-call deadline for session probe I/O.
    pub probe_timeout: std::time::Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("refresh_ttl", &self.refresh_ttl)
            .field("access_ttl", &self.access_ttl)
            .field("request_ttl", &self.request_ttl)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl TokenConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            refresh_ttl: Duration::days(30),
            access_ttl: Duration::hours(1),
            request_ttl: Duration::seconds(60),
            probe_timeout: std::time::Duration::from_secs(2),
        }
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_request_ttl(mut self, ttl: Duration) -> Self {
        self.request_ttl = ttl;
        self
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced by the caller with its own error taxonomy.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation
    }
}

/// Sign claims into a compact token string.
pub fn sign<T: Serialize>(claims: &T, config: &TokenConfig) -> Result<String, Error> {
    encode(&Header::new(Algorithm::HS256), claims, &config.encoding_key())
        .map_err(|e| ValidationError::InvalidField(format!("Failed to encode token: {e}")).into())
}

/// Verify a token's signature and deserialize its claims.
///
/// Signature and algorithm problems map to `BadSignature`; structural
/// problems (bad segments, undecodable payload) map to `MissingInput`.
pub fn verify<T: DeserializeOwned>(
    token: &str,
    config: &TokenConfig,
) -> Result<T, TokenExchangeError> {
    decode::<T>(token, &config.decoding_key(), &config.validation())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::ImmatureSignature => TokenExchangeError::BadSignature,
            _ => TokenExchangeError::MissingInput,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test_secret_key_for_hs256_tokens_not_for_production_use";

    fn test_user() -> User {
        User {
            id: "usr_1".into(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        }
    }

    #[test]
    fn test_refresh_round_trip() {
        let config = TokenConfig::new(TEST_SECRET);
        let now = Utc::now();
        let claims = TokenClaims::refresh(&test_user(), "sess-A", now, Duration::hours(1));

        let token = sign(&claims, &config).unwrap();
        assert_eq!(token.chars().filter(|&c| c == '.').count(), 2);

        let verified: TokenClaims = verify(&token, &config).unwrap();
        assert_eq!(verified, claims);
        assert_eq!(verified.token_type, TYPE_REFRESH);
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let config = TokenConfig::new(TEST_SECRET);
        let other = TokenConfig::new(b"a_completely_different_secret_key".to_vec());
        let claims = TokenClaims::refresh(&test_user(), "sess-A", Utc::now(), Duration::hours(1));

        let token = sign(&claims, &config).unwrap();
        let result: Result<TokenClaims, _> = verify(&token, &other);

        assert_eq!(result.unwrap_err(), TokenExchangeError::BadSignature);
    }

    #[test]
    fn test_garbage_is_missing_input() {
        let config = TokenConfig::new(TEST_SECRET);
        let result: Result<TokenClaims, _> = verify("not.a.token", &config);

        assert_eq!(result.unwrap_err(), TokenExchangeError::MissingInput);
    }

    #[test]
    fn test_expired_claims_verify_but_report_expired() {
        let config = TokenConfig::new(TEST_SECRET);
        let past = Utc::now() - Duration::hours(2);
        let claims = TokenClaims::refresh(&test_user(), "sess-A", past, Duration::hours(1));

        // Signature validation alone must still pass; expiry is the
        // caller's decision.
        let token = sign(&claims, &config).unwrap();
        let verified: TokenClaims = verify(&token, &config).unwrap();

        assert!(verified.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_to_access_copies_payload() {
        let now = Utc::now();
        let refresh = TokenClaims::refresh(&test_user(), "sess-A", now, Duration::days(30));
        let access = refresh.to_access(now, Duration::hours(1));

        assert_eq!(access.token_type, TYPE_ACCESS);
        assert_eq!(access.username, refresh.username);
        assert_eq!(access.email, refresh.email);
        assert_eq!(access.session_key, refresh.session_key);
        assert_eq!(access.issued_at, refresh.issued_at);
        assert_eq!(access.exp, (now + Duration::hours(1)).timestamp());
    }

    #[test]
    fn test_request_claims_without_refresh_field() {
        let config = TokenConfig::new(TEST_SECRET);
        let claims = RequestClaims {
            refresh_token: None,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + Duration::seconds(60)).timestamp(),
        };

        let token = sign(&claims, &config).unwrap();
        let verified: RequestClaims = verify(&token, &config).unwrap();

        assert!(verified.refresh_token.is_none());
    }

    #[test]
    fn test_wire_format_uses_type_field() {
        let now = Utc::now();
        let claims = TokenClaims::refresh(&test_user(), "sess-A", now, Duration::hours(1));
        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(value["type"], "refresh");
        assert_eq!(value["username"], "alice");
        assert_eq!(value["email"], "alice@example.com");
        assert_eq!(value["session_key"], "sess-A");
        assert_eq!(value["issued_at"], now.timestamp());
        assert_eq!(value["exp"], (now + Duration::hours(1)).timestamp());
    }

    #[test]
    fn test_token_config_debug_redacts_secret() {
        let config = TokenConfig::new(TEST_SECRET);
        let rendered = format!("{config:?}");

        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("test_secret"));
    }
}
