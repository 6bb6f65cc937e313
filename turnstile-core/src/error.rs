use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Token error: {0}")]
    Token(#[from] TokenExchangeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Account temporarily locked")]
    AccountLocked,
}

/// Bounded failure taxonomy for the refresh-token exchange.
///
/// Every way an exchange can be rejected maps to exactly one of these
/// variants; the HTTP adapter turns each into a distinct response. Only
/// `StaleSession` may trigger the side-effectful logout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenExchangeError {
    #[error("Missing or malformed token input")]
    MissingInput,

    #[error("Token signature verification failed")]
    BadSignature,

    #[error("Expired token")]
    Expired,

    #[error("Unexpected token type: {0}")]
    WrongType(String),

    #[error("Session referenced by the token no longer exists")]
    StaleSession,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Record not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl Error {
    /// Whether this error is part of the bounded exchange taxonomy, i.e.
    /// an expected rejection rather than a programming or backend fault.
    pub fn is_exchange_rejection(&self) -> bool {
        matches!(self, Error::Token(_))
    }
}
