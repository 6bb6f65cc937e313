//! Users as seen by the authentication gate
//!
//! Turnstile does not own a user store. The platform's user directory is an
//! external collaborator reached through the [`UserDirectory`] capability;
//! the core only reads the fields it needs to throttle logins and mint
//! tokens.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A unique, stable identifier for a specific user
///
/// This value should be treated as opaque; it is whatever the external user
/// directory uses as its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The subset of a directory user the gate works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The unique identifier for the user.
    pub id: UserId,

    /// The login name, unique within the directory.
    pub username: String,

    /// The email address carried into issued tokens.
    pub email: String,
}

/// Credentials presented by a login request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Usernames are compared case-insensitively throughout the gate.
    pub fn normalized_username(&self) -> String {
        self.username.trim().to_lowercase()
    }
}

/// Read-only capability onto the platform's user directory.
///
/// Split into lookup and verification so the account-lock check can run
/// between the two, before any password work happens.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Find a user by their normalized (lowercased) username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, Error>;

    /// Verify a password for a previously looked-up user.
    async fn verify_password(&self, user: &User, password: &str) -> Result<bool, Error>;
}
