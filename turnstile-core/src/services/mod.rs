//! Service layer for business logic
//!
//! This module contains concrete service implementations that encapsulate
//! login throttling, token exchange, and lock administration.

pub mod admin;
pub mod auth;
pub mod token;

pub use admin::LockAdminService;
pub use auth::{AccountLockConfig, AuthOutcome, AuthService, LimitKind};
pub use token::TokenService;
