//! Core functionality for the turnstile project
//!
//! Turnstile throttles interactive logins and exchanges session-bound
//! refresh tokens for short-lived access tokens. This crate holds the
//! domain types and the service layer; storage backends and the HTTP
//! surface live in sibling crates.
//!
//! The moving parts:
//!
//! - [`client::ClientId`] - stable per-request client identity
//! - [`counter::CounterStore`] - fixed-window failure counters
//! - [`policy::RateLimitPolicy`] - allow/limit decisions over the counters
//! - [`repositories`] - durable audit records for tripped addresses and
//!   cooled-down accounts
//! - [`services::AuthService`] - the login flow
//! - [`services::TokenService`] - refresh issuance and the access exchange
//! - [`services::LockAdminService`] - operator inspection and reset

pub mod client;
pub mod counter;
pub mod error;
pub mod helpers;
pub mod policy;
pub mod repositories;
pub mod services;
pub mod session;
pub mod token;
pub mod user;

pub use client::ClientId;
pub use counter::{CounterKey, CounterStore, KeyScope, MemoryCounterStore};
pub use error::{Error, TokenExchangeError};
pub use policy::{Decision, RateLimitConfig, RateLimitPolicy};
pub use repositories::{
    AccountLockRecord, AccountLockRepository, IpLockFilter, IpLockRecord, IpLockRepository, Page,
    RepositoryProvider,
};
pub use services::{AccountLockConfig, AuthOutcome, AuthService, LimitKind, LockAdminService, TokenService};
pub use session::SessionProbe;
pub use token::{TokenClaims, TokenConfig};
pub use user::{Credentials, User, UserDirectory, UserId};
