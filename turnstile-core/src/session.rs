//! Session liveness probe
//!
//! The session store belongs to the surrounding platform; the core only
//! ever asks whether a session key still exists. Implementations are wired
//! in at construction time.

use async_trait::async_trait;

use crate::Error;

/// Read-only lookup into the external session store.
///
/// `exists` must be a pure read: no session creation, no expiry touch.
/// Callers treat errors and timeouts as `false` so a session-store outage
/// cannot resurrect orphaned tokens.
#[async_trait]
pub trait SessionProbe: Send + Sync + 'static {
    async fn exists(&self, session_key: &str) -> Result<bool, Error>;
}
