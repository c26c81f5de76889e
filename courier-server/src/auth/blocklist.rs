//! In-memory token blocklist
//!
//! Revoked `jti`s are kept until the token would have expired anyway.

use chrono::Utc;
use dashmap::DashMap;

/// Revoked token identifiers with their expiry timestamp
#[derive(Default)]
pub struct TokenBlocklist {
    /// jti -> exp (unix seconds)
    entries: DashMap<String, i64>,
}

impl TokenBlocklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke a token until `exp`
    pub fn revoke(&self, jti: impl Into<String>, exp: i64) {
        self.entries.insert(jti.into(), exp);
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.entries.contains_key(jti)
    }

    /// Drop entries whose token has expired, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now().timestamp();
        let before = self.entries.len();
        self.entries.retain(|_, exp| *exp > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for TokenBlocklist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBlocklist")
            .field("entries", &self.entries.len())
            .finish()
    }
}
