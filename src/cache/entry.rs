//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use crate::cache::TaggedValue;

// == Cache Entry ==
/// Represents a single cache entry with value and absolute expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The stored value
    pub value: TaggedValue,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expire_at: Option<u64>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry with an already absolute expiry.
    pub fn with_expiry(value: TaggedValue, expire_at: Option<u64>) -> Self {
        Self { value, expire_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now` (Unix milliseconds).
    ///
    /// An entry is expired once `now` reaches its expiration time.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match self.expire_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Absolute expiry for `ttl` counted from `now`; sub-millisecond TTLs round up.
pub fn expiry_from_ttl(ttl: Duration, now: u64) -> Option<u64> {
    if ttl.is_zero() {
        return None;
    }
    let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
    Some(now.saturating_add(millis))
}
