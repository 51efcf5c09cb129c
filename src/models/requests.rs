//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::time::Duration;

use serde::Deserialize;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value; numbers keep their numeric kind, strings stay
///   strings, objects and booleans are stored as objects, arrays are rejected
/// - `ttl`: Optional TTL in seconds (never expires if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: serde_json::Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// TTL as a duration; zero means the entry never expires.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl.unwrap_or(0))
    }
}

/// Query string for POST /incr/:key
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncrQuery {
    /// Increment an unsigned counter instead of a signed one
    #[serde(default)]
    pub unsigned: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_request_deserialize() {
        let json = r#"{"key": "test", "value": "hello"}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.key, "test");
        assert_eq!(req.value, serde_json::json!("hello"));
        assert!(req.ttl.is_none());
        assert_eq!(req.ttl(), Duration::ZERO);
    }

    #[test]
    fn test_set_request_with_ttl_and_object() {
        let json = r#"{"key": "test", "value": {"a": [1, 2]}, "ttl": 60}"#;
        let req: SetRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.ttl(), Duration::from_secs(60));
        assert!(req.value.is_object());
    }

    #[test]
    fn test_incr_query_defaults_to_signed() {
        let query: IncrQuery = serde_json::from_str("{}").unwrap();
        assert!(!query.unsigned);
    }
}
