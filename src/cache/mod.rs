//! Cache Module
//!
//! Provides the typed in-memory store with TTL expiration and command log replay.

mod entry;
mod stats;
mod store;
mod value;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry};
pub use stats::CacheStats;
pub use store::Cache;
pub use value::{classify, ConversionError, TaggedValue, TypeTag};
