//! Durable Cache - an embedded typed key-value cache
//!
//! Values keep their kind (signed, unsigned, float, string or JSON object),
//! entries may carry a TTL, and every mutation can be recorded in an
//! append-only command log that is replayed on startup.

pub mod aof;
pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheStats, TaggedValue, TypeTag};
pub use config::{Config, PersistenceConfig};
pub use context::Context;
pub use error::{CacheError, ErrorKind, Result};
pub use tasks::spawn_cleanup_task;
