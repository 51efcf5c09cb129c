//! API Module
//!
//! HTTP handlers and routing that expose the cache over a small REST API.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
