//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;

use crate::cache::Cache;
use crate::context::Context;
use crate::error::Result;
use crate::models::{
    CleanupResponse, DeleteResponse, FlushResponse, GetResponse, HealthResponse, IncrQuery,
    IncrResponse, SetRequest, SetResponse, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The cache does its own locking, so it is shared through a plain `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<Cache>,
}

impl AppState {
    /// Creates a new AppState with the given cache.
    pub fn new(cache: Cache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Creates a new AppState around an already shared cache.
    pub fn from_shared(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

/// Runs a cache call on the blocking pool.
///
/// Mutations append to the command log and may rotate and archive it under
/// the exclusive lock, so they stay off the async workers.
async fn blocking<T, F>(cache: &Arc<Cache>, op: F) -> Result<T>
where
    F: FnOnce(&Cache) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let cache = Arc::clone(cache);
    tokio::task::spawn_blocking(move || op(&cache)).await?
}

/// Stores a JSON value, keeping integers signed whenever they fit in `i64`.
fn store_json(cache: &Cache, ctx: &Context, key: &str, value: &Value, ttl: Duration) -> Result<()> {
    match value {
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => cache.set(ctx, key, &i, ttl),
            (None, Some(u)) => cache.set(ctx, key, &u, ttl),
            _ => cache.set(ctx, key, n, ttl),
        },
        other => cache.set(ctx, key, other, ttl),
    }
}

/// Handler for PUT /set
///
/// Stores a key-value pair in the cache with optional TTL.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    let key = req.key.clone();
    blocking(&state.cache, move |cache| {
        store_json(cache, &Context::background(), &req.key, &req.value, req.ttl())
    })
    .await?;

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    let lookup = key.clone();
    let value = blocking(&state.cache, move |cache| {
        cache.get(&Context::background(), &lookup)
    })
    .await?;

    Ok(Json(GetResponse::new(key, &value)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache. Deleting a missing key succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let target = key.clone();
    blocking(&state.cache, move |cache| {
        cache.delete(&Context::background(), &target)
    })
    .await?;

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for POST /incr/:key
///
/// Increments a counter, creating it at 1. `?unsigned=true` targets an
/// unsigned counter.
pub async fn incr_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<IncrQuery>,
) -> Result<Json<IncrResponse>> {
    let counter = key.clone();
    let value: Value = blocking(&state.cache, move |cache| {
        let ctx = Context::background();
        if query.unsigned {
            cache.incr_uint(&ctx, &counter).map(Value::from)
        } else {
            cache.incr(&ctx, &counter).map(Value::from)
        }
    })
    .await?;

    Ok(Json(IncrResponse::new(key, value)))
}

/// Handler for POST /cleanup
///
/// Sweeps expired entries. Blocks every other cache call while it runs.
pub async fn cleanup_handler(State(state): State<AppState>) -> Result<Json<CleanupResponse>> {
    let removed = blocking(&state.cache, |cache| cache.cleanup(&Context::background())).await?;

    Ok(Json(CleanupResponse { removed }))
}

/// Handler for POST /flush
///
/// Drops every entry from memory. Not recorded in the command log.
pub async fn flush_handler(State(state): State<AppState>) -> Result<Json<FlushResponse>> {
    blocking(&state.cache, |cache| cache.clean_all(&Context::background())).await?;

    Ok(Json(FlushResponse::new()))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats();

    Json(StatsResponse::new(&stats, state.cache.is_persistent()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TaggedValue;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn set_request(key: &str, value: Value) -> SetRequest {
        SetRequest {
            key: key.to_string(),
            value,
            ttl: None,
        }
    }

    #[tokio::test]
    async fn test_set_and_get_handler() {
        let state = AppState::new(Cache::in_memory());

        let req = set_request("test_key", json!("test_value"));
        let result = set_handler(State(state.clone()), Json(req)).await;
        assert!(result.is_ok());

        let response = get_handler(State(state.clone()), Path("test_key".to_string()))
            .await
            .unwrap();
        assert_eq!(response.value, json!("test_value"));
        assert_eq!(response.kind, "string");
    }

    #[tokio::test]
    async fn test_json_numbers_keep_kind() {
        let state = AppState::new(Cache::in_memory());

        for (key, value) in [
            ("small", json!(5)),
            ("huge", json!(u64::MAX)),
            ("ratio", json!(0.25)),
        ] {
            set_handler(State(state.clone()), Json(set_request(key, value)))
                .await
                .unwrap();
        }

        let ctx = Context::background();
        assert_eq!(state.cache.get(&ctx, "small").unwrap(), TaggedValue::Int(5));
        assert_eq!(
            state.cache.get(&ctx, "huge").unwrap(),
            TaggedValue::Uint(u64::MAX)
        );
        assert_eq!(
            state.cache.get(&ctx, "ratio").unwrap(),
            TaggedValue::Float(0.25)
        );
    }

    #[tokio::test]
    async fn test_set_array_rejected() {
        let state = AppState::new(Cache::in_memory());

        let err = set_handler(State(state), Json(set_request("list", json!([1, 2]))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PointerNotAllowed);
    }

    #[tokio::test]
    async fn test_get_nonexistent_key() {
        let state = AppState::new(Cache::in_memory());

        let result = get_handler(State(state), Path("nonexistent".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_delete_handler() {
        let state = AppState::new(Cache::in_memory());

        set_handler(
            State(state.clone()),
            Json(set_request("to_delete", json!("value"))),
        )
        .await
        .unwrap();

        let result = delete_handler(State(state.clone()), Path("to_delete".to_string())).await;
        assert!(result.is_ok());

        let result = get_handler(State(state), Path("to_delete".to_string())).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_incr_handler() {
        let state = AppState::new(Cache::in_memory());

        let first = incr_handler(
            State(state.clone()),
            Path("hits".to_string()),
            Query(IncrQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(first.value, json!(1));

        let unsigned = incr_handler(
            State(state.clone()),
            Path("uhits".to_string()),
            Query(IncrQuery { unsigned: true }),
        )
        .await
        .unwrap();
        assert_eq!(unsigned.value, json!(1));

        let err = incr_handler(
            State(state),
            Path("hits".to_string()),
            Query(IncrQuery { unsigned: true }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[tokio::test]
    async fn test_flush_and_stats_handlers() {
        let state = AppState::new(Cache::in_memory());
        set_handler(State(state.clone()), Json(set_request("a", json!(1))))
            .await
            .unwrap();

        flush_handler(State(state.clone())).await.unwrap();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.total_entries, 0);
        assert!(!response.persistent);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_set_empty_key() {
        let state = AppState::new(Cache::in_memory());

        let err = set_handler(State(state), Json(set_request("", json!("value"))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyKey);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_incr_on_persistent_cache() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let config = crate::config::PersistenceConfig::at(dir.path().join("cache.aof"));
        let state = AppState::new(Cache::new(&config, &Context::background()).unwrap());

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..32 {
            let state = state.clone();
            tasks.spawn(async move {
                incr_handler(
                    State(state),
                    Path("hits".to_string()),
                    Query(IncrQuery::default()),
                )
                .await
                .map(|resp| resp.value.clone())
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        state.cache.close().unwrap();
        let reopened = Cache::new(&config, &Context::background()).unwrap();
        assert_eq!(reopened.get_int(&Context::background(), "hits").unwrap(), 32);
    }
}
