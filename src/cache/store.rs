//! Cache Store Module
//!
//! Typed key-value store with TTL expiry, backed by an optional command log.
//!
//! A single reader-writer lock guards both the map and the log, so the order
//! of records in the log always matches the order mutations hit the map.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::aof::{Command, CommandLog};
use crate::cache::entry::{current_timestamp_ms, expiry_from_ttl};
use crate::cache::stats::StatsRecorder;
use crate::cache::value::{classify, ConversionError};
use crate::cache::{CacheEntry, CacheStats, TaggedValue};
use crate::config::PersistenceConfig;
use crate::context::Context;
use crate::error::{CacheError, Result};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    aof: Option<CommandLog>,
}

impl Inner {
    /// Records a mutation that has already been applied to the map.
    ///
    /// When the append rotates the log, every live entry is re-recorded into
    /// the fresh file so it replays to the same map on its own.
    fn persist(&mut self, command: &Command) -> Result<()> {
        let Some(aof) = self.aof.as_mut() else {
            return Ok(());
        };
        let Some(retired) = aof.store(command)? else {
            return Ok(());
        };

        let now = current_timestamp_ms();
        let live = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| Command::set(key.clone(), entry.value.clone(), entry.expire_at));
        let written = aof.store_snapshot(live)?;
        info!(
            retired = %retired.display(),
            entries = written,
            "Re-recorded live entries after log rotation"
        );
        Ok(())
    }

    /// Removes every entry expired at `now`, returning how many were dropped.
    fn sweep(&mut self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    fn apply(&mut self, command: Command, now: u64) {
        match command {
            Command::Set {
                key,
                value,
                expire_at,
            } => {
                self.entries
                    .insert(key, CacheEntry::with_expiry(value, expire_at));
            }
            Command::Delete { key } => {
                self.entries.remove(&key);
            }
            Command::Cleanup => {
                self.sweep(now);
            }
        }
    }
}

// == Cache ==
/// Thread-safe typed cache. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct Cache {
    inner: RwLock<Inner>,
    stats: StatsRecorder,
}

impl Cache {
    // == Constructor ==
    /// Builds a cache, replaying the command log when persistence is enabled.
    ///
    /// Any failure to read the log is returned; callers must not fall back to
    /// an empty cache, since it would not reflect the recorded history.
    pub fn new(config: &PersistenceConfig, ctx: &Context) -> Result<Self> {
        ctx.check()?;

        if !config.enable {
            info!("Command log disabled, cache is memory only");
            return Ok(Self::default());
        }

        let aof = CommandLog::new(config);
        let commands = aof.load_file(ctx)?;
        let replayed = commands.len();

        let mut inner = Inner {
            entries: HashMap::new(),
            aof: None,
        };
        let now = current_timestamp_ms();
        for command in commands {
            inner.apply(command, now);
        }
        inner.aof = Some(aof);

        info!(
            path = %config.path.display(),
            replayed,
            entries = inner.entries.len(),
            "Cache restored from command log"
        );

        Ok(Self {
            inner: RwLock::new(inner),
            stats: StatsRecorder::new(),
        })
    }

    /// A cache without persistence.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn is_persistent(&self) -> bool {
        self.inner.read().aof.is_some()
    }

    // == Set ==
    /// Stores any serializable value under `key`.
    ///
    /// Integers, floats and strings keep their kind; structured values are
    /// stored as JSON objects; sequences, byte slices and optionals are
    /// rejected with `PointerNotAllowed`. A zero `ttl` never expires. An
    /// existing entry is replaced along with its TTL.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        ctx.check()?;
        validate_key(key)?;
        let value = classify(value)?;
        self.store(key, value, ttl)
    }

    /// Stores an already tagged value under `key`.
    pub fn set_value(
        &self,
        ctx: &Context,
        key: &str,
        value: TaggedValue,
        ttl: Duration,
    ) -> Result<()> {
        ctx.check()?;
        validate_key(key)?;
        self.store(key, value, ttl)
    }

    fn store(&self, key: &str, value: TaggedValue, ttl: Duration) -> Result<()> {
        let mut inner = self.inner.write();
        let expire_at = expiry_from_ttl(ttl, current_timestamp_ms());
        let command = Command::set(key, value.clone(), expire_at);
        inner
            .entries
            .insert(key.to_string(), CacheEntry::with_expiry(value, expire_at));
        inner.persist(&command)
    }

    // == Get ==
    /// Retrieves the stored value as-is.
    ///
    /// An expired entry is removed on discovery and reported as `NotFound`.
    pub fn get(&self, ctx: &Context, key: &str) -> Result<TaggedValue> {
        ctx.check()?;

        {
            let inner = self.inner.read();
            match inner.entries.get(key) {
                None => {
                    self.stats.record_miss();
                    return Err(CacheError::NotFound(key.to_string()));
                }
                Some(entry) if !entry.is_expired_at(current_timestamp_ms()) => {
                    self.stats.record_hit();
                    return Ok(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        // Expired under the read lock; re-check under the write lock since a
        // writer may have replaced the entry in between.
        let mut inner = self.inner.write();
        if let Some(entry) = inner.entries.get(key) {
            if !entry.is_expired_at(current_timestamp_ms()) {
                self.stats.record_hit();
                return Ok(entry.value.clone());
            }
            inner.entries.remove(key);
            self.stats.record_expiration();
            debug!(key, "Lazily expired entry");
        }
        self.stats.record_miss();
        Err(CacheError::NotFound(key.to_string()))
    }

    // == Typed Getters ==
    pub fn get_int(&self, ctx: &Context, key: &str) -> Result<i64> {
        let value = self.get(ctx, key)?;
        convert(key, &value, "i64", value.to_i64())
    }

    pub fn get_uint(&self, ctx: &Context, key: &str) -> Result<u64> {
        let value = self.get(ctx, key)?;
        convert(key, &value, "u64", value.to_u64())
    }

    pub fn get_float(&self, ctx: &Context, key: &str) -> Result<f64> {
        let value = self.get(ctx, key)?;
        convert(key, &value, "f64", value.to_f64())
    }

    /// Only an object payload holding exactly `true` or `false` matches.
    pub fn get_bool(&self, ctx: &Context, key: &str) -> Result<bool> {
        let value = self.get(ctx, key)?;
        value
            .as_bool()
            .ok_or_else(|| CacheError::type_mismatch(key, "bool", value.type_tag()))
    }

    /// Only a string value matches; numbers are not rendered.
    pub fn get_string(&self, ctx: &Context, key: &str) -> Result<String> {
        match self.get(ctx, key)? {
            TaggedValue::Str(s) => Ok(s),
            other => Err(CacheError::type_mismatch(key, "string", other.type_tag())),
        }
    }

    /// Decodes an object payload into `T`.
    pub fn get_object<T: DeserializeOwned>(&self, ctx: &Context, key: &str) -> Result<T> {
        match self.get(ctx, key)? {
            TaggedValue::Obj(bytes) => Ok(serde_json::from_slice(&bytes)?),
            other => Err(CacheError::type_mismatch(key, "object", other.type_tag())),
        }
    }

    // == Increment ==
    /// Adds one to a signed counter, creating it at 1 if absent.
    ///
    /// The entry keeps its expiry. Overflow leaves the stored value untouched.
    pub fn incr(&self, ctx: &Context, key: &str) -> Result<i64> {
        self.increment(ctx, key, TaggedValue::Int, |current| match current {
            None => Ok(1),
            Some(TaggedValue::Int(n)) => n
                .checked_add(1)
                .ok_or_else(|| CacheError::out_of_range(key, "i64")),
            Some(other) => Err(CacheError::type_mismatch(key, "int", other.type_tag())),
        })
    }

    /// Adds one to an unsigned counter, creating it at 1 if absent.
    pub fn incr_uint(&self, ctx: &Context, key: &str) -> Result<u64> {
        self.increment(ctx, key, TaggedValue::Uint, |current| match current {
            None => Ok(1),
            Some(TaggedValue::Uint(n)) => n
                .checked_add(1)
                .ok_or_else(|| CacheError::out_of_range(key, "u64")),
            Some(other) => Err(CacheError::type_mismatch(key, "uint", other.type_tag())),
        })
    }

    fn increment<N: Copy>(
        &self,
        ctx: &Context,
        key: &str,
        wrap: fn(N) -> TaggedValue,
        bump: impl FnOnce(Option<&TaggedValue>) -> Result<N>,
    ) -> Result<N> {
        ctx.check()?;
        validate_key(key)?;

        let mut inner = self.inner.write();
        let now = current_timestamp_ms();
        let current = inner
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now));
        let expire_at = current.and_then(|entry| entry.expire_at);
        let next = bump(current.map(|entry| &entry.value))?;

        let value = wrap(next);
        let command = Command::set(key, value.clone(), expire_at);
        inner
            .entries
            .insert(key.to_string(), CacheEntry::with_expiry(value, expire_at));
        inner.persist(&command)?;
        Ok(next)
    }

    // == Delete ==
    /// Removes `key`. Deleting an absent key is not an error.
    pub fn delete(&self, ctx: &Context, key: &str) -> Result<()> {
        ctx.check()?;

        let mut inner = self.inner.write();
        inner.entries.remove(key);
        inner.persist(&Command::delete(key))
    }

    // == Cleanup ==
    /// Removes every expired entry in one pass under the exclusive lock.
    ///
    /// Blocks all other operations for a full scan; schedule it for quiet
    /// periods. A failure to record the sweep is logged, not returned.
    pub fn cleanup(&self, ctx: &Context) -> Result<usize> {
        ctx.check()?;

        let mut inner = self.inner.write();
        let removed = inner.sweep(current_timestamp_ms());
        if let Err(e) = inner.persist(&Command::Cleanup) {
            error!(error = %e, "Failed to record cleanup in command log");
        }
        debug!(removed, remaining = inner.entries.len(), "Cleanup sweep finished");
        Ok(removed)
    }

    // == Clean All ==
    /// Drops every entry.
    ///
    /// Not recorded in the command log: after a restart the previously
    /// recorded entries are replayed again.
    pub fn clean_all(&self, ctx: &Context) -> Result<()> {
        ctx.check()?;

        let mut inner = self.inner.write();
        let dropped = inner.entries.len();
        inner.entries.clear();
        info!(dropped, "Cleared all cache entries");
        Ok(())
    }

    // == Close ==
    /// Flushes and releases the command log file.
    pub fn close(&self) -> Result<()> {
        match self.inner.write().aof.as_mut() {
            Some(aof) => aof.close(),
            None => Ok(()),
        }
    }

    // == Introspection ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    /// Number of entries in the map, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Copy of the whole map.
    pub fn snapshot(&self) -> HashMap<String, CacheEntry> {
        self.inner.read().entries.clone()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(CacheError::EmptyKey);
    }
    Ok(())
}

fn convert<N>(
    key: &str,
    value: &TaggedValue,
    target: &'static str,
    result: std::result::Result<N, ConversionError>,
) -> Result<N> {
    result.map_err(|e| match e {
        ConversionError::Mismatch => CacheError::type_mismatch(key, target, value.type_tag()),
        ConversionError::OutOfRange => CacheError::out_of_range(key, target),
    })
}
