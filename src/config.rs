//! Configuration Module
//!
//! Handles loading and managing server and persistence configuration from
//! environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

/// Command log settings consumed by [`crate::cache::Cache::new`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Whether mutations are recorded and replayed on startup
    pub enable: bool,
    /// Active log file path; parent directories are created on first write
    pub path: PathBuf,
    /// Rotation threshold in megabytes, 0 disables rotation
    pub max_size: u64,
    /// Archive rotated files into `.tar.gz`
    pub compress: bool,
}

impl PersistenceConfig {
    /// Persistence turned on at `path` with rotation disabled.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            enable: true,
            path: path.into(),
            max_size: 0,
            compress: false,
        }
    }

    /// Rotation threshold in bytes, 0 when rotation is disabled.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size.saturating_mul(1024 * 1024)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enable: false,
            path: PathBuf::from("data/cache.aof"),
            max_size: 64,
            compress: false,
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds, 0 disables the task
    pub cleanup_interval: u64,
    /// Command log settings
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 60)
    /// - `AOF_ENABLE` - Record and replay mutations (default: false)
    /// - `AOF_PATH` - Active log file (default: data/cache.aof)
    /// - `AOF_MAX_SIZE` - Rotation threshold in MB, 0 = never (default: 64)
    /// - `AOF_COMPRESS` - Archive rotated files (default: false)
    pub fn from_env() -> Self {
        let defaults = PersistenceConfig::default();
        Self {
            server_port: env_or("SERVER_PORT", 3000),
            cleanup_interval: env_or("CLEANUP_INTERVAL", 60),
            persistence: PersistenceConfig {
                enable: env_flag("AOF_ENABLE", defaults.enable),
                path: env::var("AOF_PATH")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or(defaults.path),
                max_size: env_or("AOF_MAX_SIZE", defaults.max_size),
                compress: env_flag("AOF_COMPRESS", defaults.compress),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cleanup_interval: 60,
            persistence: PersistenceConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => default,
    }
}
