//! Environment-level configuration
//!
//! The embedding application configures this crate entirely through
//! environment variables (a `.env` file is honored). Unparseable values
//! fall back to their defaults with a warning rather than failing startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::batch::BatchConfig;
use crate::cache::CacheConfig;

/// Full configuration: cache settings plus batch-pipeline settings
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub cache: CacheConfig,
    pub batch: BatchConfig,
}

impl Config {
    /// Load from the environment.
    ///
    /// Recognized variables:
    /// - `PRERENDER_DIR`: cache root (default `/tmp/prerender`)
    /// - `USE_DISK_CACHE`: enable switch (default `true`)
    /// - `VERBOSE_CACHE`: per-event info logging, `0`/`1` (default `0`)
    /// - `PRERENDER_WORKERS`: batch worker count (default `1`)
    /// - `PRERENDER_FORCE`: batch force flag (default `false`)
    /// - `PRERENDER_MEDIA_TYPES`: comma-separated media list (default empty)
    /// - `ENGINE_TIMEOUT_SECS`: extraction/transformation bound (default `30`)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let cache = CacheConfig {
            root: std::env::var("PRERENDER_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/prerender")),
            enabled: env_bool("USE_DISK_CACHE", true),
            verbose: env_bool("VERBOSE_CACHE", false),
            ..CacheConfig::default()
        };

        let batch = BatchConfig {
            workers: env_parse("PRERENDER_WORKERS", 1),
            force: env_bool("PRERENDER_FORCE", false),
            media_types: std::env::var("PRERENDER_MEDIA_TYPES")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            engine_timeout: Duration::from_secs(env_parse("ENGINE_TIMEOUT_SECS", 30)),
        };

        Config { cache, batch }
    }
}

/// Boolean environment switch: accepts `true`/`false` (any case) and `0`/`1`
fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                tracing::warn!(
                    variable = name,
                    value = other,
                    default,
                    "unrecognized boolean, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn env_parse<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(
                variable = name,
                value = raw.as_str(),
                %default,
                "unparseable value, using default"
            );
            default
        }),
        Err(_) => default,
    }
}
