//! # Router Configuration
//!
//! [`RouterConfig`] is read from environment variables or a YAML file at
//! startup. Every field has a default, so an empty file or an empty
//! environment yields a working router.
//!
//! ## Environment Variables
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `SWITCHYARD_TRAILING_SLASH` | `trailing_slash` (`match` / `ignore`) | `match` |
//! | `SWITCHYARD_CONTEXT_POOL_CAPACITY` | `context_pool_capacity` | `1024` |
//! | `SWITCHYARD_MAX_MULTIPART_BYTES` | `max_multipart_bytes` (decimal or `0x` hex) | 32 MiB |
//! | `SWITCHYARD_NOT_FOUND_BODY` | `not_found_body` | `404 page not found` |
//!
//! Unparseable values fall back to the default and are logged.
//!
//! ## YAML
//!
//! ```yaml
//! trailing_slash: ignore
//! context_pool_capacity: 256
//! ```

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use tracing::warn;

pub const DEFAULT_POOL_CAPACITY: usize = 1024;
pub const DEFAULT_MAX_MULTIPART_BYTES: usize = 32 << 20;
pub const DEFAULT_NOT_FOUND_BODY: &str = "404 page not found";

/// What to do when a path misses only by a trailing slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingSlash {
    /// Serve the route registered for the other variant.
    #[default]
    Match,
    /// Treat it as a miss.
    Ignore,
}

impl TrailingSlash {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "match" => Some(Self::Match),
            "ignore" => Some(Self::Ignore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub trailing_slash: TrailingSlash,
    /// Idle contexts kept for reuse.
    pub context_pool_capacity: usize,
    /// Largest multipart body the binder will parse.
    pub max_multipart_bytes: usize,
    /// Plain-text body of the default not-found handler.
    pub not_found_body: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            trailing_slash: TrailingSlash::Match,
            context_pool_capacity: DEFAULT_POOL_CAPACITY,
            max_multipart_bytes: DEFAULT_MAX_MULTIPART_BYTES,
            not_found_body: DEFAULT_NOT_FOUND_BODY.to_string(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from `SWITCHYARD_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let trailing_slash = match env::var("SWITCHYARD_TRAILING_SLASH") {
            Ok(val) => TrailingSlash::parse(&val).unwrap_or_else(|| {
                warn!(value = %val, "invalid SWITCHYARD_TRAILING_SLASH, using 'match'");
                defaults.trailing_slash
            }),
            Err(_) => defaults.trailing_slash,
        };
        Self {
            trailing_slash,
            context_pool_capacity: size_var(
                "SWITCHYARD_CONTEXT_POOL_CAPACITY",
                defaults.context_pool_capacity,
            ),
            max_multipart_bytes: size_var(
                "SWITCHYARD_MAX_MULTIPART_BYTES",
                defaults.max_multipart_bytes,
            ),
            not_found_body: env::var("SWITCHYARD_NOT_FOUND_BODY")
                .unwrap_or(defaults.not_found_body),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse router configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read router configuration from {}", path.display()))?;
        Self::from_yaml_str(&raw)
            .with_context(|| format!("invalid router configuration in {}", path.display()))
    }
}

/// Decimal or `0x`-prefixed hexadecimal size.
fn parse_size(value: &str) -> Option<usize> {
    let value = value.trim();
    match value.strip_prefix("0x") {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn size_var(name: &str, default: usize) -> usize {
    match env::var(name) {
        Ok(val) => parse_size(&val).unwrap_or_else(|| {
            warn!(variable = name, value = %val, default, "invalid size, using default");
            default
        }),
        Err(_) => default,
    }
}
