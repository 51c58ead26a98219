//! Configuration loading for stator stores.
//!
//! Layers defaults, a TOML file and `STATOR_*` environment variables into a
//! validated `stator_core::StoreConfig`. The core crate never reads files;
//! callers load here and hand the result to `Store::builder`.
//!
//! ```toml
//! mode = "deterministic"          # or "concurrent"
//! overflow = "buffer-unbounded"   # "conflate" | "suspend-publisher"
//! subscriber-capacity = 16
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use thiserror::Error;
use tracing::debug;

use stator_core::{StoreConfig, StoreError};

/// Environment variable prefix: `STATOR_MODE`, `STATOR_OVERFLOW`,
/// `STATOR_SUBSCRIBER_CAPACITY`.
pub const ENV_PREFIX: &str = "STATOR_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {reason}")]
    Validation { reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<StoreError> for ConfigError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Config { message } => Self::Validation { reason: message },
            other => Self::Validation {
                reason: other.to_string(),
            },
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Canonical config file location (`<config dir>/stator/config.toml`).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "stator", "stator").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("stator");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The provider stack: defaults, then the TOML file, then environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(StoreConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).map(|key| key.as_str().replace('_', "-").into()))
}

/// Load and validate a `StoreConfig`.
///
/// `path` overrides the canonical location. A missing file is not an error;
/// defaults and environment still apply.
pub fn load(path: Option<&Path>) -> Result<StoreConfig, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    debug!(path = %path.display(), "loading store config");

    let config: StoreConfig = figment(&path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, falling back to defaults on any error.
pub fn load_or_default(path: Option<&Path>) -> StoreConfig {
    load(path).unwrap_or_else(|e| {
        debug!(error = %e, "using default store config");
        StoreConfig::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it, creating parent directories.
pub fn save(cfg: &StoreConfig, path: &Path) -> Result<(), ConfigError> {
    cfg.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
