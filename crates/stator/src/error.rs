//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use stator_config::ConfigError;
use stator_core::StoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const STORE: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(stator::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(
        code(stator::config),
        help("Check the config file and STATOR_* environment variables.\nRun: stator config path")
    )]
    Config(#[from] ConfigError),

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(stator::config_exists), help("Pass --force to overwrite it."))]
    ConfigExists { path: String },

    // ── Store ────────────────────────────────────────────────────────
    #[error("Store error: {0}")]
    #[diagnostic(code(stator::store))]
    Store(#[from] StoreError),

    #[error("Task failed: {0}")]
    #[diagnostic(code(stator::task))]
    Task(#[from] tokio::task::JoinError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(stator::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => exit_code::USAGE,
            Self::Config(_)
            | Self::ConfigExists { .. }
            | Self::Store(StoreError::Config { .. }) => exit_code::CONFIG,
            Self::Store(_) | Self::Task(_) => exit_code::STORE,
            _ => exit_code::GENERAL,
        }
    }
}
