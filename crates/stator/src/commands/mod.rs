//! Subcommand handlers.

pub mod config_cmd;
pub mod run;

use stator_core::StoreConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the effective config from `--config`, the default path and env.
pub fn load_config(global: &GlobalOpts) -> Result<StoreConfig, CliError> {
    Ok(stator_config::load(global.config.as_deref())?)
}
