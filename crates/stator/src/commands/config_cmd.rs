//! Config subcommand handlers.

use tabled::Tabled;

use stator_core::StoreConfig;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn config_rows(cfg: &StoreConfig) -> Vec<ConfigRow> {
    vec![
        ConfigRow {
            key: "mode",
            value: cfg.mode.to_string(),
        },
        ConfigRow {
            key: "overflow",
            value: cfg.overflow.to_string(),
        },
        ConfigRow {
            key: "subscriber-capacity",
            value: cfg.subscriber_capacity.to_string(),
        },
    ]
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(stator_config::config_path);

    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => {
            let cfg = super::load_config(global)?;
            let out = output::render(global.output, &cfg, &config_rows(&cfg))?;
            output::print_output(&out);
        }

        ConfigCommand::Path => output::print_output(&path.display().to_string()),

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            stator_config::save(&StoreConfig::default(), &path)?;
            eprintln!("Wrote default config to {}", path.display());
        }
    }
    Ok(())
}
