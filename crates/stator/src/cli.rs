//! Clap derive structures for the `stator` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use stator_core::OverflowPolicy;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// stator -- exercise a single-writer state store from the command line
#[derive(Debug, Parser)]
#[command(
    name = "stator",
    version,
    about = "Drive a single-writer state store and report what subscribers saw",
    long_about = "Builds a counter store, hammers it with concurrent producers and\n\
        reports, per subscriber, how many snapshots arrived and whether they\n\
        arrived in commit order.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "STATOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default)
    Table,
    /// Pretty-printed JSON
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run producers and subscribers against a counter store
    Run(RunArgs),

    /// Inspect the effective store configuration
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Concurrent producer tasks
    #[arg(long, short = 'p', default_value_t = 4)]
    pub producers: usize,

    /// `set` calls issued by each producer (every third is a no-op)
    #[arg(long, short = 'n', default_value_t = 30)]
    pub sets: usize,

    /// Subscribers attached before the first producer starts
    #[arg(long, short = 's', default_value_t = 2)]
    pub subscribers: usize,

    /// Per-snapshot delay for the first subscriber, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub slow_ms: u64,

    /// Overflow policy (overrides config)
    #[arg(long, value_parser = parse_overflow)]
    pub overflow: Option<OverflowPolicy>,

    /// Run every job inline on the calling task
    #[arg(long)]
    pub deterministic: bool,
}

fn parse_overflow(raw: &str) -> Result<OverflowPolicy, String> {
    raw.parse::<OverflowPolicy>().map_err(|_| {
        format!("unknown policy '{raw}' (expected conflate, buffer-unbounded, suspend-publisher)")
    })
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration (default)
    Show,

    /// Print the config file location
    Path,

    /// Write the default configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
