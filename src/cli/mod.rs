//! CLI command definitions for ssm-config
//!
//! The binary resolves configuration the same way the service does at
//! startup and prints the result, which makes deployments easy to check.

use crate::format::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Inspect stage-layered SSM configuration and key files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config root directory (overrides SSM_CONFIG_DIR)
    #[arg(short, long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Active stage (overrides SSM_ENV)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the effective configuration (default)
    Show(ShowArgs),
    /// List stages defined across all config files
    Stages,
    /// Print the Sirena address
    Addr,
    /// List the key search path in order
    KeyDirs,
    /// Locate a key file on the search path
    Key(KeyArgs),
    /// Check that every key file named by the configuration can be loaded
    CheckKeys,
}

#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Print secrets instead of masking them
    #[arg(long)]
    pub reveal: bool,

    /// Merge files only: skip environment overrides and validation
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Key file name
    pub name: String,

    /// Write the key contents to stdout instead of its path
    #[arg(long)]
    pub dump: bool,
}
