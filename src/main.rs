//! ssm-config
//!
//! Resolves the stage-layered configuration exactly as the service does at
//! startup and reports the result, the key search path, and key lookups.

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use ssm_config::cli::{Cli, Command, KeyArgs, ShowArgs};
use ssm_config::config::{self, Config, ConfigLoader, ConfigSource};
use ssm_config::error::{ConfigResult, ErrorReport};
use ssm_config::format::{OutputFormat, render};
use ssm_config::keys::{self, KeyResolver};
use ssm_config::logging::{self, LogTarget};
use ssm_config::paths::{KeyDirectoryList, KeySearchInputs};
use std::borrow::Cow;
use std::io::Write;
use std::process::ExitCode;
use tracing::{debug, warn};

#[derive(Serialize)]
struct KeyDirRow {
    path: String,
    source: String,
}

#[derive(Serialize)]
struct KeyRow {
    name: String,
    path: String,
    source: String,
    bytes: usize,
}

fn print_error<'a, E>(err: &'a E, format: OutputFormat)
where
    E: std::fmt::Display,
    ErrorReport: From<&'a E>,
{
    match format {
        OutputFormat::Json => {
            let report = ErrorReport::from(err);
            let body = serde_json::to_string(&report).unwrap_or_else(|_| err.to_string());
            eprintln!("{}", body);
        }
        OutputFormat::Yaml => eprintln!("error: {}", err),
    }
}

/// Key resolver for commands that can work without a valid configuration.
fn key_resolver(global: &ConfigResult<&'static Config>) -> Cow<'static, KeyResolver> {
    if let Err(err) = global {
        warn!(error = %err, "Configuration unavailable, searching keys without config hint");
        let inputs = KeySearchInputs::discover(None);
        return Cow::Owned(KeyResolver::new(KeyDirectoryList::build(&inputs)));
    }
    Cow::Borrowed(keys::resolver())
}

fn run_show(
    source: &ConfigSource,
    global: &ConfigResult<&'static Config>,
    args: &ShowArgs,
    format: OutputFormat,
) -> Result<ExitCode> {
    let config = if args.raw {
        match ConfigLoader::resolve(&source.root_dir, &source.stage) {
            Ok(config) => config,
            Err(err) => {
                print_error(&err, format);
                return Ok(ExitCode::FAILURE);
            }
        }
    } else {
        match global {
            Ok(config) => (*config).clone(),
            Err(err) => {
                print_error(err, format);
                return Ok(ExitCode::FAILURE);
            }
        }
    };
    let shown = if args.reveal {
        config
    } else {
        config.redacted()
    };
    print!("{}", render(&shown, format)?);
    Ok(ExitCode::SUCCESS)
}

fn run_stages(source: &ConfigSource, format: OutputFormat) -> Result<ExitCode> {
    match ConfigLoader::load_documents(&source.root_dir) {
        Ok(loaded) => {
            let stages: Vec<&str> = loaded.stages().collect();
            print!("{}", render(&stages, format)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(&err, format);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_addr(global: &ConfigResult<&'static Config>, format: OutputFormat) -> Result<ExitCode> {
    match global {
        Ok(config) => {
            println!("{}", config.sirena_addr());
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(err, format);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_key_dirs(global: &ConfigResult<&'static Config>, format: OutputFormat) -> Result<ExitCode> {
    let rows: Vec<KeyDirRow> = key_resolver(global)
        .directories()
        .iter()
        .map(|dir| KeyDirRow {
            path: dir.path.display().to_string(),
            source: dir.source.to_string(),
        })
        .collect();
    print!("{}", render(&rows, format)?);
    Ok(ExitCode::SUCCESS)
}

fn run_key(
    global: &ConfigResult<&'static Config>,
    args: &KeyArgs,
    format: OutputFormat,
) -> Result<ExitCode> {
    let key = match key_resolver(global).load_resolved(&args.name) {
        Ok(key) => key,
        Err(err) => {
            print_error(&err, format);
            return Ok(ExitCode::FAILURE);
        }
    };

    if args.dump {
        std::io::stdout().write_all(&key.contents)?;
        return Ok(ExitCode::SUCCESS);
    }

    let row = KeyRow {
        name: args.name.clone(),
        path: key.path.display().to_string(),
        source: key.source.to_string(),
        bytes: key.contents.len(),
    };
    print!("{}", render(&row, format)?);
    Ok(ExitCode::SUCCESS)
}

fn run_check_keys(global: &ConfigResult<&'static Config>, format: OutputFormat) -> Result<ExitCode> {
    let config = match global {
        Ok(config) => *config,
        Err(err) => {
            print_error(err, format);
            return Ok(ExitCode::FAILURE);
        }
    };

    let material = match keys::resolver().load_material(config) {
        Ok(material) => material,
        Err(err) => {
            print_error(&err, format);
            return Ok(ExitCode::FAILURE);
        }
    };

    let rows: Vec<KeyRow> = [
        (&config.client_public_key, &material.client_public),
        (&config.client_private_key, &material.client_private),
        (&config.server_public_key, &material.server_public),
    ]
    .into_iter()
    .map(|(name, key)| KeyRow {
        name: name.clone(),
        path: key.path.display().to_string(),
        source: key.source.to_string(),
        bytes: key.contents.len(),
    })
    .collect();
    print!("{}", render(&rows, format)?);
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut source = ConfigSource::discover();
    if let Some(dir) = cli.config_dir {
        source.root_dir = dir;
    }
    if let Some(stage) = cli.env {
        source.stage = stage;
    }

    // Resolve first so the configured log level drives the subscriber
    let resolved = ConfigLoader::load(&source);
    let level = logging::startup_level(cli.verbose, resolved.as_ref().ok());
    logging::init(&LogTarget::parse(&cli.log), level)?;
    debug!(root = %source.root_dir.display(), stage = %source.stage, %level, "Configuration loaded");

    let global = resolved.map(|loaded| config::init(loaded).unwrap_or_else(|_| config::get()));

    match cli.command {
        Some(Command::Show(args)) => run_show(&source, &global, &args, cli.format),
        None => run_show(&source, &global, &ShowArgs::default(), cli.format),
        Some(Command::Stages) => run_stages(&source, cli.format),
        Some(Command::Addr) => run_addr(&global, cli.format),
        Some(Command::KeyDirs) => run_key_dirs(&global, cli.format),
        Some(Command::Key(args)) => run_key(&global, &args, cli.format),
        Some(Command::CheckKeys) => run_check_keys(&global, cli.format),
    }
}
