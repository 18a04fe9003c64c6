//! Tracing subscriber setup.
//!
//! Output goes to stdout, stderr, a file (appended, no ANSI), or nowhere.
//! `RUST_LOG` takes precedence over the level chosen by the caller.

use crate::config::Config;
use anyhow::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::filter::LevelFilter;

/// Where log output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Off,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// Parse `0/off`, `1/stdout`, `2/stderr`, or treat the value as a file name.
    pub fn parse(value: &str) -> Self {
        match value {
            "0" | "off" => LogTarget::Off,
            "1" | "stdout" => LogTarget::Stdout,
            "2" | "stderr" => LogTarget::Stderr,
            filename => LogTarget::File(PathBuf::from(filename)),
        }
    }
}

/// Map a configured level name to a tracing level.
///
/// Unknown names yield `None`; callers pick their own fallback.
pub fn level_from_name(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "fatal" | "panic" => Some(Level::ERROR),
        _ => None,
    }
}

/// Startup log level: `--verbose` wins, then the resolved `log_level`.
///
/// Falls back to INFO when resolution failed or the name is unknown.
pub fn startup_level(verbose: bool, config: Option<&Config>) -> Level {
    if verbose {
        return Level::DEBUG;
    }
    config
        .and_then(|config| level_from_name(&config.log_level))
        .unwrap_or(Level::INFO)
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()))
}

/// Install the global subscriber.
pub fn init(target: &LogTarget, level: Level) -> Result<()> {
    match target {
        LogTarget::Off => {}
        LogTarget::Stdout => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter_for(level))
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::Stderr => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter_for(level))
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter_for(level))
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(LogTarget::parse("0"), LogTarget::Off);
        assert_eq!(LogTarget::parse("off"), LogTarget::Off);
        assert_eq!(LogTarget::parse("1"), LogTarget::Stdout);
        assert_eq!(LogTarget::parse("stderr"), LogTarget::Stderr);
        assert_eq!(
            LogTarget::parse("ssm.log"),
            LogTarget::File(PathBuf::from("ssm.log"))
        );
    }

    #[test]
    fn test_level_from_name() {
        assert_eq!(level_from_name("debug"), Some(Level::DEBUG));
        assert_eq!(level_from_name("WARNING"), Some(Level::WARN));
        assert_eq!(level_from_name(" info "), Some(Level::INFO));
        assert_eq!(level_from_name("verbose"), None);
    }

    #[test]
    fn test_startup_level_follows_config() {
        let config = Config {
            log_level: "error".into(),
            ..Default::default()
        };
        assert_eq!(startup_level(false, Some(&config)), Level::ERROR);
        assert_eq!(startup_level(true, Some(&config)), Level::DEBUG);
    }

    #[test]
    fn test_startup_level_fallback_is_info() {
        assert_eq!(startup_level(false, None), Level::INFO);
        let config = Config {
            log_level: "loud".into(),
            ..Default::default()
        };
        assert_eq!(startup_level(false, Some(&config)), Level::INFO);
    }
}
