//! Stage-layered configuration.
//!
//! Every `*.yaml`/`*.yml` file under the config root is a mapping from stage
//! name to a partial [`Config`]. Documents are folded in lexical path order,
//! then the active stage is laid over `defaults`.
//!
//! ## Merge Strategy
//! - Shallow, field-by-field, last-non-empty-wins
//! - A zero value (empty string, `false`, `0`) never overrides
//! - Missing active stage falls back to `defaults`; missing both is fatal
//!
//! ## Environment Variables
//! - `SSM_CONFIG_DIR` - Config root directory (default: `config`)
//! - `SSM_ENV` - Active stage (default: `development`)
//! - `LOG_LEVEL`, `SSM_ADDR`, `TRACK_XML`, `SIRENA_*`, `CLIENT_*`,
//!   `SERVER_PUBLIC_KEY`, `REDIS_*`, `SSM_KEYS_HINT` - Field overrides
//!
//! The process-wide value is resolved at most once. Components should prefer
//! taking a `&Config` explicitly; [`get`] exists for code that cannot.

mod loader;
mod merge;
mod types;

pub use loader::{
    CONFIG_DIR_ENV, ConfigLoader, ConfigSource, DEFAULT_CONFIG_DIR, LoadedConfigs, STAGE_ENV,
    discover_files, fold_documents, parse_document,
};
pub use merge::{Unset, merge, merge_all};
pub use types::*;

use crate::error::ConfigError;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::error;

static CONFIG: OnceLock<Result<Config, ConfigError>> = OnceLock::new();

/// Returned by [`init`] when the process-wide configuration is already set.
#[derive(Debug, Error)]
#[error("configuration is already initialized")]
pub struct AlreadyInitialized;

/// Install an explicitly built configuration as the process-wide value.
///
/// First caller wins; later calls fail without replacing anything.
pub fn init(config: Config) -> Result<&'static Config, AlreadyInitialized> {
    CONFIG.set(Ok(config)).map_err(|_| AlreadyInitialized)?;
    match CONFIG.get() {
        Some(Ok(config)) => Ok(config),
        _ => Err(AlreadyInitialized),
    }
}

/// Process-wide configuration, resolved from the environment on first call.
///
/// Concurrent first callers observe a single resolution pass. The outcome,
/// success or failure, is cached for the life of the process.
pub fn try_get() -> Result<&'static Config, &'static ConfigError> {
    CONFIG
        .get_or_init(|| ConfigLoader::load(&ConfigSource::discover()))
        .as_ref()
}

/// Process-wide configuration.
///
/// # Panics
/// If resolution failed. Startup should call [`try_get`] or [`init`] first so
/// that a misconfigured deployment fails before serving anything.
pub fn get() -> &'static Config {
    match try_get() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, code = ?err.code(), "Configuration unavailable");
            panic!("configuration unavailable: {err}");
        }
    }
}

/// Sirena address from the process-wide configuration, or `""` if it failed
/// to resolve.
pub fn global_sirena_addr() -> String {
    sirena_addr(try_get().ok())
}
