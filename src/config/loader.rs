//! Configuration loader with stage-based merging.
//!
//! Resolution runs as separate phases so each can be exercised on its own:
//! discover YAML files, parse each into a [`ConfigDocument`], fold the
//! documents into [`LoadedConfigs`], then select the active stage.

use super::types::{Config, ConfigDocument, DEFAULT_LOG_LEVEL, DEFAULT_STAGE, DEFAULTS_STAGE};
use crate::error::{ConfigError, ConfigResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Environment variable naming the configuration root directory.
pub const CONFIG_DIR_ENV: &str = "SSM_CONFIG_DIR";
/// Environment variable naming the active stage.
pub const STAGE_ENV: &str = "SSM_ENV";
/// Root directory used when [`CONFIG_DIR_ENV`] is unset.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Where configuration comes from: a root directory and an active stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub root_dir: PathBuf,
    pub stage: String,
}

impl ConfigSource {
    /// Read the root directory and stage from the environment.
    pub fn discover() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create a source with explicit values.
    pub fn new(root_dir: impl Into<PathBuf>, stage: impl Into<String>) -> Self {
        Self {
            root_dir: root_dir.into(),
            stage: stage.into(),
        }
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let root_dir = lookup(CONFIG_DIR_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());
        let stage = lookup(STAGE_ENV)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_STAGE.to_string());
        Self::new(root_dir, stage)
    }
}

/// Stage name to merged partial record, accumulated across all documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedConfigs {
    stages: BTreeMap<String, Config>,
}

impl LoadedConfigs {
    /// Fold one document in. Existing stages are augmented field-by-field.
    pub fn absorb(&mut self, document: ConfigDocument) {
        for (stage, record) in document {
            self.stages
                .entry(stage)
                .and_modify(|existing| existing.merge_from(&record))
                .or_insert(record);
        }
    }

    /// Partial record for a stage, as folded (not merged with defaults).
    pub fn stage(&self, stage: &str) -> Option<&Config> {
        self.stages.get(stage)
    }

    /// Known stage names in lexical order.
    pub fn stages(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Produce the effective configuration for `stage`.
    ///
    /// - stage present: `defaults` (if any) overlaid with the stage
    /// - stage absent: `defaults` verbatim
    /// - neither present: [`ConfigError::NoUsableConfig`]
    pub fn select(&self, stage: &str) -> ConfigResult<Config> {
        let defaults = self.stages.get(DEFAULTS_STAGE);
        let (mut config, selected) = match (self.stages.get(stage), defaults) {
            (Some(active), Some(defaults)) => (super::merge::merge(defaults.clone(), active), stage),
            (Some(active), None) => (active.clone(), stage),
            (None, Some(defaults)) => {
                warn!(stage, "Stage not defined, falling back to defaults");
                (defaults.clone(), DEFAULTS_STAGE)
            }
            (None, None) => {
                return Err(ConfigError::NoUsableConfig {
                    stage: stage.to_string(),
                });
            }
        };
        config.env_type = selected.to_string();
        Ok(config)
    }
}

/// Fold parsed documents, in order, into one stage mapping.
pub fn fold_documents(documents: impl IntoIterator<Item = ConfigDocument>) -> LoadedConfigs {
    let mut loaded = LoadedConfigs::default();
    for document in documents {
        loaded.absorb(document);
    }
    loaded
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Recursively list YAML files under `root` in lexical path order.
///
/// A missing root yields an empty list; any other failure to reach or walk
/// it is fatal.
pub fn discover_files(root: &Path) -> ConfigResult<Vec<PathBuf>> {
    if let Err(err) = std::fs::metadata(root) {
        if err.kind() == std::io::ErrorKind::NotFound {
            debug!(root = %root.display(), "Config directory does not exist");
            return Ok(Vec::new());
        }
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| ConfigError::UnreadableRoot {
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_yaml(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Parse one YAML file into a stage mapping.
///
/// An empty file is an empty document; a stage with a null body is an empty
/// partial record.
pub fn parse_document(path: &Path) -> ConfigResult<ConfigDocument> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_document_str(content: &str) -> Result<ConfigDocument, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(ConfigDocument::new());
    }
    let raw: Option<BTreeMap<String, Option<Config>>> = serde_yaml::from_str(content)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(stage, record)| (stage, record.unwrap_or_default()))
        .collect())
}

/// Entry points for resolving the effective configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLoader;

impl ConfigLoader {
    /// Discover and parse every YAML document under `root_dir`, then fold them.
    pub fn load_documents(root_dir: &Path) -> ConfigResult<LoadedConfigs> {
        let files = discover_files(root_dir)?;
        if files.is_empty() {
            return Err(ConfigError::NoConfigFiles(root_dir.to_path_buf()));
        }

        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            debug!(file = %file.display(), "Parsing config file");
            documents.push(parse_document(file)?);
        }
        Ok(fold_documents(documents))
    }

    /// Merge the stage-keyed documents under `root_dir` for `stage`.
    ///
    /// No environment overrides or validation; see [`ConfigLoader::load`].
    pub fn resolve(root_dir: impl AsRef<Path>, stage: &str) -> ConfigResult<Config> {
        let root_dir = root_dir.as_ref();
        if root_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyArgument("config directory"));
        }
        if stage.is_empty() {
            return Err(ConfigError::EmptyArgument("stage"));
        }

        Self::load_documents(root_dir)?.select(stage)
    }

    /// Full startup resolution: merge, environment overrides, defaults, and
    /// presence validation.
    pub fn load(source: &ConfigSource) -> ConfigResult<Config> {
        Self::load_with_env(source, |var| std::env::var(var).ok())
    }

    /// [`ConfigLoader::load`] with an explicit environment lookup.
    pub fn load_with_env(
        source: &ConfigSource,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Config> {
        let mut config = Self::resolve(&source.root_dir, &source.stage)?;
        apply_env_overrides(&mut config, lookup)?;

        if config.log_level.is_empty() {
            config.log_level = DEFAULT_LOG_LEVEL.to_string();
        }

        let missing = config.missing_required();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired {
                stage: config.env_type.clone(),
                fields: missing,
            });
        }

        info!(
            root = %source.root_dir.display(),
            stage = %config.env_type,
            "Configuration resolved"
        );
        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Apply environment variable overrides to config.
///
/// Only non-empty variables take effect.
fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConfigResult<()> {
    let get = |var: &str| lookup(var).filter(|v| !v.is_empty());

    let strings: [(&str, &mut String); 13] = [
        ("LOG_LEVEL", &mut config.log_level),
        ("SSM_ADDR", &mut config.addr),
        ("SIRENA_CLIENT_ID", &mut config.sirena_client_id),
        ("SIRENA_HOST", &mut config.sirena_host),
        ("SIRENA_PORT", &mut config.sirena_port),
        ("CLIENT_PUBLIC_KEY", &mut config.client_public_key),
        ("CLIENT_PRIVATE_KEY", &mut config.client_private_key),
        (
            "CLIENT_PRIVATE_KEY_PASSWORD",
            &mut config.client_private_key_password,
        ),
        ("SERVER_PUBLIC_KEY", &mut config.server_public_key),
        ("SSM_KEYS_HINT", &mut config.keys_dir),
        ("REDIS_HOST", &mut config.redis_host),
        ("REDIS_PORT", &mut config.redis_port),
        ("REDIS_PASSWORD", &mut config.redis_password),
    ];
    for (var, field) in strings {
        if let Some(value) = get(var) {
            debug!(var, "Config field overridden from environment");
            *field = value;
        }
    }

    if let Some(value) = get("TRACK_XML") {
        config.track_xml = parse_flag(&value).ok_or(ConfigError::InvalidEnv {
            var: "TRACK_XML",
            value: value.clone(),
        })?;
    }

    if let Some(value) = get("REDIS_DB") {
        config.redis_db = value.parse().map_err(|_| ConfigError::InvalidEnv {
            var: "REDIS_DB",
            value: value.clone(),
        })?;
    }

    Ok(())
}
