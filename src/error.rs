//! Structured error types for configuration resolution and key lookup.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Startup errors (fatal)
    InvalidArgument,
    UnreadableRoot,
    NoConfigFiles,
    ConfigReadFailed,
    MalformedConfig,
    NoUsableConfig,
    MissingRequiredField,
    InvalidEnvValue,

    // Lookup errors (recoverable)
    KeyNotFound,
    KeyReadFailed,
}

/// Failures while resolving the effective configuration.
///
/// Every variant is fatal at startup: the process cannot run on an
/// undefined configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyArgument(&'static str),

    #[error("cannot read config directory {path}: {source}")]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("no config: no YAML files found under {0}")]
    NoConfigFiles(PathBuf),

    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no usable configuration: stage '{stage}' and 'defaults' are both undefined")]
    NoUsableConfig { stage: String },

    #[error("stage '{stage}' is missing required field(s): {}", .fields.join(", "))]
    MissingRequired {
        stage: String,
        fields: Vec<&'static str>,
    },

    #[error("environment variable {var} has invalid value '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

impl ConfigError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::EmptyArgument(_) => ErrorCode::InvalidArgument,
            ConfigError::UnreadableRoot { .. } => ErrorCode::UnreadableRoot,
            ConfigError::NoConfigFiles(_) => ErrorCode::NoConfigFiles,
            ConfigError::Read { .. } => ErrorCode::ConfigReadFailed,
            ConfigError::Parse { .. } => ErrorCode::MalformedConfig,
            ConfigError::NoUsableConfig { .. } => ErrorCode::NoUsableConfig,
            ConfigError::MissingRequired { .. } => ErrorCode::MissingRequiredField,
            ConfigError::InvalidEnv { .. } => ErrorCode::InvalidEnvValue,
        }
    }
}

/// Failures while locating or reading a key file.
///
/// These are returned to the caller, who decides whether a missing key is
/// fatal to its own operation.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key file not found: {name}")]
    NotFound { name: String },

    #[error("cannot read key file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl KeyError {
    pub fn code(&self) -> ErrorCode {
        match self {
            KeyError::NotFound { .. } => ErrorCode::KeyNotFound,
            KeyError::Read { .. } => ErrorCode::KeyReadFailed,
        }
    }
}

/// Serializable error body for machine-readable output.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&ConfigError> for ErrorReport {
    fn from(err: &ConfigError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<&KeyError> for ErrorReport {
    fn from(err: &KeyError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

pub type KeyResult<T> = std::result::Result<T, KeyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_lists_fields() {
        let err = ConfigError::MissingRequired {
            stage: "production".to_string(),
            fields: vec!["addr", "sirena_host"],
        };
        assert_eq!(
            err.to_string(),
            "stage 'production' is missing required field(s): addr, sirena_host"
        );
        assert_eq!(err.code(), ErrorCode::MissingRequiredField);
    }

    #[test]
    fn test_key_not_found_names_file() {
        let err = KeyError::NotFound {
            name: "server.pub".to_string(),
        };
        assert!(err.to_string().contains("server.pub"));
    }

    #[test]
    fn test_error_report_serializes_code() {
        let err = ConfigError::NoUsableConfig {
            stage: "staging".to_string(),
        };
        let report = ErrorReport::from(&err);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["code"], "NO_USABLE_CONFIG");
        assert!(json["message"].as_str().unwrap().contains("staging"));
    }
}
