//! Configuration types and structures.
//!
//! One record type serves both as the partial per-stage record parsed from a
//! YAML document and as the effective configuration after merging. A field
//! that holds its zero value (empty string, `false`, `0`) is "not set".

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Name of the baseline stage merged under every other stage.
pub const DEFAULTS_STAGE: &str = "defaults";

/// Stage used when nothing selects one explicitly.
pub const DEFAULT_STAGE: &str = "development";

/// Log level applied when no document or environment variable sets one.
pub const DEFAULT_LOG_LEVEL: &str = "debug";

const REDACTED: &str = "***";

/// Service configuration record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log verbosity (trace, debug, info, warn, error).
    pub log_level: String,

    /// Listen address of the service.
    pub addr: String,

    /// Whether raw XML exchanged with Sirena is logged.
    #[serde(deserialize_with = "null_as_zero")]
    pub track_xml: bool,

    #[serde(deserialize_with = "scalar_string")]
    pub sirena_client_id: String,
    pub sirena_host: String,
    /// Kept as a string: an empty port means "host already carries it".
    #[serde(deserialize_with = "scalar_string")]
    pub sirena_port: String,

    /// Key file names, resolved through the key search path.
    pub client_public_key: String,
    pub client_private_key: String,
    #[serde(deserialize_with = "scalar_string")]
    pub client_private_key_password: String,
    pub server_public_key: String,

    /// Extra directory searched for key files.
    pub keys_dir: String,

    // Optional cache backend
    pub redis_host: String,
    #[serde(deserialize_with = "scalar_string")]
    pub redis_port: String,
    #[serde(deserialize_with = "scalar_string")]
    pub redis_password: String,
    #[serde(deserialize_with = "null_as_zero")]
    pub redis_db: u32,

    /// Stage the record was resolved for. Never read from YAML.
    #[serde(skip_deserializing)]
    pub env_type: String,
}

/// Accept any YAML scalar as a string, so `sirena_port: 34323` works unquoted.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::de::Error;
    use serde_yaml::Value;

    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar, found {:?}",
            other
        ))),
    }
}

/// A blank value (`track_xml:` or `~`) reads as the zero value.
fn null_as_zero<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Partial per-stage record as written in a YAML document.
pub type StageConfig = Config;

/// One parsed YAML file: stage name to partial record.
pub type ConfigDocument = BTreeMap<String, StageConfig>;

impl Config {
    /// Sirena address to connect the client to.
    ///
    /// Returns the host alone when no port is configured.
    pub fn sirena_addr(&self) -> String {
        if self.sirena_port.is_empty() {
            return self.sirena_host.clone();
        }
        format!("{}:{}", self.sirena_host, self.sirena_port)
    }

    /// Names of required fields that are still unset.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let required = [
            ("addr", &self.addr),
            ("sirena_client_id", &self.sirena_client_id),
            ("sirena_host", &self.sirena_host),
            ("sirena_port", &self.sirena_port),
            ("client_public_key", &self.client_public_key),
            ("client_private_key", &self.client_private_key),
            ("server_public_key", &self.server_public_key),
        ];
        required
            .into_iter()
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Whether a cache backend is configured.
    pub fn has_redis(&self) -> bool {
        !self.redis_host.is_empty()
    }

    /// Redis address in `host:port` form, if a backend is configured.
    pub fn redis_addr(&self) -> Option<String> {
        if !self.has_redis() {
            return None;
        }
        if self.redis_port.is_empty() {
            return Some(self.redis_host.clone());
        }
        Some(format!("{}:{}", self.redis_host, self.redis_port))
    }

    /// Copy with secret values masked, for display.
    pub fn redacted(&self) -> Config {
        let mask = |value: &String| {
            if value.is_empty() {
                String::new()
            } else {
                REDACTED.to_string()
            }
        };
        Config {
            client_private_key_password: mask(&self.client_private_key_password),
            redis_password: mask(&self.redis_password),
            ..self.clone()
        }
    }
}

/// Null-safe form of [`Config::sirena_addr`].
///
/// An absent configuration yields an empty string rather than an error.
pub fn sirena_addr(config: Option<&Config>) -> String {
    config.map(Config::sirena_addr).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sirena_addr_without_port() {
        let config = Config {
            sirena_host: "h".into(),
            ..Default::default()
        };
        assert_eq!(config.sirena_addr(), "h");
    }

    #[test]
    fn test_sirena_addr_with_port() {
        let config = Config {
            sirena_host: "h".into(),
            sirena_port: "9000".into(),
            ..Default::default()
        };
        assert_eq!(config.sirena_addr(), "h:9000");
        assert_eq!(sirena_addr(Some(&config)), "h:9000");
    }

    #[test]
    fn test_sirena_addr_absent_config() {
        assert_eq!(sirena_addr(None), "");
    }

    #[test]
    fn test_missing_required_on_empty_record() {
        let missing = Config::default().missing_required();
        assert_eq!(
            missing,
            vec![
                "addr",
                "sirena_client_id",
                "sirena_host",
                "sirena_port",
                "client_public_key",
                "client_private_key",
                "server_public_key",
            ]
        );
    }

    #[test]
    fn test_yaml_stage_record_ignores_env_type_and_unknown_keys() {
        let yaml = r#"
addr: ":8080"
track_xml: true
env_type: bogus
unknown_field: 1
redis_db: 3
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.addr, ":8080");
        assert!(config.track_xml);
        assert_eq!(config.redis_db, 3);
        assert!(config.env_type.is_empty());
    }

    #[test]
    fn test_unquoted_scalars_become_strings() {
        let yaml = "sirena_port: 34323\nsirena_client_id: 1234\nredis_password: true\nredis_port:\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.sirena_port, "34323");
        assert_eq!(config.sirena_client_id, "1234");
        assert_eq!(config.redis_password, "true");
        assert_eq!(config.redis_port, "");
    }

    #[test]
    fn test_blank_flag_and_number_read_as_zero() {
        let config: StageConfig =
            serde_yaml::from_str("track_xml:\nredis_db: ~\nsirena_host: h\n").unwrap();
        assert!(!config.track_xml);
        assert_eq!(config.redis_db, 0);
        assert_eq!(config.sirena_host, "h");
    }

    #[test]
    fn test_nested_value_for_scalar_field_is_rejected() {
        assert!(serde_yaml::from_str::<Config>("sirena_port: [1]\n").is_err());
    }

    #[test]
    fn test_redacted_masks_only_set_secrets() {
        let config = Config {
            client_private_key_password: "hunter2".into(),
            sirena_host: "h".into(),
            ..Default::default()
        };
        let shown = config.redacted();
        assert_eq!(shown.client_private_key_password, "***");
        assert_eq!(shown.redis_password, "");
        assert_eq!(shown.sirena_host, "h");
    }

    #[test]
    fn test_redis_addr() {
        assert_eq!(Config::default().redis_addr(), None);
        let config = Config {
            redis_host: "cache".into(),
            redis_port: "6379".into(),
            ..Default::default()
        };
        assert_eq!(config.redis_addr().as_deref(), Some("cache:6379"));
    }
}
