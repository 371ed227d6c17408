//! Service configuration
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. an optional JSON file
//! 3. environment variables (a `.env` file in the working directory is
//!    loaded first when present)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`ServiceConfig`]
    #[error("invalid config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// A setting has an unusable value
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Default filter directive, e.g. `info` or `flowrepo_service=debug`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Settings of the `flowrepo` service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server_port: u16,
    pub logger: LoggerConfig,
    /// Snapshot file of the durable store; flows are kept in memory when unset
    pub store_path: Option<PathBuf>,
    /// Timeout of outbound calls to the authority and the catalog
    #[serde(with = "duration_text")]
    pub http_timeout: Duration,
    pub permissions_v2_url: String,
    pub operator_repo_url: String,
    /// Path prefix every route is mounted under
    pub url_prefix: String,
    /// Token presented as the internal credential
    pub internal_admin_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server_port: 8080,
            logger: LoggerConfig::default(),
            store_path: None,
            http_timeout: Duration::from_secs(30),
            permissions_v2_url: "http://permv2.permissions:8080".to_string(),
            operator_repo_url: "http://operator-repo:8080".to_string(),
            url_prefix: String::new(),
            internal_admin_token: None,
        }
    }
}

impl ServiceConfig {
    /// Defaults, then `path`, then the process environment
    ///
    /// # Errors
    /// [`ConfigError`] for an unreadable file or an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with the JSON file at `path`
    ///
    /// # Errors
    /// [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Overlay the variables `lookup` knows about
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] for a value that does not parse.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("SERVER_PORT") {
            self.server_port = value.trim().parse().map_err(|e: std::num::ParseIntError| {
                invalid("SERVER_PORT", &value, e)
            })?;
        }
        if let Some(value) = lookup("LOGGER_LEVEL") {
            self.logger.level = value;
        }
        if let Some(value) = lookup("LOGGER_JSON") {
            self.logger.json = parse_flag(&value).ok_or_else(|| {
                invalid("LOGGER_JSON", &value, "expected true or false")
            })?;
        }
        if let Some(value) = lookup("FLOW_STORE_PATH") {
            self.store_path = Some(value).filter(|v| !v.is_empty()).map(PathBuf::from);
        }
        if let Some(value) = lookup("HTTP_TIMEOUT") {
            self.http_timeout =
                parse_duration(&value).map_err(|reason| invalid("HTTP_TIMEOUT", &value, reason))?;
        }
        if let Some(value) = lookup("PERMISSIONS_V2_URL") {
            self.permissions_v2_url = value;
        }
        if let Some(value) = lookup("OPERATOR_REPO_URL") {
            self.operator_repo_url = value;
        }
        if let Some(value) = lookup("URL_PREFIX") {
            self.url_prefix = value;
        }
        if let Some(value) = lookup("INTERNAL_ADMIN_TOKEN") {
            self.internal_admin_token = Some(value).filter(|v| !v.is_empty());
        }
        Ok(())
    }

    /// Copy safe to print
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            internal_admin_token: self
                .internal_admin_token
                .as_ref()
                .map(|_| "<redacted>".to_string()),
            ..self.clone()
        }
    }

    /// Path segments of `url_prefix`
    #[must_use]
    pub fn prefix_segments(&self) -> Vec<String> {
        self.url_prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn invalid(key: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Parse `500ms`, `30s`, `5m`, `1h` or bare seconds
///
/// # Errors
/// A message naming the problem.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| format!("expected a number, got {text:?}"))?;

    match unit {
        "" | "s" => Ok(Duration::from_secs(amount)),
        "ms" => Ok(Duration::from_millis(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        "h" => Ok(Duration::from_secs(amount * 3600)),
        other => Err(format!("unknown unit {other:?}")),
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

mod duration_text {
    use super::{format_duration, parse_duration};
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*value))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_match_deployment() {
        let config = ServiceConfig::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.logger.level, "info");
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.permissions_v2_url, "http://permv2.permissions:8080");
        assert_eq!(config.operator_repo_url, "http://operator-repo:8080");
        assert!(config.store_path.is_none());
    }

    #[test]
    fn file_overlays_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"server_port": 9090, "http_timeout": "500ms", "logger": {"json": true}}"#,
        )
        .unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(config.server_port, 9090);
        assert_eq!(config.http_timeout, Duration::from_millis(500));
        assert!(config.logger.json);
        assert_eq!(config.logger.level, "info");
    }

    #[test]
    fn unreadable_and_invalid_files_fail() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            ServiceConfig::from_file(&missing),
            Err(ConfigError::Read { .. })
        ));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, r#"{"server_port": "many"}"#).unwrap();
        assert!(matches!(
            ServiceConfig::from_file(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn environment_wins() {
        let mut config = ServiceConfig::default();
        config
            .apply_env(env(&[
                ("SERVER_PORT", "7000"),
                ("LOGGER_LEVEL", "debug"),
                ("HTTP_TIMEOUT", "5"),
                ("FLOW_STORE_PATH", "/var/lib/flows.json"),
                ("URL_PREFIX", "/api/flows"),
                ("INTERNAL_ADMIN_TOKEN", "secret"),
            ]))
            .unwrap();

        assert_eq!(config.server_port, 7000);
        assert_eq!(config.logger.level, "debug");
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.store_path, Some(PathBuf::from("/var/lib/flows.json")));
        assert_eq!(config.prefix_segments(), vec!["api", "flows"]);
        assert_eq!(config.internal_admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_environment_value_names_the_key() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(env(&[("HTTP_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "HTTP_TIMEOUT", .. }));

        let err = config
            .apply_env(env(&[("LOGGER_JSON", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "LOGGER_JSON", .. }));
    }

    #[test]
    fn redaction_hides_token() {
        let config = ServiceConfig {
            internal_admin_token: Some("secret".into()),
            ..ServiceConfig::default()
        };
        let printed = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!printed.contains("secret"));
        assert!(printed.contains("\"http_timeout\":\"30s\""));
    }

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration(" 1h "), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("3d").is_err());
        assert!(parse_duration("").is_err());
    }
}
