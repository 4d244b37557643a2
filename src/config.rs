//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides; command-line
//! flags are applied on top by the binary.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PromalyError, Result};
use crate::query::{parse_step, Credentials, ExecutorConfig, RangeQuery};
use crate::render::OutputFormat;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Prometheus server connection
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_url")]
    pub url: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_server_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            user: String::new(),
            password: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Query defaults
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_expression")]
    pub expression: String,

    #[serde(default = "default_start")]
    pub start: String,

    /// Empty means now
    #[serde(default)]
    pub end: String,

    /// Duration string; "0" derives the step from the range
    #[serde(default = "default_step")]
    pub step: String,
}

fn default_expression() -> String {
    "up".to_string()
}

fn default_start() -> String {
    "1 hour ago".to_string()
}

fn default_step() -> String {
    "1m".to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            expression: default_expression(),
            start: default_start(),
            end: String::new(),
            step: default_step(),
        }
    }
}

/// Rendering and destination
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_output_format")]
    pub format: String,

    /// "-" for stdout, empty to skip writing
    #[serde(default = "default_output_file")]
    pub file: String,
}

fn default_title() -> String {
    "Prometheus metrics".to_string()
}

fn default_output_format() -> String {
    "csv".to_string()
}

fn default_output_file() -> String {
    "./graph".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            format: default_output_format(),
            file: default_output_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    ///
    /// A bare level applies to this crate only; anything with a target or a
    /// list of directives is used verbatim.
    pub fn filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("promaly={}", level)
        }
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> std::result::Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Default config locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = dirs::config_dir()
            .map(|p| p.join("promaly").join("config.toml"))
            .into_iter()
            .collect();
        paths.push(PathBuf::from("/etc/promaly/config.toml"));
        paths.push(PathBuf::from("./promaly.toml"));
        paths
    }

    /// First default location that exists
    pub fn find_default() -> Option<PathBuf> {
        Self::default_paths().into_iter().find(|p| p.exists())
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> std::result::Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(url) = lookup("PROMALY_SERVER") {
            self.server.url = url;
        }
        if let Some(user) = lookup("PROMALY_USER") {
            self.server.user = user;
        }
        if let Some(password) = lookup("PROMALY_PASSWORD") {
            self.server.password = password;
        }
        if let Some(timeout) = lookup("PROMALY_TIMEOUT_SECS") {
            self.server.timeout_secs = timeout.trim().parse::<u64>().map_err(|e| ConfigError::Env {
                var: "PROMALY_TIMEOUT_SECS".to_string(),
                error: format!("{:?}: {}", timeout, e),
            })?;
        }

        // Logging overrides
        if let Some(level) = lookup("PROMALY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("PROMALY_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Connection settings; a zero timeout is rejected
    pub fn executor_config(&self) -> Result<ExecutorConfig> {
        if self.server.timeout_secs == 0 {
            return Err(PromalyError::Config(
                "server.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(ExecutorConfig {
            server: self.server.url.clone(),
            credentials: Credentials::new(self.server.user.clone(), self.server.password.clone()),
            timeout: Duration::from_secs(self.server.timeout_secs),
        })
    }

    /// Query inputs with the step string parsed
    pub fn range_query(&self) -> Result<RangeQuery> {
        Ok(RangeQuery {
            expression: self.query.expression.clone(),
            start: self.query.start.clone(),
            end: self.query.end.clone(),
            step: parse_step(&self.query.step)?,
        })
    }

    pub fn output_format(&self) -> Result<OutputFormat> {
        self.output.format.parse()
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {var}: {error}")]
    Env { var: String, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Promaly Configuration
#
# Environment variables override these settings:
# - PROMALY_SERVER
# - PROMALY_USER
# - PROMALY_PASSWORD
# - PROMALY_TIMEOUT_SECS
# - PROMALY_LOG_LEVEL
# - PROMALY_LOG_FORMAT
#
# Command-line flags override both.

[server]
# Prometheus server URL (a path prefix is kept)
url = "http://localhost:9090"

# Basic auth; either field set enables it
user = ""
password = ""

# Hard deadline for the query in seconds
timeout_secs = 120

[query]
# PromQL expression
expression = "up"

# Range bounds: timestamps, dates or phrases like "1 hour ago"
start = "1 hour ago"
# Empty means now
end = ""

# Sampling step ("30s", "1m", "1h30m"); "0" derives it from the range
step = "1m"

[output]
title = "Prometheus metrics"

# csv, json, ndjson or table
format = "csv"

# Output path without extension; "-" for stdout, "" to skip writing
file = "./graph"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty or json
format = "pretty"

# Optional log file path (default: stderr)
# file = "/var/log/promaly/promaly.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.url, "http://localhost:9090");
        assert_eq!(config.server.timeout_secs, 120);
        assert_eq!(config.query.expression, "up");
        assert_eq!(config.query.start, "1 hour ago");
        assert!(config.query.end.is_empty());
        assert_eq!(config.output.file, "./graph");
        assert_eq!(config.output_format().unwrap(), OutputFormat::Csv);

        let query = config.range_query().unwrap();
        assert_eq!(query, RangeQuery::default());

        let executor = config.executor_config().unwrap();
        assert!(!executor.credentials.is_active());
        assert_eq!(executor.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_generated_config_matches_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.server.url, defaults.server.url);
        assert_eq!(config.server.timeout_secs, defaults.server.timeout_secs);
        assert_eq!(config.query.step, defaults.query.step);
        assert_eq!(config.output.format, defaults.output.format);
        assert_eq!(config.logging.level, defaults.logging.level);
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("promaly.toml");
        std::fs::write(
            &path,
            r#"
[server]
url = "https://prom.example.com/prometheus"
user = "alice"
timeout_secs = 5

[query]
step = "0"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.url, "https://prom.example.com/prometheus");
        assert_eq!(config.server.timeout_secs, 5);
        assert_eq!(config.query.expression, "up");
        assert_eq!(config.range_query().unwrap().step, Duration::ZERO);
        assert!(config.executor_config().unwrap().credentials.is_active());
        assert_eq!(config.output.title, "Prometheus metrics");
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[server\nurl = 1").unwrap();
        assert!(matches!(Config::load(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("PROMALY_SERVER", "http://prom:9090"),
            ("PROMALY_PASSWORD", "secret"),
            ("PROMALY_TIMEOUT_SECS", "30"),
            ("PROMALY_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.url, "http://prom:9090");
        assert!(config.server.user.is_empty());
        assert_eq!(config.server.password, "secret");
        assert_eq!(config.server.timeout_secs, 30);
        assert!(config.logging.is_json());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_bad_timeout_override_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|key| (key == "PROMALY_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref var, .. } if var == "PROMALY_TIMEOUT_SECS"));
        assert_eq!(config.server.timeout_secs, 120);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config
            .apply_overrides(|key| (key == "PROMALY_TIMEOUT_SECS").then(|| "0".to_string()))
            .unwrap();
        assert_eq!(config.server.timeout_secs, 0);
        assert!(matches!(config.executor_config(), Err(PromalyError::Config(_))));

        config.server.timeout_secs = 1;
        assert_eq!(config.executor_config().unwrap().timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.query.step = "fast".to_string();
        assert!(config.range_query().is_err());

        config.output.format = "png".to_string();
        assert!(config.output_format().is_err());
    }

    #[test]
    fn test_filter_directive() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.filter_directive(), "promaly=info");

        logging.level = "debug".to_string();
        assert_eq!(logging.filter_directive(), "promaly=debug");

        logging.level = "promaly=trace,reqwest=debug".to_string();
        assert_eq!(logging.filter_directive(), "promaly=trace,reqwest=debug");
    }

    #[test]
    fn test_default_paths_order() {
        let paths = Config::default_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("./promaly.toml")));
        assert!(paths.contains(&PathBuf::from("/etc/promaly/config.toml")));
    }
}
