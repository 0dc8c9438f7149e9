use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk configuration, read from a YAML file.
///
/// Every section and field has a default so a partial file is valid.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub load: LoadConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TargetConfig {
    pub host: String,
    pub port: u16,
    /// Path placed on the request line of every POST.
    pub endpoint: String,
    /// File whose contents become the request body.
    pub request_file: PathBuf,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4063,
            endpoint: "/openrtb".to_string(),
            request_file: PathBuf::from("request.json"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoadConfig {
    pub connections: usize,
    pub threads: usize,
    /// Requests sent on every connection.
    pub waves: u64,
    pub delay_ms: u64,
    pub response_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            connections: 2,
            threads: 2,
            waves: 5,
            delay_ms: 100,
            response_timeout_secs: 5,
            connect_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Per-connection diagnostics on/off.
    pub enabled: bool,
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9464,
        }
    }
}

impl Config {
    /// Reads and parses a YAML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::YamlParse(path.to_path_buf(), e))
    }
}

/// Fully resolved run settings, after CLI overrides have been applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    pub request_file: PathBuf,
    pub connections: usize,
    pub threads: usize,
    pub waves: u64,
    pub delay: Duration,
    pub response_timeout: Duration,
    pub connect_timeout: Duration,
    pub logging_enabled: bool,
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Settings {
    /// Flattens a config into settings and checks the values the engine relies on.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings = Settings {
            host: config.target.host,
            port: config.target.port,
            endpoint: config.target.endpoint,
            request_file: config.target.request_file,
            connections: config.load.connections,
            threads: config.load.threads,
            waves: config.load.waves,
            delay: Duration::from_millis(config.load.delay_ms),
            response_timeout: Duration::from_secs(config.load.response_timeout_secs),
            connect_timeout: Duration::from_secs(config.load.connect_timeout_secs),
            logging_enabled: config.logging.enabled,
            log_level: config.logging.level,
            log_format: config.logging.format,
            metrics_enabled: config.metrics.enabled,
            metrics_port: config.metrics.port,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".into()));
        }
        if self.connections == 0 {
            return Err(ConfigError::Invalid("connections must be at least 1".into()));
        }
        if self.threads == 0 {
            return Err(ConfigError::Invalid("threads must be at least 1".into()));
        }
        if self.response_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than 0".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "connect timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    YamlParse(PathBuf, serde_yaml::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::YamlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::FileRead(_, e) => Some(e),
            ConfigError::YamlParse(_, e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}
