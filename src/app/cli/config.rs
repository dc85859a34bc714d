//! TOML configuration file loading and settings resolution
//!
//! Precedence, lowest to highest: built-in defaults, the configuration file,
//! environment variables, command line flags. Environment and command line
//! are already merged by clap in [`Args`].

use super::args::Args;
use crate::core::error_handling::ContextualError;
use crate::core::logging::LogFormat;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_SCANNER: &str = "secrets";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 10;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid listen address '{value}': {message}")]
    InvalidListenAddress { value: String, message: String },

    #[error("Invalid log level '{value}' (expected one of: trace, debug, info, warn, error, off)")]
    InvalidLogLevel { value: String },

    #[error("Invalid log format '{value}' (expected one of: text, ext, json)")]
    InvalidLogFormat { value: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ConfigError::Read { .. })
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub listen_address: Option<String>,
    pub shutdown_grace_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<PathBuf>,
    pub color: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerSection {
    pub name: Option<String>,
}

/// Contents of `scanplugin.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub logging: LoggingSection,
    pub scanner: ScannerSection,
}

impl FileConfig {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load the configuration file, if any
    ///
    /// An explicitly named file must exist; the default location is used
    /// only when present.
    pub async fn load(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(None),
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        let config = Self::parse(&contents, &path)?;
        Ok(Some((path, config)))
    }
}

/// `<config_dir>/ScanPlugin/scanplugin.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ScanPlugin").join("scanplugin.toml"))
}

/// Fully resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub listen_address: SocketAddr,
    pub scanner: String,
    pub shutdown_grace: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
    pub log_file: Option<PathBuf>,
    /// `None` means decide from whether stderr is a terminal
    pub color: Option<bool>,
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Read the configuration file named by `args` (or the default one) and resolve
    pub async fn load(args: &Args) -> Result<Self, ConfigError> {
        match FileConfig::load(args.config_file.as_deref()).await? {
            Some((path, file)) => {
                let mut settings = Self::resolve(args, file)?;
                settings.config_file = Some(path);
                Ok(settings)
            }
            None => Self::resolve(args, FileConfig::default()),
        }
    }

    /// Merge command line over file values over defaults and validate the result
    pub fn resolve(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
        let listen_address = args
            .listen_address
            .clone()
            .or(file.server.listen_address)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string());
        let listen_address = SocketAddr::from_str(listen_address.trim()).map_err(|e| {
            ConfigError::InvalidListenAddress {
                value: listen_address.clone(),
                message: e.to_string(),
            }
        })?;

        let log_level = args
            .log_level
            .clone()
            .or(file.logging.level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel { value: log_level });
        }

        let log_format = match args.log_format.clone().or(file.logging.format) {
            Some(value) => LogFormat::from_str(&value.to_lowercase())
                .map_err(|_| ConfigError::InvalidLogFormat { value })?,
            None => LogFormat::default(),
        };

        // "none" and "-" disable file logging
        let log_file = args
            .log_file
            .clone()
            .or(file.logging.file)
            .filter(|path| {
                let raw = path.to_string_lossy();
                !(raw.eq_ignore_ascii_case("none") || raw == "-")
            });

        Ok(Self {
            listen_address,
            scanner: args
                .scanner
                .clone()
                .or(file.scanner.name)
                .unwrap_or_else(|| DEFAULT_SCANNER.to_string()),
            shutdown_grace: Duration::from_secs(
                args.shutdown_grace_seconds
                    .or(file.server.shutdown_grace_seconds)
                    .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECONDS),
            ),
            log_level,
            log_format,
            log_file,
            color: args.color_choice().or(file.logging.color),
            config_file: None,
        })
    }
}
