//! Plugin Error Types
//!
//! `PluginError` covers control-plane failures that are surfaced to the
//! caller. `ScanError` covers everything that can go wrong inside a running
//! scan; it never crosses the protocol boundary and ends up as the message
//! of a `Failed` status instead.

use crate::plugin::types::RunState;
use std::path::PathBuf;

/// Result type alias for plugin control operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Result type alias for scan operations
pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Configure requested while the scanner cannot accept one
    #[error("Scanner is not ready to accept a configuration (current state: {state})")]
    NotReady { state: RunState },

    /// Configure payload parsed but failed validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Scanner could not prepare itself for work
    #[error("Scanner '{scanner}' failed to initialize: {cause}")]
    Initialization { scanner: String, cause: String },

    /// No builtin scanner registered under the requested name
    #[error("Unknown scanner '{name}' (available: {available})")]
    ScannerNotFound { name: String, available: String },
}

impl crate::core::error_handling::ContextualError for PluginError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, PluginError::InvalidConfig { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            PluginError::InvalidConfig { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scan was stopped before it completed")]
    Cancelled,

    #[error("scan timed out after {seconds} seconds")]
    TimedOut { seconds: u64 },

    #[error("failed to parse scanner config: {message}")]
    InvalidScannerConfig { message: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to save scan result to {}: {message}", path.display())]
    Export { path: PathBuf, message: String },

    #[error("scanner panicked: {message}")]
    Panicked { message: String },

    #[error("{message}")]
    Failed { message: String },
}

impl ScanError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }
}
