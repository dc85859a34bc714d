//! Wire types for the plugin control protocol
//!
//! Every payload exchanged with the host is JSON with camelCase field
//! names. Snake_case aliases are accepted on input so hand-written host
//! requests work as well.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plugin run state
///
/// `Done` and `Failed` are terminal for the lifetime of the process.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
pub enum RunState {
    NotReady,
    Ready,
    Running,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Run state plus a human-readable detail message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub state: RunState,
    pub message: String,
    /// Time the status was last replaced
    pub last_transition_time: DateTime<Utc>,
}

impl Status {
    pub fn new(state: RunState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Scanner self-description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    pub version: String,
    /// Overwritten by the control surface on every read
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "api_version")]
    pub api_version: Option<String>,
}

impl Metadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            api_version: None,
        }
    }
}

/// Job configuration posted by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Path the scan report is written to on success
    #[serde(alias = "output_file")]
    pub output_file: String,
    /// Directory holding the asset to scan
    #[serde(default, alias = "input_dir")]
    pub input_dir: String,
    /// Scanner-specific parameters, as a JSON document in a string
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "scanner_config")]
    pub scanner_config: Option<String>,
    /// Scan budget in seconds; zero or absent means unbounded
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "timeout_seconds")]
    pub timeout_seconds: Option<u64>,
}

impl Config {
    pub fn new(output_file: impl Into<String>) -> Self {
        Self {
            output_file: output_file.into(),
            input_dir: String::new(),
            scanner_config: None,
            timeout_seconds: None,
        }
    }

    pub fn with_input_dir(mut self, input_dir: impl Into<String>) -> Self {
        self.input_dir = input_dir.into();
        self
    }

    pub fn with_scanner_config(mut self, scanner_config: impl Into<String>) -> Self {
        self.scanner_config = Some(scanner_config.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Reject payloads that are well-formed JSON but cannot name a report
    ///
    /// `scannerConfig` is left to the scanner, which fails the scan when it
    /// cannot read it.
    pub fn validate(&self) -> Result<(), String> {
        if self.output_file.trim().is_empty() {
            return Err("outputFile must not be empty".to_string());
        }
        if self.output_file.ends_with('/') {
            return Err(format!(
                "outputFile '{}' names a directory, not a file",
                self.output_file
            ));
        }
        Ok(())
    }

    /// Scan budget, if any
    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.timeout_seconds
            .filter(|secs| *secs > 0)
            .map(std::time::Duration::from_secs)
    }

    /// Directory to scan; empty means the working directory
    pub fn input_path(&self) -> std::path::PathBuf {
        if self.input_dir.is_empty() {
            std::path::PathBuf::from(".")
        } else {
            std::path::PathBuf::from(&self.input_dir)
        }
    }
}

/// Request to stop an in-flight scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSignal {
    /// Grace period after which a scan that has not wound down is abandoned
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "timeout_seconds")]
    pub timeout_seconds: Option<u64>,
}

/// Body of every non-2xx response that carries one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
