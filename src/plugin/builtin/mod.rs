//! Built-in Scanner Implementations
//!
//! Every scanner here registers itself through `builtin!` and is selectable
//! by name at startup.

pub mod api;
pub mod files;
pub mod secrets;
pub mod walk;

use crate::plugin::error::{ScanError, ScanResult};
use serde::de::DeserializeOwned;

/// Parse the scanner-specific options carried in `Config::scanner_config`
///
/// Absent or blank input yields the scanner's defaults.
pub(crate) fn parse_options<T: DeserializeOwned + Default>(raw: Option<&str>) -> ScanResult<T> {
    match raw.map(str::trim) {
        None | Some("") => Ok(T::default()),
        Some(json) => {
            serde_json::from_str(json).map_err(|e| ScanError::InvalidScannerConfig {
                message: e.to_string(),
            })
        }
    }
}
