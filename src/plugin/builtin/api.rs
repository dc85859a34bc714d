//! API for builtin scanner registration and lookup
//!
//! Scanners use the `builtin!` macro to register themselves; the process
//! picks one by name at startup.

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::Scanner;

/// Entry for a builtin scanner in the static registry
pub struct BuiltinScannerEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: fn() -> Box<dyn Scanner>,
}

inventory::collect!(BuiltinScannerEntry);

/// Macro for registering builtin scanners
#[macro_export]
macro_rules! builtin {
    ($name:expr, $description:expr, $factory:expr) => {
        inventory::submit!($crate::plugin::builtin::api::BuiltinScannerEntry {
            name: $name,
            description: $description,
            factory: $factory,
        });
    };
}

/// All registered builtin scanners, sorted by name
pub fn all_scanners() -> Vec<&'static BuiltinScannerEntry> {
    let mut entries: Vec<_> = inventory::iter::<BuiltinScannerEntry>().collect();
    entries.sort_by_key(|entry| entry.name);
    entries
}

/// Instantiate the builtin scanner registered as `name`
pub fn create_scanner(name: &str) -> PluginResult<Box<dyn Scanner>> {
    all_scanners()
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| (entry.factory)())
        .ok_or_else(|| PluginError::ScannerNotFound {
            name: name.to_string(),
            available: scanner_names().join(", "),
        })
}

pub fn scanner_names() -> Vec<&'static str> {
    all_scanners().into_iter().map(|entry| entry.name).collect()
}
