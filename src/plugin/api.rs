//! Public API for the plugin system
//!
//! External modules should import from here rather than directly from
//! internal modules.

// Wire types
pub use crate::plugin::types::{Config, ErrorResponse, Metadata, RunState, Status, StopSignal};

// Error handling
pub use crate::plugin::error::{PluginError, PluginResult, ScanError, ScanResult};

// Executor capability set and scan algorithms
pub use crate::plugin::state::LifecycleState;
pub use crate::plugin::stop::{StopListener, StopSender};
pub use crate::plugin::traits::{ScanExecutor, Scanner};

// Dispatch
pub use crate::plugin::dispatcher::Dispatcher;
pub use crate::plugin::executor::ScannerExecutor;

// Scan output
pub use crate::plugin::report::{Finding, FindingKind, ScanReport};

// Builtin scanners
pub use crate::plugin::builtin::api::{all_scanners, create_scanner, scanner_names, BuiltinScannerEntry};
