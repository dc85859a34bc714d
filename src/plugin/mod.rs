//! Plugin System Module
//!
//! The scanner side of the control protocol: lifecycle state, the executor
//! capability set, the dispatcher that enforces protocol preconditions, and
//! the builtin scanners.

// Internal modules - all access should go through api module
pub(crate) mod builtin;
pub(crate) mod dispatcher;
pub(crate) mod error;
pub(crate) mod executor;
pub(crate) mod report;
pub(crate) mod state;
pub(crate) mod stop;
pub(crate) mod traits;
pub(crate) mod types;

// Public API module - the only public interface for the plugin system
pub mod api;
