//! Plugin Trait System
//!
//! Two seams:
//!
//! - [`ScanExecutor`] is the capability set the dispatcher and the control
//!   surface talk to: metadata, status, start, stop. They never see a
//!   concrete implementation.
//! - [`Scanner`] is the detection algorithm itself. Builtin scanners
//!   implement it and [`crate::plugin::executor::ScannerExecutor`] adapts any
//!   scanner to the executor capability set.

use crate::plugin::error::ScanResult;
use crate::plugin::report::ScanReport;
use crate::plugin::state::LifecycleState;
use crate::plugin::stop::StopListener;
use crate::plugin::types::{Config, Metadata, StopSignal, Status};

/// Capability set every plugin executor provides
#[async_trait::async_trait]
pub trait ScanExecutor: Send + Sync {
    /// Static self-description; callable in any state
    fn metadata(&self) -> Metadata;

    /// The lifecycle store backing `status()` and `set_status()`
    fn lifecycle(&self) -> &LifecycleState;

    fn status(&self) -> Status {
        self.lifecycle().get()
    }

    fn set_status(&self, status: Status) {
        self.lifecycle().set(status)
    }

    /// Run the scan to completion
    ///
    /// Sets `Running` on entry and finishes in `Done` (report persisted to
    /// `config.output_file`) or `Failed` (non-empty message). Failures are
    /// recorded in the status and never returned.
    async fn start(&self, config: Config);

    /// Ask an in-flight scan to stop
    ///
    /// Cooperative and best-effort. Does not change the status itself and is
    /// a no-op when no scan is running.
    async fn stop(&self, signal: StopSignal);
}

/// A scan algorithm
#[async_trait::async_trait]
pub trait Scanner: Send + Sync {
    fn metadata(&self) -> Metadata;

    /// Prepare for work; the plugin stays `NotReady` until this returns
    async fn initialize(&self) -> ScanResult<()> {
        Ok(())
    }

    /// Scan `config.input_dir` and build a report
    ///
    /// Implementations should check `stop` between units of work and return
    /// `ScanError::Cancelled` once it fires.
    async fn scan(&self, config: &Config, stop: StopListener) -> ScanResult<ScanReport>;
}
