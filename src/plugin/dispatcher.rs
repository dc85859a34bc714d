//! Dispatcher
//!
//! Enforces the protocol preconditions and decouples trigger requests from
//! the work they start. `trigger_start` checks for `Ready` and moves to
//! `Running` in one critical section on the lifecycle lock, so two racing
//! configure requests can never both be accepted, and a status read issued
//! after an accepted configure never observes `Ready`. The scan itself runs
//! on its own tokio task and outlives the request that launched it.

use crate::plugin::error::{PluginError, PluginResult};
use crate::plugin::traits::ScanExecutor;
use crate::plugin::types::{Config, Metadata, RunState, Status, StopSignal};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

const SETTLE_MARGIN: Duration = Duration::from_millis(500);

pub struct Dispatcher {
    executor: Arc<dyn ScanExecutor>,
    /// The one scan task this process will ever run
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("executor", &self.executor.metadata().name)
            .field("status", &self.executor.status())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn ScanExecutor>) -> Self {
        Self {
            executor,
            scan_task: Mutex::new(None),
        }
    }

    pub fn metadata(&self) -> Metadata {
        self.executor.metadata()
    }

    pub fn status(&self) -> Status {
        self.executor.status()
    }

    /// Accept a configuration and launch the scan without waiting for it
    ///
    /// Rejected with [`PluginError::NotReady`] and no side effects unless the
    /// current state is `Ready`. A `Ready` plugin rejects an unusable config
    /// with [`PluginError::InvalidConfig`] and stays `Ready`. Must be called
    /// from within a tokio runtime.
    pub fn trigger_start(&self, config: Config) -> PluginResult<()> {
        self.executor.lifecycle().update(|status| {
            if status.state != RunState::Ready {
                return Err(PluginError::NotReady {
                    state: status.state,
                });
            }
            config
                .validate()
                .map_err(|message| PluginError::InvalidConfig { message })?;
            *status = Status::new(RunState::Running, "Scan accepted");
            Ok(())
        })
        .map_err(|e| {
            warn!("Rejected configuration: {}", e);
            e
        })?;

        info!(
            "Configuration accepted; launching scan (output: {})",
            config.output_file
        );

        // Only the caller that won the transition above gets here
        let executor = Arc::clone(&self.executor);
        let handle = tokio::spawn(run_to_completion(executor, config));
        *self.lock_task() = Some(handle);
        Ok(())
    }

    /// Forward a stop request on its own task; always accepted
    pub fn trigger_stop(&self, signal: StopSignal) {
        debug!("Dispatching stop request {:?}", signal);
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move { executor.stop(signal).await });
    }

    /// Stop an in-flight scan and give it up to `grace` to settle
    pub async fn shutdown(&self, grace: Duration) {
        let Some(handle) = self.lock_task().take() else {
            return;
        };
        if handle.is_finished() || self.status().state.is_terminal() {
            return;
        }

        info!("Stopping in-flight scan before exit (grace: {:?})", grace);
        self.executor
            .stop(StopSignal {
                timeout_seconds: Some(grace.as_secs()),
            })
            .await;

        // The executor abandons the scan once `grace` runs out; allow it to record that
        match tokio::time::timeout(grace + SETTLE_MARGIN, handle).await {
            Ok(_) => info!("Scan settled as {}", self.status().state),
            Err(_) => warn!("Scan did not stop within {:?}; abandoning it", grace),
        }
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.scan_task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body of the scan task
///
/// A panic escaping the executor must not leave the plugin `Running`
/// forever, so it is recorded as `Failed` here.
async fn run_to_completion(executor: Arc<dyn ScanExecutor>, config: Config) {
    let outcome = AssertUnwindSafe(executor.start(config)).catch_unwind().await;

    if outcome.is_err() {
        error!("Executor panicked while scanning");
        executor.lifecycle().update(|status| {
            if status.state == RunState::Running {
                *status = Status::new(RunState::Failed, "Scan failed: executor panicked");
            }
        });
    }
}
