//! Scanner Executor
//!
//! Adapts a [`Scanner`] to the [`ScanExecutor`] capability set. This is the
//! boundary where everything that can go wrong during a scan (scanner
//! errors, timeouts, stop requests, panics, failing to persist the report)
//! is turned into a `Failed` status instead of an error.

use crate::plugin::error::{PluginError, PluginResult, ScanError, ScanResult};
use crate::plugin::report::ScanReport;
use crate::plugin::state::LifecycleState;
use crate::plugin::stop::{StopListener, StopSender};
use crate::plugin::traits::{ScanExecutor, Scanner};
use crate::plugin::types::{Config, Metadata, RunState, Status, StopSignal};
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::panic::AssertUnwindSafe;
use std::time::Duration;

pub struct ScannerExecutor {
    scanner: Box<dyn Scanner>,
    lifecycle: LifecycleState,
    stop: StopSender,
}

impl std::fmt::Debug for ScannerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerExecutor")
            .field("scanner", &self.scanner.metadata().name)
            .field("status", &self.lifecycle.get())
            .field("stop_requested", &self.stop.is_requested())
            .finish()
    }
}

impl ScannerExecutor {
    /// Executor that starts `NotReady` until [`initialize`](Self::initialize) succeeds
    pub fn new(scanner: Box<dyn Scanner>) -> Self {
        Self {
            scanner,
            lifecycle: LifecycleState::not_ready("Initializing scanner..."),
            stop: StopSender::new(),
        }
    }

    /// Executor that is `Ready` immediately
    pub fn ready(scanner: Box<dyn Scanner>) -> Self {
        Self {
            scanner,
            lifecycle: LifecycleState::ready("Scanner is ready"),
            stop: StopSender::new(),
        }
    }

    /// Run the scanner's own initialization and move `NotReady` to `Ready`
    pub async fn initialize(&self) -> PluginResult<()> {
        let name = self.scanner.metadata().name;
        debug!("Initializing scanner '{}'", name);

        self.scanner
            .initialize()
            .await
            .map_err(|e| PluginError::Initialization {
                scanner: name.clone(),
                cause: e.to_string(),
            })?;

        let promoted = self.lifecycle.update(|status| {
            if status.state == RunState::NotReady {
                *status = Status::new(RunState::Ready, "Scanner is ready");
                true
            } else {
                false
            }
        });
        if promoted {
            info!("Scanner '{}' is ready", name);
        }
        Ok(())
    }

    async fn run_scan(&self, config: &Config) -> ScanResult<ScanReport> {
        let stop = self.stop.listener();
        let scan = AssertUnwindSafe(self.scanner.scan(config, stop.clone())).catch_unwind();
        let bounded = async {
            tokio::select! {
                outcome = scan => outcome,
                () = abandon_after_grace(stop) => Ok(Err(ScanError::Cancelled)),
            }
        };

        let outcome = match config.timeout() {
            Some(limit) => tokio::time::timeout(limit, bounded)
                .await
                .map_err(|_| ScanError::TimedOut {
                    seconds: limit.as_secs(),
                })?,
            None => bounded.await,
        };

        outcome.map_err(|payload| ScanError::Panicked {
            message: panic_message(payload.as_ref()),
        })?
    }
}

/// Resolve once a stop carrying a grace period has waited that long
///
/// A stop without a grace period leaves the scanner to wind down on its own.
async fn abandon_after_grace(mut stop: StopListener) {
    stop.stopped().await;
    match stop.grace() {
        Some(grace) => {
            tokio::time::sleep(grace).await;
            warn!("Scanner did not stop within {:?}; abandoning the scan", grace);
        }
        None => std::future::pending::<()>().await,
    }
}

#[async_trait::async_trait]
impl ScanExecutor for ScannerExecutor {
    fn metadata(&self) -> Metadata {
        self.scanner.metadata()
    }

    fn lifecycle(&self) -> &LifecycleState {
        &self.lifecycle
    }

    async fn start(&self, config: Config) {
        let name = self.scanner.metadata().name;
        self.set_status(Status::new(RunState::Running, "Scanner is running..."));
        info!(
            "Scanner '{}' is running (input: {}, output: {})",
            name,
            config.input_path().display(),
            config.output_file
        );

        let outcome = match self.run_scan(&config).await {
            Ok(report) => report
                .export(&config.output_file)
                .await
                .map(|()| report),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                info!(
                    "Scanner '{}' finished running: {} findings {:?}",
                    name,
                    report.findings.len(),
                    report.counts()
                );
                self.set_status(Status::new(RunState::Done, "Scanner finished running."));
            }
            Err(e) => {
                error!("Scanner '{}' failed: {}", name, e);
                self.set_status(Status::new(RunState::Failed, format!("Scan failed: {}", e)));
            }
        }
    }

    async fn stop(&self, signal: StopSignal) {
        let state = self.status().state;
        if state.is_terminal() {
            debug!("Stop requested after the scan ended as {}; ignoring", state);
            return;
        }
        if state != RunState::Running {
            debug!("Stop requested while {}; nothing to stop", state);
            return;
        }

        let grace = signal.timeout_seconds.map(Duration::from_secs);
        warn!(
            "Stop requested for scanner '{}' (grace: {:?})",
            self.scanner.metadata().name,
            grace
        );
        self.stop.request(grace);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::report::{Finding, FindingKind};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Scripted scanner behaviours
    enum Script {
        Succeed,
        Fail,
        Panic,
        WaitForStop,
        Sleep(Duration),
        FailInitialize,
    }

    struct ScriptedScanner {
        script: Script,
    }

    #[async_trait::async_trait]
    impl Scanner for ScriptedScanner {
        fn metadata(&self) -> Metadata {
            Metadata::new("scripted", "0.0.1")
        }

        async fn initialize(&self) -> ScanResult<()> {
            match self.script {
                Script::FailInitialize => Err(ScanError::Failed {
                    message: "rules database missing".to_string(),
                }),
                _ => Ok(()),
            }
        }

        async fn scan(&self, _config: &Config, mut stop: StopListener) -> ScanResult<ScanReport> {
            match &self.script {
                Script::Succeed | Script::FailInitialize => {
                    let mut report = ScanReport::begin(self.metadata());
                    report.push(Finding::new(FindingKind::Secret, "a.env:1", "token"));
                    Ok(report.finish())
                }
                Script::Fail => Err(ScanError::Failed {
                    message: "engine crashed".to_string(),
                }),
                Script::Panic => panic!("scanner bug"),
                Script::WaitForStop => {
                    stop.stopped().await;
                    Err(ScanError::Cancelled)
                }
                Script::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    Ok(ScanReport::begin(self.metadata()).finish())
                }
            }
        }
    }

    fn executor(script: Script) -> Arc<ScannerExecutor> {
        Arc::new(ScannerExecutor::ready(Box::new(ScriptedScanner { script })))
    }

    fn output_config(dir: &TempDir) -> Config {
        Config::new(dir.path().join("result.json").to_string_lossy().into_owned())
    }

    #[tokio::test]
    async fn test_successful_scan_writes_report_and_is_done() {
        let dir = TempDir::new().unwrap();
        let config = output_config(&dir);
        let executor = executor(Script::Succeed);

        executor.start(config.clone()).await;

        let status = executor.status();
        assert_eq!(status.state, RunState::Done);
        let contents = std::fs::read_to_string(&config.output_file).unwrap();
        let report: ScanReport = serde_json::from_str(&contents).unwrap();
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.scanner.name, "scripted");
    }

    #[tokio::test]
    async fn test_scanner_error_is_recorded_as_failed() {
        let dir = TempDir::new().unwrap();
        let config = output_config(&dir);
        let executor = executor(Script::Fail);

        executor.start(config.clone()).await;

        let status = executor.status();
        assert_eq!(status.state, RunState::Failed);
        assert!(status.message.contains("engine crashed"));
        assert!(!std::path::Path::new(&config.output_file).exists());
    }

    #[tokio::test]
    async fn test_scanner_panic_is_recorded_as_failed() {
        let dir = TempDir::new().unwrap();
        let executor = executor(Script::Panic);

        executor.start(output_config(&dir)).await;

        let status = executor.status();
        assert_eq!(status.state, RunState::Failed);
        assert!(status.message.contains("scanner bug"), "got {}", status.message);
    }

    #[tokio::test]
    async fn test_export_failure_is_recorded_as_failed() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(
            dir.path()
                .join("no-such-dir")
                .join("result.json")
                .to_string_lossy()
                .into_owned(),
        );
        let executor = executor(Script::Succeed);

        executor.start(config).await;

        let status = executor.status();
        assert_eq!(status.state, RunState::Failed);
        assert!(!status.message.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_is_recorded_as_failed() {
        let dir = TempDir::new().unwrap();
        let config = output_config(&dir).with_timeout_seconds(1);
        let executor = executor(Script::Sleep(Duration::from_secs(30)));

        executor.start(config).await;

        let status = executor.status();
        assert_eq!(status.state, RunState::Failed);
        assert!(status.message.contains("timed out after 1 seconds"));
    }

    #[tokio::test]
    async fn test_stop_cancels_cooperative_scan() {
        let dir = TempDir::new().unwrap();
        let executor = executor(Script::WaitForStop);

        let running = Arc::clone(&executor);
        let config = output_config(&dir);
        let task = tokio::spawn(async move { running.start(config).await });

        // Wait until the scan is in flight
        while executor.status().state != RunState::Running {
            tokio::task::yield_now().await;
        }
        executor.stop(StopSignal::default()).await;
        assert_eq!(
            executor.status().state,
            RunState::Running,
            "stop must not change the status by itself"
        );

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("scan should finish after stop")
            .unwrap();

        let status = executor.status();
        assert_eq!(status.state, RunState::Failed);
        assert!(status.message.contains("stopped"));
    }

    #[tokio::test]
    async fn test_stop_without_running_scan_is_noop() {
        let executor = executor(Script::WaitForStop);

        executor.stop(StopSignal::default()).await;

        assert_eq!(executor.status().state, RunState::Ready);
        assert!(!executor.stop.is_requested());
    }

    #[tokio::test]
    async fn test_stop_after_done_is_noop() {
        let dir = TempDir::new().unwrap();
        let executor = executor(Script::Succeed);
        executor.start(output_config(&dir)).await;

        executor
            .stop(StopSignal {
                timeout_seconds: Some(5),
            })
            .await;

        assert_eq!(executor.status().state, RunState::Done);
        assert!(!executor.stop.is_requested());
    }

    #[tokio::test]
    async fn test_stop_after_failure_is_noop() {
        let dir = TempDir::new().unwrap();
        let executor = executor(Script::Fail);
        executor.start(output_config(&dir)).await;

        executor.stop(StopSignal::default()).await;

        assert_eq!(executor.status().state, RunState::Failed);
        assert!(!executor.stop.is_requested());
    }

    #[tokio::test]
    async fn test_scan_ignoring_stop_is_abandoned_after_grace() {
        let dir = TempDir::new().unwrap();
        let config = output_config(&dir);
        let executor = executor(Script::Sleep(Duration::from_secs(30)));

        let running = Arc::clone(&executor);
        let task = tokio::spawn({
            let config = config.clone();
            async move { running.start(config).await }
        });
        while executor.status().state != RunState::Running {
            tokio::task::yield_now().await;
        }

        executor
            .stop(StopSignal {
                timeout_seconds: Some(1),
            })
            .await;

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("scan should be abandoned once the grace period ends")
            .unwrap();
        let status = executor.status();
        assert_eq!(status.state, RunState::Failed);
        assert!(status.message.contains("stopped"), "{}", status.message);
        assert!(!std::path::Path::new(&config.output_file).exists());
    }

    #[tokio::test]
    async fn test_stop_without_grace_waits_for_scanner() {
        let dir = TempDir::new().unwrap();
        let executor = executor(Script::Sleep(Duration::from_millis(300)));

        let running = Arc::clone(&executor);
        let config = output_config(&dir);
        let task = tokio::spawn(async move { running.start(config).await });
        while executor.status().state != RunState::Running {
            tokio::task::yield_now().await;
        }

        executor.stop(StopSignal::default()).await;
        task.await.unwrap();

        // The scanner ignored the stop and was allowed to finish
        assert_eq!(executor.status().state, RunState::Done);
    }

    #[tokio::test]
    async fn test_initialize_promotes_not_ready() {
        let executor = ScannerExecutor::new(Box::new(ScriptedScanner {
            script: Script::Succeed,
        }));
        assert_eq!(executor.status().state, RunState::NotReady);

        executor.initialize().await.unwrap();

        assert_eq!(executor.status().state, RunState::Ready);
    }

    #[tokio::test]
    async fn test_initialize_failure_leaves_not_ready() {
        let executor = ScannerExecutor::new(Box::new(ScriptedScanner {
            script: Script::FailInitialize,
        }));

        let err = executor.initialize().await.unwrap_err();

        assert!(matches!(err, PluginError::Initialization { .. }));
        assert!(err.to_string().contains("rules database missing"));
        assert_eq!(executor.status().state, RunState::NotReady);
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(&"static str"), "static str");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "unknown panic payload");
    }
}
