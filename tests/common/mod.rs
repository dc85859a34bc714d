//! Shared helpers for the control surface integration tests
//!
//! Each test gets its own plugin served on an ephemeral loopback port and a
//! `reqwest` client pointed at it.

#![allow(dead_code)]

use scanplugin::plugin::api::{
    Config, Dispatcher, Finding, FindingKind, Metadata, RunState, ScanError, ScanReport,
    ScanResult, Scanner, ScannerExecutor, Status, StopListener,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

/// Scanner that holds every scan until the test releases it
pub struct GatedScanner {
    gate: Arc<Semaphore>,
    fail: bool,
}

#[async_trait::async_trait]
impl Scanner for GatedScanner {
    fn metadata(&self) -> Metadata {
        Metadata {
            name: "gated".to_string(),
            version: "2.3.4".to_string(),
            // Must never reach the host
            api_version: Some("0.0.0-scanner".to_string()),
        }
    }

    async fn scan(&self, _config: &Config, mut stop: StopListener) -> ScanResult<ScanReport> {
        tokio::select! {
            permit = self.gate.acquire() => {
                permit
                    .map_err(|_| ScanError::Failed { message: "gate closed".to_string() })?
                    .forget();
            }
            _ = stop.stopped() => return Err(ScanError::Cancelled),
        }

        if self.fail {
            return Err(ScanError::Failed {
                message: "engine crashed".to_string(),
            });
        }

        let mut report = ScanReport::begin(self.metadata());
        report.push(Finding::new(
            FindingKind::Secret,
            "app/.env:3",
            "Possible aws-access-key-id committed in plain text",
        ));
        Ok(report.finish())
    }
}

pub struct TestPlugin {
    pub base_url: String,
    pub client: reqwest::Client,
    pub dispatcher: Arc<Dispatcher>,
    gate: Arc<Semaphore>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<std::io::Result<()>>>,
}

impl TestPlugin {
    /// Plugin that is `Ready` and whose scans succeed once released
    pub async fn ready() -> Self {
        Self::spawn(false, true).await
    }

    /// Plugin whose scans fail once released
    pub async fn failing() -> Self {
        Self::spawn(true, true).await
    }

    /// Plugin whose scanner never finishes initializing
    pub async fn not_ready() -> Self {
        Self::spawn(false, false).await
    }

    async fn spawn(fail: bool, ready: bool) -> Self {
        let gate = Arc::new(Semaphore::new(0));
        let scanner = Box::new(GatedScanner {
            gate: gate.clone(),
            fail,
        });
        let executor = if ready {
            ScannerExecutor::ready(scanner)
        } else {
            ScannerExecutor::new(scanner)
        };
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(executor)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(scanplugin::server::serve(
            listener,
            dispatcher.clone(),
            async move {
                let _ = shutdown_rx.await;
            },
        ));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("build HTTP client");

        Self {
            base_url,
            client,
            dispatcher,
            gate,
            shutdown: Some(shutdown_tx),
            server: Some(server),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Let one held scan proceed
    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST request")
    }

    pub async fn configure(&self, output_file: &str) -> reqwest::Response {
        self.post_json("/config", &serde_json::json!({ "outputFile": output_file }))
            .await
    }

    pub async fn status(&self) -> Status {
        let resp = self.get("/status").await;
        assert_eq!(resp.status(), 200);
        resp.json().await.expect("parse status")
    }

    /// Poll `/status` until `state` is reached
    pub async fn wait_for_state(&self, state: RunState) -> Status {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let status = self.status().await;
            if status.state == state {
                return status;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {}, last status {:?}",
                state,
                status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stop serving and wait for the server task to finish
    pub async fn shutdown(mut self) -> std::io::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.server.take() {
            Some(server) => server.await.expect("server task"),
            None => Ok(()),
        }
    }
}

impl Drop for TestPlugin {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
