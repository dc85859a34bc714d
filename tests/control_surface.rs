//! Control surface integration tests
//!
//! Exercises the five protocol endpoints over real loopback HTTP.

mod common;

use common::TestPlugin;
use scanplugin::plugin::api::{RunState, ScanReport};
use std::time::Duration;
use tempfile::TempDir;

fn output_path(dir: &TempDir) -> String {
    dir.path().join("result.json").to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_full_scan_lifecycle() {
    let plugin = TestPlugin::ready().await;
    let dir = TempDir::new().unwrap();
    let output = output_path(&dir);

    assert_eq!(plugin.get("/healthz").await.status(), 200);
    assert_eq!(plugin.status().await.state, RunState::Ready);

    let resp = plugin.configure(&output).await;
    assert_eq!(resp.status(), 201);
    assert!(resp.bytes().await.unwrap().is_empty());

    // Accepted means Running, even though the scan is still held
    let status = plugin.status().await;
    assert_eq!(status.state, RunState::Running);

    plugin.release();
    let status = plugin.wait_for_state(RunState::Done).await;
    assert!(!status.message.is_empty());

    let report: ScanReport =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(report.scanner.name, "gated");
    assert_eq!(report.findings.len(), 1);

    plugin.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_metadata_reports_protocol_version() {
    let plugin = TestPlugin::ready().await;

    let resp = plugin.get("/metadata").await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();

    assert_eq!(body["name"], "gated");
    assert_eq!(body["version"], "2.3.4");
    assert_eq!(body["apiVersion"], scanplugin::core::version::api_version());
}

#[tokio::test]
async fn test_metadata_and_status_served_while_not_ready() {
    let plugin = TestPlugin::not_ready().await;

    assert_eq!(plugin.get("/healthz").await.status(), 503);
    assert_eq!(plugin.get("/metadata").await.status(), 200);

    let status = plugin.status().await;
    assert_eq!(status.state, RunState::NotReady);
    assert!(!status.message.is_empty());
}

#[tokio::test]
async fn test_configure_rejected_while_not_ready() {
    let plugin = TestPlugin::not_ready().await;
    let dir = TempDir::new().unwrap();

    let resp = plugin.configure(&output_path(&dir)).await;

    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(!body["message"].as_str().unwrap().is_empty());
    assert_eq!(plugin.status().await.state, RunState::NotReady);
}

#[tokio::test]
async fn test_second_configure_conflicts_and_leaves_running() {
    let plugin = TestPlugin::ready().await;
    let dir = TempDir::new().unwrap();
    let output = output_path(&dir);

    assert_eq!(plugin.configure(&output).await.status(), 201);
    let resp = plugin.configure(&output).await;

    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("Running"));
    assert_eq!(plugin.status().await.state, RunState::Running);

    plugin.release();
    plugin.wait_for_state(RunState::Done).await;

    // Terminal states never accept another job
    assert_eq!(plugin.configure(&output).await.status(), 409);
    assert_eq!(plugin.status().await.state, RunState::Done);
}

#[tokio::test]
async fn test_concurrent_configures_accept_exactly_one() {
    let plugin = TestPlugin::ready().await;
    let dir = TempDir::new().unwrap();
    let output = output_path(&dir);

    let attempts = (0..16).map(|_| plugin.configure(&output));
    let codes: Vec<u16> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|resp| resp.status().as_u16())
        .collect();

    assert_eq!(codes.iter().filter(|c| **c == 201).count(), 1, "{:?}", codes);
    assert_eq!(codes.iter().filter(|c| **c == 409).count(), 15, "{:?}", codes);

    plugin.release();
    plugin.wait_for_state(RunState::Done).await;
}

#[tokio::test]
async fn test_failed_scan_is_healthy_and_terminal() {
    let plugin = TestPlugin::failing().await;
    let dir = TempDir::new().unwrap();
    let output = output_path(&dir);

    assert_eq!(plugin.configure(&output).await.status(), 201);
    plugin.release();

    let status = plugin.wait_for_state(RunState::Failed).await;
    assert!(status.message.contains("engine crashed"));
    assert!(!std::path::Path::new(&output).exists());

    // Only NotReady is unhealthy
    assert_eq!(plugin.get("/healthz").await.status(), 200);
    assert_eq!(plugin.configure(&output).await.status(), 409);
}

#[tokio::test]
async fn test_stop_accepted_with_or_without_body() {
    let plugin = TestPlugin::ready().await;

    let resp = plugin.post_json("/stop", &serde_json::json!({})).await;
    assert_eq!(resp.status(), 201);

    // No body at all
    let resp = plugin.client.post(plugin.url("/stop")).send().await.unwrap();
    assert_eq!(resp.status(), 201);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(plugin.status().await.state, RunState::Ready);
}

#[tokio::test]
async fn test_malformed_stop_is_rejected_and_scan_keeps_running() {
    let plugin = TestPlugin::ready().await;
    let dir = TempDir::new().unwrap();
    let output = output_path(&dir);
    assert_eq!(plugin.configure(&output).await.status(), 201);

    let resp = plugin
        .client
        .post(plugin.url("/stop"))
        .body("{ not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(!body["message"].as_str().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(plugin.status().await.state, RunState::Running);

    plugin.release();
    plugin.wait_for_state(RunState::Done).await;
    assert!(std::path::Path::new(&output).exists());
}

#[tokio::test]
async fn test_stop_cancels_running_scan() {
    let plugin = TestPlugin::ready().await;
    let dir = TempDir::new().unwrap();

    assert_eq!(plugin.configure(&output_path(&dir)).await.status(), 201);
    let resp = plugin
        .post_json("/stop", &serde_json::json!({ "timeoutSeconds": 5 }))
        .await;
    assert_eq!(resp.status(), 201);

    let status = plugin.wait_for_state(RunState::Failed).await;
    assert!(status.message.contains("stopped"), "{}", status.message);

    // Stop after the scan ended changes nothing
    assert_eq!(
        plugin.post_json("/stop", &serde_json::json!({})).await.status(),
        201
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(plugin.status().await.state, RunState::Failed);
}

#[tokio::test]
async fn test_malformed_configuration_is_bad_request() {
    let plugin = TestPlugin::ready().await;

    let resp = plugin
        .client
        .post(plugin.url("/config"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(!body["message"].as_str().unwrap().is_empty());

    // Well-formed but missing outputFile
    let resp = plugin
        .post_json("/config", &serde_json::json!({ "inputDir": "/asset" }))
        .await;
    assert_eq!(resp.status(), 400);

    // Well-formed but unusable while Ready
    let resp = plugin
        .post_json("/config", &serde_json::json!({ "outputFile": "" }))
        .await;
    assert_eq!(resp.status(), 400);

    assert_eq!(plugin.status().await.state, RunState::Ready);
}

#[tokio::test]
async fn test_any_decodable_configure_conflicts_while_running() {
    let plugin = TestPlugin::ready().await;
    let dir = TempDir::new().unwrap();
    assert_eq!(plugin.configure(&output_path(&dir)).await.status(), 201);

    for body in [
        serde_json::json!({ "outputFile": "" }),
        serde_json::json!({ "outputFile": "/x.json", "scannerConfig": "{bad" }),
    ] {
        let resp = plugin.post_json("/config", &body).await;
        assert_eq!(resp.status(), 409, "body {}", body);
        let reply: serde_json::Value = resp.json().await.unwrap();
        assert!(!reply["message"].as_str().unwrap().is_empty());
    }
    assert_eq!(plugin.status().await.state, RunState::Running);

    plugin.release();
    plugin.wait_for_state(RunState::Done).await;
}

#[tokio::test]
async fn test_snake_case_configuration_is_accepted() {
    let plugin = TestPlugin::ready().await;
    let dir = TempDir::new().unwrap();
    let output = output_path(&dir);

    let resp = plugin
        .post_json(
            "/config",
            &serde_json::json!({ "output_file": output, "input_dir": "/asset" }),
        )
        .await;

    assert_eq!(resp.status(), 201);
    plugin.release();
    plugin.wait_for_state(RunState::Done).await;
    assert!(std::path::Path::new(&output).exists());
}

#[tokio::test]
async fn test_status_wire_format() {
    let plugin = TestPlugin::ready().await;

    let body: serde_json::Value = plugin.get("/status").await.json().await.unwrap();

    assert_eq!(body["state"], "Ready");
    assert!(body["message"].is_string());
    assert!(body["lastTransitionTime"].is_string());
}
