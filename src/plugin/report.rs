//! Scan report written out-of-band to `Config::output_file`
//!
//! The control protocol treats the report as an opaque JSON document; the
//! shape here is what the builtin scanners produce and what the host reads
//! back once it observes `Done`.

use crate::plugin::error::{ScanError, ScanResult};
use crate::plugin::types::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Finding families a scanner can report
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum FindingKind {
    Exploit,
    InfoFinder,
    Malware,
    Misconfiguration,
    Package,
    Rootkit,
    Secret,
    Vulnerability,
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub kind: FindingKind,
    /// Where the finding was made, usually `path` or `path:line`
    pub location: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl Finding {
    pub fn new(kind: FindingKind, location: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
            summary: summary.into(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// The result document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scanner: Metadata,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Scanner-native JSON output, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_json: Option<serde_json::Value>,
    /// Scanner-native SARIF output, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_sarif: Option<serde_json::Value>,
    #[serde(default)]
    pub findings: Vec<Finding>,
}

impl ScanReport {
    /// Empty report for a scan that starts now
    pub fn begin(scanner: Metadata) -> Self {
        let now = Utc::now();
        Self {
            scanner,
            started_at: now,
            finished_at: now,
            annotations: BTreeMap::new(),
            raw_json: None,
            raw_sarif: None,
            findings: Vec::new(),
        }
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: impl ToString) {
        self.annotations.insert(key.into(), value.to_string());
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Stamp the finish time
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Findings per family, for annotations and logging
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.kind.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Write the report as one JSON document at `path`
    ///
    /// The document is written next to the destination and renamed into
    /// place, so `path` either does not exist or holds a complete report.
    pub async fn export(&self, path: impl AsRef<Path>) -> ScanResult<()> {
        let path = path.as_ref();
        let bytes = serde_json::to_vec_pretty(self).map_err(|e| ScanError::Export {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        stage_then_rename(path, move |staging| async move {
            tokio::fs::write(&staging, bytes)
                .await
                .map_err(|e| ScanError::io(&staging, e))
        })
        .await
    }
}

/// Produce the staging file with `write`, then rename it over `path`
///
/// Whichever step fails, the staging file is removed.
async fn stage_then_rename<W, F>(path: &Path, write: W) -> ScanResult<()>
where
    W: FnOnce(PathBuf) -> F,
    F: Future<Output = ScanResult<()>>,
{
    let staging = staging_path(path);
    let committed = match write(staging.clone()).await {
        Ok(()) => tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| ScanError::io(path, e)),
        Err(e) => Err(e),
    };

    if committed.is_err() {
        let _ = tokio::fs::remove_file(&staging).await;
    }
    committed
}

fn staging_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.json".to_string());
    path.with_file_name(format!(".{}.partial", file_name))
}
