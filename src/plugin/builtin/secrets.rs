//! Secrets scanner
//!
//! Line-oriented regex matching for credentials committed to a tree. Rules
//! are compiled once in `initialize`, so the plugin only reports `Ready`
//! after they are usable.

use crate::builtin;
use crate::plugin::builtin::parse_options;
use crate::plugin::builtin::walk::{compile_excludes, walk_files};
use crate::plugin::error::{ScanError, ScanResult};
use crate::plugin::report::{Finding, FindingKind, ScanReport};
use crate::plugin::stop::StopListener;
use crate::plugin::traits::Scanner;
use crate::plugin::types::{Config, Metadata};
use log::{debug, trace};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

builtin!(
    "secrets",
    "Detects credentials and private keys in plain-text files",
    SecretsScanner::boxed
);

const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Bytes inspected when deciding whether a file is binary
const BINARY_SNIFF_LEN: usize = 8000;

const RULES: &[(&str, &str)] = &[
    ("aws-access-key-id", r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b"),
    (
        "private-key",
        r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |PGP |ENCRYPTED )?PRIVATE KEY(?: BLOCK)?-----",
    ),
    ("github-token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b"),
    ("slack-token", r"\bxox[abprs]-[A-Za-z0-9-]{10,}"),
    (
        "generic-credential",
        r#"(?i)\b(?:password|passwd|secret|api[_-]?key|access[_-]?token)\b\s*[:=]\s*["']?([^\s"']{8,})"#,
    ),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SecretsOptions {
    max_file_size: u64,
    exclude: Vec<String>,
}

impl Default for SecretsOptions {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            exclude: Vec::new(),
        }
    }
}

struct Rule {
    id: &'static str,
    pattern: Regex,
}

#[derive(Default)]
pub struct SecretsScanner {
    rules: OnceLock<Vec<Rule>>,
}

impl SecretsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed() -> Box<dyn Scanner> {
        Box::new(Self::new())
    }

    fn rules(&self) -> ScanResult<&[Rule]> {
        self.rules
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| ScanError::Failed {
                message: "secrets rules have not been loaded".to_string(),
            })
    }
}

/// Keep enough of a match to recognise it without echoing the secret
fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

#[async_trait::async_trait]
impl Scanner for SecretsScanner {
    fn metadata(&self) -> Metadata {
        Metadata::new("secrets", env!("CARGO_PKG_VERSION"))
    }

    async fn initialize(&self) -> ScanResult<()> {
        if self.rules.get().is_some() {
            return Ok(());
        }
        let rules = RULES
            .iter()
            .map(|&(id, pattern)| {
                Regex::new(pattern)
                    .map(|pattern| Rule { id, pattern })
                    .map_err(|e| ScanError::Failed {
                        message: format!("rule '{}' does not compile: {}", id, e),
                    })
            })
            .collect::<ScanResult<Vec<_>>>()?;
        debug!("Loaded {} secrets rules", rules.len());
        let _ = self.rules.set(rules);
        Ok(())
    }

    async fn scan(&self, config: &Config, stop: StopListener) -> ScanResult<ScanReport> {
        let rules = self.rules()?;
        let options: SecretsOptions = parse_options(config.scanner_config.as_deref())?;
        let excludes = compile_excludes(&options.exclude)?;

        let mut report = ScanReport::begin(self.metadata());
        let root = config.input_path();
        let files = walk_files(&root, &excludes, &stop).await?;

        let mut scanned = 0usize;
        let mut skipped = 0usize;
        for file in &files {
            if stop.is_stopped() {
                return Err(ScanError::Cancelled);
            }
            if file.size > options.max_file_size {
                trace!("Skipping {} ({} bytes)", file.relative, file.size);
                skipped += 1;
                continue;
            }

            let bytes = tokio::fs::read(&file.path)
                .await
                .map_err(|e| ScanError::io(&file.path, e))?;
            if bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0) {
                skipped += 1;
                continue;
            }
            scanned += 1;

            let text = String::from_utf8_lossy(&bytes);
            for (index, line) in text.lines().enumerate() {
                for rule in rules {
                    let Some(captures) = rule.pattern.captures(line) else {
                        continue;
                    };
                    let matched = captures
                        .get(1)
                        .or_else(|| captures.get(0))
                        .map_or("", |m| m.as_str());
                    report.push(
                        Finding::new(
                            FindingKind::Secret,
                            format!("{}:{}", file.relative, index + 1),
                            format!("Possible {} committed in plain text", rule.id),
                        )
                        .with_details(serde_json::json!({
                            "rule": rule.id,
                            "match": redact(matched),
                        })),
                    );
                }
            }
        }

        report.annotate("root", root.display());
        report.annotate("filesScanned", scanned);
        report.annotate("filesSkipped", skipped);
        Ok(report.finish())
    }
}
