//! File inventory scanner
//!
//! Records every regular file under the input directory with its size and,
//! unless disabled, a SHA-256 digest of its contents.

use crate::builtin;
use crate::plugin::builtin::parse_options;
use crate::plugin::builtin::walk::{compile_excludes, walk_files};
use crate::plugin::error::{ScanError, ScanResult};
use crate::plugin::report::{Finding, FindingKind, ScanReport};
use crate::plugin::stop::StopListener;
use crate::plugin::traits::Scanner;
use crate::plugin::types::{Config, Metadata};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;

const HASH_CHUNK_SIZE: usize = 64 * 1024;

builtin!(
    "files",
    "Inventories files with their sizes and SHA-256 digests",
    FilesScanner::boxed
);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FilesOptions {
    hash_contents: bool,
    exclude: Vec<String>,
}

impl Default for FilesOptions {
    fn default() -> Self {
        Self {
            hash_contents: true,
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct FilesScanner;

impl FilesScanner {
    pub fn boxed() -> Box<dyn Scanner> {
        Box::new(Self)
    }
}

#[async_trait::async_trait]
impl Scanner for FilesScanner {
    fn metadata(&self) -> Metadata {
        Metadata::new("files", env!("CARGO_PKG_VERSION"))
    }

    async fn scan(&self, config: &Config, stop: StopListener) -> ScanResult<ScanReport> {
        let options: FilesOptions = parse_options(config.scanner_config.as_deref())?;
        let excludes = compile_excludes(&options.exclude)?;

        let mut report = ScanReport::begin(self.metadata());
        let root = config.input_path();
        let files = walk_files(&root, &excludes, &stop).await?;

        let mut total_bytes = 0u64;
        for file in &files {
            if stop.is_stopped() {
                return Err(ScanError::Cancelled);
            }

            let mut details = serde_json::json!({ "size": file.size });
            if options.hash_contents {
                details["sha256"] = sha256_file(&file.path, &stop).await?.into();
            }
            total_bytes += file.size;

            report.push(
                Finding::new(FindingKind::InfoFinder, file.relative.clone(), "Regular file")
                    .with_details(details),
            );
        }

        report.annotate("root", root.display());
        report.annotate("fileCount", files.len());
        report.annotate("totalBytes", total_bytes);
        Ok(report.finish())
    }
}

/// Hex SHA-256 of the file at `path`, read in fixed-size chunks
async fn sha256_file(path: &Path, stop: &StopListener) -> ScanResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ScanError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        if stop.is_stopped() {
            return Err(ScanError::Cancelled);
        }
        let n = file.read(&mut buf).await.map_err(|e| ScanError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
