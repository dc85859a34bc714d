//! Directory traversal shared by the builtin scanners

use crate::plugin::error::{ScanError, ScanResult};
use crate::plugin::stop::StopListener;
use std::path::{Path, PathBuf};

/// A regular file found under the scan root
#[derive(Debug, Clone, PartialEq)]
pub struct WalkedFile {
    pub path: PathBuf,
    /// Path relative to the scan root, always `/`-separated
    pub relative: String,
    pub size: u64,
}

/// Compile user-supplied exclusion globs
pub fn compile_excludes(patterns: &[String]) -> ScanResult<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| ScanError::InvalidScannerConfig {
                message: format!("invalid exclude pattern '{}': {}", p, e),
            })
        })
        .collect()
}

fn is_excluded(relative: &str, excludes: &[glob::Pattern]) -> bool {
    let file_name = relative.rsplit('/').next().unwrap_or(relative);
    excludes
        .iter()
        .any(|pattern| pattern.matches(relative) || pattern.matches(file_name))
}

/// Collect every regular file under `root`, depth first
///
/// Symlinks are not followed. Excluded directories are not descended into.
/// Returns `ScanError::Cancelled` as soon as a stop is observed.
pub async fn walk_files(
    root: &Path,
    excludes: &[glob::Pattern],
    stop: &StopListener,
) -> ScanResult<Vec<WalkedFile>> {
    let mut files = Vec::new();
    let mut pending = vec![(root.to_path_buf(), String::new())];

    while let Some((dir, prefix)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ScanError::io(&dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ScanError::io(&dir, e))?
        {
            if stop.is_stopped() {
                return Err(ScanError::Cancelled);
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix, name)
            };
            if is_excluded(&relative, excludes) {
                continue;
            }

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| ScanError::io(entry.path(), e))?;
            if file_type.is_dir() {
                pending.push((entry.path(), relative));
            } else if file_type.is_file() {
                let size = entry
                    .metadata()
                    .await
                    .map_err(|e| ScanError::io(entry.path(), e))?
                    .len();
                files.push(WalkedFile {
                    path: entry.path(),
                    relative,
                    size,
                });
            }
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
