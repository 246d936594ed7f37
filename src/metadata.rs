//! # Metadata Marker Store
//!
//! Adapter verso il tool di metadata embedded (exiftool) per leggere e
//! scrivere il marker di idempotenza nel campo Comment dei file.
//!
//! ## Responsabilità:
//! - Lettura BULK dei marker: una invocazione batched per run, mai una
//!   chiamata per file
//! - Scrittura del marker su un singolo file dopo un transform riuscito
//! - Fail-open sulla lettura: un marker illeggibile vale `Tier::None` e il
//!   file viene rielaborato invece di far fallire il run
//!
//! La scrittura NON è fail-open: un errore di stamp è un errore del job.

use crate::error::OptimizeError;
use crate::marker::Tier;
use crate::platform::PlatformCommands;
use crate::utils::to_string_vec;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Cap on paths per exiftool invocation, bounding command-line length.
const READ_CHUNK: usize = 256;

/// Get/set contract over the embedded idempotence marker.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Bulk-read markers for many files in a bounded number of external
    /// invocations. Files missing from the result carry no marker.
    async fn read_markers(&self, paths: &[PathBuf]) -> HashMap<PathBuf, Tier>;

    /// Write (overwrite) the marker on one file.
    async fn write_marker(&self, path: &Path, tier: Tier) -> Result<()>;
}

/// One record of `exiftool -json` output.
#[derive(Debug, Deserialize)]
struct CommentEntry {
    #[serde(rename = "SourceFile")]
    source_file: PathBuf,
    #[serde(rename = "Comment")]
    comment: Option<String>,
}

/// Parse the JSON document exiftool emits for a batch read.
fn parse_comment_entries(json: &str) -> Result<Vec<(PathBuf, Tier)>> {
    let entries: Vec<CommentEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|e| (e.source_file, Tier::from_tag(e.comment.as_deref())))
        .collect())
}

/// exiftool-backed marker store.
pub struct ExifToolMarkerStore;

impl ExifToolMarkerStore {
    pub fn new() -> Self {
        Self
    }

    async fn read_chunk(&self, chunk: &[PathBuf]) -> Option<Vec<(PathBuf, Tier)>> {
        let platform = PlatformCommands::instance();
        let mut args = to_string_vec(["-json", "-Comment", "-q"]);
        args.extend(chunk.iter().map(|p| p.to_string_lossy().into_owned()));

        let output = exiftool_command(platform).args(&args).output().await;

        match output {
            Ok(output) => {
                // exiftool exits nonzero when any file in the batch is
                // unreadable but still emits records for the rest; parse
                // whatever came back.
                match parse_comment_entries(&String::from_utf8_lossy(&output.stdout)) {
                    Ok(entries) => Some(entries),
                    Err(e) => {
                        warn!("Unparseable exiftool output, treating chunk as unmarked: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("exiftool batch read failed, treating chunk as unmarked: {}", e);
                None
            }
        }
    }
}

impl Default for ExifToolMarkerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn exiftool_command(platform: &PlatformCommands) -> tokio::process::Command {
    tokio::process::Command::new(platform.get_command("exiftool"))
}

#[async_trait]
impl MarkerStore for ExifToolMarkerStore {
    async fn read_markers(&self, paths: &[PathBuf]) -> HashMap<PathBuf, Tier> {
        let mut markers = HashMap::with_capacity(paths.len());

        for chunk in paths.chunks(READ_CHUNK) {
            if let Some(entries) = self.read_chunk(chunk).await {
                markers.extend(entries);
            }
        }

        debug!(
            "Bulk marker read: {} of {} files carry a marker",
            markers.values().filter(|t| **t != Tier::None).count(),
            paths.len()
        );
        markers
    }

    async fn write_marker(&self, path: &Path, tier: Tier) -> Result<()> {
        let tag = tier.as_tag().ok_or_else(|| {
            OptimizeError::Metadata(format!("refusing to stamp tier 'none' on {}", path.display()))
        })?;

        let platform = PlatformCommands::instance();
        let args = to_string_vec([
            "-overwrite_original",
            &format!("-Comment={}", tag),
            "-q",
            &path.to_string_lossy(),
        ]);

        let status = exiftool_command(platform).args(&args).status().await?;

        if !status.success() {
            return Err(OptimizeError::Metadata(format!(
                "exiftool failed to stamp {} on {}",
                tag,
                path.display()
            ))
            .into());
        }

        debug!("Stamped {} on {}", tag, path.display());
        Ok(())
    }
}

/// In-memory marker store used as a test double across the crate.
#[cfg(test)]
pub struct MemoryMarkerStore {
    markers: std::sync::Mutex<HashMap<PathBuf, Tier>>,
}

#[cfg(test)]
impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self {
            markers: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_markers(entries: impl IntoIterator<Item = (PathBuf, Tier)>) -> Self {
        Self {
            markers: std::sync::Mutex::new(entries.into_iter().collect()),
        }
    }

    pub fn marker_for(&self, path: &Path) -> Tier {
        self.markers
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn read_markers(&self, paths: &[PathBuf]) -> HashMap<PathBuf, Tier> {
        let markers = self.markers.lock().unwrap();
        paths
            .iter()
            .filter_map(|p| markers.get(p).map(|t| (p.clone(), *t)))
            .collect()
    }

    async fn write_marker(&self, path: &Path, tier: Tier) -> Result<()> {
        self.markers.lock().unwrap().insert(path.to_path_buf(), tier);
        Ok(())
    }
}
