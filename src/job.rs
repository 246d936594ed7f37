//! # Pipeline Data Model
//!
//! Work item, job e risultato: value object immutabili che attraversano le
//! tre fasi select → dispatch → aggregate.
//!
//! ## Strutture dati:
//! - `WorkItem`: un file scoperto, con path relativo calcolato una sola volta
//! - `Job`: (work item, output path) sottomesso al dispatcher
//! - `JobResult`: esito per-file, scritto una volta da un solo worker
//!
//! Nessun job contiene riferimenti ad altri job; i risultati vengono
//! aggregati, mai dedupplicati (un solo job esiste per work item selezionato).

use crate::marker::Tier;
use std::path::PathBuf;

/// One discoverable image file, reconstructed fresh every run.
#[derive(Debug, Clone)]
pub struct WorkItem {
    /// Absolute path, immutable once discovered.
    pub absolute_path: PathBuf,
    /// Path relative to the enclosing input root, computed once at discovery
    /// (falls back to the bare file name when no root prefix matches). Used
    /// only for output path construction and reporting.
    pub relative_path: PathBuf,
    /// File size in bytes, read once per run.
    pub size_bytes: u64,
    /// Pixel dimensions from the bulk pre-read, when the probe resolved them.
    pub dimensions: Option<(u32, u32)>,
    /// Idempotence marker from the bulk pre-read.
    pub marker: Tier,
}

/// One unit of work submitted to the parallel dispatcher.
#[derive(Debug, Clone)]
pub struct Job {
    pub item: WorkItem,
    pub output_path: PathBuf,
}

/// Outcome status of a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Ok,
    Failed,
}

/// Per-file outcome record. Produced by exactly one worker, written once,
/// never mutated after creation.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub status: JobStatus,
    pub relative_path: PathBuf,
    pub original_size: u64,
    pub new_size: u64,
    /// Quality level the encode actually used, when the mode tracks one
    /// (aggressive search reports its final quality).
    pub compression_level: Option<u8>,
    /// Failure detail, present only for failed jobs.
    pub error: Option<String>,
}

impl JobResult {
    pub fn ok(
        relative_path: PathBuf,
        original_size: u64,
        new_size: u64,
        compression_level: Option<u8>,
    ) -> Self {
        Self {
            status: JobStatus::Ok,
            relative_path,
            original_size,
            new_size,
            compression_level,
            error: None,
        }
    }

    pub fn failed(relative_path: PathBuf, original_size: u64, error: String) -> Self {
        Self {
            status: JobStatus::Failed,
            relative_path,
            original_size,
            new_size: original_size,
            compression_level: None,
            error: Some(error),
        }
    }

    /// Percentage saved for this file. An original size of 0 reports 0%,
    /// never a division fault.
    pub fn percent_saved(&self) -> f64 {
        if self.original_size == 0 {
            0.0
        } else {
            (self.original_size as f64 - self.new_size as f64) / self.original_size as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_saved() {
        let result = JobResult::ok(PathBuf::from("a.jpg"), 1000, 250, None);
        assert!((result.percent_saved() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percent_saved_zero_original() {
        let result = JobResult::ok(PathBuf::from("empty.png"), 0, 0, None);
        assert_eq!(result.percent_saved(), 0.0);
    }

    #[test]
    fn test_failed_result_keeps_original_size() {
        let result = JobResult::failed(PathBuf::from("bad.gif"), 4096, "boom".into());
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.new_size, 4096);
        assert_eq!(result.percent_saved(), 0.0);
    }
}
