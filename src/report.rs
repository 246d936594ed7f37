//! # Report Aggregator Module
//!
//! Fold single-threaded dei JobResult DOPO il drain completo della fase
//! parallela: nessun contatore condiviso viene mai incrementato dai worker.
//!
//! ## Output:
//! - Riepilogo human-readable (log + messaggio finale della progress bar)
//! - Report tabellare CSV, una riga per file elaborato con successo:
//!   `relative_path, original_size, optimized_size, percent_saved,
//!   compression_level`
//! - Contatori processed/skipped/failed
//!
//! Le percentuali proteggono il denominatore zero: un file di 0 byte vale
//! 0% risparmiato, mai una divisione per zero.

use crate::job::{JobResult, JobStatus};
use crate::utils::format_size;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One CSV row for a successfully processed file.
#[derive(Debug, Clone)]
pub struct ReportRow {
    pub relative_path: PathBuf,
    pub original_size: u64,
    pub optimized_size: u64,
    pub percent_saved: f64,
    pub compression_level: Option<u8>,
}

/// Aggregated outcome of one run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_original_size: u64,
    pub total_optimized_size: u64,
    pub rows: Vec<ReportRow>,
}

impl RunReport {
    /// Fold all job results into the report. Runs strictly after the
    /// parallel phase; results arrive in completion order, which carries
    /// no meaning here.
    pub fn from_results(results: &[JobResult], skipped: usize) -> Self {
        let mut report = RunReport {
            skipped,
            ..Default::default()
        };

        for result in results {
            report.total_original_size += result.original_size;
            report.total_optimized_size += result.new_size;

            match result.status {
                JobStatus::Ok => {
                    report.processed += 1;
                    report.rows.push(ReportRow {
                        relative_path: result.relative_path.clone(),
                        original_size: result.original_size,
                        optimized_size: result.new_size,
                        percent_saved: result.percent_saved(),
                        compression_level: result.compression_level,
                    });
                }
                JobStatus::Failed => {
                    report.failed += 1;
                    if let Some(ref error) = result.error {
                        warn!("Failed: {}: {}", result.relative_path.display(), error);
                    }
                }
            }
        }

        report
    }

    /// Total bytes saved across the run.
    pub fn bytes_saved(&self) -> u64 {
        self.total_original_size.saturating_sub(self.total_optimized_size)
    }

    /// Overall savings percentage, 0 when nothing was measured.
    pub fn overall_percent_saved(&self) -> f64 {
        if self.total_original_size == 0 {
            0.0
        } else {
            self.bytes_saved() as f64 / self.total_original_size as f64 * 100.0
        }
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} | Skipped: {} | Failed: {} | Total saved: {} ({:.2}%)",
            self.processed,
            self.skipped,
            self.failed,
            format_size(self.bytes_saved()),
            self.overall_percent_saved()
        )
    }

    /// Render the tabular report, one row per successful file.
    pub fn to_csv(&self) -> String {
        let mut csv = String::from(
            "relative_path,original_size,optimized_size,percent_saved,compression_level\n",
        );
        for row in &self.rows {
            let level = row
                .compression_level
                .map(|l| l.to_string())
                .unwrap_or_default();
            csv.push_str(&format!(
                "{},{},{},{:.2},{}\n",
                csv_field(&row.relative_path.to_string_lossy()),
                row.original_size,
                row.optimized_size,
                row.percent_saved,
                level
            ));
        }
        csv
    }

    /// Write the CSV report next to the optimized outputs.
    pub async fn write_csv(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.to_csv()).await?;
        Ok(())
    }
}

/// Quote a CSV field only when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
