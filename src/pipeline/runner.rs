//! # Pipeline Runner
//!
//! Orchestratore a tre fasi con barriera: select → dispatch → aggregate.
//! Nessuna selezione o aggregazione gira in concorrenza con i worker; le
//! pre-letture bulk (marker, dimensioni) avvengono una sola volta, prima
//! del loop di selezione.

use crate::codec::CodecAdapter;
use crate::config::Config;
use crate::error::OptimizeError;
use crate::metadata::{ExifToolMarkerStore, MarkerStore};
use crate::pipeline::dispatcher::{clamp_workers, dispatch};
use crate::pipeline::worker::JobWorker;
use crate::platform::PlatformCommands;
use crate::probe::ImageProbe;
use crate::progress::ProgressManager;
use crate::report::RunReport;
use crate::selector::{discover_inputs, resolve_work_paths, CandidateSelector};
use crate::utils::format_size;
use anyhow::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// File name of the tabular report written into the output tree.
const REPORT_FILE: &str = "optimization-report.csv";

/// Drives one optimization run end to end.
pub struct PipelineRunner {
    config: Config,
    markers: Arc<dyn MarkerStore>,
    check_tools: bool,
}

impl PipelineRunner {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            markers: Arc::new(ExifToolMarkerStore::new()),
            check_tools: true,
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(config: Config, markers: Arc<dyn MarkerStore>) -> Self {
        Self {
            config,
            markers,
            check_tools: false,
        }
    }

    /// Run the pipeline over the given input paths.
    pub async fn run(&self, inputs: &[PathBuf]) -> Result<RunReport> {
        let start_time = std::time::Instant::now();
        self.log_configuration();

        // Fail fast: no partial runs on a missing tool
        if self.check_tools {
            self.check_dependencies().await?;
        }

        // Discovery + location resolution (aggressive works the prior
        // stage's output tree)
        let discovered = discover_inputs(inputs, self.config.recursive)?;
        let candidates = resolve_work_paths(&self.config, discovered);
        info!("Found {} candidate files", candidates.len());

        // Bulk pre-reads, once per run, before the selection loop
        let candidate_paths: Vec<PathBuf> =
            candidates.iter().map(|c| c.absolute_path.clone()).collect();
        let marker_table = self.markers.read_markers(&candidate_paths).await;
        let dimension_table = if self.config.aggressive {
            // Aggressive eligibility is size-only
            HashMap::new()
        } else {
            ImageProbe::read_dimensions(&candidate_paths).await
        };

        let selection = CandidateSelector::new(&self.config, &marker_table, &dimension_table)
            .select(&candidates);
        info!(
            "Selected {} files to process, {} skipped",
            selection.jobs.len(),
            selection.skipped
        );

        if self.config.dry_run {
            for job in &selection.jobs {
                info!(
                    "Would process {} -> {} ({})",
                    job.item.relative_path.display(),
                    job.output_path.display(),
                    format_size(job.item.size_bytes)
                );
            }
            return Ok(RunReport::from_results(&[], selection.skipped));
        }

        if selection.jobs.is_empty() {
            info!("Nothing to process");
            return Ok(RunReport::from_results(&[], selection.skipped));
        }

        // Create output directories before dispatch so workers never race
        // on directory creation
        for job in &selection.jobs {
            if let Some(parent) = job.output_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let limit = clamp_workers(self.config.workers);
        debug!(
            "Dispatching {} jobs with concurrency {} (requested {})",
            selection.jobs.len(),
            limit,
            self.config.workers
        );

        let progress = ProgressManager::new(selection.jobs.len() as u64);
        let worker = JobWorker::new(self.config.clone(), self.markers.clone());

        let results = dispatch(selection.jobs, limit, |job| {
            let worker = worker.clone();
            let progress = progress.clone();
            async move {
                let result = worker.process(job).await;
                let message = match result.status {
                    crate::job::JobStatus::Ok => format!(
                        "[OK] {}: {:.1}% saved",
                        result.relative_path.display(),
                        result.percent_saved()
                    ),
                    crate::job::JobStatus::Failed => {
                        format!("[ERROR] {}", result.relative_path.display())
                    }
                };
                progress.update(&message);
                result
            }
        })
        .await?;

        // Aggregate strictly after the parallel phase has drained
        let report = RunReport::from_results(&results, selection.skipped);
        progress.finish(&report.format_summary());

        self.write_report(&report).await?;
        self.log_final_stats(&report, start_time.elapsed().as_secs_f64());

        Ok(report)
    }

    /// Verify every external tool this run will need.
    async fn check_dependencies(&self) -> Result<()> {
        info!("Checking external tool dependencies...");
        CodecAdapter::check_dependencies(&self.config).await?;

        let platform = PlatformCommands::instance();
        if !platform.is_command_available("exiftool").await {
            return Err(OptimizeError::MissingDependency(
                "exiftool is required for idempotence markers".to_string(),
            )
            .into());
        }

        Ok(())
    }

    fn log_configuration(&self) {
        if self.config.aggressive {
            info!(
                "Mode: aggressive WebP re-encoding (floor: {}, threshold: {})",
                self.config.aggressive_floor,
                format_size(self.config.size_threshold)
            );
        } else {
            info!(
                "Mode: optimize in original formats (JPEG quality: {}, threshold: {}, max dimension: {})",
                self.config.jpeg_quality,
                format_size(self.config.size_threshold),
                self.config.max_dimension
            );
        }

        if let Some(ref output_path) = self.config.output_path {
            info!("Output directory: {}", output_path.display());
        }
        if self.config.webp_siblings {
            info!("WebP siblings enabled (quality: {})", self.config.webp_quality);
        }
        if self.config.force {
            info!("Force mode: idempotence markers ignored");
        }
        if self.config.dry_run {
            info!("Dry run mode: no files will be modified");
        }
    }

    async fn write_report(&self, report: &RunReport) -> Result<()> {
        let report_path = match self.config.output_path {
            Some(ref output_dir) => output_dir.join(REPORT_FILE),
            None => Path::new(REPORT_FILE).to_path_buf(),
        };
        report.write_csv(&report_path).await?;
        info!("Report written to {}", report_path.display());
        Ok(())
    }

    fn log_final_stats(&self, report: &RunReport, duration: f64) {
        info!("=== Optimization Complete ===");
        info!("Files processed: {}", report.processed);
        info!("Files skipped: {}", report.skipped);
        info!("Files failed: {}", report.failed);
        info!("Bytes saved: {}", format_size(report.bytes_saved()));
        info!("Overall reduction: {:.2}%", report.overall_percent_saved());
        info!("Duration: {:.1}s", duration);
    }
}
