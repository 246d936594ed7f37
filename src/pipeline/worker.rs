//! # Job Worker Module
//!
//! Worker per l'elaborazione di un singolo job: instrada verso il Codec
//! Adapter (modalità normale) o l'Aggressive Compressor, misura le
//! dimensioni prima/dopo e produce il JobResult. Gli errori per-file si
//! fermano qui, trasformati in risultati falliti.

use crate::aggressive::AggressiveCompressor;
use crate::codec::{CodecAdapter, ImageFormat};
use crate::config::Config;
use crate::job::{Job, JobResult};
use crate::metadata::MarkerStore;
use std::sync::Arc;
use tracing::debug;

/// Per-job worker; cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct JobWorker {
    config: Config,
    codec: CodecAdapter,
    compressor: AggressiveCompressor,
}

impl JobWorker {
    pub fn new(config: Config, markers: Arc<dyn MarkerStore>) -> Self {
        Self {
            codec: CodecAdapter::new(config.clone(), markers.clone()),
            compressor: AggressiveCompressor::new(config.clone(), markers),
            config,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_parts(
        config: Config,
        codec: CodecAdapter,
        compressor: AggressiveCompressor,
    ) -> Self {
        Self {
            config,
            codec,
            compressor,
        }
    }

    /// Process one job to completion. Never propagates an error: every
    /// outcome is a JobResult, so sibling jobs are untouched by failures.
    pub async fn process(&self, job: Job) -> JobResult {
        let original_size = job.item.size_bytes;
        let relative_path = job.item.relative_path.clone();

        debug!("Processing {}", job.item.absolute_path.display());

        let outcome = if self.config.aggressive {
            self.compressor.compress(&job).await.map(Some)
        } else {
            self.codec.transform(&job).await.map(|_| self.normal_mode_level(&job))
        };

        match outcome {
            Ok(compression_level) => {
                let new_size = tokio::fs::metadata(&job.output_path)
                    .await
                    .map(|m| m.len())
                    .unwrap_or(original_size);
                JobResult::ok(relative_path, original_size, new_size, compression_level)
            }
            Err(e) => JobResult::failed(relative_path, original_size, e.to_string()),
        }
    }

    /// Quality recorded for reporting in normal mode. Lossless formats
    /// carry no quality knob.
    fn normal_mode_level(&self, job: &Job) -> Option<u8> {
        match ImageFormat::from_path(&job.item.absolute_path) {
            Ok(ImageFormat::Jpeg) => Some(self.config.jpeg_quality),
            Ok(ImageFormat::Webp) => Some(self.config.webp_quality),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggressive::WebpEncoder;
    use crate::job::{JobStatus, WorkItem};
    use crate::marker::Tier;
    use crate::metadata::MemoryMarkerStore;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct FixedSizeEncoder {
        size: usize,
        fail: bool,
    }

    #[async_trait]
    impl WebpEncoder for FixedSizeEncoder {
        async fn encode(&self, _input: &Path, output: &Path, _quality: u8) -> Result<()> {
            if self.fail {
                anyhow::bail!("simulated encoder failure");
            }
            tokio::fs::write(output, vec![0u8; self.size]).await?;
            Ok(())
        }
    }

    fn aggressive_worker(dir: &TempDir, encoder: FixedSizeEncoder) -> (JobWorker, Job) {
        let config = Config {
            aggressive: true,
            size_threshold: 1000,
            output_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let markers: Arc<MemoryMarkerStore> = Arc::new(MemoryMarkerStore::new());

        let input = dir.path().join("pic.jpg");
        std::fs::write(&input, vec![0u8; 4096]).unwrap();

        let job = Job {
            item: WorkItem {
                absolute_path: input,
                relative_path: PathBuf::from("pic.jpg"),
                size_bytes: 4096,
                dimensions: None,
                marker: Tier::Optimized,
            },
            output_path: dir.path().join("pic.webp"),
        };

        let worker = JobWorker::with_parts(
            config.clone(),
            CodecAdapter::new(config.clone(), markers.clone()),
            AggressiveCompressor::with_encoder(config, markers, Arc::new(encoder)),
        );
        (worker, job)
    }

    #[tokio::test]
    async fn test_successful_job_records_sizes_and_level() {
        let dir = TempDir::new().unwrap();
        let (worker, job) = aggressive_worker(&dir, FixedSizeEncoder { size: 512, fail: false });

        let result = worker.process(job).await;

        assert_eq!(result.status, JobStatus::Ok);
        assert_eq!(result.original_size, 4096);
        assert_eq!(result.new_size, 512);
        // First encode already under threshold: top-of-range quality
        assert_eq!(result.compression_level, Some(95));
    }

    #[tokio::test]
    async fn test_failed_job_becomes_failed_result() {
        let dir = TempDir::new().unwrap();
        let (worker, job) = aggressive_worker(&dir, FixedSizeEncoder { size: 512, fail: true });

        let result = worker.process(job).await;

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.new_size, result.original_size);
        assert!(result.error.as_deref().unwrap().contains("simulated"));
    }
}
