//! # Aggressive Compressor Module
//!
//! Ricerca lineare monotona sulla qualità WebP per forzare sotto soglia i
//! file già ottimizzati che restano troppo grandi.
//!
//! ## Algoritmo:
//! - Primo encode a qualità alta (95, quasi lossless)
//! - Finché la dimensione supera la soglia E la qualità è sopra il floor:
//!   scendi di 5 punti e ricodifica DALL'ORIGINALE (mai dall'output lossy
//!   precedente, per non accumulare perdita generazionale)
//! - Il floor è uno stop rigido: best-effort, non garantito sotto soglia
//!
//! Greedy deliberato, non binary search: ogni encode costa, e la
//! terminazione anticipata è il caso comune. Al termine l'output viene
//! stampato con il marker `aggressive` e la qualità usata torna al caller
//! per il report.

use crate::config::{Config, AGGRESSIVE_START_QUALITY};
use crate::error::OptimizeError;
use crate::job::Job;
use crate::marker::Tier;
use crate::metadata::MarkerStore;
use crate::platform::PlatformCommands;
use crate::utils::to_string_vec;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Fixed decrement of the quality search.
const QUALITY_STEP: u8 = 5;

/// Single-quality WebP encode seam; the search loop drives this.
#[async_trait]
pub trait WebpEncoder: Send + Sync {
    async fn encode(&self, input: &Path, output: &Path, quality: u8) -> Result<()>;
}

/// cwebp-backed encoder.
pub struct CwebpEncoder;

#[async_trait]
impl WebpEncoder for CwebpEncoder {
    async fn encode(&self, input: &Path, output: &Path, quality: u8) -> Result<()> {
        let platform = PlatformCommands::instance();
        let args = to_string_vec([
            "-q", &quality.to_string(),
            &input.to_string_lossy(),
            "-o", &output.to_string_lossy(),
        ]);

        let status = platform.niced_command("cwebp").await.args(&args).status().await?;
        if !status.success() {
            return Err(OptimizeError::Tool {
                tool: "cwebp".to_string(),
                path: input.display().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Iterative quality-reduction search over a WebP re-encode.
#[derive(Clone)]
pub struct AggressiveCompressor {
    config: Config,
    encoder: Arc<dyn WebpEncoder>,
    markers: Arc<dyn MarkerStore>,
}

impl AggressiveCompressor {
    pub fn new(config: Config, markers: Arc<dyn MarkerStore>) -> Self {
        Self::with_encoder(config, markers, Arc::new(CwebpEncoder))
    }

    pub fn with_encoder(
        config: Config,
        markers: Arc<dyn MarkerStore>,
        encoder: Arc<dyn WebpEncoder>,
    ) -> Self {
        Self {
            config,
            encoder,
            markers,
        }
    }

    /// Run the search for one job and return the quality actually used.
    /// Stamps the `aggressive` marker on completion.
    pub async fn compress(&self, job: &Job) -> Result<u8> {
        let input = &job.item.absolute_path;
        let output = &job.output_path;
        let floor = self.config.aggressive_floor;

        let mut quality = AGGRESSIVE_START_QUALITY;
        self.encoder.encode(input, output, quality).await?;

        loop {
            let size = tokio::fs::metadata(output).await?.len();
            if size <= self.config.size_threshold {
                debug!(
                    "Aggressive target met for {} at quality {} ({} bytes)",
                    output.display(),
                    quality,
                    size
                );
                break;
            }
            if quality <= floor {
                debug!(
                    "Aggressive floor reached for {} ({} bytes still above threshold)",
                    output.display(),
                    size
                );
                break;
            }

            quality = quality.saturating_sub(QUALITY_STEP).max(floor);
            // Always from the original input: no generational loss
            self.encoder.encode(input, output, quality).await?;
        }

        self.markers.write_marker(output, Tier::Aggressive).await?;
        Ok(quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::WorkItem;
    use crate::metadata::MemoryMarkerStore;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Encoder double: records every call and writes a file whose size is
    /// a deterministic function of the requested quality.
    struct FakeEncoder {
        size_for_quality: fn(u8) -> usize,
        calls: Mutex<Vec<(PathBuf, u8)>>,
    }

    impl FakeEncoder {
        fn new(size_for_quality: fn(u8) -> usize) -> Self {
            Self {
                size_for_quality,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn qualities(&self) -> Vec<u8> {
            self.calls.lock().unwrap().iter().map(|(_, q)| *q).collect()
        }

        fn inputs(&self) -> Vec<PathBuf> {
            self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
        }
    }

    #[async_trait]
    impl WebpEncoder for FakeEncoder {
        async fn encode(&self, input: &Path, output: &Path, quality: u8) -> Result<()> {
            self.calls.lock().unwrap().push((input.to_path_buf(), quality));
            tokio::fs::write(output, vec![0u8; (self.size_for_quality)(quality)]).await?;
            Ok(())
        }
    }

    fn test_job(dir: &TempDir) -> Job {
        let input = dir.path().join("big.jpg");
        std::fs::write(&input, vec![0u8; 10]).unwrap();
        Job {
            item: WorkItem {
                absolute_path: input,
                relative_path: PathBuf::from("big.jpg"),
                size_bytes: 10,
                dimensions: None,
                marker: Tier::Optimized,
            },
            output_path: dir.path().join("big.webp"),
        }
    }

    fn test_config(threshold: u64, floor: u8) -> Config {
        Config {
            size_threshold: threshold,
            aggressive_floor: floor,
            aggressive: true,
            ..Default::default()
        }
    }

    async fn run_search(
        threshold: u64,
        floor: u8,
        size_for_quality: fn(u8) -> usize,
    ) -> (u8, Arc<FakeEncoder>, Arc<MemoryMarkerStore>, Job, TempDir) {
        let dir = TempDir::new().unwrap();
        let job = test_job(&dir);
        let encoder = Arc::new(FakeEncoder::new(size_for_quality));
        let markers = Arc::new(MemoryMarkerStore::new());
        let compressor = AggressiveCompressor::with_encoder(
            test_config(threshold, floor),
            markers.clone(),
            encoder.clone(),
        );

        let final_quality = compressor.compress(&job).await.unwrap();
        (final_quality, encoder, markers, job, dir)
    }

    #[tokio::test]
    async fn test_first_encode_can_satisfy() {
        let (quality, encoder, _, _, _dir) = run_search(1000, 40, |_| 500).await;
        assert_eq!(quality, AGGRESSIVE_START_QUALITY);
        assert_eq!(encoder.qualities(), vec![95]);
    }

    #[tokio::test]
    async fn test_stops_as_soon_as_good_enough() {
        // Sizes shrink below the threshold at quality 75
        let (quality, encoder, _, _, _dir) =
            run_search(1000, 40, |q| if q >= 80 { 2000 } else { 500 }).await;
        assert_eq!(quality, 75);
        assert_eq!(encoder.qualities(), vec![95, 90, 85, 80, 75]);
    }

    #[tokio::test]
    async fn test_floor_is_a_hard_stop() {
        // Never compressible below the threshold
        let (quality, encoder, _, _, _dir) = run_search(1000, 40, |_| 5000).await;
        assert_eq!(quality, 40);

        let qualities = encoder.qualities();
        // At most (start - floor) / step + 1 encodes
        assert_eq!(qualities.len(), ((95 - 40) / 5 + 1) as usize);
        assert_eq!(*qualities.last().unwrap(), 40);
        assert!(qualities.iter().all(|q| *q >= 40));
    }

    #[tokio::test]
    async fn test_floor_clamp_when_not_step_aligned() {
        let (quality, encoder, _, _, _dir) = run_search(1000, 42, |_| 5000).await;
        assert_eq!(quality, 42);
        assert_eq!(*encoder.qualities().last().unwrap(), 42);
    }

    #[tokio::test]
    async fn test_reencodes_from_original_every_step() {
        let (_, encoder, _, job, _dir) = run_search(1000, 40, |_| 5000).await;
        let inputs = encoder.inputs();
        assert!(inputs.len() > 1);
        assert!(inputs.iter().all(|p| *p == job.item.absolute_path));
    }

    #[tokio::test]
    async fn test_stamps_aggressive_marker() {
        let (_, _, markers, job, _dir) = run_search(1000, 40, |_| 500).await;
        assert_eq!(markers.marker_for(&job.output_path), Tier::Aggressive);
    }
}
