//! # Candidate Selector Module
//!
//! Discovery dei file di input e partizione candidato/scartato per il run
//! corrente. Gira interamente PRIMA della fase parallela.
//!
//! ## Responsabilità:
//! - Espansione delle directory di input (walkdir, ricorsione opzionale)
//! - Calcolo del path relativo UNA SOLA VOLTA alla discovery
//! - Risoluzione dei candidati aggressive nell'albero di output dello
//!   stadio precedente
//! - Eligibilità: marker tier, soglie strettamente maggiori, output esistente
//!
//! Il selettore non invoca mai tool esterni: riceve le lookup table di
//! marker e dimensioni già costruite dalle pre-letture bulk e le consulta
//! in sola lettura. Ogni file entra nella selezione al più una volta per
//! run: gli input sovrapposti vengono dedupplicati alla discovery.

use crate::config::Config;
use crate::error::OptimizeError;
use crate::job::{Job, WorkItem};
use crate::marker::Tier;
use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Fixed extension set the pipeline operates on.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// A file found during input expansion, with its once-computed relative path.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub absolute_path: PathBuf,
    pub relative_path: PathBuf,
}

/// Result of the selection phase: the work list and how many discovered
/// files were skipped.
#[derive(Debug)]
pub struct Selection {
    pub jobs: Vec<Job>,
    pub skipped: usize,
}

/// Check if a path carries one of the supported image extensions
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Expand the input paths (files or directories) into discovered files.
///
/// Directory inputs are walked for supported extensions; recursion into
/// subdirectories is gated by `recursive` (default: top-level only). The
/// relative path is computed here, against the enclosing input root, and
/// never recomputed; a file given directly falls back to its bare name.
/// Nonexistent inputs are fatal. Duplicate discoveries (overlapping inputs)
/// are collapsed so no file can be selected twice in one run.
pub fn discover_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<DiscoveredFile>> {
    let mut discovered = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for input in inputs {
        if !input.exists() {
            return Err(OptimizeError::InvalidInput(format!(
                "input path does not exist: {}",
                input.display()
            ))
            .into());
        }

        if input.is_file() {
            if !is_supported_image(input) {
                return Err(OptimizeError::UnsupportedFormat(input.display().to_string()).into());
            }
            let relative = PathBuf::from(input.file_name().unwrap_or_default());
            if seen.insert(input.clone()) {
                discovered.push(DiscoveredFile {
                    absolute_path: input.clone(),
                    relative_path: relative,
                });
            }
            continue;
        }

        let max_depth = if recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !is_supported_image(path) {
                continue;
            }
            // Relative to the enclosing input root, bare name as fallback
            let relative = path
                .strip_prefix(input)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| PathBuf::from(path.file_name().unwrap_or_default()));
            if seen.insert(path.to_path_buf()) {
                discovered.push(DiscoveredFile {
                    absolute_path: path.to_path_buf(),
                    relative_path: relative,
                });
            }
        }
    }

    debug!("Discovered {} candidate files", discovered.len());
    Ok(discovered)
}

/// Resolve discovered files to the paths this run actually operates on.
///
/// Normal mode works on the raw inputs. Aggressive mode never touches
/// unmarked originals: its work tier is the previous stage's output tree,
/// so each file is location-resolved to `output_dir/relative` when an
/// output directory is configured.
pub fn resolve_work_paths(config: &Config, discovered: Vec<DiscoveredFile>) -> Vec<DiscoveredFile> {
    if !config.aggressive {
        return discovered;
    }

    match config.output_path {
        Some(ref output_dir) => discovered
            .into_iter()
            .map(|d| DiscoveredFile {
                absolute_path: output_dir.join(&d.relative_path),
                relative_path: d.relative_path,
            })
            .collect(),
        // Inputs already point at the optimized tree
        None => discovered,
    }
}

/// Partitions resolved candidates into jobs and skips against the pre-read
/// lookup tables.
pub struct CandidateSelector<'a> {
    config: &'a Config,
    markers: &'a HashMap<PathBuf, Tier>,
    dimensions: &'a HashMap<PathBuf, (u32, u32)>,
}

impl<'a> CandidateSelector<'a> {
    pub fn new(
        config: &'a Config,
        markers: &'a HashMap<PathBuf, Tier>,
        dimensions: &'a HashMap<PathBuf, (u32, u32)>,
    ) -> Self {
        Self {
            config,
            markers,
            dimensions,
        }
    }

    /// Run the selection loop. Purely table- and filesystem-driven; no
    /// external tool is invoked from here.
    pub fn select(&self, candidates: &[DiscoveredFile]) -> Selection {
        let mut jobs = Vec::new();
        let mut skipped = 0usize;

        for candidate in candidates {
            match self.evaluate(candidate) {
                Some(job) => jobs.push(job),
                None => skipped += 1,
            }
        }

        debug!("Selection: {} to process, {} skipped", jobs.len(), skipped);
        Selection { jobs, skipped }
    }

    fn evaluate(&self, candidate: &DiscoveredFile) -> Option<Job> {
        // Aggressive candidates are output-tree resolved and may not exist
        // yet (no prior optimization pass ran for this file).
        let metadata = std::fs::metadata(&candidate.absolute_path).ok()?;
        let size_bytes = metadata.len();
        let marker = self
            .markers
            .get(&candidate.absolute_path)
            .copied()
            .unwrap_or_default();
        let dimensions = self.dimensions.get(&candidate.absolute_path).copied();

        if self.config.aggressive {
            self.evaluate_aggressive(candidate, size_bytes, marker)
        } else {
            self.evaluate_normal(candidate, size_bytes, marker, dimensions)
        }
    }

    fn evaluate_normal(
        &self,
        candidate: &DiscoveredFile,
        size_bytes: u64,
        marker: Tier,
        dimensions: Option<(u32, u32)>,
    ) -> Option<Job> {
        // Already at or above this stage's tier: idempotent skip
        if !self.config.force && marker >= Tier::Optimized {
            debug!("Skip (marker {}): {}", marker, candidate.absolute_path.display());
            return None;
        }

        // Strictly greater-than on both criteria; a missing dimension entry
        // degrades to the size criterion alone
        let oversized = size_bytes > self.config.size_threshold;
        let overlarge = dimensions
            .map(|(w, h)| w.max(h) > self.config.max_dimension)
            .unwrap_or(false);
        if !oversized && !overlarge {
            return None;
        }

        // validate() guarantees an output dir outside aggressive mode
        let output_dir = self.config.output_path.as_ref()?;
        let output_path = output_dir.join(&candidate.relative_path);

        if !self.config.force && output_path.exists() {
            debug!("Skip (output exists): {}", output_path.display());
            return None;
        }

        Some(Job {
            item: WorkItem {
                absolute_path: candidate.absolute_path.clone(),
                relative_path: candidate.relative_path.clone(),
                size_bytes,
                dimensions,
                marker,
            },
            output_path,
        })
    }

    fn evaluate_aggressive(
        &self,
        candidate: &DiscoveredFile,
        size_bytes: u64,
        marker: Tier,
    ) -> Option<Job> {
        // Aggressive consumes the optimized tier; force re-admits files it
        // already processed, but never unmarked originals
        let eligible_tier =
            marker == Tier::Optimized || (self.config.force && marker == Tier::Aggressive);
        if !eligible_tier {
            debug!("Skip (marker {}): {}", marker, candidate.absolute_path.display());
            return None;
        }

        // Size-only: aggressive targets bytes, not resolution
        if size_bytes <= self.config.size_threshold {
            return None;
        }

        let output_path = candidate.absolute_path.with_extension("webp");

        Some(Job {
            item: WorkItem {
                absolute_path: candidate.absolute_path.clone(),
                relative_path: candidate.relative_path.clone(),
                size_bytes,
                dimensions: None,
                marker,
            },
            output_path,
        })
    }
}
