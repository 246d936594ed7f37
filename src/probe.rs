//! # Image Dimension Probe
//!
//! Lettura BULK delle dimensioni pixel tramite ImageMagick `identify`,
//! senza decodifica in-process. Una invocazione batched per run costruisce
//! la lookup table usata dal selettore; i file che il probe non risolve
//! restano fuori dalla mappa e la selezione degrada al solo criterio di
//! dimensione file.

use crate::platform::PlatformCommands;
use crate::utils::to_string_vec;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Cap on paths per identify invocation, bounding command-line length.
const PROBE_CHUNK: usize = 256;

/// Format string: one `path|width|height` line per frame.
const FORMAT: &str = "%i|%w|%h\n";

/// Parse identify output lines. Multi-frame images (GIF) emit one line per
/// frame with the same input path; the first frame wins.
fn parse_identify_lines(output: &str) -> Vec<(PathBuf, (u32, u32))> {
    let mut dims = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for line in output.lines() {
        let mut fields = line.rsplitn(3, '|');
        let (Some(h), Some(w), Some(path)) = (fields.next(), fields.next(), fields.next()) else {
            continue;
        };
        let (Ok(w), Ok(h)) = (w.trim().parse::<u32>(), h.trim().parse::<u32>()) else {
            continue;
        };
        let path = PathBuf::from(path);
        if seen.insert(path.clone()) {
            dims.push((path, (w, h)));
        }
    }

    dims
}

/// Batched pixel-dimension lookup over external ImageMagick tools.
pub struct ImageProbe;

impl ImageProbe {
    /// Read dimensions for many files in a bounded number of external
    /// invocations. Files the probe cannot resolve are absent from the map.
    pub async fn read_dimensions(paths: &[PathBuf]) -> HashMap<PathBuf, (u32, u32)> {
        let mut dims = HashMap::with_capacity(paths.len());

        for chunk in paths.chunks(PROBE_CHUNK) {
            if let Some(entries) = Self::probe_chunk(chunk).await {
                dims.extend(entries);
            }
        }

        debug!("Bulk dimension probe resolved {} of {} files", dims.len(), paths.len());
        dims
    }

    async fn probe_chunk(chunk: &[PathBuf]) -> Option<Vec<(PathBuf, (u32, u32))>> {
        let platform = PlatformCommands::instance();

        // ImageMagick 7 (magick identify), then legacy 6.x (identify)
        let invocations: &[(&str, &[&str])] = &[("magick", &["identify"]), ("identify", &[])];

        for (tool, prefix) in invocations {
            if !platform.is_command_available(tool).await {
                continue;
            }

            let mut args = to_string_vec(*prefix);
            args.extend(to_string_vec(["-format", FORMAT]));
            args.extend(chunk.iter().map(|p| p.to_string_lossy().into_owned()));

            match tokio::process::Command::new(platform.get_command(tool))
                .args(&args)
                .output()
                .await
            {
                Ok(output) => {
                    // identify exits nonzero when any file in the batch is
                    // corrupt but still prints the frames it could read.
                    let entries = parse_identify_lines(&String::from_utf8_lossy(&output.stdout));
                    if !entries.is_empty() || output.status.success() {
                        return Some(entries);
                    }
                    warn!("{} produced no dimensions for a batch, trying next tool", tool);
                }
                Err(e) => {
                    warn!("{} invocation failed: {}", tool, e);
                }
            }
        }

        warn!(
            "No dimension probe available for {} files; selection degrades to size-only",
            chunk.len()
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identify_lines() {
        let output = "/a/photo.jpg|4000|3000\n/a/icon.png|64|64\n";
        let dims = parse_identify_lines(output);
        assert_eq!(dims.len(), 2);
        assert_eq!(dims[0], (PathBuf::from("/a/photo.jpg"), (4000, 3000)));
        assert_eq!(dims[1], (PathBuf::from("/a/icon.png"), (64, 64)));
    }

    #[test]
    fn test_parse_keeps_first_frame_of_animations() {
        let output = "/a/anim.gif|320|240\n/a/anim.gif|320|240\n/a/anim.gif|160|120\n";
        let dims = parse_identify_lines(output);
        assert_eq!(dims, vec![(PathBuf::from("/a/anim.gif"), (320, 240))]);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let output = "garbage\n/a/ok.jpg|800|600\n/a/bad.jpg|eight|600\n";
        let dims = parse_identify_lines(output);
        assert_eq!(dims, vec![(PathBuf::from("/a/ok.jpg"), (800, 600))]);
    }

    #[test]
    fn test_parse_tolerates_pipes_in_path() {
        let output = "/a/we|ird.png|10|20\n";
        let dims = parse_identify_lines(output);
        assert_eq!(dims, vec![(PathBuf::from("/a/we|ird.png"), (10, 20))]);
    }
}
