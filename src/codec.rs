//! # Codec Adapter Module
//!
//! Questo modulo gestisce la trasformazione per-formato delle immagini
//! utilizzando esclusivamente tool esterni specializzati.
//!
//! ## Strategia per formato
//!
//! | Formato | Pipeline | Tool |
//! |---------|----------|------|
//! | JPEG    | sRGB + downscale + re-encode, poi passata lossless | magick/convert, jpegtran/jpegoptim |
//! | PNG     | sRGB + downscale + strip, poi lossless-only | magick/convert, oxipng |
//! | GIF     | ottimizzazione lossless a livello massimo | gifsicle |
//! | WebP    | resize+recompress combinati, fallback senza resize | cwebp |
//!
//! La PNG resta deliberatamente lossless-only: nessuna quantizzazione di
//! palette o chroma, la fedeltà cromatica vale più dei byte risparmiati.
//!
//! Ogni transform riuscito termina stampando il marker `optimized`
//! sull'output, mai sui path di errore. La rendition WebP sibling è
//! opzionale e best-effort.

use crate::config::Config;
use crate::error::OptimizeError;
use crate::job::Job;
use crate::marker::Tier;
use crate::metadata::MarkerStore;
use crate::platform::PlatformCommands;
use crate::utils::to_string_vec;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Image formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        match ext.as_deref() {
            Some("jpg") | Some("jpeg") => Ok(ImageFormat::Jpeg),
            Some("png") => Ok(ImageFormat::Png),
            Some("gif") => Ok(ImageFormat::Gif),
            Some("webp") => Ok(ImageFormat::Webp),
            _ => Err(OptimizeError::UnsupportedFormat(path.display().to_string()).into()),
        }
    }
}

/// Shrink-only geometry argument for ImageMagick (`>` never enlarges).
fn magick_resize_arg(max_dimension: u32) -> String {
    format!("{}x{}>", max_dimension, max_dimension)
}

/// Target size for cwebp's explicit `-resize`, preserving aspect ratio.
/// Returns None when the image already fits (never upscale).
fn webp_resize_target(dimensions: Option<(u32, u32)>, max_dimension: u32) -> Option<(u32, u32)> {
    let (w, h) = dimensions?;
    let longest = w.max(h);
    if longest <= max_dimension {
        return None;
    }
    let scale = max_dimension as f64 / longest as f64;
    let nw = ((w as f64 * scale).round() as u32).max(1);
    let nh = ((h as f64 * scale).round() as u32).max(1);
    Some((nw, nh))
}

/// Per-format transformation via external encoders.
#[derive(Clone)]
pub struct CodecAdapter {
    config: Config,
    markers: Arc<dyn MarkerStore>,
}

impl CodecAdapter {
    pub fn new(config: Config, markers: Arc<dyn MarkerStore>) -> Self {
        Self { config, markers }
    }

    /// Transform one job's input into its output path and stamp the
    /// `optimized` marker as the final step. Steps within the job run
    /// strictly sequentially; any failure leaves the output unstamped.
    pub async fn transform(&self, job: &Job) -> Result<()> {
        let input = &job.item.absolute_path;
        let output = &job.output_path;

        match ImageFormat::from_path(input)? {
            ImageFormat::Jpeg => self.transform_jpeg(job).await?,
            ImageFormat::Png => self.transform_png(job).await?,
            ImageFormat::Gif => self.transform_gif(job).await?,
            ImageFormat::Webp => self.transform_webp(job).await?,
        }

        debug!("Transform complete: {} -> {}", input.display(), output.display());
        self.markers.write_marker(output, Tier::Optimized).await
    }

    /// JPEG: normalize to sRGB, shrink-only downscale, re-encode at the
    /// configured quality, strip metadata; then a lossless re-compression
    /// pass (jpegtran preferred, jpegoptim as the stdout-based alternative).
    async fn transform_jpeg(&self, job: &Job) -> Result<()> {
        let input = path_str(&job.item.absolute_path)?;
        let output = path_str(&job.output_path)?;

        let args = to_string_vec([
            input,
            "-colorspace", "sRGB",
            "-resize", &magick_resize_arg(self.config.max_dimension),
            "-quality", &self.config.jpeg_quality.to_string(),
            "-strip",
            output,
        ]);
        self.run_magick(&args, &job.item.absolute_path).await?;

        self.recompress_jpeg_lossless(&job.output_path).await?;

        if self.config.webp_siblings {
            self.emit_webp_sibling(&job.output_path, &job.output_path.with_extension("webp"))
                .await;
        }
        Ok(())
    }

    /// PNG: same normalization and downscale, then a lossless-only size
    /// optimization. No quantization: color fidelity is the policy here.
    async fn transform_png(&self, job: &Job) -> Result<()> {
        let input = path_str(&job.item.absolute_path)?;
        let output = path_str(&job.output_path)?;

        let args = to_string_vec([
            input,
            "-colorspace", "sRGB",
            "-resize", &magick_resize_arg(self.config.max_dimension),
            "-strip",
            output,
        ]);
        self.run_magick(&args, &job.item.absolute_path).await?;

        let oxipng_args = to_string_vec(["-o", "6", "--strip", "all", output]);
        if !self.run_tool("oxipng", &oxipng_args).await? {
            return Err(tool_error("oxipng", &job.output_path));
        }

        if self.config.webp_siblings {
            self.emit_webp_sibling(&job.output_path, &job.output_path.with_extension("webp"))
                .await;
        }
        Ok(())
    }

    /// GIF: lossless frame/color-table optimization at the maximum level.
    /// The optional WebP sibling is generated from the first frame only (a
    /// static preview), through a temp file cleaned up on every exit path.
    async fn transform_gif(&self, job: &Job) -> Result<()> {
        let input = path_str(&job.item.absolute_path)?;
        let output = path_str(&job.output_path)?;

        let args = to_string_vec(["-O3", input, "-o", output]);
        if !self.run_tool("gifsicle", &args).await? {
            return Err(tool_error("gifsicle", &job.item.absolute_path));
        }

        if self.config.webp_siblings {
            if let Err(e) = self.emit_gif_first_frame_sibling(job).await {
                warn!(
                    "WebP sibling generation failed for {}: {}",
                    job.output_path.display(),
                    e
                );
            }
        }
        Ok(())
    }

    /// WebP: combined resize+recompress in a single cwebp call when the
    /// image needs shrinking; if the encoder rejects the resize argument
    /// combination, fall back to recompress-only.
    async fn transform_webp(&self, job: &Job) -> Result<()> {
        let input = path_str(&job.item.absolute_path)?;
        let output = path_str(&job.output_path)?;
        let quality = self.config.webp_quality.to_string();

        if let Some((w, h)) = webp_resize_target(job.item.dimensions, self.config.max_dimension) {
            let args = to_string_vec([
                "-q", &quality,
                "-resize", &w.to_string(), &h.to_string(),
                input,
                "-o", output,
            ]);
            if self.run_tool("cwebp", &args).await? {
                return Ok(());
            }
            warn!(
                "cwebp rejected resize for {}, retrying without resize",
                job.item.absolute_path.display()
            );
        }

        let args = to_string_vec(["-q", &quality, input, "-o", output]);
        if !self.run_tool("cwebp", &args).await? {
            return Err(tool_error("cwebp", &job.item.absolute_path));
        }
        Ok(())
    }

    /// Lossless JPEG re-compression of an already-encoded output.
    /// jpegtran writes into a scoped temp file that replaces the output on
    /// success; jpegoptim is the stdout-capturing alternative.
    async fn recompress_jpeg_lossless(&self, output: &Path) -> Result<()> {
        let platform = PlatformCommands::instance();
        let output_str = path_str(output)?;

        if platform.is_command_available("jpegtran").await {
            let parent = output.parent().unwrap_or(Path::new("."));
            let temp = tempfile::NamedTempFile::new_in(parent)?;
            let temp_str = temp.path().to_string_lossy().into_owned();

            let args = to_string_vec([
                "-copy", "none",
                "-optimize",
                "-progressive",
                "-outfile", &temp_str,
                output_str,
            ]);
            if self.run_tool("jpegtran", &args).await? {
                temp.persist(output)?;
                return Ok(());
            }
            warn!("jpegtran failed for {}, trying jpegoptim", output.display());
            // temp dropped here, removing the partial file
        }

        if platform.is_command_available("jpegoptim").await {
            let args = to_string_vec(["--strip-all", "--stdout", output_str]);
            let mut cmd = platform.niced_command("jpegoptim").await;
            let result = cmd.args(&args).output().await?;
            if result.status.success() && !result.stdout.is_empty() {
                tokio::fs::write(output, result.stdout).await?;
                return Ok(());
            }
        }

        Err(tool_error("jpegtran/jpegoptim", output))
    }

    /// Static WebP preview from the first GIF frame. The intermediate frame
    /// lives in a NamedTempFile so it is removed on success and on every
    /// error path alike.
    async fn emit_gif_first_frame_sibling(&self, job: &Job) -> Result<()> {
        let parent = job.output_path.parent().unwrap_or(Path::new("."));
        let frame = tempfile::Builder::new().suffix(".png").tempfile_in(parent)?;
        let frame_str = frame.path().to_string_lossy().into_owned();

        // `[0]` selects the first frame only
        let first_frame = format!("{}[0]", path_str(&job.output_path)?);
        let args = to_string_vec([first_frame.as_str(), frame_str.as_str()]);
        self.run_magick(&args, &job.output_path).await?;

        let sibling = job.output_path.with_extension("webp");
        let args = to_string_vec([
            "-q", &self.config.webp_quality.to_string(),
            &frame_str,
            "-o", &sibling.to_string_lossy(),
        ]);
        if !self.run_tool("cwebp", &args).await? {
            return Err(tool_error("cwebp", &sibling));
        }
        Ok(())
    }

    /// Best-effort sibling rendition; failure never fails the primary job.
    async fn emit_webp_sibling(&self, source: &Path, sibling: &Path) {
        let args = to_string_vec([
            "-q", &self.config.webp_quality.to_string(),
            &source.to_string_lossy(),
            "-o", &sibling.to_string_lossy(),
        ]);

        match self.run_tool("cwebp", &args).await {
            Ok(true) => debug!("WebP sibling written: {}", sibling.display()),
            Ok(false) => warn!("cwebp failed for sibling {}", sibling.display()),
            Err(e) => warn!("cwebp invocation error for sibling {}: {}", sibling.display(), e),
        }
    }

    /// Run an ImageMagick operation through whichever binary is present
    /// (ImageMagick 7 `magick`, legacy `convert`).
    async fn run_magick(&self, args: &[String], context: &Path) -> Result<()> {
        let platform = PlatformCommands::instance();

        for tool in ["magick", "convert"] {
            if !platform.is_command_available(tool).await {
                continue;
            }
            if self.run_tool(tool, args).await? {
                return Ok(());
            }
            warn!("{} failed for {}, trying next tool", tool, context.display());
        }

        Err(tool_error("magick/convert", context))
    }

    /// Execute one external tool at lowered scheduling priority and report
    /// whether it exited successfully.
    async fn run_tool(&self, tool: &str, args: &[String]) -> Result<bool> {
        let platform = PlatformCommands::instance();
        let mut cmd = platform.niced_command(tool).await;

        debug!("Running {} {:?}", tool, args);
        let start_time = std::time::Instant::now();
        let success = cmd.args(args).status().await?.success();
        debug!("{} finished in {:?} (success: {})", tool, start_time.elapsed(), success);

        Ok(success)
    }

    /// Verify the external tools this run will need, before any processing.
    /// A missing required tool is fatal: no partial runs.
    pub async fn check_dependencies(config: &Config) -> Result<()> {
        let platform = PlatformCommands::instance();
        let mut missing: Vec<&str> = Vec::new();

        // Aggressive mode only re-encodes with cwebp; normal mode needs the
        // full per-format chain.
        if !config.aggressive {
            let has_magick = platform.is_command_available("magick").await
                || platform.is_command_available("convert").await;
            if !has_magick {
                missing.push("magick or convert (ImageMagick)");
            }

            let has_jpeg_pass = platform.is_command_available("jpegtran").await
                || platform.is_command_available("jpegoptim").await;
            if !has_jpeg_pass {
                missing.push("jpegtran or jpegoptim");
            }

            if !platform.is_command_available("oxipng").await {
                missing.push("oxipng");
            }
            if !platform.is_command_available("gifsicle").await {
                missing.push("gifsicle");
            }
        }

        if !platform.is_command_available("cwebp").await {
            missing.push("cwebp");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OptimizeError::MissingDependency(missing.join(", ")).into())
        }
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid path: {:?}", path))
}

fn tool_error(tool: &str, path: &Path) -> anyhow::Error {
    OptimizeError::Tool {
        tool: tool.to_string(),
        path: path.display().to_string(),
    }
    .into()
}
