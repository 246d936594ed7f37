//! # Asset Optimizer - Main Entry Point
//!
//! Punto di ingresso dell'applicazione.
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (input, output, soglie, workers, modalità)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Valida gli input e crea la directory di output se necessario
//! 4. Crea la configurazione e avvia la pipeline
//! 5. L'exit status riflette la presenza di job falliti
//!
//! ## Esempio di utilizzo:
//! ```bash
//! asset-optimizer assets/ --output dist/ --threshold 500KB --jobs 8
//! asset-optimizer assets/ --output dist/ --aggressive --quality-floor 40
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use philoassets_optimizer::{Config, PipelineRunner};

#[derive(Parser)]
#[command(name = "asset-optimizer")]
#[command(about = "Optimize image asset trees with marker-based idempotence")]
struct Args {
    /// Files or directories to optimize
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory mirroring input relative paths
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Size threshold above which a file is a candidate (e.g. 500KB, 2MB)
    #[arg(short, long, default_value = "500KB")]
    threshold: String,

    /// Maximum pixel dimension before downscaling
    #[arg(short, long, default_value = "2560")]
    max_dimension: u32,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value = "80")]
    quality: u8,

    /// WebP quality for siblings and aggressive encodes (1-100)
    #[arg(long, default_value = "80")]
    webp_quality: u8,

    /// Generate a WebP rendition next to each optimized output
    #[arg(long)]
    webp: bool,

    /// Number of parallel jobs (clamped to a quarter of available cores)
    #[arg(short, long, default_value = "4")]
    jobs: usize,

    /// Aggressive mode: size-driven WebP re-encoding of optimized files
    #[arg(long)]
    aggressive: bool,

    /// Quality floor for the aggressive search
    #[arg(long, default_value = "40")]
    quality_floor: u8,

    /// Reprocess files regardless of idempotence markers
    #[arg(short, long)]
    force: bool,

    /// Recurse into subdirectories of directory inputs
    #[arg(short, long)]
    recursive: bool,

    /// Select and list candidates without processing anything
    #[arg(long)]
    dry_run: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Validate arguments before any processing begins
    for input in &args.inputs {
        if !input.exists() {
            return Err(anyhow::anyhow!("Input path does not exist: {}", input.display()));
        }
    }

    let size_threshold = Config::parse_size(&args.threshold)?;

    // Create the output directory if needed
    if let Some(ref output_dir) = args.output {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
            info!("Created output directory: {}", output_dir.display());
        }
        if !output_dir.is_dir() {
            return Err(anyhow::anyhow!("Output path is not a directory: {}", output_dir.display()));
        }
    }

    let config = Config {
        size_threshold,
        max_dimension: args.max_dimension,
        jpeg_quality: args.quality,
        webp_quality: args.webp_quality,
        aggressive_floor: args.quality_floor,
        workers: args.jobs,
        output_path: args.output,
        aggressive: args.aggressive,
        force: args.force,
        recursive: args.recursive,
        dry_run: args.dry_run,
        webp_siblings: args.webp,
    };

    let runner = PipelineRunner::new(config)?;
    let report = runner.run(&args.inputs).await?;

    // Partial success still surfaces in the exit status
    if report.failed > 0 {
        error!("{} job(s) failed; see the report for details", report.failed);
        std::process::exit(1);
    }

    Ok(())
}
