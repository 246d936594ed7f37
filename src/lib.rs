//! # Philoassets Optimizer Library
//!
//! Pipeline batch single-host per l'ottimizzazione di alberi di asset
//! statici: selezione del lavoro, idempotenza via marker embedded,
//! dispatch parallelo a concorrenza limitata verso encoder esterni,
//! modalità aggressive a ricerca iterativa di qualità, report strutturato.
//!
//! ## Architettura dei moduli:
//! - `config`: Configurazione immutabile del run e parsing soglie
//! - `error`: Tipi di errore custom
//! - `marker`: Tier di idempotenza e confine di serializzazione dei tag
//! - `metadata`: Adapter exiftool per lettura bulk/scrittura marker
//! - `probe`: Lookup bulk delle dimensioni pixel via identify
//! - `selector`: Discovery input e partizione candidato/scartato
//! - `codec`: Trasformazioni per-formato via tool esterni
//! - `aggressive`: Ricerca lineare di qualità WebP sotto soglia
//! - `pipeline`: Dispatcher, worker e orchestratore a tre fasi
//! - `report`: Aggregazione risultati, riepilogo e CSV
//! - `signing`: Digest signed-URL compatibile col verifier esterno
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use philoassets_optimizer::{Config, PipelineRunner};
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let runner = PipelineRunner::new(config)?;
//! let report = runner.run(&[std::path::PathBuf::from("assets")]).await?;
//! println!("{}", report.format_summary());
//! # Ok(())
//! # }
//! ```

pub mod aggressive;
pub mod codec;
pub mod config;
pub mod error;
pub mod job;
pub mod marker;
pub mod metadata;
pub mod pipeline;
pub mod platform;
pub mod probe;
pub mod progress;
pub mod report;
pub mod selector;
pub mod signing;
pub mod utils;

pub use config::Config;
pub use error::OptimizeError;
pub use marker::Tier;
pub use pipeline::PipelineRunner;
pub use report::RunReport;
