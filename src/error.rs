//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `InvalidInput`: Input path inesistente o configurazione incoerente
//! - `SizeParse`: Stringa di soglia malformata (es. "500XB")
//! - `MissingDependency`: Tool esterno mancante (magick, exiftool, cwebp, ...)
//! - `Tool`: Invocazione tool esterno fallita (exit status non-zero)
//! - `UnsupportedFormat`: Estensione file non supportata
//! - `Metadata`: Errori di lettura/scrittura marker embedded
//!
//! Gli errori fatali (input, soglia, dipendenze) bloccano il run prima di
//! qualsiasi elaborazione; gli errori per-file restano confinati al job.

/// Custom error types for asset optimization
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid size threshold '{0}': expected a number with optional KB/MB/GB suffix")]
    SizeParse(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("{tool} failed for {path}")]
    Tool { tool: String, path: String },

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Metadata marker error: {0}")]
    Metadata(String),
}
