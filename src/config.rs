//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri della pipeline
//! - Fornisce validazione robusta dei parametri di input
//! - Parsing delle soglie di dimensione con suffisso (`500KB`, `2MB`)
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//!
//! ## Parametri di configurazione:
//! - `size_threshold`: Soglia in byte oltre cui un file è candidato (default: 500KB)
//! - `max_dimension`: Lato massimo in pixel oltre cui si ridimensiona (default: 2560)
//! - `jpeg_quality` / `webp_quality`: Qualità di ricodifica (1-100, default: 80)
//! - `aggressive_floor`: Qualità minima della ricerca aggressive (default: 40)
//! - `workers`: Numero di job paralleli richiesti (default: 4)
//! - `output_path`: Directory di output che rispecchia i path relativi
//! - `aggressive`: Secondo stadio WebP guidato dalla dimensione
//! - `force`: Ignora i marker di idempotenza
//! - `recursive`: Scende nelle sottodirectory (default: solo primo livello)
//! - `webp_siblings`: Genera la rendition WebP accanto all'output
//!
//! La configurazione è immutabile per tutta la durata di una invocazione.

use crate::error::OptimizeError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound of the aggressive quality search; the floor must stay below it.
pub const AGGRESSIVE_START_QUALITY: u8 = 95;

/// Configuration for one optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Size threshold in bytes (strictly-greater-than selects a file)
    pub size_threshold: u64,
    /// Maximum pixel dimension (strictly-greater-than selects a file)
    pub max_dimension: u32,
    /// JPEG re-encode quality (1-100)
    pub jpeg_quality: u8,
    /// WebP quality for siblings and aggressive encodes (1-100)
    pub webp_quality: u8,
    /// Quality floor for the aggressive search (hard stop)
    pub aggressive_floor: u8,
    /// Number of parallel jobs requested (clamped at dispatch time)
    pub workers: usize,
    /// Output directory mirroring input relative paths
    pub output_path: Option<PathBuf>,
    /// Aggressive mode: size-driven WebP re-encoding of optimized files
    pub aggressive: bool,
    /// Ignore idempotence markers and reprocess
    pub force: bool,
    /// Recurse into subdirectories of directory inputs
    pub recursive: bool,
    /// Dry run - select and list, do not dispatch
    pub dry_run: bool,
    /// Emit a WebP rendition next to each optimized output
    pub webp_siblings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size_threshold: 500 * 1024,
            max_dimension: 2560,
            jpeg_quality: 80,
            webp_quality: 80,
            aggressive_floor: 40,
            workers: 4,
            output_path: None,
            aggressive: false,
            force: false,
            recursive: false,
            dry_run: false,
            webp_siblings: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(anyhow::anyhow!("JPEG quality must be between 1 and 100"));
        }

        if self.webp_quality == 0 || self.webp_quality > 100 {
            return Err(anyhow::anyhow!("WebP quality must be between 1 and 100"));
        }

        if self.aggressive_floor == 0 || self.aggressive_floor >= AGGRESSIVE_START_QUALITY {
            return Err(anyhow::anyhow!(
                "Aggressive quality floor must be between 1 and {}",
                AGGRESSIVE_START_QUALITY - 1
            ));
        }

        if self.size_threshold == 0 {
            return Err(anyhow::anyhow!("Size threshold must be greater than 0"));
        }

        if self.max_dimension == 0 {
            return Err(anyhow::anyhow!("Max dimension must be greater than 0"));
        }

        if self.workers == 0 {
            return Err(anyhow::anyhow!("Number of workers must be greater than 0"));
        }

        // Normal mode writes an output tree; aggressive mode may run in place
        // over the previous stage's output tree.
        if !self.aggressive && self.output_path.is_none() {
            return Err(anyhow::anyhow!(
                "An output directory is required outside aggressive mode"
            ));
        }

        if let Some(ref output_path) = self.output_path {
            if !output_path.exists() {
                return Err(anyhow::anyhow!("Output path does not exist: {}", output_path.display()));
            }
            if !output_path.is_dir() {
                return Err(anyhow::anyhow!("Output path is not a directory: {}", output_path.display()));
            }
        }

        Ok(())
    }

    /// Parse a size threshold string with an optional KB/MB/GB suffix.
    ///
    /// Accepts `"512000"`, `"500KB"`, `"2MB"`, `"1GB"` (case-insensitive,
    /// `B` suffix optional). Binary multiples, matching the values the
    /// selector compares against.
    pub fn parse_size(input: &str) -> Result<u64, OptimizeError> {
        let trimmed = input.trim();
        let upper = trimmed.to_ascii_uppercase();

        let (digits, multiplier) = if let Some(stripped) = upper.strip_suffix("KB") {
            (stripped, 1024u64)
        } else if let Some(stripped) = upper.strip_suffix("MB") {
            (stripped, 1024 * 1024)
        } else if let Some(stripped) = upper.strip_suffix("GB") {
            (stripped, 1024 * 1024 * 1024)
        } else if let Some(stripped) = upper.strip_suffix('B') {
            (stripped, 1)
        } else {
            (upper.as_str(), 1)
        };

        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| OptimizeError::SizeParse(input.to_string()))?;

        value
            .checked_mul(multiplier)
            .ok_or_else(|| OptimizeError::SizeParse(input.to_string()))
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn aggressive_config() -> Config {
        Config {
            aggressive: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = aggressive_config();
        assert!(config.validate().is_ok());

        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.jpeg_quality = 80;
        config.webp_quality = 101;
        assert!(config.validate().is_err());

        config.webp_quality = 80;
        config.aggressive_floor = AGGRESSIVE_START_QUALITY;
        assert!(config.validate().is_err());

        config.aggressive_floor = 40;
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_normal_mode_requires_output() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            output_path: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.size_threshold, 500 * 1024);
        assert_eq!(config.max_dimension, 2560);
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.webp_quality, 80);
        assert_eq!(config.aggressive_floor, 40);
        assert_eq!(config.workers, 4);
        assert!(!config.aggressive);
        assert!(!config.force);
        assert!(!config.recursive);
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(Config::parse_size("512000").unwrap(), 512000);
        assert_eq!(Config::parse_size("500KB").unwrap(), 500 * 1024);
        assert_eq!(Config::parse_size("2MB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(Config::parse_size("1gb").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(Config::parse_size("100B").unwrap(), 100);
        assert_eq!(Config::parse_size(" 500 KB ").unwrap(), 500 * 1024);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!(Config::parse_size("").is_err());
        assert!(Config::parse_size("KB").is_err());
        assert!(Config::parse_size("12XB").is_err());
        assert!(Config::parse_size("-5MB").is_err());
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            size_threshold: 2 * 1024 * 1024,
            jpeg_quality: 85,
            webp_quality: 75,
            workers: 8,
            aggressive: true,
            force: true,
            ..Default::default()
        };

        // Save config
        original_config.save_to_file(&config_path).await.unwrap();

        // Load config
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.size_threshold, 2 * 1024 * 1024);
        assert_eq!(loaded_config.jpeg_quality, 85);
        assert_eq!(loaded_config.webp_quality, 75);
        assert_eq!(loaded_config.workers, 8);
        assert!(loaded_config.aggressive);
        assert!(loaded_config.force);
    }
}
