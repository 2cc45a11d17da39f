//! Subcommands and the option handling they share.

pub mod batch;
pub mod config;
pub mod models;
pub mod parse;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::{debug, warn};

use deckparse_core::{CancellationFlag, DeckConfig};

/// Load the configuration from `--config`, the user config file, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<DeckConfig> {
    if let Some(path) = config_path {
        return DeckConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        debug!("Using config file {}", default_path.display());
        return DeckConfig::from_file(&default_path)
            .with_context(|| format!("Failed to read config file {}", default_path.display()));
    }

    Ok(DeckConfig::default())
}

/// Extraction options that override the configuration file.
#[derive(Args, Debug, Default)]
pub struct ExtractionOverrides {
    /// Use only the PDF text layer, never OCR
    #[arg(long)]
    pub no_ocr: bool,

    /// Raster scale for OCR rendering
    #[arg(long)]
    pub scale: Option<f32>,

    /// Minimum text-layer length (characters) that skips OCR
    #[arg(long)]
    pub threshold: Option<usize>,

    /// OCR language (ISO 639-2, e.g. "eng")
    #[arg(long)]
    pub lang: Option<String>,

    /// Model directory
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Per-page OCR budget in milliseconds (0 waits forever)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl ExtractionOverrides {
    pub fn apply(&self, config: &mut DeckConfig) {
        if self.no_ocr {
            config.ocr.enabled = false;
        }
        if let Some(scale) = self.scale {
            config.pdf.render_scale = scale;
        }
        if let Some(threshold) = self.threshold {
            config.pdf.text_threshold = threshold;
        }
        if let Some(lang) = &self.lang {
            config.ocr.language = lang.clone();
        }
        if let Some(dir) = &self.model_dir {
            config.models.model_dir = dir.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.ocr.page_timeout_ms = if ms == 0 { None } else { Some(ms) };
        }
    }
}

/// Cancel `flag` when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c(flag: &CancellationFlag) {
    let flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the current page");
            flag.cancel();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let overrides = ExtractionOverrides {
            no_ocr: true,
            scale: Some(3.0),
            threshold: Some(25),
            lang: Some("deu".to_string()),
            model_dir: Some(PathBuf::from("/opt/models")),
            timeout_ms: Some(0),
        };
        let mut config = DeckConfig::default();
        overrides.apply(&mut config);

        assert!(!config.ocr.enabled);
        assert_eq!(config.pdf.render_scale, 3.0);
        assert_eq!(config.pdf.text_threshold, 25);
        assert_eq!(config.ocr.language, "deu");
        assert_eq!(config.models.model_dir, PathBuf::from("/opt/models"));
        assert_eq!(config.ocr.page_timeout_ms, None);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = DeckConfig::default();
        ExtractionOverrides::default().apply(&mut config);
        assert!(config.ocr.enabled);
        assert_eq!(config.pdf.text_threshold, 10);
        assert_eq!(config.ocr.page_timeout_ms, Some(120_000));
    }
}
