//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Native text of at least this many characters is accepted without OCR.
pub const DEFAULT_TEXT_THRESHOLD: usize = 10;

/// Upscale factor applied when rasterizing a page for OCR.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Language model used by the OCR engine.
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Main configuration for the deckparse pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// PDF processing configuration.
    pub pdf: PdfConfig,

    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Model configuration.
    pub models: ModelConfig,
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Native text of at least this many characters skips OCR.
    pub text_threshold: usize,

    /// Raster upscale factor relative to the page's native size (72 dpi).
    pub render_scale: f32,

    /// Upper bound for either side of a rendered bitmap, in pixels.
    pub max_render_dimension: u32,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            render_scale: DEFAULT_RENDER_SCALE,
            max_render_dimension: 10_000,
        }
    }
}

/// OCR fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Fall back to OCR for pages without a usable text layer.
    pub enabled: bool,

    /// Language of the recognition model (ISO 639-2, e.g. "eng").
    pub language: String,

    /// Budget for rendering and recognizing one page. `None` waits forever.
    pub page_timeout_ms: Option<u64>,

    /// Longest wait for the engine to come free before a page's budget starts,
    /// e.g. while it finishes a page that timed out. `None` waits forever.
    pub engine_wait_ms: Option<u64>,

    /// Keep `[UNK]` tokens emitted by the recognizer.
    pub keep_unk: bool,

    /// Repair letter/digit confusions in OCR output.
    pub correct_confusables: bool,

    /// Confusables are only repaired when recognition confidence is below this.
    pub confusable_confidence_threshold: f32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: DEFAULT_OCR_LANGUAGE.to_string(),
            page_timeout_ms: Some(120_000),
            engine_wait_ms: Some(300_000),
            keep_unk: false,
            correct_confusables: true,
            confusable_confidence_threshold: 0.9,
        }
    }
}

impl OcrConfig {
    /// Page budget as a [`Duration`].
    pub fn page_timeout(&self) -> Option<Duration> {
        self.page_timeout_ms.map(Duration::from_millis)
    }

    /// Engine wait as a [`Duration`].
    pub fn engine_wait(&self) -> Option<Duration> {
        self.engine_wait_ms.map(Duration::from_millis)
    }
}

/// Model file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name. Derived from the language when unset.
    pub recognition_model: Option<String>,

    /// Character dictionary file name. Derived from the language when unset.
    pub dictionary: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: None,
            dictionary: None,
        }
    }
}

/// Resolved paths of the three files an OCR engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub detection: PathBuf,
    pub recognition: PathBuf,
    pub dictionary: PathBuf,
}

impl ModelPaths {
    /// Whether every model file is present on disk.
    pub fn exist(&self) -> bool {
        self.detection.exists() && self.recognition.exists() && self.dictionary.exists()
    }

    /// Files that are missing on disk.
    pub fn missing(&self) -> Vec<&PathBuf> {
        [&self.detection, &self.recognition, &self.dictionary]
            .into_iter()
            .filter(|p| !p.exists())
            .collect()
    }
}

impl ModelConfig {
    /// Resolve model file paths for a recognition language.
    pub fn resolve(&self, language: &str) -> ModelPaths {
        let script = script_for_language(language);
        let recognition = self
            .recognition_model
            .clone()
            .unwrap_or_else(|| format!("{}_rec.onnx", script));
        let dictionary = self
            .dictionary
            .clone()
            .unwrap_or_else(|| format!("{}_dict.txt", script));

        ModelPaths {
            detection: self.model_dir.join(&self.detection_model),
            recognition: self.model_dir.join(recognition),
            dictionary: self.model_dir.join(dictionary),
        }
    }
}

/// Map an ISO 639-2 language code to the recognition model family covering it.
pub fn script_for_language(language: &str) -> String {
    match language.to_ascii_lowercase().as_str() {
        "eng" | "fra" | "deu" | "spa" | "ita" | "por" | "nld" | "pol" | "swe" | "dan"
        | "nor" | "fin" | "ces" | "slk" | "ron" | "hun" | "tur" => "latin".to_string(),
        "rus" | "ukr" | "bel" | "bul" | "srp" => "cyrillic".to_string(),
        other => other.to_string(),
    }
}

impl DeckConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Model paths for the configured OCR language.
    pub fn model_paths(&self) -> ModelPaths {
        self.models.resolve(&self.ocr.language)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.pdf.render_scale.is_finite() && self.pdf.render_scale > 0.0) {
            return Err(format!("pdf.render_scale must be positive, got {}", self.pdf.render_scale));
        }
        if self.pdf.max_render_dimension == 0 {
            return Err("pdf.max_render_dimension must be non-zero".to_string());
        }
        if self.ocr.language.trim().is_empty() {
            return Err("ocr.language must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_documented_constants() {
        let config = DeckConfig::default();
        assert_eq!(config.pdf.text_threshold, 10);
        assert_eq!(config.pdf.render_scale, 2.0);
        assert_eq!(config.ocr.language, "eng");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DeckConfig =
            serde_json::from_str(r#"{"pdf": {"text_threshold": 25}}"#).unwrap();
        assert_eq!(config.pdf.text_threshold, 25);
        assert_eq!(config.pdf.render_scale, 2.0);
        assert!(config.ocr.enabled);
    }

    #[test]
    fn test_resolve_english_uses_latin_models() {
        let models = ModelConfig {
            model_dir: PathBuf::from("/m"),
            ..ModelConfig::default()
        };
        let paths = models.resolve("eng");
        assert_eq!(paths.detection, PathBuf::from("/m/det.onnx"));
        assert_eq!(paths.recognition, PathBuf::from("/m/latin_rec.onnx"));
        assert_eq!(paths.dictionary, PathBuf::from("/m/latin_dict.txt"));
    }

    #[test]
    fn test_resolve_honours_overrides() {
        let models = ModelConfig {
            model_dir: PathBuf::from("/m"),
            recognition_model: Some("custom.onnx".to_string()),
            ..ModelConfig::default()
        };
        let paths = models.resolve("jpn");
        assert_eq!(paths.recognition, PathBuf::from("/m/custom.onnx"));
        assert_eq!(paths.dictionary, PathBuf::from("/m/jpn_dict.txt"));
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        let mut config = DeckConfig::default();
        config.pdf.render_scale = 0.0;
        assert!(config.validate().is_err());
    }
}
