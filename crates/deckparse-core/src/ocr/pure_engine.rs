//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use super::{EngineFactory, OcrBackend, Recognition, TextBox};
use crate::error::OcrError;
use crate::models::config::{DeckConfig, ModelPaths};

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
pub struct PureOcrEngine {
    engine: pure_onnx_ocr::engine::OcrEngine,
    keep_unk: bool,
}

impl PureOcrEngine {
    /// Load detection and recognition models from disk.
    pub fn from_paths(paths: &ModelPaths, keep_unk: bool) -> Result<Self, OcrError> {
        let missing = paths.missing();
        if !missing.is_empty() {
            let names: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(OcrError::EngineInit(format!(
                "missing model files: {}",
                names.join(", ")
            )));
        }

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&paths.detection)
            .rec_model_path(&paths.recognition)
            .dictionary_path(&paths.dictionary)
            .build()
            .map_err(|e| OcrError::EngineInit(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", paths.recognition.display());

        Ok(Self { engine, keep_unk })
    }
}

impl OcrBackend for PureOcrEngine {
    fn recognize(
        &mut self,
        image: &DynamicImage,
        progress: &dyn Fn(u8),
    ) -> Result<Recognition, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();

        debug!("Recognizing image: {}x{}", width, height);
        progress(0);

        let results = self
            .engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());
        progress(90);

        let boxes: Vec<TextBox> = results
            .iter()
            .map(|r| TextBox {
                bbox: polygon_to_bbox(&r.bounding_box),
                text: if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                },
                confidence: r.confidence,
            })
            .collect();

        let recognition =
            Recognition::from_boxes(boxes, (width, height), start.elapsed().as_millis() as u64);
        progress(100);

        debug!(
            "OCR complete: {} text boxes in {}ms",
            recognition.boxes.len(),
            recognition.processing_time_ms
        );
        Ok(recognition)
    }
}

/// Builds [`PureOcrEngine`]s from a model directory.
#[derive(Debug, Clone)]
pub struct PureOcrFactory {
    language: String,
    paths: ModelPaths,
    keep_unk: bool,
}

impl PureOcrFactory {
    /// Create a factory for the given language and model files.
    pub fn new(language: impl Into<String>, paths: ModelPaths) -> Self {
        Self {
            language: language.into(),
            paths,
            keep_unk: false,
        }
    }

    /// Create a factory from configuration.
    pub fn from_config(config: &DeckConfig) -> Self {
        Self::new(config.ocr.language.clone(), config.model_paths()).with_keep_unk(config.ocr.keep_unk)
    }

    /// Keep `[UNK]` tokens in recognized text.
    pub fn with_keep_unk(mut self, keep_unk: bool) -> Self {
        self.keep_unk = keep_unk;
        self
    }

    /// Model files the engines load.
    pub fn paths(&self) -> &ModelPaths {
        &self.paths
    }
}

impl EngineFactory for PureOcrFactory {
    fn language(&self) -> &str {
        &self.language
    }

    fn create(&self) -> Result<Box<dyn OcrBackend>, OcrError> {
        let engine = PureOcrEngine::from_paths(&self.paths, self.keep_unk)?;
        Ok(Box::new(engine))
    }
}

/// Convert a `Polygon<f64>` to our `[f32; 8]` bbox format.
///
/// Extracts the first 4 exterior points (quadrilateral) as
/// `[x1, y1, x2, y2, x3, y3, x4, y4]`.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
