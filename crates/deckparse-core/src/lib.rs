//! Core library for pitch-deck PDF text extraction.
//!
//! This crate provides:
//! - PDF loading, metadata and native text-layer extraction
//! - Page rasterization (pdfium, with an image-layer fallback) and an OCR
//!   fallback using PaddleOCR models
//! - Deterministic text normalization
//! - A page-by-page pipeline producing a [`ParsedDocument`]

pub mod error;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod text;

#[cfg(test)]
mod testing;

pub use error::{DeckError, OcrError, PdfError, RenderError, Result};
pub use models::config::{DeckConfig, ModelConfig, ModelPaths, OcrConfig, PdfConfig};
pub use models::document::{
    DocumentMetadata, ExtractionMethod, ExtractionStats, PageResult, ParsedDocument,
};
pub use ocr::{EngineFactory, OcrBackend, OcrSession, Recognition, SharedOcrSession, TextBox};
#[cfg(feature = "native")]
pub use ocr::{PureOcrEngine, PureOcrFactory};
pub use pdf::{ImageLayerRenderer, PageRenderer, PdfDocument};
#[cfg(feature = "pdfium")]
pub use pdf::{PDFIUM_LIB_ENV, PdfiumRenderer};
pub use pipeline::{CancellationFlag, DeckParser, OcrProvider, ParseProgress, ProgressCallback};
