//! Data models and configuration.

pub mod config;
pub mod document;

pub use config::{DeckConfig, ModelConfig, ModelPaths, OcrConfig, PdfConfig};
pub use document::{DocumentMetadata, ExtractionMethod, ExtractionStats, PageResult, ParsedDocument};
