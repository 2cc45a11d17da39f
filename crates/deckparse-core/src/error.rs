//! Error types for the deckparse-core library.

use thiserror::Error;

/// Main error type for the deckparse library.
///
/// Only failures that make the whole document unusable end up here. Page-level
/// problems are reported in-band on [`crate::PageResult`].
#[derive(Error, Debug)]
pub enum DeckError {
    /// The input could not be opened as a PDF.
    #[error("failed to load document: {0}")]
    DocumentLoad(#[from] PdfError),

    /// The parse was cancelled between pages.
    #[error("parse cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to PDF loading and the native text layer.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF bytes.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and the empty password does not open it.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// The document information dictionary could not be read.
    #[error("failed to read metadata: {0}")]
    Metadata(String),

    /// Failed to extract the text layer of a page.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),
}

/// Errors raised while rasterizing a page for OCR.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// The page content stream could not be read.
    #[error("failed to read page content: {0}")]
    Content(String),

    /// The requested bitmap exceeds the configured size limit.
    #[error("rendered page too large: {width}x{height}")]
    TooLarge { width: u32, height: u32 },

    /// No image on the page could be decoded.
    #[error("image error: {0}")]
    Image(String),

    /// The rendering library could not be loaded.
    #[error("renderer unavailable: {0}")]
    Backend(String),
}

/// Errors related to the OCR engine.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The recognition engine could not be constructed.
    #[error("failed to initialize OCR engine: {0}")]
    EngineInit(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Render + recognize did not finish within the page budget.
    #[error("OCR timed out after {0}ms")]
    Timeout(u64),

    /// The recognition task died before returning.
    #[error("OCR task aborted: {0}")]
    Aborted(String),
}

/// Result type for the deckparse library.
pub type Result<T> = std::result::Result<T, DeckError>;
