//! PDF processing module.

mod loader;
mod metadata;
#[cfg(feature = "pdfium")]
mod pdfium;
mod render;

pub use loader::PdfDocument;
pub use metadata::{decode_text_string, parse_pdf_date};
#[cfg(feature = "pdfium")]
pub use pdfium::{PDFIUM_LIB_ENV, PdfiumRenderer};
pub use render::{ImageLayerRenderer, PageRenderer};

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;
