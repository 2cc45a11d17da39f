//! Full-page rasterization through the pdfium library.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use image::{DynamicImage, ImageBuffer, Rgb};
use pdfium_render::prelude::{PdfBitmapFormat, PdfRenderConfig, Pdfium};
use tracing::{debug, trace};

use super::loader::PdfDocument;
use super::render::PageRenderer;
use crate::error::RenderError;

/// Environment variable naming an explicit pdfium shared library.
pub const PDFIUM_LIB_ENV: &str = "DECKPARSE_PDFIUM_LIB_PATH";

/// Process-wide binding; pdfium is initialized at most once.
static PDFIUM: OnceLock<Result<Pdfium, String>> = OnceLock::new();

/// Renderer drawing text, vector graphics and images with pdfium.
pub struct PdfiumRenderer {
    pdfium: &'static Pdfium,
    max_dimension: u32,
}

impl PdfiumRenderer {
    /// Bind to a pdfium library.
    ///
    /// Looks at [`PDFIUM_LIB_ENV`], next to the executable, the working
    /// directory and finally the system library path.
    /// A failed lookup is remembered for the life of the process.
    pub fn bind() -> Result<Self, RenderError> {
        let pdfium = PDFIUM
            .get_or_init(bind_pdfium)
            .as_ref()
            .map_err(|e| RenderError::Backend(e.clone()))?;
        Ok(Self {
            pdfium,
            max_dimension: 10_000,
        })
    }

    /// Set the maximum width/height of the output bitmap.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }
}

impl std::fmt::Debug for PdfiumRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfiumRenderer")
            .field("max_dimension", &self.max_dimension)
            .finish_non_exhaustive()
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(
        &self,
        document: &PdfDocument,
        page: u32,
        scale: f32,
    ) -> Result<DynamicImage, RenderError> {
        document
            .page_id(page)
            .map_err(|_| RenderError::InvalidPage(page))?;
        let index = page
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or(RenderError::InvalidPage(page))?;

        let pdf = self
            .pdfium
            .load_pdf_from_byte_slice(document.raw_data(), None)
            .map_err(|e| RenderError::Content(format!("pdfium open failed: {}", e)))?;
        let pdf_page = pdf
            .pages()
            .get(index)
            .map_err(|e| RenderError::Content(format!("pdfium page access failed: {}", e)))?;

        let width = (pdf_page.width().value * scale).ceil();
        let height = (pdf_page.height().value * scale).ceil();
        if !(width >= 1.0 && height >= 1.0) {
            return Err(RenderError::Content(format!(
                "degenerate page size {}x{}",
                width, height
            )));
        }
        if width > self.max_dimension as f32 || height > self.max_dimension as f32 {
            return Err(RenderError::TooLarge {
                width: width as u32,
                height: height as u32,
            });
        }

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32)
            .render_form_data(true)
            .render_annotations(true)
            .set_reverse_byte_order(false)
            .set_format(PdfBitmapFormat::BGRA);
        let bitmap = pdf_page
            .render_with_config(&config)
            .map_err(|e| RenderError::Content(format!("pdfium render failed: {}", e)))?;

        let out_width = bitmap.width().max(0) as u32;
        let out_height = bitmap.height().max(0) as u32;
        let image = bgra_to_rgb(&bitmap.as_raw_bytes(), out_width, out_height).ok_or_else(|| {
            RenderError::Image(format!(
                "pdfium returned a short bitmap for {}x{}",
                out_width, out_height
            ))
        })?;

        debug!("Rendered page {} at {}x{} with pdfium", page, out_width, out_height);
        Ok(DynamicImage::ImageRgb8(image))
    }
}

/// Convert a BGRA bitmap, possibly with row padding, into RGB.
fn bgra_to_rgb(raw: &[u8], width: u32, height: u32) -> Option<ImageBuffer<Rgb<u8>, Vec<u8>>> {
    if width == 0 || height == 0 {
        return None;
    }
    let stride = raw.len() / height as usize;
    if stride < width as usize * 4 {
        return None;
    }

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for row in raw.chunks_exact(stride).take(height as usize) {
        for pixel in row[..width as usize * 4].chunks_exact(4) {
            rgb.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }
    }
    ImageBuffer::from_raw(width, height, rgb)
}

fn bind_pdfium() -> Result<Pdfium, String> {
    if let Ok(path) = std::env::var(PDFIUM_LIB_ENV) {
        let bindings = Pdfium::bind_to_library(&path)
            .map_err(|e| format!("failed to load pdfium from {}={}: {}", PDFIUM_LIB_ENV, path, e))?;
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(dir) = std::env::current_exe().ok().as_deref().and_then(Path::parent) {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(".")));

    for path in candidates {
        trace!("Trying pdfium at {}", path.display());
        if let Ok(bindings) = Pdfium::bind_to_library(&path) {
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        format!(
            "pdfium library not found ({}); install it or place {} next to the executable",
            e,
            Pdfium::pdfium_platform_library_name().to_string_lossy()
        )
    })?;
    Ok(Pdfium::new(bindings))
}
