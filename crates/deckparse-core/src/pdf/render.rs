//! Page rasterization for OCR.
//!
//! With the `pdfium` feature, [`PdfiumRenderer`](super::PdfiumRenderer) draws
//! complete pages. [`ImageLayerRenderer`] is the fallback when the pdfium
//! library cannot be bound: it composites a page's image XObjects onto a white
//! canvas sized from the MediaBox, honouring the `cm`/`q`/`Q` transform stack
//! and form XObjects. Vector paths and glyphs are not painted by it.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, trace, warn};

use super::loader::{PdfDocument, inherited_attribute};
use crate::error::RenderError;

/// US Letter, used when a page has no usable MediaBox.
const FALLBACK_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Maximum nesting of form XObjects.
const MAX_FORM_DEPTH: usize = 8;

/// Trait for turning a PDF page into a bitmap.
pub trait PageRenderer: Send + Sync {
    /// Render a 1-indexed page at `scale` times its native (72 dpi) size.
    fn render(
        &self,
        document: &PdfDocument,
        page: u32,
        scale: f32,
    ) -> Result<DynamicImage, RenderError>;
}

/// Renderer painting a page's embedded raster images.
#[derive(Debug, Clone)]
pub struct ImageLayerRenderer {
    max_dimension: u32,
}

impl ImageLayerRenderer {
    /// Create a renderer with the default size limit.
    pub fn new() -> Self {
        Self {
            max_dimension: 10_000,
        }
    }

    /// Set the maximum width/height of the output bitmap.
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }
}

impl Default for ImageLayerRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for ImageLayerRenderer {
    fn render(
        &self,
        document: &PdfDocument,
        page: u32,
        scale: f32,
    ) -> Result<DynamicImage, RenderError> {
        let page_id = document
            .page_id(page)
            .map_err(|_| RenderError::InvalidPage(page))?;
        let doc = document.inner();

        let media_box = inherited_attribute(doc, page_id, b"MediaBox")
            .and_then(rect_from_object)
            .unwrap_or(FALLBACK_MEDIA_BOX);
        let page_width = media_box[2] - media_box[0];
        let page_height = media_box[3] - media_box[1];

        let width = (page_width * scale).ceil();
        let height = (page_height * scale).ceil();
        if !(width >= 1.0 && height >= 1.0) {
            return Err(RenderError::Content(format!(
                "degenerate page size {}x{}",
                page_width, page_height
            )));
        }
        let (width, height) = (width as u32, height as u32);
        if width > self.max_dimension || height > self.max_dimension {
            return Err(RenderError::TooLarge { width, height });
        }

        let content = doc
            .get_page_content(page_id)
            .map_err(|e| RenderError::Content(e.to_string()))?;
        let resources = inherited_attribute(doc, page_id, b"Resources").and_then(|obj| match obj {
            Object::Dictionary(dict) => Some(dict),
            _ => None,
        });

        let mut canvas = Canvas {
            image: ImageBuffer::from_pixel(width, height, Rgb([255, 255, 255])),
            origin: (media_box[0], media_box[3]),
            scale,
            painted: 0,
            image_error: None,
        };

        // Device space flips y; the canvas mapping handles it, so start from identity
        paint_content(doc, &content, resources, Matrix::IDENTITY, &mut canvas, 0)?;

        // A page whose only images are undecodable would reach OCR as a blank sheet
        if canvas.painted == 0 {
            if let Some(reason) = canvas.image_error {
                return Err(RenderError::Image(reason));
            }
        }

        debug!(
            "Rendered page {} at {}x{} ({} images)",
            page, width, height, canvas.painted
        );
        Ok(DynamicImage::ImageRgb8(canvas.image))
    }
}

struct Canvas {
    image: RgbImage,
    /// Top-left corner of the page in PDF user space.
    origin: (f32, f32),
    scale: f32,
    painted: usize,
    /// Last image that could not be decoded.
    image_error: Option<String>,
}

impl Canvas {
    /// Paint `source` into the unit square mapped by `ctm`.
    fn draw(&mut self, source: &DynamicImage, ctm: &Matrix) {
        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| ctm.apply(x, y));
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

        let left = ((min_x - self.origin.0) * self.scale).round();
        let top = ((self.origin.1 - max_y) * self.scale).round();
        let width = ((max_x - min_x) * self.scale).round();
        let height = ((max_y - min_y) * self.scale).round();
        let too_large = width > self.image.width() as f32 * 4.0
            || height > self.image.height() as f32 * 4.0;
        if !(width >= 1.0 && height >= 1.0) || too_large {
            trace!("Skipping image with target size {}x{}", width, height);
            return;
        }

        let mut scaled = imageops::resize(
            &source.to_rgb8(),
            width as u32,
            height as u32,
            FilterType::Triangle,
        );
        // A negative d component means the image is drawn upside down
        if ctm.d < 0.0 {
            scaled = imageops::flip_vertical(&scaled);
        }
        imageops::overlay(&mut self.image, &scaled, left as i64, top as i64);
        self.painted += 1;
    }
}

fn paint_content(
    doc: &Document,
    content: &[u8],
    resources: Option<&Dictionary>,
    base: Matrix,
    canvas: &mut Canvas,
    depth: usize,
) -> Result<(), RenderError> {
    let content = Content::decode(content).map_err(|e| RenderError::Content(e.to_string()))?;

    let mut ctm = base;
    let mut stack = Vec::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => stack.push(ctm),
            "Q" => ctm = stack.pop().unwrap_or(base),
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    ctm = m.then(&ctm);
                }
            }
            "Do" => {
                let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                    continue;
                };
                let Some(stream) = lookup_xobject(doc, resources, name) else {
                    trace!("XObject {} not found", String::from_utf8_lossy(name));
                    continue;
                };
                paint_xobject(doc, stream, resources, ctm, canvas, depth)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn paint_xobject(
    doc: &Document,
    stream: &Stream,
    parent_resources: Option<&Dictionary>,
    ctm: Matrix,
    canvas: &mut Canvas,
    depth: usize,
) -> Result<(), RenderError> {
    let subtype = stream.dict.get(b"Subtype").and_then(|o| o.as_name());
    match subtype {
        Ok(b"Image") => {
            match decode_image(doc, stream) {
                Ok(image) => canvas.draw(&image, &ctm),
                Err(reason) => {
                    warn!("Skipping undecodable image XObject: {}", reason);
                    canvas.image_error = Some(reason);
                }
            }
            Ok(())
        }
        Ok(b"Form") if depth < MAX_FORM_DEPTH => {
            let form_matrix = stream
                .dict
                .get(b"Matrix")
                .ok()
                .and_then(|o| o.as_array().ok())
                .and_then(|arr| Matrix::from_operands(arr))
                .unwrap_or(Matrix::IDENTITY);
            let resources = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|o| doc.dereference(o).ok())
                .and_then(|(_, o)| match o {
                    Object::Dictionary(dict) => Some(dict),
                    _ => None,
                })
                .or(parent_resources);
            let content = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            paint_content(doc, &content, resources, form_matrix.then(&ctm), canvas, depth + 1)
        }
        _ => Ok(()),
    }
}

fn lookup_xobject<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    name: &[u8],
) -> Option<&'a Stream> {
    let xobjects = resources?.get(b"XObject").ok()?;
    let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) else {
        return None;
    };
    match doc.dereference(xobjects.get(name).ok()?).ok()? {
        (_, Object::Stream(stream)) => Some(stream),
        _ => None,
    }
}

/// Decode an image XObject into pixels.
fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage, String> {
    let dict = &stream.dict;
    let dimension = |key: &[u8]| {
        dict.get(key)
            .and_then(|o| o.as_i64())
            .ok()
            .and_then(|v| u32::try_from(v).ok())
    };
    let (Some(width), Some(height)) = (dimension(b"Width"), dimension(b"Height")) else {
        return Err("image without valid Width/Height".to_string());
    };

    let filters: Vec<&[u8]> = stream.filters().unwrap_or_default();
    match filters.last().copied() {
        Some(b"DCTDecode") => {
            trace!("Decoding JPEG image {}x{}", width, height);
            let jpeg = if filters.len() > 1 {
                decode_filter_prefix(stream, &filters[..filters.len() - 1])?
            } else {
                stream.content.clone()
            };
            return image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
                .map_err(|e| format!("JPEG decode failed: {}", e));
        }
        Some(name @ (b"JPXDecode" | b"CCITTFaxDecode" | b"JBIG2Decode")) => {
            return Err(format!(
                "unsupported image filter {}",
                String::from_utf8_lossy(name)
            ));
        }
        _ => {}
    }

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| format!("stream decode failed: {}", e))?
    };
    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    let components = color_components(doc, dict.get(b"ColorSpace").ok())
        .ok_or_else(|| "unsupported colour space".to_string())?;

    raw_to_image(&data, width, height, components, bits)
        .ok_or_else(|| format!("{} components at {} bits not decodable", components, bits))
}

/// Undo the filters applied on top of an image codec, e.g. `[/FlateDecode /DCTDecode]`.
fn decode_filter_prefix(stream: &Stream, prefix: &[&[u8]]) -> Result<Vec<u8>, String> {
    let mut outer = Stream::new(stream.dict.clone(), stream.content.clone());
    let names: Vec<Object> = prefix.iter().map(|n| Object::Name(n.to_vec())).collect();
    outer.dict.set("Filter", Object::Array(names));
    // Per-filter parameters live in an array parallel to Filter
    match stream.dict.get(b"DecodeParms") {
        Ok(Object::Array(params)) => match params.first() {
            Some(Object::Dictionary(first)) => outer.dict.set("DecodeParms", first.clone()),
            _ => {
                outer.dict.remove(b"DecodeParms");
            }
        },
        Ok(_) | Err(_) => {}
    }
    outer
        .decompressed_content()
        .map_err(|e| format!("stream decode failed: {}", e))
}

/// Number of colour components of an image colour space.
fn color_components(doc: &Document, color_space: Option<&Object>) -> Option<u8> {
    let Some(color_space) = color_space else {
        return Some(1);
    };
    let (_, color_space) = doc.dereference(color_space).ok()?;
    match color_space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"G" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" | b"CMYK" => Some(4),
            _ => None,
        },
        Object::Array(arr) => match arr.first().and_then(|o| o.as_name().ok()) {
            Some(b"ICCBased") => {
                let (_, profile) = doc.dereference(arr.get(1)?).ok()?;
                let n = profile.as_stream().ok()?.dict.get(b"N").ok()?.as_i64().ok()?;
                u8::try_from(n).ok()
            }
            Some(b"CalGray") => Some(1),
            Some(b"CalRGB") | Some(b"Lab") => Some(3),
            _ => None,
        },
        _ => None,
    }
}

fn raw_to_image(data: &[u8], width: u32, height: u32, components: u8, bits: i64) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;

    let rgb: Vec<u8> = match (components, bits) {
        (1, 8) => data.get(..pixels)?.iter().flat_map(|&g| [g, g, g]).collect(),
        (1, 1) => {
            let row_bytes = (width as usize).div_ceil(8);
            let packed = data.get(..row_bytes * height as usize)?;
            let mut out = Vec::with_capacity(pixels * 3);
            for row in packed.chunks(row_bytes) {
                for x in 0..width as usize {
                    let bit = (row[x / 8] >> (7 - (x % 8))) & 1;
                    let value = if bit == 1 { 255 } else { 0 };
                    out.extend_from_slice(&[value, value, value]);
                }
            }
            out
        }
        (3, 8) => data.get(..pixels * 3)?.to_vec(),
        (4, 8) => data
            .get(..pixels * 4)?
            .chunks_exact(4)
            .flat_map(|p| {
                let k = 255 - p[3] as u16;
                [p[0], p[1], p[2]].map(|c| ((255 - c as u16) * k / 255) as u8)
            })
            .collect(),
        _ => {
            trace!("Unsupported image format: {} components, {} bits", components, bits);
            return None;
        }
    };

    ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
}

fn rect_from_object(obj: &Object) -> Option<[f32; 4]> {
    let arr = obj.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut rect = [0.0f32; 4];
    for (slot, value) in rect.iter_mut().zip(arr) {
        *slot = number(value)?;
    }
    let [x0, y0, x1, y1] = rect;
    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Affine transform `[a b c d e f]` as used by PDF.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let v: Vec<f32> = operands.iter().map(number).collect::<Option<_>>()?;
        Some(Self {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    /// `self` applied first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}
