//! OCR fallback: engine traits, session lifecycle and the bundled engine.

mod session;

#[cfg(feature = "native")]
mod pure_engine;

pub use session::{OcrSession, SharedOcrSession};

#[cfg(feature = "native")]
pub use pure_engine::{PureOcrEngine, PureOcrFactory};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// A stateful recognition engine.
///
/// Engines are not re-entrant: `recognize` takes `&mut self`, so callers
/// serialize through [`OcrSession`].
pub trait OcrBackend: Send {
    /// Recognize the text in `image`.
    ///
    /// `progress` receives completion percentages (0-100). It is informational only.
    fn recognize(
        &mut self,
        image: &DynamicImage,
        progress: &dyn Fn(u8),
    ) -> Result<Recognition, OcrError>;

    /// Release engine resources. Called once before the engine is dropped.
    fn shutdown(&mut self) {}
}

/// Constructs engines for a fixed language on demand.
pub trait EngineFactory: Send + Sync {
    /// ISO 639-2 language code of the engines this factory builds.
    fn language(&self) -> &str;

    /// Build a new engine. This is the expensive step sessions try to avoid repeating.
    fn create(&self) -> Result<Box<dyn OcrBackend>, OcrError>;
}

/// A detected text box with its coordinates and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Result of recognizing one page image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recognition {
    /// Recognized text boxes in reading order.
    pub boxes: Vec<TextBox>,

    /// Full text (boxes joined with newlines).
    pub text: String,

    /// Mean recognition confidence (0.0 - 1.0); 1.0 when nothing was recognized.
    pub confidence: f32,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

impl Recognition {
    /// Build a result from boxes, sorting them into reading order.
    pub fn from_boxes(mut boxes: Vec<TextBox>, image_size: (u32, u32), processing_time_ms: u64) -> Self {
        sort_by_reading_order(&mut boxes);

        let text = boxes
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let confidence = if boxes.is_empty() {
            1.0
        } else {
            boxes.iter().map(|b| b.confidence).sum::<f32>() / boxes.len() as f32
        };

        Self {
            boxes,
            text,
            confidence,
            processing_time_ms,
            image_size,
        }
    }

    /// A box-less result carrying plain text at full confidence.
    pub fn from_text(text: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            boxes: Vec::new(),
            text: text.into(),
            confidence: 1.0,
            processing_time_ms: 0,
            image_size: (width, height),
        }
    }
}

/// Sort boxes top-to-bottom, then left-to-right within 20 px rows.
pub fn sort_by_reading_order(boxes: &mut [TextBox]) {
    boxes.sort_by(|a, b| {
        let (ax, ay, _, _) = a.rect();
        let (bx, by, _, _) = b.rect();

        let row_a = (ay / 20.0) as i32;
        let row_b = (by / 20.0) as i32;

        row_a
            .cmp(&row_b)
            .then(ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(x: f32, y: f32, text: &str, confidence: f32) -> TextBox {
        TextBox {
            bbox: [x, y, x + 50.0, y, x + 50.0, y + 10.0, x, y + 10.0],
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_from_boxes_orders_rows_then_columns() {
        let boxes = vec![
            text_box(200.0, 105.0, "world", 0.8),
            text_box(10.0, 300.0, "footer", 0.6),
            text_box(10.0, 101.0, "hello", 1.0),
        ];
        let result = Recognition::from_boxes(boxes, (640, 480), 12);
        assert_eq!(result.text, "hello\nworld\nfooter");
        assert!((result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_empty_recognition_has_full_confidence() {
        let result = Recognition::from_boxes(Vec::new(), (10, 10), 0);
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 1.0);
    }
}
