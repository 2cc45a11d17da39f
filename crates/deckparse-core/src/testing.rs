//! In-memory PDF fixtures and fake OCR parts shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, dictionary};

use crate::error::{OcrError, RenderError};
use crate::ocr::{EngineFactory, OcrBackend, Recognition};
use crate::pdf::{PageRenderer, PdfDocument};

/// What to draw on one fixture page.
#[derive(Debug, Clone, Default)]
pub struct PageSpec {
    runs: Vec<String>,
    image: Option<(u32, u32)>,
    filled_rect: bool,
}

impl PageSpec {
    /// A page with a text layer only.
    pub fn text(text: &str) -> Self {
        Self::runs(&[text])
    }

    /// A page drawing each string with its own `Tj`, one line apart.
    pub fn runs(runs: &[&str]) -> Self {
        Self {
            runs: runs.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    /// A page with a single grey-scale image and no text layer.
    pub fn image(width: u32, height: u32) -> Self {
        Self {
            image: Some((width, height)),
            ..Self::default()
        }
    }

    /// Also paint a filled black rectangle as vector graphics.
    pub fn with_filled_rect(mut self) -> Self {
        self.filled_rect = true;
        self
    }

    /// An empty page.
    pub fn blank() -> Self {
        Self::default()
    }
}

/// Builder for small PDFs.
#[derive(Debug, Default)]
pub struct PdfFixture {
    pages: Vec<PageSpec>,
    info: Vec<(&'static str, Object)>,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, layout: PageSpec) -> Self {
        self.pages.push(layout);
        self
    }

    pub fn info(mut self, key: &'static str, value: Object) -> Self {
        self.info.push((key, value));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for layout in &self.pages {
            let mut operations = Vec::new();
            let mut xobjects = Dictionary::new();

            if let Some((width, height)) = layout.image {
                let pixels = vec![0u8; (width * height) as usize];
                let image_id = doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => Object::Integer(width as i64),
                        "Height" => Object::Integer(height as i64),
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => Object::Integer(8),
                    },
                    pixels,
                ));
                xobjects.set("Im1", image_id);
                operations.push(Operation::new("q", vec![]));
                operations.push(Operation::new(
                    "cm",
                    [400, 0, 0, 300, 100, 400]
                        .into_iter()
                        .map(Object::Integer)
                        .collect(),
                ));
                operations.push(Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]));
                operations.push(Operation::new("Q", vec![]));
            }

            if layout.filled_rect {
                operations.push(Operation::new(
                    "re",
                    [72, 72, 200, 100].into_iter().map(Object::Integer).collect(),
                ));
                operations.push(Operation::new("f", vec![]));
            }

            if !layout.runs.is_empty() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(24)],
                ));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Integer(72), Object::Integer(720)],
                ));
                for (index, run) in layout.runs.iter().enumerate() {
                    if index > 0 {
                        operations.push(Operation::new(
                            "Td",
                            vec![Object::Integer(0), Object::Integer(-30)],
                        ));
                    }
                    operations.push(Operation::new("Tj", vec![Object::string_literal(run.as_str())]));
                }
                operations.push(Operation::new("ET", vec![]));
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("fixture content encodes"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                    "XObject" => xobjects,
                },
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if !self.info.is_empty() {
            let mut info = Dictionary::new();
            for (key, value) in self.info {
                info.set(key, value);
            }
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture saves");
        bytes
    }
}

/// Counters shared between a [`FakeFactory`] and the test observing it.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub created: AtomicUsize,
    pub recognized: AtomicUsize,
    pub shut_down: AtomicUsize,
}

impl EngineStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn recognized(&self) -> usize {
        self.recognized.load(Ordering::SeqCst)
    }

    pub fn shut_down(&self) -> usize {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// Scripted answer for one `recognize` call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Fail,
    Slow(Duration, String),
}

/// Engine factory handing out engines that replay scripted answers.
///
/// Once the script runs dry every call answers with `fallback`.
pub struct FakeFactory {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: String,
    fail_init: bool,
    pub stats: Arc<EngineStats>,
}

impl FakeFactory {
    pub fn answering(fallback: &str) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: fallback.to_string(),
            fail_init: false,
            stats: Arc::new(EngineStats::default()),
        }
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::answering("")
        }
    }

    pub fn then(self, answer: Scripted) -> Self {
        self.script.lock().unwrap().push_back(answer);
        self
    }
}

impl EngineFactory for FakeFactory {
    fn language(&self) -> &str {
        "eng"
    }

    fn create(&self) -> Result<Box<dyn OcrBackend>, OcrError> {
        if self.fail_init {
            return Err(OcrError::EngineInit("model files missing".to_string()));
        }
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            script: Arc::clone(&self.script),
            fallback: self.fallback.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct FakeEngine {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: String,
    stats: Arc<EngineStats>,
}

impl OcrBackend for FakeEngine {
    fn recognize(
        &mut self,
        image: &DynamicImage,
        progress: &dyn Fn(u8),
    ) -> Result<Recognition, OcrError> {
        self.stats.recognized.fetch_add(1, Ordering::SeqCst);
        progress(0);
        let next = self.script.lock().unwrap().pop_front();
        let text = match next {
            Some(Scripted::Text(text)) => text,
            Some(Scripted::Fail) => {
                return Err(OcrError::Recognition("scripted failure".to_string()));
            }
            Some(Scripted::Slow(delay, text)) => {
                std::thread::sleep(delay);
                text
            }
            None => self.fallback.clone(),
        };
        progress(100);
        Ok(Recognition::from_text(text, image.width(), image.height()))
    }

    fn shutdown(&mut self) {
        self.stats.shut_down.fetch_add(1, Ordering::SeqCst);
    }
}

/// Renderer producing a small blank bitmap, failing on chosen pages.
#[derive(Debug, Default)]
pub struct FakeRenderer {
    pub fail_on: Vec<u32>,
}

impl PageRenderer for FakeRenderer {
    fn render(
        &self,
        document: &PdfDocument,
        page: u32,
        _scale: f32,
    ) -> Result<DynamicImage, RenderError> {
        document
            .page_id(page)
            .map_err(|_| RenderError::InvalidPage(page))?;
        if self.fail_on.contains(&page) {
            return Err(RenderError::Content("scripted render failure".to_string()));
        }
        Ok(DynamicImage::new_rgb8(8, 8))
    }
}
