//! Page-by-page extraction: text layer first, OCR when the layer is too thin.

pub mod aggregate;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::error::{DeckError, OcrError, RenderError, Result};
use crate::models::config::DeckConfig;
use crate::models::document::{ExtractionMethod, PageResult, ParsedDocument};
use crate::ocr::{EngineFactory, OcrSession, Recognition, SharedOcrSession};
use crate::pdf::{ImageLayerRenderer, PageRenderer, PdfDocument};
use crate::text::{char_len, correct_confusables, count_words, normalize};

/// Cooperative cancellation, checked between pages.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every parse holding a clone of this flag to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress events published while a document is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseProgress {
    /// A page is about to be processed.
    PageStarted { page: u32, page_count: u32 },

    /// OCR on `page` reached `percent` (0-100).
    Ocr { page: u32, percent: u8 },

    /// A page is done.
    PageFinished {
        page: u32,
        page_count: u32,
        method: ExtractionMethod,
    },
}

/// Receiver for [`ParseProgress`] events.
pub type ProgressCallback = Arc<dyn Fn(ParseProgress) + Send + Sync>;

/// Where a parse gets its OCR engine from.
#[derive(Clone)]
pub enum OcrProvider {
    /// Never run OCR.
    Disabled,

    /// Each parse builds its own engine on first need and shuts it down at the end.
    PerCall(Arc<dyn EngineFactory>),

    /// Every parse uses one long-lived session; calls are serialized by its mutex.
    Shared(SharedOcrSession),
}

impl std::fmt::Debug for OcrProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::PerCall(factory) => write!(f, "PerCall({})", factory.language()),
            Self::Shared(_) => f.write_str("Shared"),
        }
    }
}

/// Failure on the OCR path of a single page.
#[derive(Error, Debug)]
enum OcrPathError {
    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("{0}")]
    Ocr(#[from] OcrError),

    #[error("OCR engine still busy after {0}ms")]
    EngineBusy(u64),
}

/// Extracts the text of pitch-deck PDFs.
///
/// ```no_run
/// use deckparse_core::{CancellationFlag, DeckConfig, DeckParser};
///
/// # async fn run(bytes: Vec<u8>) -> deckparse_core::Result<()> {
/// let parser = DeckParser::new(DeckConfig::default());
/// let document = parser.parse(&bytes, &CancellationFlag::new()).await?;
/// println!("{} pages, {} words", document.page_count, document.extraction_stats.total_words);
/// # Ok(())
/// # }
/// ```
pub struct DeckParser {
    config: DeckConfig,
    renderer: Arc<dyn PageRenderer>,
    ocr: OcrProvider,
    progress: Option<ProgressCallback>,
}

impl DeckParser {
    /// Create a parser from configuration.
    ///
    /// Pages are rendered with pdfium when the library can be bound. OCR uses
    /// a per-call engine built from the configured model files.
    pub fn new(config: DeckConfig) -> Self {
        let renderer = default_renderer(&config);
        let ocr = default_provider(&config);

        Self {
            config,
            renderer,
            ocr,
            progress: None,
        }
    }

    /// Create a parser after checking the configuration.
    pub fn try_new(config: DeckConfig) -> Result<Self> {
        config.validate().map_err(DeckError::Config)?;
        Ok(Self::new(config))
    }

    /// Replace the page renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Build a fresh engine per parse from `factory`.
    pub fn with_engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.ocr = OcrProvider::PerCall(factory);
        self
    }

    /// Share one session (and its engine) across parses.
    pub fn with_shared_session(mut self, session: SharedOcrSession) -> Self {
        self.ocr = OcrProvider::Shared(session);
        self
    }

    /// Never fall back to OCR.
    pub fn without_ocr(mut self) -> Self {
        self.ocr = OcrProvider::Disabled;
        self
    }

    /// Receive progress events.
    pub fn on_progress(mut self, callback: impl Fn(ParseProgress) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &DeckConfig {
        &self.config
    }

    pub fn ocr_provider(&self) -> &OcrProvider {
        &self.ocr
    }

    /// Read and parse a PDF file.
    pub async fn parse_file(&self, path: &Path, cancel: &CancellationFlag) -> Result<ParsedDocument> {
        let bytes = tokio::fs::read(path).await?;
        self.parse(&bytes, cancel).await
    }

    /// Parse a PDF held in memory.
    ///
    /// Returns a complete document or a single fatal error. Pages that fail on
    /// the OCR path keep their text layer and are flagged as degraded.
    pub async fn parse(&self, data: &[u8], cancel: &CancellationFlag) -> Result<ParsedDocument> {
        let started = Instant::now();

        if cancel.is_cancelled() {
            return Err(DeckError::Cancelled);
        }

        let document = Arc::new(PdfDocument::load(data)?);
        let page_count = document.page_count();
        info!("Parsing PDF: {} pages, {} bytes", page_count, data.len());

        let metadata = document.metadata_or_default();

        let (session, owned) = match (&self.ocr, self.config.ocr.enabled) {
            (_, false) | (OcrProvider::Disabled, _) => (None, false),
            (OcrProvider::PerCall(factory), true) => {
                (Some(OcrSession::shared(Arc::clone(factory))), true)
            }
            (OcrProvider::Shared(session), true) => (Some(Arc::clone(session)), false),
        };

        let mut run = PageRun {
            parser: self,
            document,
            session: session.clone(),
            warnings: Vec::new(),
        };
        let outcome = run.process_all(cancel).await;

        if let Some(session) = session {
            if owned || cancel.is_cancelled() {
                terminate_when_idle(session);
            }
        }

        let pages = outcome?;
        let parsed = aggregate::assemble(pages, metadata, run.warnings, started);

        info!(
            "Parsed {} pages: {} text, {} OCR, {} words in {}ms",
            parsed.page_count,
            parsed.extraction_stats.pages_with_text,
            parsed.extraction_stats.pages_with_ocr,
            parsed.extraction_stats.total_words,
            parsed.extraction_stats.processing_time_ms
        );

        Ok(parsed)
    }

    fn emit(&self, event: ParseProgress) {
        if let Some(callback) = &self.progress {
            callback(event);
        }
    }
}

/// Shut the engine down now, or as soon as a timed-out page releases it.
fn terminate_when_idle(session: SharedOcrSession) {
    if let Ok(mut guard) = session.try_lock() {
        guard.terminate();
        return;
    }
    debug!("OCR engine still busy with a timed-out page, terminating once it finishes");
    tokio::spawn(async move {
        session.lock().await.terminate();
    });
}

#[cfg(feature = "pdfium")]
fn default_renderer(config: &DeckConfig) -> Arc<dyn PageRenderer> {
    let max_dimension = config.pdf.max_render_dimension;
    match crate::pdf::PdfiumRenderer::bind() {
        Ok(renderer) => Arc::new(renderer.with_max_dimension(max_dimension)),
        Err(e) => {
            warn!("Rendering embedded images only: {}", e);
            Arc::new(ImageLayerRenderer::new().with_max_dimension(max_dimension))
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn default_renderer(config: &DeckConfig) -> Arc<dyn PageRenderer> {
    Arc::new(ImageLayerRenderer::new().with_max_dimension(config.pdf.max_render_dimension))
}

#[cfg(feature = "native")]
fn default_provider(config: &DeckConfig) -> OcrProvider {
    OcrProvider::PerCall(Arc::new(crate::ocr::PureOcrFactory::from_config(config)))
}

#[cfg(not(feature = "native"))]
fn default_provider(_config: &DeckConfig) -> OcrProvider {
    OcrProvider::Disabled
}

/// State of one parse call.
struct PageRun<'a> {
    parser: &'a DeckParser,
    document: Arc<PdfDocument>,
    /// Cleared when the engine cannot be built.
    session: Option<SharedOcrSession>,
    warnings: Vec<String>,
}

impl PageRun<'_> {
    async fn process_all(&mut self, cancel: &CancellationFlag) -> Result<Vec<PageResult>> {
        let page_count = self.document.page_count();
        let mut pages = Vec::with_capacity(page_count as usize);

        for page in 1..=page_count {
            if cancel.is_cancelled() {
                info!("Parse cancelled before page {}", page);
                return Err(DeckError::Cancelled);
            }

            self.parser.emit(ParseProgress::PageStarted { page, page_count });
            let result = self.process_page(page).await;
            self.parser.emit(ParseProgress::PageFinished {
                page,
                page_count,
                method: result.extraction_method,
            });
            pages.push(result);
        }

        Ok(pages)
    }

    async fn process_page(&mut self, page: u32) -> PageResult {
        let threshold = self.parser.config.pdf.text_threshold;

        let (native, layer_error) = match self.document.native_text(page) {
            Ok(text) => (text, None),
            Err(e) => {
                debug!("Page {}: no usable text layer ({})", page, e);
                (String::new(), Some(e.to_string()))
            }
        };
        let native_len = char_len(&native);

        let mut method = ExtractionMethod::Text;
        let mut chosen = native;
        let mut warning = layer_error;
        let mut degraded = warning.is_some();

        if native_len >= threshold {
            debug!("Page {}: text layer accepted ({} chars)", page, native_len);
        } else if let Some(session) = self.session.clone() {
            debug!(
                "Page {}: text layer has {} chars, trying OCR",
                page, native_len
            );
            match self.recognize(page, session).await {
                Ok(recognition) => {
                    let ocr_text = self.clean_ocr_text(&recognition);
                    let ocr_len = char_len(&ocr_text);
                    if ocr_len > native_len {
                        debug!("Page {}: OCR text adopted ({} chars)", page, ocr_len);
                        chosen = ocr_text;
                        method = ExtractionMethod::Ocr;
                        warning = None;
                        degraded = false;
                    } else {
                        debug!(
                            "Page {}: OCR text ({} chars) not longer than text layer",
                            page, ocr_len
                        );
                    }
                }
                Err(OcrPathError::Ocr(OcrError::EngineInit(msg))) => {
                    warn!("OCR unavailable, continuing with text layer only: {}", msg);
                    self.warnings.push(format!("OCR unavailable: {}", msg));
                    self.session = None;
                }
                Err(e @ OcrPathError::EngineBusy(_)) => {
                    warn!("Page {}: {}, skipping OCR for the remaining pages", page, e);
                    self.warnings
                        .push(format!("OCR skipped from page {}: {}", page, e));
                    self.session = None;
                    warning = Some(e.to_string());
                    degraded = true;
                }
                Err(e) => {
                    warn!("Page {}: OCR failed, keeping text layer: {}", page, e);
                    warning = Some(e.to_string());
                    degraded = true;
                }
            }
        } else {
            debug!("Page {}: text layer has {} chars, OCR disabled", page, native_len);
        }

        if degraded {
            if let Some(reason) = &warning {
                warn!("Page {} degraded: {}", page, reason);
            }
        }

        let text = normalize(&chosen);
        PageResult {
            page_number: page,
            word_count: count_words(&text),
            text,
            extraction_method: method,
            degraded,
            warning,
        }
    }

    /// Render and recognize one page off the async runtime, within the page budget.
    ///
    /// The budget starts once the engine is free; an earlier page that timed
    /// out keeps it until its recognition returns.
    async fn recognize(
        &self,
        page: u32,
        session: SharedOcrSession,
    ) -> std::result::Result<Recognition, OcrPathError> {
        let mut guard = match self.parser.config.ocr.engine_wait() {
            Some(limit) => tokio::time::timeout(limit, session.lock_owned())
                .await
                .map_err(|_| OcrPathError::EngineBusy(limit.as_millis() as u64))?,
            None => session.lock_owned().await,
        };

        let document = Arc::clone(&self.document);
        let renderer = Arc::clone(&self.parser.renderer);
        let progress = self.parser.progress.clone();
        let scale = self.parser.config.pdf.render_scale;

        let job = tokio::task::spawn_blocking(move || -> std::result::Result<Recognition, OcrPathError> {
            let image = renderer.render(&document, page, scale)?;
            let report = |percent: u8| {
                trace!("Page {}: OCR {}%", page, percent);
                if let Some(callback) = &progress {
                    callback(ParseProgress::Ocr { page, percent });
                }
            };
            Ok(guard.recognize(&image, &report)?)
        });

        let joined = match self.parser.config.ocr.page_timeout() {
            Some(limit) => match tokio::time::timeout(limit, job).await {
                Ok(joined) => joined,
                Err(_) => return Err(OcrError::Timeout(limit.as_millis() as u64).into()),
            },
            None => job.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) => Err(OcrError::Aborted(e.to_string()).into()),
        }
    }

    fn clean_ocr_text(&self, recognition: &Recognition) -> String {
        let config = &self.parser.config.ocr;
        let text = recognition.text.trim();
        if config.correct_confusables && recognition.confidence < config.confusable_confidence_threshold {
            correct_confusables(text)
        } else {
            text.to_string()
        }
    }
}
