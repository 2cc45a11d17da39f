//! OCR engine lifecycle: lazy construction, reuse and termination.

use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{EngineFactory, OcrBackend, Recognition};
use crate::error::OcrError;

/// A session shared between concurrent parses.
///
/// The mutex serializes `recognize` calls across every parse holding a clone.
pub type SharedOcrSession = Arc<Mutex<OcrSession>>;

/// Owns at most one live engine and builds it on first use.
///
/// `terminate` drops the engine; the next `recognize` builds a fresh one.
pub struct OcrSession {
    factory: Arc<dyn EngineFactory>,
    engine: Option<Box<dyn OcrBackend>>,
}

impl OcrSession {
    /// Create a session. No engine is built until the first `recognize`.
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            engine: None,
        }
    }

    /// Create a session wrapped for sharing across parses.
    pub fn shared(factory: Arc<dyn EngineFactory>) -> SharedOcrSession {
        Arc::new(Mutex::new(Self::new(factory)))
    }

    /// Language of the engines this session builds.
    pub fn language(&self) -> &str {
        self.factory.language()
    }

    /// Whether an engine is currently alive.
    pub fn is_live(&self) -> bool {
        self.engine.is_some()
    }

    /// Recognize text, building the engine first if none is alive.
    pub fn recognize(
        &mut self,
        image: &DynamicImage,
        progress: &dyn Fn(u8),
    ) -> Result<Recognition, OcrError> {
        let mut engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                debug!("Initializing OCR engine ({})", self.factory.language());
                let engine = self.factory.create()?;
                info!("OCR engine initialized ({})", self.factory.language());
                engine
            }
        };

        let result = engine.recognize(image, progress);
        self.engine = Some(engine);
        result
    }

    /// Shut the engine down. Does nothing when no engine is alive.
    pub fn terminate(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            debug!("Terminating OCR engine");
            engine.shutdown();
        }
    }
}

impl Drop for OcrSession {
    fn drop(&mut self) {
        self.terminate();
    }
}
