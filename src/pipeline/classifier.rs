use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::PipelineError;
use crate::pipeline::traits::SpeechClassifier;

type ClassifierLoader = Box<dyn Fn() -> Result<Box<dyn SpeechClassifier>, PipelineError> + Send + Sync>;

/// Speech classifier handle that loads its model on first use.
///
/// The first successful `ensure_loaded` call keeps the classifier for the
/// lifetime of the handle; later files reuse it without reloading. A failed
/// load is not cached, so the next call tries again. Loading happens under a
/// mutex, so concurrent callers wait for a single initialization.
pub struct LazyClassifier {
    loader: ClassifierLoader,
    slot: Mutex<Option<Arc<dyn SpeechClassifier>>>,
}

impl LazyClassifier {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SpeechClassifier>, PipelineError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            slot: Mutex::new(None),
        }
    }

    /// Wraps an already constructed classifier.
    pub fn preloaded(classifier: impl SpeechClassifier + 'static) -> Self {
        let classifier: Arc<dyn SpeechClassifier> = Arc::new(classifier);
        Self {
            loader: Box::new(|| -> Result<Box<dyn SpeechClassifier>, PipelineError> {
                Err(PipelineError::classifier_unavailable(
                    "preloaded classifier has no loader",
                ))
            }),
            slot: Mutex::new(Some(classifier)),
        }
    }

    pub fn ensure_loaded(&self) -> Result<Arc<dyn SpeechClassifier>, PipelineError> {
        let mut slot = self.slot.lock().map_err(|_| {
            PipelineError::runtime("classifier lock", "classifier mutex poisoned")
        })?;
        if let Some(classifier) = slot.as_ref() {
            return Ok(Arc::clone(classifier));
        }

        tracing::info!("speech classifier: loading model (first use)");
        let classifier: Arc<dyn SpeechClassifier> = Arc::from((self.loader)()?);
        tracing::info!(classifier = classifier.label(), "speech classifier: loaded");
        *slot = Some(Arc::clone(&classifier));
        Ok(classifier)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

impl fmt::Debug for LazyClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyClassifier")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
