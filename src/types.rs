use serde::{Deserialize, Serialize};

/// A time span in seconds that refinement and bridging stages can correct.
///
/// `bounds()` returns `None` for malformed intervals (missing start or end),
/// which every stage skips instead of failing the batch.
pub trait Interval {
    fn bounds(&self) -> Option<(f64, f64)>;
    fn set_start(&mut self, start: f64);
    fn set_end(&mut self, end: f64);
}

/// A single aligned word. Aligners leave `start`/`end` unset for tokens they
/// could not place (digits, symbols), so both are optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(rename = "word", default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn is_timed(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

impl Interval for Word {
    fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.start?, self.end?))
    }

    fn set_start(&mut self, start: f64) {
        self.start = Some(start);
    }

    fn set_end(&mut self, end: f64) {
        self.end = Some(end);
    }
}

/// A sentence-level span. Like [`Word`], its times are optional on the wire
/// so one malformed segment does not reject the whole file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
            text: text.into(),
            words: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = words;
        self
    }
}

impl Interval for Segment {
    fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.start?, self.end?))
    }

    fn set_start(&mut self, start: f64) {
        self.start = Some(start);
    }

    fn set_end(&mut self, end: f64) {
        self.end = Some(end);
    }
}

/// Word-aligned transcription as produced by the upstream aligner.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignedResult {
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub sample_rate_hz: u32,
    /// Mono PCM samples in [-1, 1].
    pub samples: Vec<f32>,
    pub aligned: AlignedResult,
}

/// Sentence-level subtitle cue. `text` may contain `\n` line breaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceCue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCue {
    pub start: f64,
    pub end: f64,
    pub word: String,
}

impl Interval for WordCue {
    fn bounds(&self) -> Option<(f64, f64)> {
        Some((self.start, self.end))
    }

    fn set_start(&mut self, start: f64) {
        self.start = start;
    }

    fn set_end(&mut self, end: f64) {
        self.end = end;
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub sentences: Vec<SentenceCue>,
    pub words: Vec<WordCue>,
}

/// What happened to one item of a batch stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemResult {
    Adjusted,
    Unchanged,
    /// Malformed interval (missing time fields); left as-is.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub processed: usize,
    pub adjusted: usize,
    pub skipped: usize,
    /// Set when a cancellation request stopped the stage early.
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn record(&mut self, result: ItemResult) {
        self.processed += 1;
        match result {
            ItemResult::Adjusted => self.adjusted += 1,
            ItemResult::Unchanged => {}
            ItemResult::Skipped => self.skipped += 1,
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}

/// Items returned by a batch stage together with its per-item accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput<T> {
    pub items: Vec<T>,
    pub outcome: BatchOutcome,
}

impl<T> StageOutput<T> {
    pub(crate) fn untouched(items: Vec<T>) -> Self {
        Self {
            items,
            outcome: BatchOutcome::default(),
        }
    }
}
