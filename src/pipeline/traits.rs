use crate::boundary::probability::Frame;
use crate::error::PipelineError;

/// Frame-level voice activity classifier.
///
/// Receives a batch of fixed-size frames and returns one speech probability
/// per frame, in order.
pub trait SpeechClassifier: Send + Sync {
    fn frame_probabilities(
        &self,
        frames: &[Frame],
        sample_rate_hz: u32,
    ) -> Result<Vec<f32>, PipelineError>;

    fn label(&self) -> String;
}

/// Coarse pipeline stages, reported as a file is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    GapDistribution,
    SpeechDetection,
    SentenceRefinement,
    WordRefinement,
    Segmentation,
    Bridging,
}

impl PipelineStage {
    /// Fraction of a file's work completed once this stage starts.
    pub fn progress(self) -> f32 {
        match self {
            PipelineStage::GapDistribution => 0.0,
            PipelineStage::SpeechDetection => 0.1,
            PipelineStage::SentenceRefinement => 0.5,
            PipelineStage::WordRefinement => 0.6,
            PipelineStage::Segmentation => 0.8,
            PipelineStage::Bridging => 0.9,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::GapDistribution => "gap distribution",
            PipelineStage::SpeechDetection => "speech detection",
            PipelineStage::SentenceRefinement => "sentence refinement",
            PipelineStage::WordRefinement => "word refinement",
            PipelineStage::Segmentation => "segmentation",
            PipelineStage::Bridging => "bridging",
        }
    }
}
