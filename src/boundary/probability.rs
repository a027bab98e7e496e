use std::ops::Range;

use crate::cancel::CancellationToken;
use crate::error::PipelineError;
use crate::pipeline::traits::SpeechClassifier;

/// Samples per classifier frame (32 ms at 16 kHz).
pub const FRAME_SAMPLES: usize = 512;

pub type Frame = [f32; FRAME_SAMPLES];

/// Per-frame speech likelihood for a whole file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    probs: Vec<f32>,
    sample_rate_hz: u32,
}

impl ProbabilityMap {
    pub fn new(probs: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            probs,
            sample_rate_hz,
        }
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probs.is_empty()
    }

    pub fn probabilities(&self) -> &[f32] {
        &self.probs
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Frame index nearest to `seconds`, clamped to `[0, len]`.
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds * self.sample_rate_hz as f64 / FRAME_SAMPLES as f64).round();
        if frame <= 0.0 {
            return 0;
        }
        (frame as usize).min(self.probs.len())
    }

    /// First and last frame in `frames` whose probability exceeds `threshold`.
    pub fn speech_span(&self, frames: Range<usize>, threshold: f32) -> Option<(usize, usize)> {
        let end = frames.end.min(self.probs.len());
        let start = frames.start.min(end);
        let window = &self.probs[start..end];
        let first = window.iter().position(|&p| p > threshold)?;
        let last = window.iter().rposition(|&p| p > threshold)?;
        Some((start + first, start + last))
    }
}

/// Splits audio into zero-padded frames.
pub fn split_frames(samples: &[f32]) -> Vec<Frame> {
    samples
        .chunks(FRAME_SAMPLES)
        .map(|chunk| {
            let mut frame = [0.0f32; FRAME_SAMPLES];
            frame[..chunk.len()].copy_from_slice(chunk);
            frame
        })
        .collect()
}

/// Runs the classifier over the whole file, `batch_frames` frames per call.
///
/// Returns `Ok(None)` when cancellation is observed between batches.
pub fn compute_probability_map(
    classifier: &dyn SpeechClassifier,
    samples: &[f32],
    sample_rate_hz: u32,
    batch_frames: usize,
    cancel: &CancellationToken,
) -> Result<Option<ProbabilityMap>, PipelineError> {
    let batch_samples = batch_frames.max(1) * FRAME_SAMPLES;
    let mut probs = Vec::with_capacity(samples.len().div_ceil(FRAME_SAMPLES));

    for batch in samples.chunks(batch_samples) {
        if cancel.is_cancelled() {
            tracing::debug!(frames_done = probs.len(), "probability map: cancelled between batches");
            return Ok(None);
        }
        let frames = split_frames(batch);
        let batch_probs = classifier.frame_probabilities(&frames, sample_rate_hz)?;
        if batch_probs.len() != frames.len() {
            return Err(PipelineError::runtime(
                "speech classifier",
                format!(
                    "expected {} probabilities, classifier returned {}",
                    frames.len(),
                    batch_probs.len()
                ),
            ));
        }
        probs.extend(batch_probs.into_iter().map(|p| p.clamp(0.0, 1.0)));
    }

    Ok(Some(ProbabilityMap::new(probs, sample_rate_hz)))
}
