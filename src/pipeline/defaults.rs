use crate::boundary::probability::Frame;
use crate::error::PipelineError;
use crate::pipeline::traits::SpeechClassifier;

/// Loudness-based speech classifier.
///
/// Maps each frame's RMS linearly from `silence_rms` (probability 0) to
/// `speech_rms` (probability 1). Good enough for clean studio audio and for
/// tests; noisy recordings want a trained model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyClassifier {
    pub silence_rms: f32,
    pub speech_rms: f32,
}

impl EnergyClassifier {
    pub const DEFAULT_SILENCE_RMS: f32 = 0.005;
    pub const DEFAULT_SPEECH_RMS: f32 = 0.05;

    pub fn new(silence_rms: f32, speech_rms: f32) -> Self {
        Self {
            silence_rms,
            speech_rms,
        }
    }

    fn probability(&self, frame: &Frame) -> f32 {
        let mean_sq =
            frame.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / frame.len() as f64;
        let rms = mean_sq.sqrt() as f32;
        let span = (self.speech_rms - self.silence_rms).max(f32::EPSILON);
        ((rms - self.silence_rms) / span).clamp(0.0, 1.0)
    }
}

impl Default for EnergyClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SILENCE_RMS, Self::DEFAULT_SPEECH_RMS)
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn frame_probabilities(
        &self,
        frames: &[Frame],
        _sample_rate_hz: u32,
    ) -> Result<Vec<f32>, PipelineError> {
        Ok(frames.iter().map(|frame| self.probability(frame)).collect())
    }

    fn label(&self) -> String {
        "energy".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::probability::FRAME_SAMPLES;

    #[test]
    fn silence_scores_zero_and_loud_frames_saturate() {
        let classifier = EnergyClassifier::default();
        let silent = [0.0f32; FRAME_SAMPLES];
        let loud = [0.3f32; FRAME_SAMPLES];
        let probs = classifier
            .frame_probabilities(&[silent, loud], 16_000)
            .expect("energy classifier never fails");
        assert_eq!(probs, vec![0.0, 1.0]);
    }

    #[test]
    fn intermediate_levels_scale_linearly() {
        let classifier = EnergyClassifier::new(0.0, 0.1);
        let frame = [0.05f32; FRAME_SAMPLES];
        let probs = classifier.frame_probabilities(&[frame], 16_000).unwrap();
        assert!((probs[0] - 0.5).abs() < 1e-4, "p={}", probs[0]);
    }

    #[test]
    fn degenerate_span_does_not_divide_by_zero() {
        let classifier = EnergyClassifier::new(0.1, 0.1);
        let probs = classifier
            .frame_probabilities(&[[0.2f32; FRAME_SAMPLES]], 16_000)
            .unwrap();
        assert_eq!(probs, vec![1.0]);
    }
}
