use std::path::Path;
use std::sync::Mutex;

use crate::boundary::probability::{Frame, FRAME_SAMPLES};
use crate::error::PipelineError;
use crate::pipeline::traits::SpeechClassifier;

const STATE_DIM: usize = 64;

/// Silero VAD (v4 ONNX export) running on the CPU execution provider.
///
/// Each frame of a batch is classified with a fresh recurrent state, so
/// batches can be any size the inference profile asks for.
pub struct SileroClassifier {
    session: Mutex<ort::session::Session>,
    model_path: String,
}

impl SileroClassifier {
    pub fn load(model_path: &Path) -> Result<Self, PipelineError> {
        if !model_path.exists() {
            return Err(PipelineError::classifier_unavailable(format!(
                "model file not found: {}",
                model_path.display()
            )));
        }
        let session = ort::session::Session::builder()
            .map_err(|e| PipelineError::runtime("onnx session builder", e))?
            .with_execution_providers(vec![ort::ep::CPU::default().build()])
            .map_err(|e| PipelineError::runtime("onnx execution providers", e))?
            .commit_from_file(model_path)
            .map_err(|e| PipelineError::classifier_unavailable(format!("onnx model load: {e}")))?;

        tracing::info!(
            inputs = session.inputs().len(),
            outputs = session.outputs().len(),
            model_path = %model_path.display(),
            "silero VAD ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            model_path: model_path.display().to_string(),
        })
    }
}

impl SpeechClassifier for SileroClassifier {
    fn frame_probabilities(
        &self,
        frames: &[Frame],
        sample_rate_hz: u32,
    ) -> Result<Vec<f32>, PipelineError> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        if sample_rate_hz != 16_000 && sample_rate_hz != 8_000 {
            return Err(PipelineError::runtime(
                "silero inference",
                format!("unsupported sample rate {sample_rate_hz} Hz, expected 8000 or 16000"),
            ));
        }

        let batch = frames.len();
        let audio: Vec<f32> = frames.iter().flat_map(|frame| frame.iter().copied()).collect();
        let input = ort::value::Tensor::from_array(([batch, FRAME_SAMPLES], audio))
            .map_err(|e| PipelineError::runtime("onnx input tensor", e))?;
        let sr = ort::value::Tensor::from_array(([0usize; 0], vec![sample_rate_hz as i64]))
            .map_err(|e| PipelineError::runtime("onnx sr tensor", e))?;
        let h = ort::value::Tensor::from_array(([2, batch, STATE_DIM], vec![0.0f32; 2 * batch * STATE_DIM]))
            .map_err(|e| PipelineError::runtime("onnx state tensor", e))?;
        let c = ort::value::Tensor::from_array(([2, batch, STATE_DIM], vec![0.0f32; 2 * batch * STATE_DIM]))
            .map_err(|e| PipelineError::runtime("onnx state tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PipelineError::runtime("onnx session lock", "session mutex poisoned"))?;
        let outputs = session
            .run(ort::inputs!["input" => input, "sr" => sr, "h" => h, "c" => c])
            .map_err(|e| PipelineError::runtime("silero forward pass", e))?;
        let (_, probs) = outputs["output"]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::runtime("silero extract output", e))?;

        if probs.len() != batch {
            return Err(PipelineError::runtime(
                "silero extract output",
                format!("expected {batch} probabilities, got {}", probs.len()),
            ));
        }
        Ok(probs.to_vec())
    }

    fn label(&self) -> String {
        format!("silero ({})", self.model_path)
    }
}
