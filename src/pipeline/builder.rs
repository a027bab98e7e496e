use std::sync::Arc;

use crate::boundary::BoundaryRefinery;
use crate::config::{PipelineConfig, RefineryConfig};
use crate::error::PipelineError;
use crate::pipeline::classifier::LazyClassifier;
use crate::pipeline::defaults::EnergyClassifier;
use crate::pipeline::runtime::{SubtitlePipeline, SubtitlePipelineParts};

pub struct SubtitlePipelineBuilder {
    config: PipelineConfig,
    classifier: Option<Arc<LazyClassifier>>,
    refinement_enabled: bool,
}

impl SubtitlePipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            classifier: None,
            refinement_enabled: true,
        }
    }

    /// Shares a classifier handle; the model loads on the first file that
    /// needs it and stays loaded for every pipeline holding the handle.
    pub fn with_classifier(mut self, classifier: Arc<LazyClassifier>) -> Self {
        self.classifier = Some(classifier);
        self.refinement_enabled = true;
        self
    }

    /// Keeps aligner boundaries as they are.
    pub fn without_refinement(mut self) -> Self {
        self.classifier = None;
        self.refinement_enabled = false;
        self
    }

    pub fn build(self) -> Result<SubtitlePipeline, PipelineError> {
        validate_refinery(&self.config.refinery)?;

        let refinery = if self.refinement_enabled {
            let classifier = self
                .classifier
                .unwrap_or_else(|| Arc::new(LazyClassifier::preloaded(EnergyClassifier::default())));
            BoundaryRefinery::new(classifier, self.config.refinery, self.config.inference_profile)
        } else {
            BoundaryRefinery::without_classifier(self.config.refinery)
        };

        tracing::debug!(
            max_words = self.config.segmentation.max_words,
            max_lines = self.config.segmentation.max_lines,
            base_limit = self.config.segmentation.base_limit,
            bridge_ms = self.config.bridge_threshold_ms,
            word_bridge_ms = self.config.word_bridge_threshold_ms,
            profile = ?self.config.inference_profile,
            refinement = self.refinement_enabled,
            "subtitle pipeline built"
        );

        Ok(SubtitlePipeline::from_parts(SubtitlePipelineParts {
            config: self.config,
            refinery,
        }))
    }
}

fn validate_refinery(cfg: &RefineryConfig) -> Result<(), PipelineError> {
    if !(0.0..=1.0).contains(&cfg.speech_threshold) {
        return Err(PipelineError::invalid_config(
            "refinery.speech_threshold",
            format!("must lie in [0, 1], got {}", cfg.speech_threshold),
        ));
    }
    let durations = [
        ("refinery.pad_start", cfg.pad_start),
        ("refinery.pad_end", cfg.pad_end),
        ("refinery.end_drift", cfg.end_drift),
        ("refinery.neighbor_margin", cfg.neighbor_margin),
        ("refinery.end_release", cfg.end_release),
        ("refinery.next_start_guard", cfg.next_start_guard),
        ("refinery.degenerate_duration", cfg.degenerate_duration),
    ];
    for (field, value) in durations {
        if !value.is_finite() || value < 0.0 {
            return Err(PipelineError::invalid_config(
                field,
                format!("must be a non-negative number of seconds, got {value}"),
            ));
        }
    }
    Ok(())
}
