use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Maximum words per segment, 0 = unlimited.
    pub max_words: usize,
    /// Maximum text lines per segment, 0 = unlimited.
    pub max_lines: usize,
    /// Characters per line.
    pub base_limit: usize,
}

impl SegmentationConfig {
    pub const DEFAULT_BASE_LIMIT: usize = 75;

    /// With every limit at zero the segmenter hands aligner segments through.
    pub fn is_unconstrained(&self) -> bool {
        self.max_words == 0 && self.max_lines == 0 && self.base_limit == 0
    }

    /// Character capacity of one segment, `None` when lines are unlimited.
    pub fn segment_capacity(&self) -> Option<usize> {
        (self.max_lines > 0).then(|| self.base_limit * self.max_lines)
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_words: 0,
            max_lines: 0,
            base_limit: Self::DEFAULT_BASE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    /// Gaps at or below this many seconds are closed.
    pub bridge_threshold: f64,
    pub min_duration: f64,
}

impl TimingConfig {
    pub const SENTENCE_MIN_DURATION: f64 = 0.2;
    pub const WORD_MIN_DURATION: f64 = 0.08;

    pub fn sentence(bridge_threshold_ms: u32) -> Self {
        Self {
            bridge_threshold: bridge_threshold_ms as f64 / 1000.0,
            min_duration: Self::SENTENCE_MIN_DURATION,
        }
    }

    pub fn word(bridge_threshold_ms: u32) -> Self {
        Self {
            bridge_threshold: bridge_threshold_ms as f64 / 1000.0,
            min_duration: Self::WORD_MIN_DURATION,
        }
    }

    /// A zero threshold disables the bridge stage for that granularity.
    pub fn is_enabled(&self) -> bool {
        self.bridge_threshold > 0.0
    }
}

/// Which kind of interval a refinement pass operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Sentence,
    Word,
}

impl Granularity {
    /// Largest start correction accepted from boundary refinement, in seconds.
    pub fn max_start_drift(self) -> f64 {
        match self {
            Granularity::Sentence => 0.30,
            Granularity::Word => 0.15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Sentence => "sentence",
            Granularity::Word => "word",
        }
    }
}

/// Fixed aggressive preset for speech-boundary refinement.
///
/// A low threshold catches whispers and breath onsets, and wide pads let the
/// search reach half a second before and after each aligner boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineryConfig {
    pub speech_threshold: f32,
    pub pad_start: f64,
    pub pad_end: f64,
    pub end_drift: f64,
    /// Reserved distance from each neighbouring interval, in seconds.
    pub neighbor_margin: f64,
    /// Zero-crossing search radius in samples.
    pub snap_window: usize,
    /// Release tail appended to a snapped end, in seconds.
    pub end_release: f64,
    /// Extra clearance kept between a refined end and the next start.
    pub next_start_guard: f64,
    /// Duration forced onto intervals that collapse during refinement.
    pub degenerate_duration: f64,
}

impl Default for RefineryConfig {
    fn default() -> Self {
        Self {
            speech_threshold: 0.08,
            pad_start: 0.50,
            pad_end: 0.50,
            end_drift: 0.50,
            neighbor_margin: 0.02,
            snap_window: 1200,
            end_release: 0.04,
            next_start_guard: 0.01,
            degenerate_duration: 0.1,
        }
    }
}

/// Throughput/memory trade-off for batched classifier inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceProfile {
    Eko,
    Mid,
    #[default]
    High,
    Ultra,
    Sonic,
    Custom,
}

impl InferenceProfile {
    /// Frames handed to the classifier per call.
    pub fn batch_frames(self) -> usize {
        match self {
            InferenceProfile::Eko => 2_000,
            InferenceProfile::Mid => 10_000,
            InferenceProfile::High => 20_000,
            InferenceProfile::Ultra | InferenceProfile::Sonic | InferenceProfile::Custom => 40_000,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("vram_").unwrap_or(&normalized);
        match normalized {
            "eko" => Some(Self::Eko),
            "mid" => Some(Self::Mid),
            "high" => Some(Self::High),
            "ultra" => Some(Self::Ultra),
            "sonic" => Some(Self::Sonic),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub segmentation: SegmentationConfig,
    pub bridge_threshold_ms: u32,
    pub word_bridge_threshold_ms: u32,
    pub refinery: RefineryConfig,
    pub inference_profile: InferenceProfile,
}

impl PipelineConfig {
    pub const DEFAULT_BRIDGE_THRESHOLD_MS: u32 = 700;
    pub const DEFAULT_WORD_BRIDGE_THRESHOLD_MS: u32 = 300;

    pub fn sentence_timing(&self) -> TimingConfig {
        TimingConfig::sentence(self.bridge_threshold_ms)
    }

    pub fn word_timing(&self) -> TimingConfig {
        TimingConfig::word(self.word_bridge_threshold_ms)
    }

    /// Reads a JSON settings file and validates it into a typed config.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io("read settings file", e))?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self, PipelineError> {
        let raw: RawSettings =
            serde_json::from_str(data).map_err(|e| PipelineError::json("parse settings", e))?;
        raw.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            bridge_threshold_ms: Self::DEFAULT_BRIDGE_THRESHOLD_MS,
            word_bridge_threshold_ms: Self::DEFAULT_WORD_BRIDGE_THRESHOLD_MS,
            refinery: RefineryConfig::default(),
            inference_profile: InferenceProfile::default(),
        }
    }
}

/// A settings value as it arrives from the settings layer: a JSON number or
/// a string that should contain one.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NumericSetting {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl NumericSetting {
    /// Parses the value as a non-negative integer. Negative numbers clamp to
    /// zero, fractional numbers truncate, blank strings count as unset.
    fn to_count(&self, field: &'static str) -> Result<Option<u64>, PipelineError> {
        let value = match self {
            NumericSetting::Integer(v) => *v as f64,
            NumericSetting::Float(v) => *v,
            NumericSetting::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed.parse::<f64>().map_err(|_| {
                    PipelineError::invalid_config(field, format!("expected a number, got {text:?}"))
                })?
            }
        };
        if !value.is_finite() {
            return Err(PipelineError::invalid_config(
                field,
                format!("expected a finite number, got {value}"),
            ));
        }
        Ok(Some(value.max(0.0) as u64))
    }
}

/// Untyped settings document; converted to [`PipelineConfig`] by `validate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    #[serde(default)]
    pub max_words: Option<NumericSetting>,
    #[serde(default)]
    pub max_lines: Option<NumericSetting>,
    #[serde(default)]
    pub base_limit: Option<NumericSetting>,
    #[serde(default, alias = "bridge_ms")]
    pub bridge_threshold_ms: Option<NumericSetting>,
    #[serde(default, alias = "word_bridge_ms")]
    pub word_bridge_threshold_ms: Option<NumericSetting>,
    #[serde(default, alias = "vram_profile")]
    pub inference_profile: Option<String>,
    #[serde(default)]
    pub refinery: Option<RefineryConfig>,
}

impl RawSettings {
    pub fn validate(&self) -> Result<PipelineConfig, PipelineError> {
        let defaults = PipelineConfig::default();

        let count = |setting: &Option<NumericSetting>,
                     field: &'static str|
         -> Result<Option<u64>, PipelineError> {
            match setting {
                Some(value) => value.to_count(field),
                None => Ok(None),
            }
        };
        let to_usize = |value: u64| usize::try_from(value).unwrap_or(usize::MAX);
        let to_ms = |value: u64| u32::try_from(value).unwrap_or(u32::MAX);

        let segmentation = SegmentationConfig {
            max_words: count(&self.max_words, "max_words")?
                .map(to_usize)
                .unwrap_or(defaults.segmentation.max_words),
            max_lines: count(&self.max_lines, "max_lines")?
                .map(to_usize)
                .unwrap_or(defaults.segmentation.max_lines),
            base_limit: count(&self.base_limit, "base_limit")?
                .map(to_usize)
                .unwrap_or(defaults.segmentation.base_limit),
        };

        let inference_profile = match self.inference_profile.as_deref() {
            Some(name) => InferenceProfile::parse(name).ok_or_else(|| {
                PipelineError::invalid_config(
                    "inference_profile",
                    format!("unknown profile {name:?}"),
                )
            })?,
            None => defaults.inference_profile,
        };

        Ok(PipelineConfig {
            segmentation,
            bridge_threshold_ms: count(&self.bridge_threshold_ms, "bridge_threshold_ms")?
                .map(to_ms)
                .unwrap_or(defaults.bridge_threshold_ms),
            word_bridge_threshold_ms: count(
                &self.word_bridge_threshold_ms,
                "word_bridge_threshold_ms",
            )?
            .map(to_ms)
            .unwrap_or(defaults.word_bridge_threshold_ms),
            refinery: self.refinery.unwrap_or(defaults.refinery),
            inference_profile,
        })
    }
}
