pub mod boundary;
pub mod cancel;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod segmentation;
pub mod timing;
pub mod types;

pub use cancel::CancellationToken;
pub use config::{InferenceProfile, PipelineConfig, RawSettings, SegmentationConfig, TimingConfig};
pub use error::PipelineError;
pub use pipeline::builder::SubtitlePipelineBuilder;
pub use pipeline::classifier::LazyClassifier;
pub use pipeline::defaults::EnergyClassifier;
pub use pipeline::runtime::{PipelineReport, PipelineRun, SubtitlePipeline};
pub use pipeline::traits::{PipelineStage, SpeechClassifier};
pub use pipeline::worker::{FileJob, PipelineWorker, WorkerEvent};
pub use types::{
    AlignedResult, BatchOutcome, PipelineInput, PipelineOutput, Segment, SentenceCue, Word,
    WordCue,
};
