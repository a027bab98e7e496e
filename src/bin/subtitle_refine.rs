use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use claxon::FlacReader;
use indicatif::{ProgressBar, ProgressStyle};
use subtitle_timing::{
    AlignedResult, EnergyClassifier, FileJob, InferenceProfile, LazyClassifier, PipelineConfig,
    PipelineError, PipelineInput, PipelineWorker, SubtitlePipelineBuilder, WorkerEvent,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[path = "subtitle_refine/json_output.rs"]
mod json_output;

use json_output::{write_output, OutputDocument, OutputMeta};

const PROGRESS_STEPS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassifierChoice {
    /// Loudness-based frame classifier, no model file needed.
    Energy,
    /// Silero VAD ONNX model (requires the `onnx` feature).
    Silero,
    /// Keep aligner boundaries; skip refinement.
    None,
}

impl ClassifierChoice {
    fn as_str(self) -> &'static str {
        match self {
            Self::Energy => "energy",
            Self::Silero => "silero",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "subtitle_refine")]
#[command(about = "Refine word-aligned transcripts into timed, balanced subtitle segments")]
struct Args {
    /// Aligner output JSON files. Each is paired with the audio file of the
    /// same stem and `--audio-ext` extension.
    #[arg(required = true)]
    aligned: Vec<PathBuf>,
    #[arg(long, env = "SUBTITLE_REFINE_AUDIO_EXT", default_value = "flac")]
    audio_ext: String,
    /// JSON settings file (max_words, max_lines, base_limit, bridge_ms, ...).
    #[arg(long, env = "SUBTITLE_REFINE_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long)]
    max_words: Option<usize>,
    #[arg(long)]
    max_lines: Option<usize>,
    #[arg(long)]
    base_limit: Option<usize>,
    #[arg(long)]
    bridge_ms: Option<u32>,
    #[arg(long)]
    word_bridge_ms: Option<u32>,
    /// Inference batch profile: eko, mid, high, ultra, sonic or custom.
    #[arg(long, env = "SUBTITLE_REFINE_PROFILE")]
    profile: Option<String>,
    #[arg(long, value_enum, default_value_t = ClassifierChoice::Energy)]
    classifier: ClassifierChoice,
    #[arg(
        long,
        env = "SUBTITLE_REFINE_SILERO_MODEL",
        default_value = "models/silero_vad.onnx"
    )]
    silero_model: PathBuf,
    /// Output directory; defaults to next to each aligned file.
    #[arg(long, env = "SUBTITLE_REFINE_OUT_DIR")]
    out_dir: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subtitle_timing=info,subtitle_refine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    let mut builder = SubtitlePipelineBuilder::new(config.clone());
    builder = match args.classifier {
        ClassifierChoice::None => builder.without_refinement(),
        choice => builder.with_classifier(Arc::new(build_classifier(choice, &args.silero_model))),
    };
    let pipeline = Arc::new(builder.build().map_err(|err| err.to_string())?);

    let mut outputs: HashMap<String, (PathBuf, PathBuf, PathBuf)> = HashMap::new();
    let mut jobs = Vec::with_capacity(args.aligned.len());
    for aligned_path in &args.aligned {
        let audio_path = aligned_path.with_extension(&args.audio_ext);
        let out_path = output_path(aligned_path, args.out_dir.as_deref());
        let name = aligned_path.display().to_string();
        outputs.insert(
            name.clone(),
            (aligned_path.clone(), audio_path.clone(), out_path),
        );
        let aligned_path = aligned_path.clone();
        jobs.push(FileJob::deferred(name, move || {
            load_input(&aligned_path, &audio_path)
        }));
    }

    let progress = ProgressBar::new(PROGRESS_STEPS);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let worker = PipelineWorker::spawn(pipeline, jobs).map_err(|err| err.to_string())?;
    let mut failures = 0usize;
    let mut stopped = false;
    for event in worker.events().iter() {
        match event {
            WorkerEvent::Log(message) => progress.set_message(message),
            WorkerEvent::Progress(fraction) => {
                progress.set_position((fraction.clamp(0.0, 1.0) * PROGRESS_STEPS as f32) as u64);
            }
            WorkerEvent::Done { file, output, .. } => {
                let Some(output) = output else {
                    failures += 1;
                    continue;
                };
                let Some((aligned_path, audio_path, out_path)) = outputs.get(&file) else {
                    continue;
                };
                let document = OutputDocument {
                    meta: OutputMeta {
                        generated_at: Utc::now().to_rfc3339(),
                        aligned_path: aligned_path.display().to_string(),
                        audio_path: audio_path.display().to_string(),
                        classifier: args.classifier.as_str().to_string(),
                        max_words: config.segmentation.max_words,
                        max_lines: config.segmentation.max_lines,
                        base_limit: config.segmentation.base_limit,
                        bridge_threshold_ms: config.bridge_threshold_ms,
                        word_bridge_threshold_ms: config.word_bridge_threshold_ms,
                    },
                    sentences: &output.sentences,
                    words: &output.words,
                };
                match write_output(out_path, &document) {
                    Ok(()) => progress.println(format!("wrote {}", out_path.display())),
                    Err(err) => {
                        failures += 1;
                        progress.println(err);
                    }
                }
            }
            WorkerEvent::Stopped => stopped = true,
            WorkerEvent::Finished => progress.set_position(PROGRESS_STEPS),
        }
    }
    worker.join().map_err(|err| err.to_string())?;
    progress.finish_with_message("done");

    if stopped {
        return Err("processing stopped before all files finished".to_string());
    }
    if failures > 0 {
        return Err(format!("{failures} file(s) failed"));
    }
    Ok(())
}

fn resolve_config(args: &Args) -> Result<PipelineConfig, String> {
    let mut config = match args.config.as_ref() {
        Some(path) => PipelineConfig::load(path).map_err(|err| err.to_string())?,
        None => PipelineConfig::default(),
    };
    if let Some(max_words) = args.max_words {
        config.segmentation.max_words = max_words;
    }
    if let Some(max_lines) = args.max_lines {
        config.segmentation.max_lines = max_lines;
    }
    if let Some(base_limit) = args.base_limit {
        config.segmentation.base_limit = base_limit;
    }
    if let Some(bridge_ms) = args.bridge_ms {
        config.bridge_threshold_ms = bridge_ms;
    }
    if let Some(word_bridge_ms) = args.word_bridge_ms {
        config.word_bridge_threshold_ms = word_bridge_ms;
    }
    if let Some(profile) = args.profile.as_deref() {
        config.inference_profile = InferenceProfile::parse(profile)
            .ok_or_else(|| format!("Unknown inference profile '{profile}'"))?;
    }
    Ok(config)
}

fn build_classifier(choice: ClassifierChoice, silero_model: &Path) -> LazyClassifier {
    match choice {
        ClassifierChoice::Silero => silero_classifier(silero_model.to_path_buf()),
        _ => LazyClassifier::preloaded(EnergyClassifier::default()),
    }
}

#[cfg(feature = "onnx")]
fn silero_classifier(model_path: PathBuf) -> LazyClassifier {
    LazyClassifier::new(move || {
        let classifier = subtitle_timing::pipeline::silero::SileroClassifier::load(&model_path)?;
        Ok(Box::new(classifier) as Box<dyn subtitle_timing::SpeechClassifier>)
    })
}

#[cfg(not(feature = "onnx"))]
fn silero_classifier(_model_path: PathBuf) -> LazyClassifier {
    LazyClassifier::new(|| {
        Err(PipelineError::classifier_unavailable(
            "built without the `onnx` feature",
        ))
    })
}

fn output_path(aligned_path: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = aligned_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{stem}.subtitles.json");
    match out_dir {
        Some(dir) => dir.join(file_name),
        None => aligned_path.with_file_name(file_name),
    }
}

fn load_input(aligned_path: &Path, audio_path: &Path) -> Result<PipelineInput, PipelineError> {
    let data = fs::read_to_string(aligned_path).map_err(|err| {
        PipelineError::runtime(
            "read aligned json",
            format!("'{}': {err}", aligned_path.display()),
        )
    })?;
    let aligned: AlignedResult = serde_json::from_str(&data).map_err(|err| {
        PipelineError::runtime(
            "parse aligned json",
            format!("'{}': {err}", aligned_path.display()),
        )
    })?;
    let (sample_rate_hz, samples) =
        read_flac_mono(audio_path).map_err(|err| PipelineError::runtime("decode audio", err))?;
    Ok(PipelineInput {
        sample_rate_hz,
        samples,
        aligned,
    })
}

/// Decodes a FLAC file and averages its channels into one track.
fn read_flac_mono(path: &Path) -> Result<(u32, Vec<f32>), String> {
    let mut reader = FlacReader::open(path)
        .map_err(|err| format!("Failed to decode FLAC '{}': {err}", path.display()))?;
    let info = reader.streaminfo();
    let channels = info.channels as usize;
    if channels == 0 {
        return Err(format!("FLAC has zero channels: {}", path.display()));
    }
    let full_scale = (1_i64 << info.bits_per_sample.saturating_sub(1).max(1)) as f32;

    let interleaved = reader
        .samples()
        .collect::<Result<Vec<i32>, _>>()
        .map_err(|err| format!("Failed reading samples from '{}': {err}", path.display()))?;
    let mono = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| s as f32).sum::<f32>() / (channels as f32 * full_scale))
        .collect();
    Ok((info.sample_rate, mono))
}
