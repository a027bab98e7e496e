use std::fs;
use std::path::Path;

use serde::Serialize;
use subtitle_timing::{SentenceCue, WordCue};

/// Settings and provenance recorded next to the cues.
#[derive(Debug, Serialize)]
pub struct OutputMeta {
    pub generated_at: String,
    pub aligned_path: String,
    pub audio_path: String,
    pub classifier: String,
    pub max_words: usize,
    pub max_lines: usize,
    pub base_limit: usize,
    pub bridge_threshold_ms: u32,
    pub word_bridge_threshold_ms: u32,
}

#[derive(Debug, Serialize)]
pub struct OutputDocument<'a> {
    pub meta: OutputMeta,
    pub sentences: &'a [SentenceCue],
    pub words: &'a [WordCue],
}

/// Writes `document` as pretty JSON, creating the output directory if needed.
pub fn write_output(path: &Path, document: &OutputDocument<'_>) -> Result<(), String> {
    let mut json = serde_json::to_string_pretty(document)
        .map_err(|err| format!("Failed to serialize subtitles for '{}': {err}", path.display()))?;
    json.push('\n');

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|err| format!("Failed to create '{}': {err}", dir.display()))?;
    }
    fs::write(path, json).map_err(|err| format!("Failed to write '{}': {err}", path.display()))
}
