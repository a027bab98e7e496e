/// Number of amplitude samples inspected per file.
const TARGET_SAMPLE_COUNT: usize = 1000;
const TAIL_FRACTION: f64 = 0.1;

/// Coarse loudness estimate of a recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseProfile {
    /// Mean absolute amplitude of the quietest 10% of sampled points.
    pub noise_floor: f32,
    /// Mean absolute amplitude of the loudest 10% of sampled points.
    pub speech_level: f32,
    pub ratio: f32,
}

/// Samples the audio at a fixed stride and compares its quiet and loud tails.
///
/// The estimate is informational: refinement runs on a fixed preset and only
/// logs this profile.
pub fn estimate_noise_profile(samples: &[f32]) -> Option<NoiseProfile> {
    if samples.is_empty() {
        return None;
    }
    let stride = (samples.len() / TARGET_SAMPLE_COUNT).max(1);
    let mut magnitudes = samples
        .iter()
        .step_by(stride)
        .map(|x| x.abs())
        .collect::<Vec<_>>();
    magnitudes.sort_by(f32::total_cmp);

    let tail = (magnitudes.len() as f64 * TAIL_FRACTION) as usize;
    if tail == 0 {
        return None;
    }
    let noise_floor = mean(&magnitudes[..tail]);
    let speech_level = mean(&magnitudes[magnitudes.len() - tail..]);
    Some(NoiseProfile {
        noise_floor,
        speech_level,
        ratio: speech_level / (noise_floor + 1e-9),
    })
}

fn mean(values: &[f32]) -> f32 {
    values.iter().map(|&v| v as f64).sum::<f64>() as f32 / values.len() as f32
}
