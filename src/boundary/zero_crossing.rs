/// Returns the sample index with the smallest magnitude within `radius`
/// samples of `center`, so a cut lands near a zero crossing instead of
/// mid-waveform. The earliest index wins ties. Falls back to `center` when
/// the clamped window is empty.
pub(crate) fn snap_to_zero_crossing(samples: &[f32], center: usize, radius: usize) -> usize {
    let lo = center.saturating_sub(radius);
    let hi = center.saturating_add(radius).min(samples.len());
    if hi <= lo {
        return center;
    }
    let mut best = lo;
    let mut best_magnitude = f32::INFINITY;
    for (offset, sample) in samples[lo..hi].iter().enumerate() {
        let magnitude = sample.abs();
        if magnitude < best_magnitude {
            best_magnitude = magnitude;
            best = lo + offset;
        }
    }
    best
}
