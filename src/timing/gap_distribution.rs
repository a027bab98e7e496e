use crate::types::{BatchOutcome, Interval, ItemResult, Segment, StageOutput};

/// Gaps at or above this length are real pauses and stay untouched.
const MAX_DISTRIBUTED_GAP: f64 = 0.3;
/// Share of the gap each neighbouring word may absorb.
const GAP_SHARE: f64 = 0.4;
const MAX_SHIFT: f64 = 0.08;

/// Spreads short inter-word silences onto the neighbouring words so cuts do
/// not land exactly on the last sample of speech.
///
/// For every adjacent pair with `0 < gap < 0.3s`, the earlier word's end and
/// the later word's start each move `min(gap * 0.4, 0.08)` seconds into the
/// gap. Touching or overlapping pairs are left for the timing bridge. Segment
/// bounds are then reset to their first/last timed word.
///
/// The outcome counts word pairs: adjusted, unchanged, or skipped because one
/// side has no timestamps.
pub fn distribute_gaps(segments: Vec<Segment>) -> StageOutput<Segment> {
    let mut outcome = BatchOutcome::default();
    let items = segments
        .into_iter()
        .map(|mut segment| {
            if segment.words.is_empty() {
                return segment;
            }
            for idx in 0..segment.words.len() - 1 {
                let (head, tail) = segment.words.split_at_mut(idx + 1);
                outcome.record(distribute_pair(&mut head[idx], &mut tail[0]));
            }
            reset_segment_bounds(&mut segment);
            segment
        })
        .collect();
    StageOutput { items, outcome }
}

fn distribute_pair<W: Interval>(left: &mut W, right: &mut W) -> ItemResult {
    let (Some((_, left_end)), Some((right_start, _))) = (left.bounds(), right.bounds()) else {
        return ItemResult::Skipped;
    };
    let gap = right_start - left_end;
    if gap <= 0.0 || gap >= MAX_DISTRIBUTED_GAP {
        return ItemResult::Unchanged;
    }
    let shift = (gap * GAP_SHARE).min(MAX_SHIFT);
    left.set_end(left_end + shift);
    right.set_start(right_start - shift);
    ItemResult::Adjusted
}

fn reset_segment_bounds(segment: &mut Segment) {
    if let Some(start) = segment.words.first().and_then(|w| w.start) {
        segment.start = Some(start);
    }
    if let Some(end) = segment.words.last().and_then(|w| w.end) {
        segment.end = Some(end);
    }
}
