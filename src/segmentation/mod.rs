use crate::config::SegmentationConfig;
use crate::types::{Segment, Word};

mod grouping;
mod line_balance;
#[cfg(test)]
mod tests;
mod wrap;

use grouping::{group_words, TimedWord};
use line_balance::balance_lines;

pub use line_balance::is_conjunction;

/// Segments closer than this are joined end-to-start.
const TRANSITION_GAP: f64 = 0.2;

/// Regroups aligned words into display segments and lays out their lines.
///
/// Words without timestamps are dropped. When no word is timed, or every
/// limit in `config` is zero, the aligner's own segments are returned with
/// trimmed text.
pub fn segment(segments: Vec<Segment>, config: &SegmentationConfig) -> Vec<Segment> {
    let timed: Vec<TimedWord<'_>> = segments
        .iter()
        .flat_map(|segment| segment.words.iter())
        .filter_map(TimedWord::from_word)
        .collect();

    if timed.is_empty() || config.is_unconstrained() {
        tracing::debug!(
            segments = segments.len(),
            timed_words = timed.len(),
            "segmentation: pass-through"
        );
        return segments
            .into_iter()
            .map(|segment| Segment {
                text: segment.text.trim().to_string(),
                ..segment
            })
            .collect();
    }

    let groups = group_words(&timed, config);
    let mut out: Vec<Segment> = groups
        .iter()
        .filter_map(|group| build_segment(group, config))
        .collect();
    smooth_transitions(&mut out);

    tracing::info!(
        input_segments = segments.len(),
        words = timed.len(),
        output_segments = out.len(),
        max_words = config.max_words,
        max_lines = config.max_lines,
        base_limit = config.base_limit,
        "segmentation: regrouped"
    );
    out
}

fn build_segment(group: &[TimedWord<'_>], config: &SegmentationConfig) -> Option<Segment> {
    let first = group.first()?;
    let last = group.last()?;
    let joined = group
        .iter()
        .map(|w| w.word.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(
        Segment::new(balance_lines(&joined, config), first.start, last.end)
            .with_words(group.iter().map(|w| w.word.clone()).collect::<Vec<Word>>()),
    )
}

fn smooth_transitions(segments: &mut [Segment]) {
    for i in 1..segments.len() {
        let (Some(prev_end), Some(next_start)) = (segments[i - 1].end, segments[i].start) else {
            continue;
        };
        if next_start - prev_end < TRANSITION_GAP {
            segments[i - 1].end = Some(next_start);
        }
    }
}
