use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::config::{Granularity, InferenceProfile, RefineryConfig};
use crate::pipeline::classifier::LazyClassifier;
use crate::types::{BatchOutcome, Interval, ItemResult, StageOutput};

mod noise_profile;
pub mod probability;
mod zero_crossing;

pub use noise_profile::{estimate_noise_profile, NoiseProfile};
pub use probability::{compute_probability_map, ProbabilityMap, FRAME_SAMPLES};

use zero_crossing::snap_to_zero_crossing;

/// Result of preparing the speech-probability signal for one file.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbabilitySignal {
    Ready(ProbabilityMap),
    /// The classifier could not be loaded or failed during inference.
    Unavailable,
    Cancelled,
}

/// Snaps interval boundaries onto detected speech.
///
/// Refinement is best-effort: whenever the probability signal cannot be
/// produced, intervals are returned exactly as received.
#[derive(Debug, Clone)]
pub struct BoundaryRefinery {
    classifier: Option<Arc<LazyClassifier>>,
    config: RefineryConfig,
    profile: InferenceProfile,
}

impl BoundaryRefinery {
    pub fn new(
        classifier: Arc<LazyClassifier>,
        config: RefineryConfig,
        profile: InferenceProfile,
    ) -> Self {
        Self {
            classifier: Some(classifier),
            config,
            profile,
        }
    }

    pub fn without_classifier(config: RefineryConfig) -> Self {
        Self {
            classifier: None,
            config,
            profile: InferenceProfile::default(),
        }
    }

    /// Computes the per-frame speech probabilities for a file. The map is
    /// meant to be computed once and reused by every refinement pass.
    pub fn probability_signal(
        &self,
        samples: &[f32],
        sample_rate_hz: u32,
        cancel: &CancellationToken,
    ) -> ProbabilitySignal {
        let Some(lazy) = self.classifier.as_ref() else {
            tracing::warn!("boundary refinery: no speech classifier configured, skipping refinement");
            return ProbabilitySignal::Unavailable;
        };
        if samples.is_empty() || sample_rate_hz == 0 {
            return ProbabilitySignal::Unavailable;
        }

        if let Some(profile) = estimate_noise_profile(samples) {
            tracing::info!(
                noise_floor = format!("{:.5}", profile.noise_floor),
                speech_level = format!("{:.5}", profile.speech_level),
                ratio = format!("{:.1}", profile.ratio),
                threshold = self.config.speech_threshold,
                pad_start = self.config.pad_start,
                pad_end = self.config.pad_end,
                "boundary refinery: fixed aggressive preset"
            );
        }

        let classifier = match lazy.ensure_loaded() {
            Ok(classifier) => classifier,
            Err(err) => {
                tracing::warn!(error = %err, "boundary refinery: classifier unavailable");
                return ProbabilitySignal::Unavailable;
            }
        };

        let batch_frames = self.profile.batch_frames();
        match compute_probability_map(
            classifier.as_ref(),
            samples,
            sample_rate_hz,
            batch_frames,
            cancel,
        ) {
            Ok(Some(map)) => {
                tracing::debug!(
                    frames = map.len(),
                    batch_frames,
                    classifier = classifier.label(),
                    "boundary refinery: probability map ready"
                );
                ProbabilitySignal::Ready(map)
            }
            Ok(None) => ProbabilitySignal::Cancelled,
            Err(err) => {
                tracing::warn!(error = %err, "boundary refinery: inference failed");
                ProbabilitySignal::Unavailable
            }
        }
    }

    /// Computes the probability map and refines `items` against it.
    ///
    /// Unavailable classifier: items come back unchanged. Cancellation: items
    /// come back unchanged with `outcome.cancelled` set.
    pub fn refine<T: Interval>(
        &self,
        items: Vec<T>,
        samples: &[f32],
        sample_rate_hz: u32,
        granularity: Granularity,
        cancel: &CancellationToken,
    ) -> StageOutput<T> {
        match self.probability_signal(samples, sample_rate_hz, cancel) {
            ProbabilitySignal::Ready(map) => self.refine_with_map(items, &map, samples, granularity),
            ProbabilitySignal::Unavailable => StageOutput::untouched(items),
            ProbabilitySignal::Cancelled => StageOutput {
                items,
                outcome: BatchOutcome::cancelled(),
            },
        }
    }

    /// Refines every timed interval against an existing probability map.
    ///
    /// Each interval searches a padded window that stops short of its
    /// neighbours, takes the first/last frame above the speech threshold,
    /// snaps both to a nearby zero crossing and accepts each side only when
    /// it stays within the drift limit for `granularity`.
    pub fn refine_with_map<T: Interval>(
        &self,
        mut items: Vec<T>,
        map: &ProbabilityMap,
        samples: &[f32],
        granularity: Granularity,
    ) -> StageOutput<T> {
        let mut outcome = BatchOutcome::default();
        let sample_rate = map.sample_rate_hz() as f64;
        if sample_rate <= 0.0 {
            return StageOutput::untouched(items);
        }
        let audio_duration = samples.len() as f64 / sample_rate;

        let timed = items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| item.bounds().map(|(start, end)| (idx, start, end)))
            .collect::<Vec<_>>();
        for _ in timed.len()..items.len() {
            outcome.record(ItemResult::Skipped);
        }

        for (pos, &(idx, start, end)) in timed.iter().enumerate() {
            let prev_limit = if pos > 0 {
                timed[pos - 1].2 + self.config.neighbor_margin
            } else {
                0.0
            };
            let next_limit = match timed.get(pos + 1) {
                Some(&(_, next_start, _)) => next_start - self.config.neighbor_margin,
                None => audio_duration,
            };

            let (new_start, new_end) = self.refine_bounds(
                map,
                samples,
                IntervalWindow {
                    start,
                    end,
                    prev_limit,
                    next_limit,
                },
                granularity,
            );

            let changed = new_start != start || new_end != end;
            if changed {
                tracing::debug!(
                    granularity = granularity.as_str(),
                    index = idx,
                    start,
                    end,
                    new_start,
                    new_end,
                    "boundary refinery: interval corrected"
                );
                items[idx].set_start(new_start);
                items[idx].set_end(new_end);
            }
            outcome.record(if changed {
                ItemResult::Adjusted
            } else {
                ItemResult::Unchanged
            });
        }

        StageOutput { items, outcome }
    }

    fn refine_bounds(
        &self,
        map: &ProbabilityMap,
        samples: &[f32],
        window: IntervalWindow,
        granularity: Granularity,
    ) -> (f64, f64) {
        let cfg = &self.config;
        let sample_rate = map.sample_rate_hz() as f64;
        let mut start = window.start;
        let mut end = window.end;

        let search_start = window.prev_limit.max(window.start - cfg.pad_start);
        let search_end = window.next_limit.min(window.end + cfg.pad_end);
        let first_frame = map.frame_at(search_start);
        let last_frame = map.frame_at(search_end);

        if first_frame < last_frame {
            if let Some((first_hit, last_hit)) =
                map.speech_span(first_frame..last_frame, cfg.speech_threshold)
            {
                let raw_start = first_hit * FRAME_SAMPLES;
                let raw_end = (last_hit + 1) * FRAME_SAMPLES;
                let snapped_start =
                    snap_to_zero_crossing(samples, raw_start, cfg.snap_window) as f64 / sample_rate;
                let snapped_end = snap_to_zero_crossing(samples, raw_end, cfg.snap_window) as f64
                    / sample_rate
                    + cfg.end_release;

                let max_start_drift = granularity.max_start_drift();
                if (snapped_start - window.start).abs() < max_start_drift {
                    let clamped = round_ms(snapped_start.max(window.prev_limit));
                    if (clamped - window.start).abs() < max_start_drift {
                        start = clamped;
                    }
                }
                if (snapped_end - window.end).abs() < cfg.end_drift {
                    let clamped =
                        round_ms(snapped_end.min(window.next_limit - cfg.next_start_guard));
                    if (clamped - window.end).abs() < cfg.end_drift {
                        end = clamped;
                    }
                }
            }
        }

        if end <= start {
            end = start + cfg.degenerate_duration;
        }
        (start, end)
    }
}

#[derive(Debug, Clone, Copy)]
struct IntervalWindow {
    start: f64,
    end: f64,
    /// Earliest allowed start: previous interval's end plus margin.
    prev_limit: f64,
    /// Latest allowed end: next interval's start minus margin.
    next_limit: f64,
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::pipeline::traits::SpeechClassifier;
    use crate::types::{Segment, Word};
    use crate::boundary::probability::Frame;

    const SR: u32 = 16_000;

    fn seg(start: f64, end: f64) -> Segment {
        Segment::new("", start, end)
    }

    /// Audio with a sine burst between `start` and `end` seconds.
    fn burst(total_secs: f64, start: f64, end: f64) -> Vec<f32> {
        let len = (total_secs * SR as f64) as usize;
        (0..len)
            .map(|i| {
                let t = i as f64 / SR as f64;
                if t >= start && t < end {
                    (0.5 * (2.0 * std::f64::consts::PI * 220.0 * t).sin()) as f32
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Speech probability 1.0 for frames whose RMS is audible.
    struct LoudnessClassifier;

    impl SpeechClassifier for LoudnessClassifier {
        fn frame_probabilities(
            &self,
            frames: &[Frame],
            _sample_rate_hz: u32,
        ) -> Result<Vec<f32>, PipelineError> {
            Ok(frames
                .iter()
                .map(|f| {
                    let energy = f.iter().map(|x| x * x).sum::<f32>() / f.len() as f32;
                    if energy.sqrt() > 0.05 {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect())
        }

        fn label(&self) -> String {
            "loudness".to_string()
        }
    }

    fn refinery() -> BoundaryRefinery {
        BoundaryRefinery::new(
            Arc::new(LazyClassifier::preloaded(LoudnessClassifier)),
            RefineryConfig::default(),
            InferenceProfile::Eko,
        )
    }

    #[test]
    fn without_classifier_returns_input_unchanged() {
        let input = vec![seg(1.0, 2.0), seg(2.5, 3.0)];
        let samples = burst(4.0, 1.0, 2.0);
        let out = BoundaryRefinery::without_classifier(RefineryConfig::default()).refine(
            input.clone(),
            &samples,
            SR,
            Granularity::Sentence,
            &CancellationToken::new(),
        );
        assert_eq!(out.items, input);
        assert_eq!(out.outcome, BatchOutcome::default());
    }

    #[test]
    fn failing_loader_returns_input_unchanged() {
        let lazy = LazyClassifier::new(|| {
            Err(PipelineError::classifier_unavailable("model file missing"))
        });
        let refinery = BoundaryRefinery::new(
            Arc::new(lazy),
            RefineryConfig::default(),
            InferenceProfile::default(),
        );
        let input = vec![Word::new("hi", 1.0, 1.4)];
        let out = refinery.refine(
            input.clone(),
            &burst(3.0, 1.1, 1.3),
            SR,
            Granularity::Word,
            &CancellationToken::new(),
        );
        assert_eq!(out.items, input);
    }

    #[test]
    fn late_aligner_start_snaps_to_speech_onset() {
        let samples = burst(5.0, 1.0, 2.0);
        let out = refinery().refine(
            vec![seg(1.2, 2.0)],
            &samples,
            SR,
            Granularity::Sentence,
            &CancellationToken::new(),
        );
        let (start, end) = out.items[0].bounds().expect("timed");
        // silence before the onset is digital zero, so the snap lands on the
        // earliest silent sample inside the search radius
        assert!((0.9..=1.0).contains(&start), "start={start}");
        assert!(end > 1.95 && end < 2.2, "end={end}");
        assert_eq!(out.outcome.adjusted, 1);
    }

    #[test]
    fn corrections_beyond_drift_are_rejected() {
        // speech starts 0.45s before the aligner start; word drift limit is 0.15s
        let samples = burst(5.0, 1.05, 2.0);
        let out = refinery().refine(
            vec![Word::new("late", 1.5, 2.0)],
            &samples,
            SR,
            Granularity::Word,
            &CancellationToken::new(),
        );
        let (start, end) = out.items[0].bounds().expect("timed");
        assert_eq!(start, 1.5);
        assert!((end - 2.0).abs() < 0.5);
    }

    #[test]
    fn silent_window_leaves_interval_unchanged() {
        let samples = vec![0.0f32; SR as usize * 3];
        let out = refinery().refine(
            vec![seg(1.0, 1.5)],
            &samples,
            SR,
            Granularity::Sentence,
            &CancellationToken::new(),
        );
        assert_eq!(out.items, vec![seg(1.0, 1.5)]);
        assert_eq!(out.outcome.adjusted, 0);
        assert_eq!(out.outcome.processed, 1);
    }

    #[test]
    fn refined_start_respects_previous_neighbour() {
        let samples = burst(5.0, 1.0, 3.0);
        let out = refinery().refine(
            vec![seg(1.0, 1.9), seg(2.0, 3.0)],
            &samples,
            SR,
            Granularity::Sentence,
            &CancellationToken::new(),
        );
        let (second_start, _) = out.items[1].bounds().expect("timed");
        let (_, first_end) = out.items[0].bounds().expect("timed");
        assert!(second_start >= 1.9 + 0.02 - 1e-9);
        assert!(first_end <= 2.0 - 0.02 - 0.01 + 1e-9);
    }

    #[test]
    fn malformed_words_are_counted_as_skipped() {
        let samples = burst(4.0, 1.0, 2.0);
        let input = vec![
            Word::new("one", 1.0, 1.4),
            Word {
                text: "#".to_string(),
                start: None,
                end: None,
            },
            Word::new("two", 1.5, 2.0),
        ];
        let out = refinery().refine(
            input.clone(),
            &samples,
            SR,
            Granularity::Word,
            &CancellationToken::new(),
        );
        assert_eq!(out.outcome.processed, 3);
        assert_eq!(out.outcome.skipped, 1);
        assert_eq!(out.items[1], input[1]);
    }

    #[test]
    fn cancelled_refinement_returns_input() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let input = vec![seg(1.2, 2.0)];
        let out = refinery().refine(
            input.clone(),
            &burst(3.0, 1.0, 2.0),
            SR,
            Granularity::Sentence,
            &cancel,
        );
        assert_eq!(out.items, input);
        assert!(out.outcome.cancelled);
    }

    #[test]
    fn degenerate_interval_gets_minimum_span() {
        let map = ProbabilityMap::new(vec![0.0; 200], SR);
        let samples = vec![0.0f32; 200 * FRAME_SAMPLES];
        let out = refinery().refine_with_map(
            vec![seg(2.0, 2.0)],
            &map,
            &samples,
            Granularity::Sentence,
        );
        assert!((out.items[0].end.unwrap() - 2.1).abs() < 1e-9);
    }

    #[test]
    fn snap_past_drift_is_rejected_even_when_neighbour_clamp_pulls_it_back() {
        // speech frames from index 32 (1.024s); the only silent sample left in
        // the snap radius sits at 0.949s, 0.151s before the word start
        let mut samples = vec![0.5f32; SR as usize * 3];
        let silent = (0.949 * SR as f64).round() as usize;
        samples[silent] = 0.0;
        let mut probabilities = vec![0.0f32; samples.len() / FRAME_SAMPLES];
        for p in probabilities.iter_mut().skip(32) {
            *p = 1.0;
        }
        let map = ProbabilityMap::new(probabilities, SR);

        let out = refinery().refine_with_map(
            vec![Word::new("before", 0.5, 1.0), Word::new("current", 1.1, 1.5)],
            &map,
            &samples,
            Granularity::Word,
        );
        assert_eq!(out.items[1].start, Some(1.1));
    }

    #[test]
    fn untimed_segments_are_skipped() {
        let input = vec![
            Segment {
                start: Some(1.0),
                end: None,
                text: "cut".to_string(),
                words: Vec::new(),
            },
            seg(1.2, 2.0),
        ];
        let out = refinery().refine(
            input.clone(),
            &burst(5.0, 1.0, 2.0),
            SR,
            Granularity::Sentence,
            &CancellationToken::new(),
        );
        assert_eq!(out.items[0], input[0]);
        assert_eq!(out.outcome.skipped, 1);
        assert_eq!(out.outcome.processed, 2);
    }
}
