use crate::boundary::{BoundaryRefinery, ProbabilitySignal};
use crate::cancel::CancellationToken;
use crate::config::{Granularity, PipelineConfig};
use crate::pipeline::traits::PipelineStage;
use crate::segmentation::segment;
use crate::timing::{bridge_intervals, distribute_gaps};
use crate::types::{
    BatchOutcome, PipelineInput, PipelineOutput, Segment, SentenceCue, Word, WordCue,
};

const EXPECTED_SAMPLE_RATE_HZ: u32 = 16_000;

/// Runs gap distribution, boundary refinement, segmentation and bridging
/// over one file at a time.
#[derive(Debug, Clone)]
pub struct SubtitlePipeline {
    config: PipelineConfig,
    refinery: BoundaryRefinery,
}

pub(crate) struct SubtitlePipelineParts {
    pub config: PipelineConfig,
    pub refinery: BoundaryRefinery,
}

/// Per-stage outcomes for one processed file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub gap_distribution: BatchOutcome,
    pub sentence_refinement: BatchOutcome,
    pub word_refinement: BatchOutcome,
    /// Frames in the speech probability map, `None` when refinement was skipped.
    pub speech_frames: Option<usize>,
    /// Segments that reached the end without both times and produced no cue.
    pub untimed_segments: usize,
    pub output_segments: usize,
    pub output_words: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub output: PipelineOutput,
    /// Final segments, with the words each one owns.
    pub segments: Vec<Segment>,
    pub report: PipelineReport,
}

impl SubtitlePipeline {
    pub(crate) fn from_parts(parts: SubtitlePipelineParts) -> Self {
        Self {
            config: parts.config,
            refinery: parts.refinery,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes one file. Returns `None` when `cancel` fires before the
    /// file is finished.
    pub fn process(&self, input: PipelineInput, cancel: &CancellationToken) -> Option<PipelineRun> {
        self.process_with_progress(input, cancel, |_| {})
    }

    pub fn process_with_progress<F>(
        &self,
        input: PipelineInput,
        cancel: &CancellationToken,
        mut on_stage: F,
    ) -> Option<PipelineRun>
    where
        F: FnMut(PipelineStage),
    {
        if cancel.is_cancelled() {
            return None;
        }
        if input.sample_rate_hz != EXPECTED_SAMPLE_RATE_HZ {
            tracing::warn!(
                expected_rate_hz = EXPECTED_SAMPLE_RATE_HZ,
                actual_rate_hz = input.sample_rate_hz,
                "speech classifier expects 16 kHz audio; refinement quality may degrade"
            );
        }

        let PipelineInput {
            sample_rate_hz,
            samples,
            aligned,
        } = input;
        let mut report = PipelineReport::default();
        let sentence_timing = self.config.sentence_timing();
        let word_timing = self.config.word_timing();

        let mut segments = aligned.segments;
        if sentence_timing.is_enabled() || word_timing.is_enabled() {
            on_stage(PipelineStage::GapDistribution);
            let distributed = distribute_gaps(segments);
            report.gap_distribution = distributed.outcome;
            segments = distributed.items;
        }

        on_stage(PipelineStage::SpeechDetection);
        match self
            .refinery
            .probability_signal(&samples, sample_rate_hz, cancel)
        {
            ProbabilitySignal::Ready(map) => {
                report.speech_frames = Some(map.len());

                on_stage(PipelineStage::SentenceRefinement);
                let refined =
                    self.refinery
                        .refine_with_map(segments, &map, &samples, Granularity::Sentence);
                report.sentence_refinement = refined.outcome;
                segments = refined.items;

                on_stage(PipelineStage::WordRefinement);
                let (words, counts) = take_words(&mut segments);
                let refined = self
                    .refinery
                    .refine_with_map(words, &map, &samples, Granularity::Word);
                report.word_refinement = refined.outcome;
                return_words(&mut segments, refined.items, &counts);

                tracing::info!(
                    sentences_adjusted = report.sentence_refinement.adjusted,
                    words_adjusted = report.word_refinement.adjusted,
                    words_skipped = report.word_refinement.skipped,
                    "boundary refinement finished"
                );
            }
            ProbabilitySignal::Unavailable => {
                tracing::warn!("boundary refinement skipped; keeping aligner boundaries");
            }
            ProbabilitySignal::Cancelled => return None,
        }
        drop(samples);

        if cancel.is_cancelled() {
            return None;
        }
        on_stage(PipelineStage::Segmentation);
        let segments = segment(segments, &self.config.segmentation);

        if cancel.is_cancelled() {
            return None;
        }
        on_stage(PipelineStage::Bridging);
        let segments = if sentence_timing.is_enabled() {
            bridge_intervals(segments, &sentence_timing)
        } else {
            segments
        };

        let mut words = segments
            .iter()
            .flat_map(|segment| segment.words.iter())
            .filter_map(word_cue)
            .collect::<Vec<_>>();
        if word_timing.is_enabled() && !words.is_empty() {
            words = bridge_intervals(words, &word_timing);
        }

        let sentences = segments
            .iter()
            .filter_map(sentence_cue)
            .collect::<Vec<_>>();
        report.untimed_segments = segments.len() - sentences.len();
        if report.untimed_segments > 0 {
            tracing::warn!(
                skipped = report.untimed_segments,
                "segments without start/end left out of sentence cues"
            );
        }

        report.output_segments = sentences.len();
        report.output_words = words.len();
        tracing::info!(
            segments = report.output_segments,
            words = report.output_words,
            gap_pairs_adjusted = report.gap_distribution.adjusted,
            "pipeline finished file"
        );

        Some(PipelineRun {
            output: PipelineOutput { sentences, words },
            segments,
            report,
        })
    }
}

/// Moves every word out of `segments`, returning them flattened together
/// with how many each segment owned.
fn take_words(segments: &mut [Segment]) -> (Vec<Word>, Vec<usize>) {
    let counts = segments.iter().map(|s| s.words.len()).collect::<Vec<_>>();
    let words = segments
        .iter_mut()
        .flat_map(|s| std::mem::take(&mut s.words))
        .collect();
    (words, counts)
}

fn return_words(segments: &mut [Segment], words: Vec<Word>, counts: &[usize]) {
    let mut words = words.into_iter();
    for (segment, &count) in segments.iter_mut().zip(counts) {
        segment.words = words.by_ref().take(count).collect();
    }
}

fn sentence_cue(segment: &Segment) -> Option<SentenceCue> {
    Some(SentenceCue {
        start: segment.start?,
        end: segment.end?,
        text: segment.text.clone(),
    })
}

fn word_cue(word: &Word) -> Option<WordCue> {
    Some(WordCue {
        start: word.start?,
        end: word.end?,
        word: word.text.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::{RefineryConfig, SegmentationConfig};
    use crate::pipeline::builder::SubtitlePipelineBuilder;
    use crate::pipeline::classifier::LazyClassifier;
    use crate::pipeline::defaults::EnergyClassifier;
    use crate::types::AlignedResult;

    fn segment_of(words: Vec<Word>) -> Segment {
        let text = words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" ");
        let start = words.first().and_then(|w| w.start).unwrap_or(0.0);
        let end = words.last().and_then(|w| w.end).unwrap_or(0.0);
        Segment::new(text, start, end).with_words(words)
    }

    fn input(segments: Vec<Segment>, seconds: f64) -> PipelineInput {
        PipelineInput {
            sample_rate_hz: 16_000,
            samples: vec![0.0; (seconds * 16_000.0) as usize],
            aligned: AlignedResult { segments },
        }
    }

    #[test]
    fn take_and_return_words_preserve_ownership() {
        let mut segments = vec![
            segment_of(vec![Word::new("a", 0.0, 0.1), Word::new("b", 0.2, 0.3)]),
            segment_of(vec![]),
            segment_of(vec![Word::new("c", 1.0, 1.1)]),
        ];
        let (words, counts) = take_words(&mut segments);
        assert_eq!(counts, vec![2, 0, 1]);
        assert_eq!(words.len(), 3);
        assert!(segments.iter().all(|s| s.words.is_empty()));
        return_words(&mut segments, words, &counts);
        assert_eq!(segments[0].words.len(), 2);
        assert_eq!(segments[2].words[0].text, "c");
    }

    #[test]
    fn stages_are_reported_in_order() {
        let pipeline = SubtitlePipelineBuilder::new(PipelineConfig::default())
            .with_classifier(Arc::new(LazyClassifier::preloaded(EnergyClassifier::default())))
            .build()
            .expect("build");
        let mut stages = Vec::new();
        let run = pipeline
            .process_with_progress(
                input(vec![segment_of(vec![Word::new("hi", 0.5, 0.9)])], 2.0),
                &CancellationToken::new(),
                |stage| stages.push(stage),
            )
            .expect("not cancelled");
        assert_eq!(
            stages,
            vec![
                PipelineStage::GapDistribution,
                PipelineStage::SpeechDetection,
                PipelineStage::SentenceRefinement,
                PipelineStage::WordRefinement,
                PipelineStage::Segmentation,
                PipelineStage::Bridging,
            ]
        );
        assert_eq!(run.output.sentences.len(), 1);
        assert_eq!(run.output.words.len(), 1);
        assert!(run.report.speech_frames.is_some());
    }

    #[test]
    fn gap_distribution_is_skipped_when_bridges_are_off() {
        let config = PipelineConfig {
            bridge_threshold_ms: 0,
            word_bridge_threshold_ms: 0,
            ..PipelineConfig::default()
        };
        let pipeline = SubtitlePipelineBuilder::new(config)
            .without_refinement()
            .build()
            .expect("build");
        let words = vec![Word::new("one", 0.0, 0.4), Word::new("two", 0.5, 0.9)];
        let run = pipeline
            .process(input(vec![segment_of(words)], 1.0), &CancellationToken::new())
            .expect("run");
        assert_eq!(run.report.gap_distribution, BatchOutcome::default());
        assert_eq!(run.output.words[0].end, 0.4);
        assert_eq!(run.output.words[1].start, 0.5);
    }

    #[test]
    fn cancelled_before_start_yields_nothing() {
        let pipeline = SubtitlePipelineBuilder::new(PipelineConfig::default())
            .without_refinement()
            .build()
            .expect("build");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pipeline.process(
            input(vec![segment_of(vec![Word::new("x", 0.0, 1.0)])], 1.0),
            &cancel,
        );
        assert!(result.is_none());
    }

    #[test]
    fn unavailable_classifier_still_segments_and_bridges() {
        let refinery_off = SubtitlePipeline::from_parts(SubtitlePipelineParts {
            config: PipelineConfig::default(),
            refinery: BoundaryRefinery::without_classifier(RefineryConfig::default()),
        });
        let words = vec![Word::new("one", 1.0, 1.02)];
        let run = refinery_off
            .process(input(vec![segment_of(words)], 3.0), &CancellationToken::new())
            .expect("run");
        assert!(run.report.speech_frames.is_none());
        // minimum durations: 0.2s sentence, 0.08s word
        assert!((run.output.sentences[0].end - 1.2).abs() < 1e-9);
        assert!((run.output.words[0].end - 1.08).abs() < 1e-9);
    }

    #[test]
    fn untimed_segment_is_skipped_and_the_rest_continue() {
        // unconstrained segmentation keeps the aligner's segments, untimed one included
        let config = PipelineConfig {
            segmentation: SegmentationConfig {
                max_words: 0,
                max_lines: 0,
                base_limit: 0,
            },
            ..PipelineConfig::default()
        };
        let pipeline = SubtitlePipelineBuilder::new(config)
            .with_classifier(Arc::new(LazyClassifier::preloaded(EnergyClassifier::default())))
            .build()
            .expect("build");
        let broken = Segment {
            start: Some(0.2),
            end: None,
            text: "lost".to_string(),
            words: Vec::new(),
        };
        let run = pipeline
            .process(
                input(vec![broken, segment_of(vec![Word::new("kept", 1.0, 1.5)])], 3.0),
                &CancellationToken::new(),
            )
            .expect("run");
        assert_eq!(run.report.sentence_refinement.skipped, 1);
        assert_eq!(run.report.untimed_segments, 1);
        assert_eq!(run.output.sentences.len(), 1);
        assert_eq!(run.output.sentences[0].text, "kept");
    }
}
