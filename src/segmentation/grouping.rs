use crate::config::SegmentationConfig;
use crate::types::Word;

use super::wrap::char_len;

/// Gap that always ends a segment.
const BREATH_GAP: f64 = 0.5;
/// Gap that ends a segment after sentence-final punctuation.
const SENTENCE_GAP: f64 = 0.2;
/// Share of `base_limit` after which punctuation may end a segment.
const PUNCTUATION_FILL: f64 = 0.7;

/// A timed word, with its bounds unwrapped.
#[derive(Debug, Clone)]
pub(crate) struct TimedWord<'a> {
    pub(crate) word: &'a Word,
    pub(crate) start: f64,
    pub(crate) end: f64,
}

impl<'a> TimedWord<'a> {
    pub(crate) fn from_word(word: &'a Word) -> Option<Self> {
        Some(Self {
            word,
            start: word.start?,
            end: word.end?,
        })
    }

    fn text(&self) -> &str {
        self.word.text.trim()
    }
}

/// Splits the ordered word stream into segment-sized groups.
pub(crate) fn group_words<'a>(
    words: &[TimedWord<'a>],
    config: &SegmentationConfig,
) -> Vec<Vec<TimedWord<'a>>> {
    let mut groups = Vec::new();
    let mut group: Vec<TimedWord<'a>> = Vec::new();
    let mut group_len = 0usize;

    for word in words {
        if !group.is_empty() && should_split(&group, group_len, word, config) {
            groups.push(std::mem::take(&mut group));
            group_len = 0;
        }
        // word length plus one separator
        group_len += char_len(word.text()) + 1;
        group.push(word.clone());
    }
    if !group.is_empty() {
        groups.push(group);
    }
    groups
}

fn should_split(
    group: &[TimedWord<'_>],
    group_len: usize,
    next: &TimedWord<'_>,
    config: &SegmentationConfig,
) -> bool {
    let Some(last) = group.last() else {
        return false;
    };

    if config.max_words > 0 && group.len() >= config.max_words {
        return true;
    }

    if config.base_limit > 0 {
        let over_capacity = config
            .segment_capacity()
            .is_some_and(|capacity| group_len + char_len(next.text()) > capacity);
        if over_capacity {
            return true;
        }
        if group_len as f64 >= config.base_limit as f64 * PUNCTUATION_FILL {
            let last_text = last.text();
            if ends_with_any(last_text, &['.', '?', '!', ':']) {
                return true;
            }
            if ends_with_any(last_text, &[',', ';']) && group_len >= config.base_limit {
                return true;
            }
        }
    }

    let gap = next.start - last.end;
    gap > BREATH_GAP || (ends_with_any(last.text(), &['.', '?', '!']) && gap > SENTENCE_GAP)
}

fn ends_with_any(text: &str, marks: &[char]) -> bool {
    text.chars().next_back().is_some_and(|c| marks.contains(&c))
}
