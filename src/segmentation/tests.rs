use super::line_balance::{balance_lines, protect_conjunctions, pull_dangling_word};
use super::wrap::greedy_wrap;
use super::{is_conjunction, segment};
use crate::config::SegmentationConfig;
use crate::types::{Segment, Word};

fn make_word(text: &str, start: f64, end: f64) -> Word {
    Word::new(text, start, end)
}

fn make_segment(words: Vec<Word>) -> Segment {
    let start = words.first().and_then(|w| w.start).unwrap_or(0.0);
    let end = words.last().and_then(|w| w.end).unwrap_or(0.0);
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    Segment::new(text, start, end).with_words(words)
}

/// Words `w0..wN` spaced 0.5s apart, each 0.4s long.
fn evenly_spaced(count: usize) -> Vec<Word> {
    (0..count)
        .map(|i| {
            let start = i as f64 * 0.5;
            make_word(&format!("w{i}"), start, start + 0.4)
        })
        .collect()
}

fn config(max_words: usize, max_lines: usize, base_limit: usize) -> SegmentationConfig {
    SegmentationConfig {
        max_words,
        max_lines,
        base_limit,
    }
}

#[test]
fn unconstrained_config_passes_segments_through() {
    let mut input = make_segment(evenly_spaced(3));
    input.text = "  w0 w1 w2 \n".to_string();
    let out = segment(vec![input.clone()], &config(0, 0, 0));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "w0 w1 w2");
    assert_eq!(out[0].words, input.words);
    assert_eq!(out[0].start, input.start);
}

#[test]
fn untimed_words_pass_segments_through() {
    let words = vec![Word {
        text: "42".to_string(),
        start: None,
        end: None,
    }];
    let input = Segment::new(" 42 ", 1.0, 2.0).with_words(words);
    let out = segment(vec![input], &config(3, 2, 40));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "42");
    assert_eq!((out[0].start, out[0].end), (Some(1.0), Some(2.0)));
}

#[test]
fn untimed_segment_passes_through_unchanged() {
    let input = Segment {
        start: Some(4.0),
        end: None,
        text: "lost end".to_string(),
        words: Vec::new(),
    };
    let out = segment(vec![input.clone()], &config(3, 2, 40));
    assert_eq!(out, vec![input]);
}

#[test]
fn max_words_splits_groups() {
    let out = segment(vec![make_segment(evenly_spaced(5))], &config(2, 2, 75));
    let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["w0 w1", "w2 w3", "w4"]);
    assert_eq!(out[0].start, Some(0.0));
    assert_eq!(out[2].words.len(), 1);
}

#[test]
fn close_segments_are_joined_end_to_start() {
    let out = segment(vec![make_segment(evenly_spaced(5))], &config(2, 2, 75));
    assert_eq!(out[0].end, out[1].start);
    assert_eq!(out[1].end, out[2].start);
    assert!((out[2].end.unwrap() - 2.4).abs() < 1e-9);
}

#[test]
fn long_silence_splits_regardless_of_word_limit() {
    let words = vec![
        make_word("one", 0.0, 0.4),
        make_word("two", 0.5, 0.9),
        make_word("three", 1.0, 1.4),
        make_word("four", 2.0, 2.4),
        make_word("five", 2.5, 2.9),
    ];
    let out = segment(vec![make_segment(words)], &config(10, 2, 75));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].text, "one two three");
    assert_eq!(out[1].text, "four five");
    // 0.6s gap is above the transition threshold, so it stays open
    assert!((out[0].end.unwrap() - 1.4).abs() < 1e-9);
}

#[test]
fn sentence_end_with_short_pause_splits() {
    let words = vec![
        make_word("Hello.", 0.0, 0.4),
        make_word("Again", 0.7, 1.0),
    ];
    let out = segment(vec![make_segment(words)], &config(0, 2, 75));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].text, "Hello.");
}

#[test]
fn sentence_end_without_pause_stays_grouped() {
    let words = vec![
        make_word("Hello.", 0.0, 0.4),
        make_word("Again", 0.5, 1.0),
    ];
    let out = segment(vec![make_segment(words)], &config(0, 2, 75));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "Hello. Again");
}

#[test]
fn character_capacity_splits_groups() {
    let words = (0..4)
        .map(|i| make_word("aaaa", i as f64 * 0.3, i as f64 * 0.3 + 0.25))
        .collect();
    // capacity = 10 * 1
    let out = segment(vec![make_segment(words)], &config(0, 1, 10));
    let texts: Vec<&str> = out.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["aaaa aaaa", "aaaa aaaa"]);
}

#[test]
fn full_stop_ends_segment_once_line_is_mostly_full() {
    let words = vec![
        make_word("hello", 0.0, 0.2),
        make_word("there", 0.25, 0.45),
        make_word("friend.", 0.5, 0.7),
        make_word("again", 0.75, 0.9),
    ];
    // group length after "friend." is 20 >= 0.7 * 20
    let out = segment(vec![make_segment(words)], &config(0, 0, 20));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].text, "hello there friend.");
}

#[test]
fn comma_needs_a_full_line_to_split() {
    let words = vec![
        make_word("hello", 0.0, 0.2),
        make_word("friend,", 0.25, 0.45),
        make_word("again", 0.5, 0.7),
    ];
    // group length 14 reaches 70% of 20 but not the full limit
    let out = segment(vec![make_segment(words)], &config(0, 0, 20));
    assert_eq!(out.len(), 1);
}

#[test]
fn untimed_words_are_dropped_from_regrouped_text() {
    let words = vec![
        make_word("one", 0.0, 0.3),
        Word {
            text: "%".to_string(),
            start: None,
            end: None,
        },
        make_word("two", 0.35, 0.6),
    ];
    let out = segment(vec![make_segment(words)], &config(5, 2, 75));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "one two");
    assert_eq!(out[0].words.len(), 2);
}

#[test]
fn greedy_wrap_fills_lines() {
    assert_eq!(greedy_wrap("aaaa bbbb cccc", 9), vec!["aaaa bbbb", "cccc"]);
    assert_eq!(greedy_wrap("  spaced   out ", 40), vec!["spaced out"]);
    assert!(greedy_wrap("", 10).is_empty());
}

#[test]
fn greedy_wrap_keeps_long_words_whole() {
    assert_eq!(
        greedy_wrap("tiny extraordinarily tiny", 6),
        vec!["tiny", "extraordinarily", "tiny"]
    );
}

#[test]
fn greedy_wrap_counts_characters_not_bytes() {
    // 5 chars each, 10 bytes for the first
    assert_eq!(greedy_wrap("çünkü hello", 11), vec!["çünkü hello"]);
}

#[test]
fn conjunction_moves_to_next_line() {
    let text = balance_lines(
        "I went to the market and bought some fresh bread",
        &config(0, 2, 20),
    );
    assert_eq!(text, "I went to the market\nand bought some fresh bread");
}

#[test]
fn dangling_word_is_pulled_down() {
    let text = balance_lines("abcd abcd abcd abcd xyz", &config(0, 2, 20));
    assert_eq!(text, "abcd abcd abcd\nabcd xyz");
}

#[test]
fn long_word_is_not_pulled_down() {
    let text = balance_lines("aa abcdefghijklmnop xyz", &config(0, 2, 20));
    assert_eq!(text, "aa abcdefghijklmnop\nxyz");
}

#[test]
fn excess_lines_merge_upward() {
    let a = "a".repeat(30);
    let b = "b".repeat(30);
    let c = "c".repeat(30);
    let text = balance_lines(&format!("{a} {b} {c}"), &config(0, 2, 10));
    assert_eq!(text, format!("{a}\n{b} {c}"));
}

#[test]
fn single_line_mode_wraps_at_base_limit() {
    let text = balance_lines("aaaa bbbb cccc", &config(0, 1, 9));
    assert_eq!(text, "aaaa bbbb\ncccc");
}

#[test]
fn unlimited_lines_keep_one_line() {
    let text = balance_lines("  a b c d e f g h  ", &config(0, 0, 3));
    assert_eq!(text, "a b c d e f g h");
}

#[test]
fn conjunction_only_line_folds_into_next() {
    let mut lines = vec![
        "we and".to_string(),
        "or".to_string(),
        "left early".to_string(),
    ];
    protect_conjunctions(&mut lines);
    assert_eq!(lines, vec!["we", "and or left early"]);
}

#[test]
fn last_line_may_end_with_conjunction() {
    let mut lines = vec!["go home".to_string(), "and".to_string()];
    protect_conjunctions(&mut lines);
    assert_eq!(lines, vec!["go home", "and"]);
}

#[test]
fn dangle_rule_needs_two_words_above() {
    let mut lines = vec!["alone".to_string(), "word".to_string()];
    pull_dangling_word(&mut lines);
    assert_eq!(lines, vec!["alone", "word"]);
}

#[test]
fn conjunction_match_ignores_case_and_punctuation() {
    assert!(is_conjunction("And"));
    assert!(is_conjunction("but,"));
    assert!(is_conjunction("Çünkü..."));
    assert!(!is_conjunction("android"));
    assert!(!is_conjunction("sow"));
}
