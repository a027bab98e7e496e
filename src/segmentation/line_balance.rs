use crate::config::SegmentationConfig;

use super::wrap::{char_len, greedy_wrap};

/// Lines narrower than this look ragged on screen.
const MIN_TARGET_WIDTH: usize = 15;
/// Slack added to the target width for the first wrap.
const WRAP_TOLERANCE: usize = 5;
/// A remainder above this share of `base_limit` earns an extra line.
const REMAINDER_SHARE: f64 = 0.1;
/// Words this long are not pulled down by the anti-dangle rule.
const MAX_DANGLE_PULL: usize = 15;

const CONJUNCTIONS: &[&str] = &[
    "ve", "ama", "fakat", "çünkü", "veya", "lakin", "ancak", "and", "but", "or", "so", "because",
    "while",
];

const STRIP_CHARS: &[char] = &['.', ',', '?', '!', ':', ';'];

/// Whether `word` is a conjunction that must not end a line. Case and
/// surrounding punctuation are ignored.
pub fn is_conjunction(word: &str) -> bool {
    let clean = word.to_lowercase();
    let clean = clean.trim_matches(STRIP_CHARS);
    CONJUNCTIONS.contains(&clean)
}

/// Lays segment text out on screen lines according to `config.max_lines`.
///
/// `max_lines == 0` or `base_limit == 0` keeps the text on one line.
pub(crate) fn balance_lines(text: &str, config: &SegmentationConfig) -> String {
    let text = text.trim();
    if config.base_limit == 0 {
        return text.to_string();
    }
    match config.max_lines {
        0 => text.to_string(),
        1 => greedy_wrap(text, config.base_limit).join("\n"),
        max_lines => balance_multi_line(text, config.base_limit, max_lines).join("\n"),
    }
}

fn balance_multi_line(text: &str, base_limit: usize, max_lines: usize) -> Vec<String> {
    let total = char_len(text);
    let remainder_bonus = (total % base_limit) as f64 > base_limit as f64 * REMAINDER_SHARE;
    let target_lines = (total / base_limit + usize::from(remainder_bonus)).clamp(1, max_lines);
    let target_width = MIN_TARGET_WIDTH.max(total / target_lines);

    let mut lines = greedy_wrap(text, target_width + WRAP_TOLERANCE);
    while lines.len() > max_lines {
        if let Some(last) = lines.pop() {
            if let Some(prev) = lines.last_mut() {
                prev.push(' ');
                prev.push_str(&last);
            }
        }
    }

    if lines.len() > 1 {
        pull_dangling_word(&mut lines);
        protect_conjunctions(&mut lines);
    }
    lines
}

/// Moves the last word of the second-to-last line down when the final line
/// holds a single word.
pub(super) fn pull_dangling_word(lines: &mut [String]) {
    let n = lines.len();
    if n < 2 || lines[n - 1].split_whitespace().count() != 1 {
        return;
    }
    let mut prev_words: Vec<&str> = lines[n - 2].split_whitespace().collect();
    if prev_words.len() <= 1 {
        return;
    }
    let Some(pulled) = prev_words.pop() else {
        return;
    };
    if char_len(pulled) >= MAX_DANGLE_PULL {
        return;
    }
    let new_last = format!("{pulled} {}", lines[n - 1]);
    let new_prev = prev_words.join(" ");
    lines[n - 2] = new_prev;
    lines[n - 1] = new_last;
}

/// No line except the last may end on a conjunction; trailing conjunctions
/// move to the start of the following line. A line made only of conjunctions
/// is folded into the next one.
pub(super) fn protect_conjunctions(lines: &mut Vec<String>) {
    let mut j = 0;
    while j + 1 < lines.len() {
        let mut words: Vec<String> = lines[j].split_whitespace().map(str::to_string).collect();
        let mut moved = Vec::new();
        while words.last().is_some_and(|w| is_conjunction(w)) {
            if let Some(word) = words.pop() {
                moved.push(word);
            }
        }
        if moved.is_empty() {
            j += 1;
            continue;
        }
        moved.reverse();
        moved.push(std::mem::take(&mut lines[j + 1]));
        lines[j + 1] = moved.join(" ");
        if words.is_empty() {
            lines.remove(j);
        } else {
            lines[j] = words.join(" ");
            j += 1;
        }
    }
}
