/// Number of Unicode scalar values in `text`.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Greedy word wrap: fills each line up to `width` characters.
///
/// Words are never broken, hyphenated ones included; a word longer than
/// `width` sits alone on its own line. Whitespace runs collapse to single
/// spaces.
pub(crate) fn greedy_wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = char_len(word);
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= width {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
