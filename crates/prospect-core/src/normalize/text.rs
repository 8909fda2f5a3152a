//! String-layer normalization helpers.
//!
//! Financial filings mix full-width and half-width forms freely; every text
//! that reaches a regex goes through [`clean_text`] first so patterns can be
//! written against the ASCII forms only.

/// Fold full-width digits, latin letters and common punctuation to their
/// ASCII equivalents. Other characters pass through unchanged.
pub fn fold_width(text: &str) -> String {
    text.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    match c {
        // Full-width ASCII block (！..～) maps linearly onto !..~
        '\u{ff01}'..='\u{ff5e}' => char::from_u32(c as u32 - 0xff01 + 0x21).unwrap_or(c),
        '\u{3000}' => ' ',
        // Punctuation outside the linear block.
        '。' => '.',
        '、' => ',',
        '〔' => '[',
        '〕' => ']',
        '【' => '[',
        '】' => ']',
        _ => c,
    }
}

/// Collapse whitespace runs to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.trim().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Matching form of a text: width-folded with all whitespace removed.
///
/// Chinese running text carries no meaningful spaces, and parsers often
/// break lines mid-word; dropping whitespace entirely makes regexes stable
/// against both.
pub fn clean_text(text: &str) -> String {
    fold_width(text).chars().filter(|c| !c.is_whitespace()).collect()
}

const BRACKET_PAIRS: &[(char, char)] = &[('(', ')'), ('[', ']'), ('（', '）'), ('《', '》'), ('"', '"')];

/// Remove one level of brackets wrapping the entire value.
pub fn strip_wrapping_brackets(text: &str) -> String {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let (first, last) = (chars.next(), chars.next_back());
    if let (Some(first), Some(last)) = (first, last) {
        if BRACKET_PAIRS.iter().any(|&(open, close)| first == open && last == close) {
            let inner: String = trimmed
                .chars()
                .skip(1)
                .take(trimmed.chars().count().saturating_sub(2))
                .collect();
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Trim trailing punctuation left over from sentence-level matches.
pub fn trim_trailing_punct(text: &str) -> String {
    text.trim_end_matches(['，', '。', '；', '、', ',', '.', ';', ':', '：'])
        .trim_end()
        .to_string()
}

const SENTENCE_BOUNDS: &[char] = &['。', '；', ';', '!', '！', '?', '？', '\n'];

/// The sentence containing a byte span, bounded by sentence punctuation.
pub fn sentence_containing(text: &str, span: (usize, usize)) -> &str {
    let start = text[..span.0.min(text.len())]
        .rfind(SENTENCE_BOUNDS)
        .map(|i| i + text[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    let end = text[span.1.min(text.len())..]
        .find(SENTENCE_BOUNDS)
        .map(|i| span.1 + i)
        .unwrap_or(text.len());
    &text[start..end]
}
