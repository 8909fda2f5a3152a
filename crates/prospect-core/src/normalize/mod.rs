//! Value normalization applied to raw candidates.
//!
//! Normalization is deterministic and lossless for the string layer: the raw
//! matched span is always retained next to the normalized form, and a failed
//! numeric or date parse simply leaves that facet `None`.

pub mod date;
pub mod number;
pub mod text;
pub mod unit;

use serde::Serialize;

use self::date::PartialDate;
use self::number::ParsedNumber;
use self::text::{collapse_whitespace, fold_width, strip_wrapping_brackets, trim_trailing_punct};

/// The typed facets derived from one raw candidate string.
#[derive(Debug, Clone, Serialize, Default)]
pub struct NormalizedValue {
    /// The raw matched text, untouched.
    pub raw: String,
    /// Normalized string form (width-folded, whitespace-collapsed).
    pub text: String,
    /// Numeric interpretation, when the text parses as a number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<ParsedNumber>,
    /// Date interpretation, when the text parses as a (partial) date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<PartialDate>,
}

/// Normalize one raw candidate string.
///
/// `strip_brackets` additionally removes one level of brackets wrapping the
/// whole value, a common artifact of annotated table cells.
pub fn normalize(raw: &str, strip_brackets: bool) -> NormalizedValue {
    let mut text = collapse_whitespace(&fold_width(raw));
    if strip_brackets {
        text = strip_wrapping_brackets(&text);
    }
    text = trim_trailing_punct(&text);
    let number = number::parse_number(&text);
    let date = date::parse_date(&text);
    NormalizedValue {
        raw: raw.to_string(),
        text,
        number,
        date,
    }
}
