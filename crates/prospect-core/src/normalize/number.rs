//! Numeric parsing for Arabic and Chinese numerals.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

lazy_static! {
    static ref ARABIC_NUMBER: Regex =
        Regex::new(r"^-?\d{1,3}(?:,\d{3})+(?:\.\d+)?|^-?\d+(?:\.\d+)?").unwrap();
    static ref SCALE_SUFFIX: Regex = Regex::new(r"^(亿|万|千|百万)").unwrap();
}

/// A parsed numeric value with its written scale suffix retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedNumber {
    /// Value as written (scale suffix not applied).
    pub value: Decimal,
    /// Scale suffix following the digits (`万`, `亿`, ...), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
}

impl ParsedNumber {
    /// The value with the scale suffix applied.
    pub fn scaled(&self) -> Decimal {
        match self.scale.as_deref() {
            Some("万") => self.value * Decimal::from(10_000),
            Some("亿") => self.value * Decimal::from(100_000_000),
            Some("千") => self.value * Decimal::from(1_000),
            Some("百万") => self.value * Decimal::from(1_000_000),
            _ => self.value,
        }
    }
}

/// Parse a number from the head of a normalized text.
///
/// Handles Arabic digits with thousands separators and decimal point, and
/// Chinese numerals including section scales (`三千五百万`). Returns `None`
/// when the text does not start with a number.
pub fn parse_number(text: &str) -> Option<ParsedNumber> {
    if let Some(m) = ARABIC_NUMBER.find(text) {
        let cleaned = m.as_str().replace(',', "");
        if let Ok(value) = Decimal::from_str(&cleaned) {
            let rest = &text[m.end()..];
            let scale = SCALE_SUFFIX.find(rest).map(|s| s.as_str().to_string());
            return Some(ParsedNumber { value, scale });
        }
    }
    parse_chinese_number(text).map(|value| ParsedNumber { value, scale: None })
}

const DIGITS: &[(char, u64)] = &[
    ('零', 0),
    ('一', 1),
    ('二', 2),
    ('两', 2),
    ('三', 3),
    ('四', 4),
    ('五', 5),
    ('六', 6),
    ('七', 7),
    ('八', 8),
    ('九', 9),
];

const SMALL_UNITS: &[(char, u64)] = &[('十', 10), ('百', 100), ('千', 1000)];
const SECTION_UNITS: &[(char, u64)] = &[('万', 10_000), ('亿', 100_000_000)];

fn digit_value(c: char) -> Option<u64> {
    DIGITS.iter().find(|&&(d, _)| d == c).map(|&(_, v)| v)
}

fn small_unit(c: char) -> Option<u64> {
    SMALL_UNITS.iter().find(|&&(u, _)| u == c).map(|&(_, v)| v)
}

fn section_unit(c: char) -> Option<u64> {
    SECTION_UNITS.iter().find(|&&(u, _)| u == c).map(|&(_, v)| v)
}

/// Parse a Chinese-numeral integer from the head of the text.
///
/// `三千五百二十一` → 3521, `一亿二千万` → 120_000_000, `十五` → 15.
pub fn parse_chinese_number(text: &str) -> Option<Decimal> {
    let mut total: u64 = 0;
    let mut section: u64 = 0;
    let mut pending: u64 = 0;
    let mut consumed = false;

    for c in text.chars() {
        if let Some(d) = digit_value(c) {
            pending = pending * 10 + d;
            consumed = true;
        } else if let Some(unit) = small_unit(c) {
            // A leading unit means an implicit one: 十五 = 15.
            let factor = if pending == 0 { 1 } else { pending };
            section += factor * unit;
            pending = 0;
            consumed = true;
        } else if let Some(unit) = section_unit(c) {
            total += (section + pending) * unit;
            section = 0;
            pending = 0;
            consumed = true;
        } else {
            break;
        }
    }

    if !consumed {
        return None;
    }
    Some(Decimal::from(total + section + pending))
}
