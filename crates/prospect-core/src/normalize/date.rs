//! Date coercion from the mixed formats found in filings.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use super::number::parse_chinese_number;

lazy_static! {
    static ref CJK_YMD: Regex =
        Regex::new(r"(?P<y>\d{4})年(?:(?P<m>\d{1,2})月(?:(?P<d>\d{1,2})日)?)?").unwrap();
    static ref DASH_YMD: Regex =
        Regex::new(r"(?P<y>\d{4})[-/.](?P<m>\d{1,2})(?:[-/.](?P<d>\d{1,2}))?").unwrap();
    static ref NUMERAL_YMD: Regex = Regex::new(
        r"(?P<y>[〇零一二三四五六七八九]{4})年(?:(?P<m>十?[一二三四五六七八九十]|十)月(?:(?P<d>[一二三四五六七八九十]{1,3})日)?)?"
    )
    .unwrap();
}

/// A date that may be missing its month or day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum PartialDate {
    Full(NaiveDate),
    YearMonth(i32, u32),
    Year(i32),
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialDate::Full(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PartialDate::YearMonth(y, m) => write!(f, "{y:04}-{m:02}"),
            PartialDate::Year(y) => write!(f, "{y:04}"),
        }
    }
}

impl From<PartialDate> for String {
    fn from(date: PartialDate) -> Self {
        date.to_string()
    }
}

/// Parse the first date found in a normalized text.
pub fn parse_date(text: &str) -> Option<PartialDate> {
    for pattern in [&*CJK_YMD, &*DASH_YMD] {
        if let Some(caps) = pattern.captures(text) {
            let year: i32 = caps.name("y")?.as_str().parse().ok()?;
            let month: Option<u32> = caps.name("m").and_then(|m| m.as_str().parse().ok());
            let day: Option<u32> = caps.name("d").and_then(|d| d.as_str().parse().ok());
            if let Some(date) = assemble(year, month, day) {
                return Some(date);
            }
        }
    }
    if let Some(caps) = NUMERAL_YMD.captures(text) {
        let year = numeral_year(caps.name("y")?.as_str())?;
        let month = caps
            .name("m")
            .and_then(|m| parse_chinese_number(m.as_str()))
            .and_then(|d| u32::try_from(d.mantissa()).ok());
        let day = caps
            .name("d")
            .and_then(|d| parse_chinese_number(d.as_str()))
            .and_then(|d| u32::try_from(d.mantissa()).ok());
        return assemble(year, month, day);
    }
    None
}

fn assemble(year: i32, month: Option<u32>, day: Option<u32>) -> Option<PartialDate> {
    match (month, day) {
        (Some(month), Some(day)) => NaiveDate::from_ymd_opt(year, month, day).map(PartialDate::Full),
        (Some(month), None) if (1..=12).contains(&month) => Some(PartialDate::YearMonth(year, month)),
        (None, _) => Some(PartialDate::Year(year)),
        _ => None,
    }
}

/// Year written digit-by-digit: `二零二一` → 2021.
fn numeral_year(text: &str) -> Option<i32> {
    let mut year = 0;
    for c in text.chars() {
        let digit = match c {
            '〇' | '零' => 0,
            '一' => 1,
            '二' => 2,
            '三' => 3,
            '四' => 4,
            '五' => 5,
            '六' => 6,
            '七' => 7,
            '八' => 8,
            '九' => 9,
            _ => return None,
        };
        year = year * 10 + digit;
    }
    Some(year)
}
