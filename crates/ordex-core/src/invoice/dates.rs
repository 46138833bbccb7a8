//! Date recognition for invoice tokens.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DATE_LONG: Regex = Regex::new(
        r"([A-Za-z]{3,9})\.?\s+(\d{1,2}),?\s+(\d{4})"
    ).unwrap();

    static ref DATE_DAY_FIRST: Regex = Regex::new(
        r"\b(\d{1,2})\s+([A-Za-z]{3,9})\.?\s+(\d{4})\b"
    ).unwrap();

    static ref DATE_YMD: Regex = Regex::new(
        r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"
    ).unwrap();

    static ref DATE_US: Regex = Regex::new(
        r"\b(\d{1,2})/(\d{1,2})/(\d{4}|\d{2})\b"
    ).unwrap();
}

/// Find the first date in `text`.
///
/// Recognises `November 5, 1998`, `Nov. 5, 1998`, `5 November 1998`,
/// `1998-11-05` and US-style `11/05/1998`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = DATE_LONG.captures(text) {
        let month = month_number(&caps[1]);
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = month.and_then(|m| NaiveDate::from_ymd_opt(year, m, day)) {
            return Some(date);
        }
    }

    if let Some(caps) = DATE_DAY_FIRST.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2]);
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = month.and_then(|m| NaiveDate::from_ymd_opt(year, m, day)) {
            return Some(date);
        }
    }

    if let Some(caps) = DATE_YMD.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = DATE_US.captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let year = parse_year(&caps[3]);
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

/// Find the first date in `text` and render it as `YYYY-MM-DD`.
pub fn canonical_date(text: &str) -> Option<String> {
    parse_date(text).map(|d| d.format("%Y-%m-%d").to_string())
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        // Two-digit years: the site has existed since 1995.
        if year >= 95 { 1900 + year } else { 2000 + year }
    } else {
        year
    }
}

/// English month name or abbreviation to number.
fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
