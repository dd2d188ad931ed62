//! # Attribute Term Parsing
//!
//! Catalog attributes arrive as free-form strings typed by editors. This
//! module turns them into dates, weekdays and week numbers, returning `None`
//! instead of guessing when a value cannot be read.
//!
//! ## Accepted Formats
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────────────────┐
//! │ Attribute    │ Examples                                                 │
//! ├──────────────┼──────────────────────────────────────────────────────────┤
//! │ date         │ 2025-01-06 · 06.01.2025 · 20250106 · 2025-01-06 08:00:00 │
//! │ weekday      │ 1..7 (ISO) · monday · mon · montag · mo                  │
//! │ holidays     │ ["2025-02-17","2025-04-21"] · 17.02.2025, 21.04.2025     │
//! │ series term  │ summer-week-2 · Camp WEEK-3 (first integer after week-)  │
//! └──────────────┴──────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use chrono::{NaiveDate, Weekday};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%Y%m%d"];

const WEEKDAY_NAMES: [(&str, Weekday); 28] = [
    ("monday", Weekday::Mon),
    ("mon", Weekday::Mon),
    ("montag", Weekday::Mon),
    ("mo", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("tue", Weekday::Tue),
    ("dienstag", Weekday::Tue),
    ("di", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("wed", Weekday::Wed),
    ("mittwoch", Weekday::Wed),
    ("mi", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("thu", Weekday::Thu),
    ("donnerstag", Weekday::Thu),
    ("do", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("fri", Weekday::Fri),
    ("freitag", Weekday::Fri),
    ("fr", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sat", Weekday::Sat),
    ("samstag", Weekday::Sat),
    ("sa", Weekday::Sat),
    ("sunday", Weekday::Sun),
    ("sun", Weekday::Sun),
    ("sonntag", Weekday::Sun),
    ("so", Weekday::Sun),
];

const WEEK_TOKEN: &str = "week-";

/// Extracts the week number from a series term.
///
/// The number is the first run of digits directly following the token
/// `week-` (case-insensitive). Terms without such a run yield `None`, never 0.
///
/// ## Example
/// ```rust
/// use clubhouse_core::terms::week_number_from_term;
///
/// assert_eq!(week_number_from_term("summer-week-2"), Some(2));
/// assert_eq!(week_number_from_term("Camp WEEK-12 (Bern)"), Some(12));
/// assert_eq!(week_number_from_term("week-two"), None);
/// assert_eq!(week_number_from_term("Herbstferien"), None);
/// ```
pub fn week_number_from_term(term: &str) -> Option<u32> {
    let lower = term.to_ascii_lowercase();
    let mut rest = lower.as_str();

    while let Some(pos) = rest.find(WEEK_TOKEN) {
        let after = &rest[pos + WEEK_TOKEN.len()..];
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return digits.parse().ok();
        }
        rest = after;
    }

    None
}

/// Parses a calendar date in one of the accepted formats.
///
/// A trailing time part (`2025-01-06 08:00:00`, `2025-01-06T08:00`) is ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let date_part = trimmed
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Parses a weekday from an ISO number (1 = Monday) or a name.
pub fn parse_weekday(raw: &str) -> Option<Weekday> {
    let value = raw.trim().trim_end_matches('.').to_lowercase();
    if value.is_empty() {
        return None;
    }

    if let Ok(iso) = value.parse::<u8>() {
        return weekday_from_iso(iso);
    }

    WEEKDAY_NAMES
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, day)| *day)
}

/// Maps an ISO weekday number (1 = Monday .. 7 = Sunday).
pub fn weekday_from_iso(iso: u8) -> Option<Weekday> {
    match iso {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Result of reading a holiday list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidayList {
    pub dates: BTreeSet<NaiveDate>,
    /// Entries that could not be read as dates.
    pub rejected: Vec<String>,
}

/// Parses a holiday list stored as a JSON array or a separated list.
///
/// Unreadable entries are collected in [`HolidayList::rejected`] so the
/// caller can report them; the remaining dates are still usable.
pub fn parse_holidays(raw: &str) -> HolidayList {
    let trimmed = raw.trim();
    let entries: Vec<String> = match serde_json::from_str::<Vec<String>>(trimmed) {
        Ok(list) => list,
        Err(_) => trimmed
            .split([',', ';', '\n'])
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };

    let mut list = HolidayList::default();
    for entry in entries {
        match parse_date(&entry) {
            Some(date) => {
                list.dates.insert(date);
            }
            None => list.rejected.push(entry),
        }
    }
    list
}
