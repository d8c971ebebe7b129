//! Date and clock-time helpers
//!
//! The target site is not consistent about time formats: the tee sheet shows
//! "2:00 PM", the booking list sometimes "2:00PM", and configuration uses
//! 24-hour "14:00". Everything funnels through [`parse_clock_time`].

use crate::types::TargetDay;
use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveTime};
use regex::Regex;
use std::sync::OnceLock;

fn time_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\d{1,2}:\d{2}\s*[AP]M").unwrap())
}

fn bare_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{1,2}:\d{2}").unwrap())
}

/// Parse a clock time in any of the formats the site or the config uses:
/// `2:00 PM`, `2:00PM`, `14:00`.
pub fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let cleaned = raw.trim().to_uppercase();
    for format in ["%I:%M %p", "%I:%M%p", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(&cleaned, format) {
            return Some(time);
        }
    }
    None
}

/// Find the first clock-time token inside arbitrary element text, e.g.
/// `"7:30 AM  Open  Open  Open  Open"` → `"7:30 AM"`.
///
/// Prefers an AM/PM-qualified token; falls back to a bare `H:MM` match.
pub fn extract_time_token(text: &str) -> Option<String> {
    if let Some(m) = time_token_re().find(text) {
        return Some(m.as_str().to_string());
    }
    bare_time_re().find(text).map(|m| m.as_str().to_string())
}

/// Parse a fixed UTC offset like `-05:00`, `+0530`, or `Z`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match *s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => (1, s),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// One bookable calendar date inside the booking window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateDate {
    pub date: NaiveDate,
    pub weekday: chrono::Weekday,
    pub days_ahead: u32,
}

/// Resolve a target day to a concrete date, relative to `today`.
///
/// Weekday targets resolve to the nearest upcoming occurrence (today itself
/// never counts: the window opens days in advance, so same-day targets are
/// already closed) and return `None` when that occurrence falls outside the
/// booking window. Exact-date targets pass through untouched.
pub fn resolve_target_date(
    day: &TargetDay,
    today: NaiveDate,
    window_days: u32,
) -> Option<NaiveDate> {
    match day {
        TargetDay::Date(date) => Some(*date),
        TargetDay::Weekday(weekday) => {
            let today_num = i64::from(today.weekday().num_days_from_monday());
            let target_num = i64::from(weekday.num_days_from_monday());
            let mut days_ahead = (target_num - today_num).rem_euclid(7);
            if days_ahead == 0 {
                days_ahead = 7;
            }
            if days_ahead > i64::from(window_days) {
                return None;
            }
            Some(today + Duration::days(days_ahead))
        }
    }
}

/// All dates from tomorrow through the end of the booking window, used to
/// show the operator what is reachable when the target day is not.
pub fn candidate_dates(today: NaiveDate, window_days: u32) -> Vec<CandidateDate> {
    (1..=window_days)
        .map(|days_ahead| {
            let date = today + Duration::days(i64::from(days_ahead));
            CandidateDate {
                date,
                weekday: date.weekday(),
                days_ahead,
            }
        })
        .collect()
}
