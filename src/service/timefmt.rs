//! Date, clock and duration formats found in attendance and productivity exports.

use chrono::{NaiveDate, NaiveTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

/// No single day's duration can run past 24 hours.
pub const MAX_DAY_MINUTES: i32 = 24 * 60;

const FOUR_DIGIT_YEAR: &[&str] = &[
    "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%d-%b-%Y", "%d %b %Y", "%d/%b/%Y",
];
const TWO_DIGIT_YEAR: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d.%m.%y", "%d-%b-%y", "%d %b %y"];

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").expect("valid iso date regex"));
static HM_UNITS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:(\d+)\s*h(?:rs?|ours?)?)?\s*(?:(\d+)\s*m(?:ins?|inutes?)?)?\s*(?:(\d+)\s*s(?:ecs?|econds?)?)?\s*$")
        .expect("valid duration regex")
});

/// Day-first dates (`15/03/2024`, `15-Mar-24`) and ISO dates.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if ISO_DATE_RE.is_match(s) {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    }
    let year = s
        .rsplit(|c: char| !c.is_ascii_alphanumeric())
        .next()
        .unwrap_or_default();
    let formats = if year.len() == 2 {
        TWO_DIGIT_YEAR
    } else {
        FOUR_DIGIT_YEAR
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Wall-clock time: `9:05`, `09:05:30`, `9:05 PM`.
pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let s = raw.trim();
    ["%H:%M:%S", "%H:%M", "%I:%M %p", "%I:%M:%S %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

fn within_day(minutes: i64) -> Option<i32> {
    i32::try_from(minutes)
        .ok()
        .filter(|m| (0..=MAX_DAY_MINUTES).contains(m))
}

/// `HH:MM` or `HH:MM:SS` durations up to a full day. Seconds are dropped.
pub fn parse_hhmm_minutes(raw: &str) -> Option<i32> {
    let mut parts = raw.trim().split(':');
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().ok()?;
    if let Some(seconds) = parts.next() {
        let seconds: i32 = seconds.trim().parse().ok()?;
        if !(0..60).contains(&seconds) {
            return None;
        }
    }
    if parts.next().is_some() || hours < 0 || !(0..60).contains(&minutes) {
        return None;
    }
    within_day(hours.checked_mul(60)?.checked_add(minutes)?)
}

/// Every duration spelling seen in exports: `HH:MM[:SS]`, `1h 20m`, `45m`,
/// decimal hours (`7.5`). Blank means zero; anything over a day is rejected.
pub fn parse_flexible_minutes(raw: &str) -> Option<i32> {
    let s = raw.trim();
    if s.is_empty() || s == "-" || s == "--" {
        return Some(0);
    }
    if s.contains(':') {
        return parse_hhmm_minutes(s);
    }
    if let Ok(hours) = s.parse::<f64>() {
        let minutes = (hours * 60.0).round();
        if minutes.is_finite() && (0.0..=MAX_DAY_MINUTES as f64).contains(&minutes) {
            return Some(minutes as i32);
        }
        return None;
    }
    let caps = HM_UNITS_RE.captures(s)?;
    if caps.get(1).is_none() && caps.get(2).is_none() && caps.get(3).is_none() {
        return None;
    }
    let num = |i: usize| -> Option<i64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    within_day(num(1)?.checked_mul(60)?.checked_add(num(2)?)?)
}

/// Minutes from `start` to `end`; an `end` before `start` crossed midnight.
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> i32 {
    let start = start.num_seconds_from_midnight() as i32 / 60;
    let end = end.num_seconds_from_midnight() as i32 / 60;
    if end >= start {
        end - start
    } else {
        end + 24 * 60 - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn dates_in_export_formats() {
        assert_eq!(parse_date("15/03/2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15-03-2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15.03.2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15/03/24"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("15-Mar-2024"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("2024-03-15"), Some(d(2024, 3, 15)));
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn clock_times() {
        assert_eq!(parse_clock("9:05"), NaiveTime::from_hms_opt(9, 5, 0));
        assert_eq!(parse_clock("18:10:30"), NaiveTime::from_hms_opt(18, 10, 30));
        assert_eq!(parse_clock("6:15 PM"), NaiveTime::from_hms_opt(18, 15, 0));
        assert_eq!(parse_clock("--"), None);
    }

    #[test]
    fn hhmm_durations() {
        assert_eq!(parse_hhmm_minutes("09:08"), Some(548));
        assert_eq!(parse_hhmm_minutes("24:00"), Some(1440));
        assert_eq!(parse_hhmm_minutes("01:02:59"), Some(62));
        assert_eq!(parse_hhmm_minutes("1:75"), None);
        assert_eq!(parse_hhmm_minutes("abc"), None);
    }

    #[test]
    fn flexible_durations() {
        assert_eq!(parse_flexible_minutes("7.5"), Some(450));
        assert_eq!(parse_flexible_minutes("1h 20m"), Some(80));
        assert_eq!(parse_flexible_minutes("45m"), Some(45));
        assert_eq!(parse_flexible_minutes("2 hrs"), Some(120));
        assert_eq!(parse_flexible_minutes("06:30:00"), Some(390));
        assert_eq!(parse_flexible_minutes(""), Some(0));
        assert_eq!(parse_flexible_minutes("soon"), None);
        assert_eq!(parse_flexible_minutes("-3"), None);
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert_eq!(parse_hhmm_minutes("26:00"), None);
        assert_eq!(parse_flexible_minutes("40000000:00"), None);
        assert_eq!(parse_flexible_minutes("99999999999999999999:00"), None);
        assert_eq!(parse_flexible_minutes("40000000h 5m"), None);
        assert_eq!(parse_flexible_minutes("99999999999h"), None);
        assert_eq!(parse_flexible_minutes("99999999999999999999999m"), None);
        assert_eq!(parse_flexible_minutes("1e12"), None);
        assert_eq!(parse_flexible_minutes("inf"), None);
        assert_eq!(parse_flexible_minutes("25"), None);
        assert_eq!(parse_flexible_minutes("24h"), Some(1440));
    }

    #[test]
    fn overnight_spans() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(minutes_between(t(9, 0), t(18, 30)), 570);
        assert_eq!(minutes_between(t(22, 0), t(6, 0)), 480);
    }
}
