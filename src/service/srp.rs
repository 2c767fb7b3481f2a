//! Parser for the SRP daily attendance export.
//!
//! The export is a text report padded with spaces: a few banner lines, a
//! line carrying the report date, a column header, then one line per
//! employee. Page breaks repeat the banner and header, and the report ends
//! with totals. Columns are not at fixed offsets across vendors' versions,
//! so rows are read token by token:
//!
//! ```text
//! <sno> <code> <name...> [shift] <in> <out> [work] [ot] <status>
//! ```
//!
//! Names contain spaces, so everything between the code and the first time
//! token is the name, minus a trailing shift code.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

use super::timefmt::{minutes_between, parse_clock, parse_date, parse_hhmm_minutes};
use super::{ParseError, SkippedLine};
use crate::model::attendance::AttendanceStatus;

static DATE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bdate\b\s*[:\-]?\s*(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|\d{1,2}[\- /][A-Za-z]{3}[\- /]\d{2,4})",
    )
    .expect("valid srp date regex")
});
static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(s\.?\s*no|sr\.?(\s*no)?|sl\.?\s*no|sno)\.?\s.*(code|emp)")
        .expect("valid srp header regex")
});
static ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+\s+\S+\s+\S").expect("valid srp row regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").expect("valid srp time regex"));
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(-{1,3}|--:--|__:__)$").expect("valid srp placeholder regex"));
static SHIFT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(GS|G|N|S\d{1,2}|[ABC]\d)$").expect("valid srp shift regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SrpRow {
    pub line_no: usize,
    pub serial: u32,
    pub employee_code: String,
    pub name: String,
    pub shift: Option<String>,
    #[schema(value_type = Option<String>)]
    pub in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub out_time: Option<NaiveTime>,
    pub work_minutes: Option<i32>,
    pub overtime_minutes: Option<i32>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SrpReport {
    #[schema(value_type = String, format = "date")]
    pub report_date: NaiveDate,
    pub rows: Vec<SrpRow>,
    pub skipped: Vec<SkippedLine>,
}

fn is_time_token(token: &str) -> bool {
    TIME_RE.is_match(token) || PLACEHOLDER_RE.is_match(token)
}

/// `00:00` in a clock column means "no punch".
fn clock_value(token: Option<&&str>) -> Option<NaiveTime> {
    let token = token?;
    if PLACEHOLDER_RE.is_match(token) {
        return None;
    }
    parse_clock(token).filter(|t| *t != NaiveTime::MIN)
}

fn duration_value(token: Option<&&str>) -> Option<i32> {
    let token = token?;
    if PLACEHOLDER_RE.is_match(token) {
        return None;
    }
    parse_hhmm_minutes(token)
}

/// Finds the report date on the banner lines above the data.
fn report_date(lines: &[&str]) -> Option<NaiveDate> {
    lines.iter().find_map(|line| {
        DATE_LINE_RE
            .captures(line)
            .and_then(|caps| parse_date(caps.get(1)?.as_str()))
    })
}

/// Index of the first data line.
fn data_start(lines: &[&str]) -> Option<usize> {
    if let Some(header) = lines.iter().position(|l| HEADER_RE.is_match(l)) {
        return Some(header + 1);
    }
    lines.iter().position(|l| ROW_RE.is_match(l))
}

fn parse_row(line_no: usize, line: &str) -> Result<SrpRow, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let serial: u32 = tokens[0]
        .parse()
        .map_err(|_| format!("serial number '{}' is not a number", tokens[0]))?;
    let employee_code = tokens[1].to_string();
    let rest = &tokens[2..];

    let first_time = rest.iter().position(|t| is_time_token(t));
    let (name_tokens, times, tail): (&[&str], &[&str], &[&str]) = match first_time {
        Some(i) => {
            let times_len = rest[i..].iter().take_while(|t| is_time_token(t)).count();
            (&rest[..i], &rest[i..i + times_len], &rest[i + times_len..])
        }
        // absent, leave and weekly-off rows often have no time columns at all
        None if rest.len() >= 2 => (&rest[..rest.len() - 1], &[], &rest[rest.len() - 1..]),
        None => return Err("row has no name or status".to_string()),
    };

    let (name_tokens, shift) = match name_tokens.split_last() {
        Some((last, init)) if !init.is_empty() && SHIFT_RE.is_match(last) => {
            (init, Some(last.to_string()))
        }
        _ => (name_tokens, None),
    };
    if name_tokens.is_empty() {
        return Err("missing employee name".to_string());
    }

    let in_time = clock_value(times.first());
    let out_time = clock_value(times.get(1));
    let overtime_minutes = duration_value(times.get(3));
    let work_minutes = duration_value(times.get(2)).or(match (in_time, out_time) {
        (Some(i), Some(o)) => Some(minutes_between(i, o)),
        _ => None,
    });

    let status = match tail.last() {
        Some(code) => AttendanceStatus::from_report_code(code)
            .ok_or_else(|| format!("unknown status code '{}'", code))?,
        None if in_time.is_some() => AttendanceStatus::Present,
        None => return Err("missing status".to_string()),
    };

    Ok(SrpRow {
        line_no,
        serial,
        employee_code,
        name: name_tokens.join(" "),
        shift,
        in_time,
        out_time,
        work_minutes,
        overtime_minutes,
        status,
    })
}

/// Parses a whole SRP report. `date_override` wins over the date printed in
/// the banner.
pub fn parse_srp(text: &str, date_override: Option<NaiveDate>) -> Result<SrpReport, ParseError> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Err(ParseError::Empty);
    }

    let start = data_start(&lines).ok_or(ParseError::NoRows)?;
    let report_date = date_override
        .or_else(|| report_date(&lines[..start]))
        .ok_or(ParseError::MissingDate)?;

    let mut rows = Vec::new();
    let mut skipped = Vec::new();

    for (idx, line) in lines.iter().enumerate().skip(start) {
        // page banners, repeated headers, separators and totals
        if !ROW_RE.is_match(line) {
            continue;
        }
        let line_no = idx + 1;
        match parse_row(line_no, line) {
            Ok(row) => rows.push(row),
            Err(reason) => skipped.push(SkippedLine::new(line_no, reason)),
        }
    }

    if rows.is_empty() && skipped.is_empty() {
        return Err(ParseError::NoRows);
    }

    Ok(SrpReport {
        report_date,
        rows,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
                      ACME INDUSTRIES PVT LTD
               Daily Attendance Report
Date : 15/03/2024                                   Page 1 of 2
--------------------------------------------------------------------------
SNo  EmpCode  Name               Shift  In     Out    Work   OT     Status
--------------------------------------------------------------------------
1    EMP001   ASHA RAO           GS     09:02  18:10  09:08  00:08  P
2    EMP002   RAVI KUMAR         GS     --     --     00:00  00:00  A
3    EMP003   MEERA NAIR         S1     09:30  13:45  04:15  00:00  HD

                      ACME INDUSTRIES PVT LTD
SNo  EmpCode  Name               Shift  In     Out    Work   OT     Status
4    EMP004   JOHN               GS     10:00  --     00:00  00:00  MIS
5    EMP005   PRIYA SINGH        GS     WO
6    EMP006   KARAN MEHTA        GS     09:00  18:00  09:00  00:00  XYZ
--------------------------------------------------------------------------
Total Present: 2
";

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_sample_report() {
        let report = parse_srp(SAMPLE, None).unwrap();
        assert_eq!(report.report_date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(report.rows.len(), 5);

        let asha = &report.rows[0];
        assert_eq!(asha.serial, 1);
        assert_eq!(asha.employee_code, "EMP001");
        assert_eq!(asha.name, "ASHA RAO");
        assert_eq!(asha.shift.as_deref(), Some("GS"));
        assert_eq!(asha.in_time, Some(t(9, 2)));
        assert_eq!(asha.out_time, Some(t(18, 10)));
        assert_eq!(asha.work_minutes, Some(548));
        assert_eq!(asha.overtime_minutes, Some(8));
        assert_eq!(asha.status, AttendanceStatus::Present);
        assert_eq!(asha.line_no, 7);
    }

    #[test]
    fn absent_and_half_day_rows() {
        let report = parse_srp(SAMPLE, None).unwrap();

        let ravi = &report.rows[1];
        assert_eq!(ravi.in_time, None);
        assert_eq!(ravi.out_time, None);
        assert_eq!(ravi.work_minutes, Some(0));
        assert_eq!(ravi.status, AttendanceStatus::Absent);

        let meera = &report.rows[2];
        assert_eq!(meera.shift.as_deref(), Some("S1"));
        assert_eq!(meera.status, AttendanceStatus::HalfDay);
        assert_eq!(meera.work_minutes, Some(255));
    }

    #[test]
    fn rows_after_page_break_and_without_times() {
        let report = parse_srp(SAMPLE, None).unwrap();

        let john = &report.rows[3];
        assert_eq!(john.name, "JOHN");
        assert_eq!(john.shift.as_deref(), Some("GS"));
        assert_eq!(john.out_time, None);
        assert_eq!(john.status, AttendanceStatus::MissedPunch);

        let priya = &report.rows[4];
        assert_eq!(priya.name, "PRIYA SINGH");
        assert_eq!(priya.shift.as_deref(), Some("GS"));
        assert_eq!(priya.in_time, None);
        assert_eq!(priya.work_minutes, None);
        assert_eq!(priya.status, AttendanceStatus::WeeklyOff);
    }

    #[test]
    fn unknown_status_is_reported_not_fatal() {
        let report = parse_srp(SAMPLE, None).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line_no, 15);
        assert!(report.skipped[0].reason.contains("XYZ"));
    }

    #[test]
    fn override_date_wins() {
        let day = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let report = parse_srp(SAMPLE, Some(day)).unwrap();
        assert_eq!(report.report_date, day);
    }

    #[test]
    fn headerless_report_starts_at_first_row() {
        let text = "Attendance Date: 02-Jan-2025\n\
                    1 E10 SAM LEE 09:00 17:00 P\n\
                    2 E11 TARA 08:30 17:45\n";
        let report = parse_srp(text, None).unwrap();
        assert_eq!(report.report_date, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].name, "SAM LEE");
        assert_eq!(report.rows[0].shift, None);
        assert_eq!(report.rows[0].work_minutes, Some(480));
        // no status column but an in punch
        assert_eq!(report.rows[1].status, AttendanceStatus::Present);
        assert_eq!(report.rows[1].work_minutes, Some(555));
    }

    #[test]
    fn bare_sr_header_is_recognised() {
        let text = "Date : 15/03/2024\n\
                    2024 Annual Shift Roster\n\
                    Sr  Code  Name  In  Out  Status\n\
                    1 E1 ASHA 09:00 17:00 P\n";
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(data_start(&lines), Some(3));

        let report = parse_srp(text, None).unwrap();
        assert_eq!(report.rows.len(), 1);
        assert!(report.skipped.is_empty());
        assert!(!HEADER_RE.is_match("Srinivas Code Name"));
    }

    #[test]
    fn missing_date_is_an_error() {
        let text = "SNo Code Name In Out Status\n1 E1 A B 09:00 17:00 P\n";
        assert_eq!(parse_srp(text, None), Err(ParseError::MissingDate));
    }

    #[test]
    fn report_without_rows() {
        assert_eq!(parse_srp("   \n", None), Err(ParseError::Empty));
        assert_eq!(
            parse_srp("Date : 01/01/2024\nnothing here\n", None),
            Err(ParseError::NoRows)
        );
    }
}
