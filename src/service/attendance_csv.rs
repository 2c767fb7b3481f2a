use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use utoipa::ToSchema;

use super::timefmt::{
    MAX_DAY_MINUTES, minutes_between, parse_clock, parse_date, parse_flexible_minutes,
};
use super::{ParseError, SkippedLine, find_column, normalize_header};
use crate::model::attendance::AttendanceStatus;

const CODE_COLUMNS: &[&str] = &["employeecode", "empcode", "code", "employeeid", "empid"];
const DATE_COLUMNS: &[&str] = &["date", "attendancedate", "day"];
const IN_COLUMNS: &[&str] = &["intime", "in", "checkin", "punchin"];
const OUT_COLUMNS: &[&str] = &["outtime", "out", "checkout", "punchout"];
const STATUS_COLUMNS: &[&str] = &["status", "attendancestatus"];
const WORK_MINUTES_COLUMNS: &[&str] = &["workminutes", "minutes"];
const WORK_HOURS_COLUMNS: &[&str] = &["work", "workhours", "totalhours", "duration"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CsvAttendanceRow {
    pub line_no: usize,
    pub employee_code: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>)]
    pub in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub out_time: Option<NaiveTime>,
    pub work_minutes: Option<i32>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Default)]
pub struct CsvAttendance {
    pub rows: Vec<CsvAttendanceRow>,
    pub skipped: Vec<SkippedLine>,
}

struct Columns {
    code: usize,
    date: usize,
    in_time: Option<usize>,
    out_time: Option<usize>,
    status: Option<usize>,
    work_minutes: Option<usize>,
    work_hours: Option<usize>,
}

fn cell<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn optional_clock(raw: &str, column: &str) -> Result<Option<NaiveTime>, String> {
    if raw.is_empty() || raw == "-" || raw == "--" {
        return Ok(None);
    }
    parse_clock(raw)
        .map(Some)
        .ok_or_else(|| format!("invalid {} '{}'", column, raw))
}

fn parse_record(line_no: usize, record: &csv::StringRecord, cols: &Columns) -> Result<CsvAttendanceRow, String> {
    let employee_code = cell(record, Some(cols.code));
    if employee_code.is_empty() {
        return Err("missing employee code".to_string());
    }

    let raw_date = cell(record, Some(cols.date));
    let date = parse_date(raw_date).ok_or_else(|| format!("invalid date '{}'", raw_date))?;

    let in_time = optional_clock(cell(record, cols.in_time), "in_time")?;
    let out_time = optional_clock(cell(record, cols.out_time), "out_time")?;

    let raw_minutes = cell(record, cols.work_minutes);
    let raw_hours = cell(record, cols.work_hours);
    let work_minutes = if !raw_minutes.is_empty() {
        let minutes = raw_minutes
            .parse::<i32>()
            .ok()
            .filter(|m| (0..=MAX_DAY_MINUTES).contains(m))
            .or_else(|| parse_flexible_minutes(raw_minutes));
        Some(minutes.ok_or_else(|| format!("invalid work duration '{}'", raw_minutes))?)
    } else if !raw_hours.is_empty() {
        Some(
            parse_flexible_minutes(raw_hours)
                .ok_or_else(|| format!("invalid work duration '{}'", raw_hours))?,
        )
    } else {
        match (in_time, out_time) {
            (Some(i), Some(o)) => Some(minutes_between(i, o)),
            _ => None,
        }
    };

    let raw_status = cell(record, cols.status);
    let status = if raw_status.is_empty() {
        if in_time.is_some() {
            AttendanceStatus::Present
        } else {
            AttendanceStatus::Absent
        }
    } else {
        AttendanceStatus::from_report_code(raw_status)
            .ok_or_else(|| format!("unknown status '{}'", raw_status))?
    };

    Ok(CsvAttendanceRow {
        line_no,
        employee_code: employee_code.to_string(),
        date,
        in_time,
        out_time,
        work_minutes,
        status,
    })
}

/// Reads an attendance CSV with a header row. Bad rows are skipped and
/// reported; a missing code or date column rejects the whole file.
pub fn parse_attendance_csv(text: &str) -> Result<CsvAttendance, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ParseError::Malformed(e.to_string()))?
        .iter()
        .map(normalize_header)
        .collect();

    let cols = Columns {
        code: find_column(&headers, CODE_COLUMNS).ok_or(ParseError::MissingColumn("employee_code"))?,
        date: find_column(&headers, DATE_COLUMNS).ok_or(ParseError::MissingColumn("date"))?,
        in_time: find_column(&headers, IN_COLUMNS),
        out_time: find_column(&headers, OUT_COLUMNS),
        status: find_column(&headers, STATUS_COLUMNS),
        work_minutes: find_column(&headers, WORK_MINUTES_COLUMNS),
        work_hours: find_column(&headers, WORK_HOURS_COLUMNS),
    };

    let mut out = CsvAttendance::default();
    for (idx, result) in reader.records().enumerate() {
        // header is line 1
        let fallback_line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.skipped.push(SkippedLine::new(fallback_line, e.to_string()));
                continue;
            }
        };
        let line_no = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        match parse_record(line_no, &record, &cols) {
            Ok(row) => out.rows.push(row),
            Err(reason) => out.skipped.push(SkippedLine::new(line_no, reason)),
        }
    }

    if out.rows.is_empty() && out.skipped.is_empty() {
        return Err(ParseError::NoRows);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_derives_missing_fields() {
        let text = "Employee Code, Date, In Time, Out Time, Status\n\
                    EMP001,15/03/2024,09:00,17:30,P\n\
                    EMP002,2024-03-15,,,\n\
                    EMP003,15-03-2024,09:15,,MIS\n";
        let parsed = parse_attendance_csv(text).unwrap();
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.rows.len(), 3);

        let first = &parsed.rows[0];
        assert_eq!(first.employee_code, "EMP001");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(first.work_minutes, Some(510));
        assert_eq!(first.status, AttendanceStatus::Present);
        assert_eq!(first.line_no, 2);

        assert_eq!(parsed.rows[1].status, AttendanceStatus::Absent);
        assert_eq!(parsed.rows[1].work_minutes, None);
        assert_eq!(parsed.rows[2].status, AttendanceStatus::MissedPunch);
    }

    #[test]
    fn work_minutes_column_is_read_as_minutes() {
        let text = "code,date,work_minutes,status\nE1,01/02/2024,480,present\nE2,01/02/2024,7:30,half_day\n";
        let parsed = parse_attendance_csv(text).unwrap();
        assert_eq!(parsed.rows[0].work_minutes, Some(480));
        assert_eq!(parsed.rows[1].work_minutes, Some(450));
        assert_eq!(parsed.rows[1].status, AttendanceStatus::HalfDay);
    }

    #[test]
    fn work_hours_column_is_read_as_hours() {
        let text = "code,date,total hours\nE1,01/02/2024,7.5\n";
        let parsed = parse_attendance_csv(text).unwrap();
        assert_eq!(parsed.rows[0].work_minutes, Some(450));
        assert_eq!(parsed.rows[0].status, AttendanceStatus::Absent);
    }

    #[test]
    fn durations_longer_than_a_day_are_skipped() {
        let text = "code,date,work_minutes\nE1,01/02/2024,40000000:00\nE2,01/02/2024,99999\nE3,01/02/2024,1e12\nE4,01/02/2024,480\n";
        let parsed = parse_attendance_csv(text).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].employee_code, "E4");
        assert_eq!(
            parsed.skipped[0].reason,
            "invalid work duration '40000000:00'"
        );
        assert_eq!(parsed.skipped.len(), 3);
    }

    #[test]
    fn bad_rows_are_skipped_with_reason() {
        let text = "employee_code,date,in_time,status\nE1,not-a-date,09:00,P\n,01/01/2024,09:00,P\nE3,01/01/2024,25:99,P\nE4,01/01/2024,09:00,ZZ\n";
        let parsed = parse_attendance_csv(text).unwrap();
        assert!(parsed.rows.is_empty());
        let reasons: Vec<_> = parsed.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(
            reasons,
            vec![
                "invalid date 'not-a-date'",
                "missing employee code",
                "invalid in_time '25:99'",
                "unknown status 'ZZ'",
            ]
        );
        assert_eq!(parsed.skipped[0].line_no, 2);
    }

    #[test]
    fn required_columns() {
        assert_eq!(
            parse_attendance_csv("name,date\nA,01/01/2024\n").unwrap_err(),
            ParseError::MissingColumn("employee_code")
        );
        assert_eq!(
            parse_attendance_csv("code,status\nE1,P\n").unwrap_err(),
            ParseError::MissingColumn("date")
        );
        assert_eq!(parse_attendance_csv("code,date\n").unwrap_err(), ParseError::NoRows);
    }
}
