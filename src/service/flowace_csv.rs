//! Reader for Flowace productivity exports.
//!
//! Exports carry a display name instead of an employee code, one row per
//! member per day. Column titles vary between report types, so columns are
//! found by their normalised header.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::timefmt::{parse_date, parse_flexible_minutes};
use super::{ParseError, SkippedLine, find_column, normalize_header};

const NAME_COLUMNS: &[&str] = &["employeename", "employee", "name", "member", "membername", "user", "username"];
const DATE_COLUMNS: &[&str] = &["date", "day", "workdate"];
const ACTIVE_COLUMNS: &[&str] = &["activetime", "active", "activehours", "activeduration", "totalactivetime"];
const IDLE_COLUMNS: &[&str] = &["idletime", "idle", "idlehours", "idleduration"];
const PRODUCTIVE_COLUMNS: &[&str] = &["productivetime", "productive", "productivehours"];
const UNPRODUCTIVE_COLUMNS: &[&str] = &["unproductivetime", "unproductive", "unproductivehours"];
const PRODUCTIVITY_COLUMNS: &[&str] = &["productivity", "productivitypercent", "productivityscore"];

#[derive(Debug, Clone, PartialEq)]
pub struct FlowaceRow {
    pub line_no: usize,
    pub employee_name: String,
    pub date: NaiveDate,
    pub active_minutes: i32,
    pub idle_minutes: i32,
    pub productive_minutes: i32,
    pub unproductive_minutes: i32,
    pub productivity_percent: Option<f64>,
}

#[derive(Debug, Default)]
pub struct FlowaceFile {
    pub rows: Vec<FlowaceRow>,
    pub skipped: Vec<SkippedLine>,
    /// Rows dropped because a later row had the same name and date
    pub duplicates: usize,
}

struct Columns {
    name: usize,
    date: usize,
    active: Option<usize>,
    idle: Option<usize>,
    productive: Option<usize>,
    unproductive: Option<usize>,
    productivity: Option<usize>,
}

fn cell<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> &'r str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn minutes(record: &csv::StringRecord, idx: Option<usize>, column: &str) -> Result<i32, String> {
    let raw = cell(record, idx);
    parse_flexible_minutes(raw).ok_or_else(|| format!("invalid {} '{}'", column, raw))
}

/// The stored form of a name. `flowace_records` is unique on this exact text.
pub fn collapse_spaces(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn percent(raw: &str) -> Result<Option<f64>, String> {
    let trimmed = raw.trim_end_matches('%').trim();
    if trimmed.is_empty() || trimmed == "-" {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(format!("invalid productivity '{}'", raw)),
    }
}

fn parse_record(line_no: usize, record: &csv::StringRecord, cols: &Columns) -> Result<FlowaceRow, String> {
    let employee_name = cell(record, Some(cols.name));
    if employee_name.is_empty() {
        return Err("missing employee name".to_string());
    }
    let raw_date = cell(record, Some(cols.date));
    let date = parse_date(raw_date).ok_or_else(|| format!("invalid date '{}'", raw_date))?;

    Ok(FlowaceRow {
        line_no,
        employee_name: collapse_spaces(employee_name),
        date,
        active_minutes: minutes(record, cols.active, "active time")?,
        idle_minutes: minutes(record, cols.idle, "idle time")?,
        productive_minutes: minutes(record, cols.productive, "productive time")?,
        unproductive_minutes: minutes(record, cols.unproductive, "unproductive time")?,
        productivity_percent: percent(cell(record, cols.productivity))?,
    })
}

/// Parses a Flowace CSV. Within one file the last row for a (name, date)
/// pair wins, using the same name text the table's unique key sees.
pub fn parse_flowace_csv(text: &str) -> Result<FlowaceFile, ParseError> {
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
        name: find_column(&headers, NAME_COLUMNS).ok_or(ParseError::MissingColumn("employee_name"))?,
        date: find_column(&headers, DATE_COLUMNS).ok_or(ParseError::MissingColumn("date"))?,
        active: find_column(&headers, ACTIVE_COLUMNS),
        idle: find_column(&headers, IDLE_COLUMNS),
        productive: find_column(&headers, PRODUCTIVE_COLUMNS),
        unproductive: find_column(&headers, UNPRODUCTIVE_COLUMNS),
        productivity: find_column(&headers, PRODUCTIVITY_COLUMNS),
    };

    let mut file = FlowaceFile::default();
    let mut seen: HashMap<(String, NaiveDate), usize> = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        let fallback_line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                file.skipped.push(SkippedLine::new(fallback_line, e.to_string()));
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
            Ok(row) => {
                let key = (row.employee_name.clone(), row.date);
                match seen.get(&key) {
                    Some(&pos) => {
                        file.rows[pos] = row;
                        file.duplicates += 1;
                    }
                    None => {
                        seen.insert(key, file.rows.len());
                        file.rows.push(row);
                    }
                }
            }
            Err(reason) => file.skipped.push(SkippedLine::new(line_no, reason)),
        }
    }

    if file.rows.is_empty() && file.skipped.is_empty() {
        return Err(ParseError::NoRows);
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Employee Name,Date,Active Time,Idle Time,Productive Time,Unproductive Time,Productivity %
Asha  Rao,15/03/2024,07:45:00,00:30:00,06:50:00,00:55:00,88%
Ravi K,15/03/2024,3h 10m,45m,2.5,0,79.1
Asha Rao,15/03/2024,08:00:00,00:20:00,07:00:00,01:00:00,87.5%
,15/03/2024,01:00:00,,,,
Meera,16/03/2024,later,,,,
";

    #[test]
    fn parses_and_dedupes_by_name_and_date() {
        let file = parse_flowace_csv(SAMPLE).unwrap();
        assert_eq!(file.rows.len(), 2);
        assert_eq!(file.duplicates, 1);

        let asha = &file.rows[0];
        assert_eq!(asha.employee_name, "Asha Rao");
        // the later row replaced the first one
        assert_eq!(asha.active_minutes, 480);
        assert_eq!(asha.idle_minutes, 20);
        assert_eq!(asha.productivity_percent, Some(87.5));
        assert_eq!(asha.line_no, 4);

        let ravi = &file.rows[1];
        assert_eq!(ravi.active_minutes, 190);
        assert_eq!(ravi.idle_minutes, 45);
        assert_eq!(ravi.productive_minutes, 150);
        assert_eq!(ravi.unproductive_minutes, 0);
        assert_eq!(ravi.productivity_percent, Some(79.1));
    }

    #[test]
    fn bad_rows_are_reported() {
        let file = parse_flowace_csv(SAMPLE).unwrap();
        let reasons: Vec<_> = file.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(reasons, vec!["missing employee name", "invalid active time 'later'"]);
    }

    #[test]
    fn oversized_activity_is_skipped_not_fatal() {
        let text = "Name,Date,Active Time,Idle Time\nAsha,15/03/2024,40000000:00,0\nRavi,15/03/2024,08:00,99999999999h\nMeera,15/03/2024,07:00,00:30\n";
        let file = parse_flowace_csv(text).unwrap();
        assert_eq!(file.rows.len(), 1);
        assert_eq!(file.rows[0].employee_name, "Meera");
        let lines: Vec<_> = file.skipped.iter().map(|s| s.line_no).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn dedup_key_is_the_stored_name() {
        let text = "Name,Date,Active\nAsha  Rao,15/03/2024,1\nAsha Rao,15/03/2024,2\nasha rao,15/03/2024,3\nAsha-Rao,15/03/2024,4\n";
        let file = parse_flowace_csv(text).unwrap();
        let names: Vec<_> = file.rows.iter().map(|r| r.employee_name.as_str()).collect();
        assert_eq!(names, vec!["Asha Rao", "asha rao", "Asha-Rao"]);
        assert_eq!(file.rows[0].active_minutes, 120);
        assert_eq!(file.duplicates, 1);
    }

    #[test]
    fn optional_columns_default_to_zero() {
        let file = parse_flowace_csv("Name,Date\nTara,2024-03-15\n").unwrap();
        assert_eq!(file.rows[0].active_minutes, 0);
        assert_eq!(file.rows[0].productivity_percent, None);
    }

    #[test]
    fn requires_name_and_date() {
        assert_eq!(
            parse_flowace_csv("Date,Active\n01/01/2024,1\n").unwrap_err(),
            ParseError::MissingColumn("employee_name")
        );
        assert_eq!(
            parse_flowace_csv("Name,Active\nA,1\n").unwrap_err(),
            ParseError::MissingColumn("date")
        );
    }
}
