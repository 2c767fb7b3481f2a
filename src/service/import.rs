//! Writes parsed uploads to the database.
//!
//! Every upload gets an `upload_history` row before parsing starts, so a file
//! that fails to parse still leaves a `failed` entry behind. The rows
//! themselves are written in a single transaction together with the final
//! counts.

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::{MySql, MySqlPool, Transaction};
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use super::SkippedLine;
use super::attendance_csv::CsvAttendanceRow;
use super::flowace_csv::FlowaceFile;
use super::name_matcher::NameMatcher;
use super::srp::SrpRow;
use super::timefmt::minutes_between;
use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;
use crate::model::attendance_record::RecordSource;
use crate::model::employee::EmployeeRef;
use crate::model::flowace::MatchMethod;
use crate::model::upload::{FileType, UploadStatus};

/// One attendance line ready to be written, whatever file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line_no: usize,
    pub employee_code: String,
    pub date: NaiveDate,
    pub in_time: Option<NaiveTime>,
    pub out_time: Option<NaiveTime>,
    pub work_minutes: Option<i32>,
    pub status: AttendanceStatus,
}

impl ImportRow {
    pub fn from_srp(row: SrpRow, date: NaiveDate) -> Self {
        Self {
            line_no: row.line_no,
            employee_code: row.employee_code,
            date,
            in_time: row.in_time,
            out_time: row.out_time,
            work_minutes: row.work_minutes,
            status: row.status,
        }
    }

    pub fn effective_minutes(&self) -> i32 {
        effective_minutes(self.work_minutes, self.in_time, self.out_time)
    }
}

/// Stated minutes, else the time between the punches, else zero.
pub fn effective_minutes(
    work_minutes: Option<i32>,
    in_time: Option<NaiveTime>,
    out_time: Option<NaiveTime>,
) -> i32 {
    match (work_minutes, in_time, out_time) {
        (Some(m), _, _) => m,
        (None, Some(i), Some(o)) => minutes_between(i, o),
        _ => 0,
    }
}

impl From<CsvAttendanceRow> for ImportRow {
    fn from(row: CsvAttendanceRow) -> Self {
        Self {
            line_no: row.line_no,
            employee_code: row.employee_code,
            date: row.date,
            in_time: row.in_time,
            out_time: row.out_time,
            work_minutes: row.work_minutes,
            status: row.status,
        }
    }
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ImportSummary {
    pub upload_id: u64,
    pub batch_id: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub report_date: Option<NaiveDate>,
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub skipped: usize,
    /// Employee codes in the file that match no employee
    pub unknown_codes: Vec<String>,
    pub skipped_lines: Vec<SkippedLine>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct FlowaceImportSummary {
    pub upload_id: u64,
    pub batch_id: String,
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Repeated name/date rows inside the file
    pub duplicates: usize,
    pub skipped: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub unmatched_names: Vec<String>,
    pub skipped_lines: Vec<SkippedLine>,
}

/// An `upload_history` row in `processing` state.
#[derive(Debug, Clone)]
pub struct UploadHandle {
    pub id: u64,
    pub batch_id: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    total: usize,
    inserted: usize,
    updated: usize,
    duplicates: usize,
    skipped: usize,
}

pub async fn begin_upload(
    pool: &MySqlPool,
    file_name: &str,
    file_type: FileType,
    uploaded_by: &str,
) -> Result<UploadHandle, AppError> {
    let batch_id = uuid::Uuid::new_v4().to_string();
    let result = sqlx::query(
        r#"
        INSERT INTO upload_history (batch_id, file_name, file_type, uploaded_by, status)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&batch_id)
    .bind(file_name)
    .bind(file_type.as_ref())
    .bind(uploaded_by)
    .bind(UploadStatus::Processing.as_ref())
    .execute(pool)
    .await?;

    Ok(UploadHandle {
        id: result.last_insert_id(),
        batch_id,
    })
}

/// Records why an upload did not go through. Errors here are only logged so
/// the caller still sees the original failure.
pub async fn fail_upload(pool: &MySqlPool, upload: &UploadHandle, reason: &str) {
    let result = sqlx::query("UPDATE upload_history SET status = ?, error_message = ? WHERE id = ?")
        .bind(UploadStatus::Failed.as_ref())
        .bind(reason)
        .bind(upload.id)
        .execute(pool)
        .await;

    if let Err(e) = result {
        warn!(error = %e, upload_id = upload.id, "Could not mark upload as failed");
    }
}

async fn complete_upload(
    tx: &mut Transaction<'_, MySql>,
    upload: &UploadHandle,
    report_date: Option<NaiveDate>,
    counts: Counts,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE upload_history
        SET status = ?, report_date = ?, total_rows = ?, inserted_rows = ?,
            updated_rows = ?, duplicate_rows = ?, skipped_rows = ?
        WHERE id = ?
        "#,
    )
    .bind(UploadStatus::Completed.as_ref())
    .bind(report_date)
    .bind(counts.total as i64)
    .bind(counts.inserted as i64)
    .bind(counts.updated as i64)
    .bind(counts.duplicates as i64)
    .bind(counts.skipped as i64)
    .bind(upload.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn load_employee_refs(pool: &MySqlPool) -> Result<Vec<EmployeeRef>, AppError> {
    let employees = sqlx::query_as::<_, EmployeeRef>(
        "SELECT id, employee_code, name FROM employees WHERE is_active = 1",
    )
    .fetch_all(pool)
    .await?;
    Ok(employees)
}

fn code_key(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Inserts or (with `overwrite`) replaces one record per employee and day.
#[instrument(skip(pool, rows, skipped_lines), fields(rows = rows.len()))]
pub async fn import_attendance(
    pool: &MySqlPool,
    upload: &UploadHandle,
    source: RecordSource,
    report_date: Option<NaiveDate>,
    rows: Vec<ImportRow>,
    skipped_lines: Vec<SkippedLine>,
    overwrite: bool,
) -> Result<ImportSummary, AppError> {
    let employees: HashMap<String, u64> = load_employee_refs(pool)
        .await?
        .into_iter()
        .map(|e| (code_key(&e.employee_code), e.id))
        .collect();

    let mut counts = Counts {
        total: rows.len() + skipped_lines.len(),
        skipped: skipped_lines.len(),
        ..Counts::default()
    };
    let mut unknown_codes: Vec<String> = Vec::new();

    let mut tx = pool.begin().await?;
    for row in &rows {
        let Some(&employee_id) = employees.get(&code_key(&row.employee_code)) else {
            counts.skipped += 1;
            if !unknown_codes.contains(&row.employee_code) {
                unknown_codes.push(row.employee_code.clone());
            }
            continue;
        };

        let existing: Option<u64> = sqlx::query_scalar(
            "SELECT id FROM attendance_records WHERE employee_id = ? AND date = ? FOR UPDATE",
        )
        .bind(employee_id)
        .bind(row.date)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some(_) if !overwrite => counts.duplicates += 1,
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE attendance_records
                    SET in_time = ?, out_time = ?, work_minutes = ?, status = ?, source = ?, upload_id = ?
                    WHERE id = ?
                    "#,
                )
                .bind(row.in_time)
                .bind(row.out_time)
                .bind(row.effective_minutes())
                .bind(row.status.as_ref())
                .bind(source.as_ref())
                .bind(upload.id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                counts.updated += 1;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO attendance_records
                        (employee_id, date, in_time, out_time, work_minutes, status, source, upload_id)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(employee_id)
                .bind(row.date)
                .bind(row.in_time)
                .bind(row.out_time)
                .bind(row.effective_minutes())
                .bind(row.status.as_ref())
                .bind(source.as_ref())
                .bind(upload.id)
                .execute(&mut *tx)
                .await?;
                counts.inserted += 1;
            }
        }
    }

    complete_upload(&mut tx, upload, report_date, counts).await?;
    tx.commit().await?;

    info!(
        upload_id = upload.id,
        inserted = counts.inserted,
        updated = counts.updated,
        duplicates = counts.duplicates,
        skipped = counts.skipped,
        "Attendance import finished"
    );

    Ok(ImportSummary {
        upload_id: upload.id,
        batch_id: upload.batch_id.clone(),
        report_date,
        total_rows: counts.total,
        inserted: counts.inserted,
        updated: counts.updated,
        duplicates: counts.duplicates,
        skipped: counts.skipped,
        unknown_codes,
        skipped_lines,
    })
}

/// A hand-made match survives later uploads of the same name and date.
fn is_manual(method: Option<&str>) -> bool {
    method == Some(MatchMethod::Manual.as_ref())
}

/// Upserts productivity rows on (employee_name, date). Rows matched by hand
/// keep their employee when a later file repeats them.
#[instrument(skip(pool, file, matcher), fields(rows = file.rows.len()))]
pub async fn import_flowace(
    pool: &MySqlPool,
    upload: &UploadHandle,
    file: FlowaceFile,
    matcher: &NameMatcher,
) -> Result<FlowaceImportSummary, AppError> {
    let mut counts = Counts {
        total: file.rows.len() + file.skipped.len() + file.duplicates,
        duplicates: file.duplicates,
        skipped: file.skipped.len(),
        ..Counts::default()
    };
    let mut matched = 0usize;
    let mut unmatched_names: Vec<String> = Vec::new();

    let mut tx = pool.begin().await?;
    for row in &file.rows {
        let found = matcher.match_name(&row.employee_name);
        let employee_id = found.map(|m| m.employee_id);
        let method = found.map(|m| m.method.to_string());

        let existing: Option<(u64, Option<String>)> = sqlx::query_as(
            "SELECT id, match_method FROM flowace_records WHERE employee_name = ? AND date = ? FOR UPDATE",
        )
        .bind(&row.employee_name)
        .bind(row.date)
        .fetch_optional(&mut *tx)
        .await?;

        let keep_manual = existing
            .as_ref()
            .is_some_and(|(_, previous)| is_manual(previous.as_deref()));
        if keep_manual || found.is_some() {
            matched += 1;
        } else {
            unmatched_names.push(row.employee_name.clone());
        }

        match existing {
            Some((id, _)) => {
                let mut sql = String::from(
                    "UPDATE flowace_records SET active_minutes = ?, idle_minutes = ?, productive_minutes = ?, \
                     unproductive_minutes = ?, productivity_percent = ?, upload_id = ?",
                );
                if !keep_manual {
                    sql.push_str(", employee_id = ?, match_method = ?");
                }
                sql.push_str(" WHERE id = ?");

                let mut query = sqlx::query(&sql)
                    .bind(row.active_minutes)
                    .bind(row.idle_minutes)
                    .bind(row.productive_minutes)
                    .bind(row.unproductive_minutes)
                    .bind(row.productivity_percent)
                    .bind(upload.id);
                if !keep_manual {
                    query = query.bind(employee_id).bind(method);
                }
                query.bind(id).execute(&mut *tx).await?;
                counts.updated += 1;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO flowace_records
                        (employee_id, employee_name, date, active_minutes, idle_minutes,
                         productive_minutes, unproductive_minutes, productivity_percent,
                         match_method, upload_id)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(employee_id)
                .bind(&row.employee_name)
                .bind(row.date)
                .bind(row.active_minutes)
                .bind(row.idle_minutes)
                .bind(row.productive_minutes)
                .bind(row.unproductive_minutes)
                .bind(row.productivity_percent)
                .bind(method)
                .bind(upload.id)
                .execute(&mut *tx)
                .await?;
                counts.inserted += 1;
            }
        }
    }

    let report_date = file.rows.iter().map(|r| r.date).max();
    complete_upload(&mut tx, upload, report_date, counts).await?;
    tx.commit().await?;

    info!(
        upload_id = upload.id,
        inserted = counts.inserted,
        updated = counts.updated,
        matched,
        unmatched = unmatched_names.len(),
        "Flowace import finished"
    );

    Ok(FlowaceImportSummary {
        upload_id: upload.id,
        batch_id: upload.batch_id.clone(),
        total_rows: counts.total,
        inserted: counts.inserted,
        updated: counts.updated,
        duplicates: counts.duplicates,
        skipped: counts.skipped,
        matched,
        unmatched: unmatched_names.len(),
        unmatched_names,
        skipped_lines: file.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_manual_matches_are_kept() {
        assert!(is_manual(Some("manual")));
        assert!(!is_manual(Some("exact")));
        assert!(!is_manual(None));
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn row(work: Option<i32>, in_time: Option<NaiveTime>, out_time: Option<NaiveTime>) -> ImportRow {
        ImportRow {
            line_no: 2,
            employee_code: "E1".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            in_time,
            out_time,
            work_minutes: work,
            status: AttendanceStatus::Present,
        }
    }

    #[test]
    fn stated_minutes_win() {
        assert_eq!(row(Some(300), Some(t(9, 0)), Some(t(18, 0))).effective_minutes(), 300);
    }

    #[test]
    fn minutes_fall_back_to_punches() {
        assert_eq!(row(None, Some(t(9, 0)), Some(t(17, 30))).effective_minutes(), 510);
        assert_eq!(row(None, Some(t(22, 0)), Some(t(6, 0))).effective_minutes(), 480);
        assert_eq!(row(None, Some(t(9, 0)), None).effective_minutes(), 0);
    }

    #[test]
    fn srp_rows_take_the_report_date() {
        let srp = SrpRow {
            line_no: 9,
            serial: 1,
            employee_code: "EMP001".to_string(),
            name: "Asha Rao".to_string(),
            shift: Some("GS".to_string()),
            in_time: Some(t(9, 5)),
            out_time: Some(t(18, 0)),
            work_minutes: Some(535),
            overtime_minutes: None,
            status: AttendanceStatus::Present,
        };
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let row = ImportRow::from_srp(srp, date);
        assert_eq!(row.date, date);
        assert_eq!(row.employee_code, "EMP001");
        assert_eq!(row.effective_minutes(), 535);
    }

    #[test]
    fn codes_compare_case_insensitively() {
        assert_eq!(code_key(" emp001 "), code_key("EMP001"));
    }
}
