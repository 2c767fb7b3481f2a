//! Decides what Flowace activity does to a day's attendance record.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::MySqlPool;
use std::collections::HashMap;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::import::load_employee_refs;
use super::name_matcher::NameMatcher;
use crate::error::AppError;
use crate::model::attendance::AttendanceStatus;
use crate::model::attendance_record::RecordSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub full_day_minutes: i32,
    pub half_day_minutes: i32,
}

impl Thresholds {
    /// `None` when there is too little activity to count as a working day.
    pub fn status_for(&self, active_minutes: i32) -> Option<AttendanceStatus> {
        if active_minutes >= self.full_day_minutes {
            Some(AttendanceStatus::Present)
        } else if active_minutes >= self.half_day_minutes {
            Some(AttendanceStatus::HalfDay)
        } else {
            None
        }
    }
}

/// What is stored for the employee and date.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ExistingRecord {
    pub id: u64,
    pub status: String,
    pub source: String,
    pub flowace_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    Insert { status: AttendanceStatus },
    /// Store the minutes; `status` is only set for flowace-sourced records.
    Update { id: u64, status: Option<AttendanceStatus> },
    Skip,
}

pub fn plan(existing: Option<&ExistingRecord>, active_minutes: i32, thresholds: Thresholds) -> ReconcileAction {
    let Some(record) = existing else {
        return match thresholds.status_for(active_minutes) {
            Some(status) => ReconcileAction::Insert { status },
            None => ReconcileAction::Skip,
        };
    };

    let from_flowace = record.source == RecordSource::Flowace.as_ref();
    let status = if from_flowace {
        let wanted = thresholds
            .status_for(active_minutes)
            .unwrap_or(AttendanceStatus::Absent);
        (record.status != wanted.as_ref()).then_some(wanted)
    } else {
        None
    };

    if status.is_none() && record.flowace_minutes == Some(active_minutes) {
        return ReconcileAction::Skip;
    }
    ReconcileAction::Update { id: record.id, status }
}

/// One entry per (employee, date) holding the largest active time seen.
pub fn collapse_by_employee_day<I>(rows: I) -> Vec<(u64, NaiveDate, i32)>
where
    I: IntoIterator<Item = (u64, NaiveDate, i32)>,
{
    let mut best: HashMap<(u64, NaiveDate), i32> = HashMap::new();
    for (employee_id, date, minutes) in rows {
        best.entry((employee_id, date))
            .and_modify(|m| *m = (*m).max(minutes))
            .or_insert(minutes);
    }
    let mut out: Vec<_> = best.into_iter().map(|((e, d), m)| (e, d, m)).collect();
    out.sort_unstable();
    out
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct ReconcileSummary {
    /// Previously unmatched rows now tied to an employee
    pub rematched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Days with no attendance record and too little activity to create one
    pub below_threshold: usize,
}

/// Re-matches unmatched Flowace rows, then folds matched activity in
/// `[from, to]` into `attendance_records`. Runs in one transaction.
#[instrument(skip(pool, aliases))]
pub async fn reconcile_range(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
    aliases: &[(String, String)],
    thresholds: Thresholds,
) -> Result<ReconcileSummary, AppError> {
    let matcher = NameMatcher::new(&load_employee_refs(pool).await?, aliases);
    let mut summary = ReconcileSummary::default();
    let mut tx = pool.begin().await?;

    let unmatched: Vec<(u64, String)> = sqlx::query_as(
        "SELECT id, employee_name FROM flowace_records \
         WHERE employee_id IS NULL AND date BETWEEN ? AND ? FOR UPDATE",
    )
    .bind(from)
    .bind(to)
    .fetch_all(&mut *tx)
    .await?;

    for (id, name) in unmatched {
        if let Some(found) = matcher.match_name(&name) {
            sqlx::query("UPDATE flowace_records SET employee_id = ?, match_method = ? WHERE id = ?")
                .bind(found.employee_id)
                .bind(found.method.as_ref())
                .bind(id)
                .execute(&mut *tx)
                .await?;
            summary.rematched += 1;
        }
    }

    let activity: Vec<(u64, NaiveDate, i32)> = sqlx::query_as(
        "SELECT employee_id, date, active_minutes FROM flowace_records \
         WHERE employee_id IS NOT NULL AND date BETWEEN ? AND ?",
    )
    .bind(from)
    .bind(to)
    .fetch_all(&mut *tx)
    .await?;

    for (employee_id, date, active_minutes) in collapse_by_employee_day(activity) {
        let existing = sqlx::query_as::<_, ExistingRecord>(
            "SELECT id, status, source, flowace_minutes FROM attendance_records \
             WHERE employee_id = ? AND date = ? FOR UPDATE",
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;

        match plan(existing.as_ref(), active_minutes, thresholds) {
            ReconcileAction::Insert { status } => {
                sqlx::query(
                    r#"
                    INSERT INTO attendance_records
                        (employee_id, date, work_minutes, status, source, flowace_minutes)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(employee_id)
                .bind(date)
                .bind(active_minutes)
                .bind(status.as_ref())
                .bind(RecordSource::Flowace.as_ref())
                .bind(active_minutes)
                .execute(&mut *tx)
                .await?;
                summary.inserted += 1;
            }
            ReconcileAction::Update { id, status } => {
                sqlx::query(
                    "UPDATE attendance_records SET flowace_minutes = ?, status = COALESCE(?, status) WHERE id = ?",
                )
                .bind(active_minutes)
                .bind(status.map(|s| s.to_string()))
                .bind(id)
                .execute(&mut *tx)
                .await?;
                summary.updated += 1;
            }
            ReconcileAction::Skip if existing.is_some() => summary.unchanged += 1,
            ReconcileAction::Skip => summary.below_threshold += 1,
        }
    }

    tx.commit().await?;
    info!(
        rematched = summary.rematched,
        inserted = summary.inserted,
        updated = summary.updated,
        "Flowace reconciliation finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Thresholds = Thresholds {
        full_day_minutes: 360,
        half_day_minutes: 180,
    };

    fn record(status: &str, source: &str, minutes: Option<i32>) -> ExistingRecord {
        ExistingRecord {
            id: 9,
            status: status.to_string(),
            source: source.to_string(),
            flowace_minutes: minutes,
        }
    }

    #[test]
    fn thresholds() {
        assert_eq!(T.status_for(360), Some(AttendanceStatus::Present));
        assert_eq!(T.status_for(359), Some(AttendanceStatus::HalfDay));
        assert_eq!(T.status_for(180), Some(AttendanceStatus::HalfDay));
        assert_eq!(T.status_for(179), None);
    }

    #[test]
    fn missing_record_is_inserted_only_with_enough_activity() {
        assert_eq!(
            plan(None, 400, T),
            ReconcileAction::Insert {
                status: AttendanceStatus::Present
            }
        );
        assert_eq!(plan(None, 30, T), ReconcileAction::Skip);
    }

    #[test]
    fn imported_records_keep_their_status() {
        let absent = record("absent", "srp", None);
        assert_eq!(plan(Some(&absent), 500, T), ReconcileAction::Update { id: 9, status: None });

        let same = record("absent", "csv", Some(500));
        assert_eq!(plan(Some(&same), 500, T), ReconcileAction::Skip);
    }

    #[test]
    fn flowace_records_follow_activity() {
        let half = record("half_day", "flowace", Some(200));
        assert_eq!(
            plan(Some(&half), 420, T),
            ReconcileAction::Update {
                id: 9,
                status: Some(AttendanceStatus::Present)
            }
        );
        assert_eq!(
            plan(Some(&half), 60, T),
            ReconcileAction::Update {
                id: 9,
                status: Some(AttendanceStatus::Absent)
            }
        );
        assert_eq!(plan(Some(&half), 200, T), ReconcileAction::Skip);
    }

    #[test]
    fn collapse_keeps_the_longest_day() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let rows = vec![(2, d, 100), (1, d, 50), (2, d, 300), (2, d, 20)];
        assert_eq!(collapse_by_employee_day(rows), vec![(1, d, 50), (2, d, 300)]);
    }
}
