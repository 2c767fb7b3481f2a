use crate::{
    api::response::{self, Pagination},
    api::{check_range, today},
    auth::auth::AuthUser,
    error::{AppError, FieldError},
    model::work_log::{MAX_LOG_COUNT, WorkLog, WorkLogSummary, total_minutes},
    utils::db_utils::{Filters, bind_query_as, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use std::collections::{HashMap, HashSet};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SELECT_LOG: &str = r#"
    SELECT l.id, l.employee_id, l.tag_id, t.name AS tag_name, l.date, l.count,
           l.total_minutes, l.notes, l.created_at
    FROM logs l
    JOIN tags t ON t.id = l.tag_id"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LogEntry {
    pub tag_id: u64,
    #[schema(example = 12)]
    pub count: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitLogs {
    /// Staff may submit for someone else; employees always submit for themselves
    pub employee_id: Option<u64>,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub date: NaiveDate,
    pub entries: Vec<LogEntry>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLog {
    pub count: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LogQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub tag_id: Option<u64>,
    #[param(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
}

fn validate_submission(payload: &SubmitLogs) -> Result<(), AppError> {
    let mut v = Validator::new();
    v.check(payload.date <= today(), "date", "must not be in the future")
        .check(!payload.entries.is_empty(), "entries", "must not be empty");

    let mut seen = HashSet::new();
    for (i, entry) in payload.entries.iter().enumerate() {
        v.between(
            &format!("entries[{}].count", i),
            entry.count as i64,
            0,
            MAX_LOG_COUNT as i64,
        )
        .opt_max_len(&format!("entries[{}].notes", i), entry.notes.as_deref(), 512)
            .check(
                seen.insert(entry.tag_id),
                &format!("entries[{}].tag_id", i),
                "is listed twice",
            );
    }
    v.finish()
}

/// Minutes for `count` units of a tag, as a 400 on `field` when it overflows.
fn checked_total(field: &str, count: i32, expected_minutes: i32) -> Result<i32, AppError> {
    total_minutes(count, expected_minutes)
        .ok_or_else(|| AppError::Validation(vec![FieldError::new(field, "is too large for this tag")]))
}

async fn find_log(pool: &MySqlPool, id: u64) -> Result<WorkLog, AppError> {
    sqlx::query_as::<_, WorkLog>(&format!("{} WHERE l.id = ?", SELECT_LOG))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Work log"))
}

/// Submit the day's counts. Re-submitting a tag for the same day replaces it.
#[utoipa::path(
    post,
    path = "/api/logs",
    request_body = SubmitLogs,
    responses(
        (status = 200, description = "Logs for the day after the submission", body = [WorkLog]),
        (status = 400, description = "Validation failed or a tag is not assigned"),
        (status = 403, description = "Employees may only log for themselves")
    ),
    security(("bearer_auth" = [])),
    tag = "Work Logs"
)]
pub async fn submit_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SubmitLogs>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.target_employee(payload.employee_id)?;
    validate_submission(&payload)?;

    let mut tx = pool.begin().await?;
    let assigned: HashMap<u64, (i32, bool)> = sqlx::query_as::<_, (u64, i32, bool)>(
        r#"
        SELECT t.id, t.expected_minutes, t.is_active
        FROM assignments a
        JOIN tags t ON t.id = a.tag_id
        WHERE a.employee_id = ?
        "#,
    )
    .bind(employee_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .map(|(id, minutes, active)| (id, (minutes, active)))
    .collect();

    let mut v = Validator::new();
    let mut totals = Vec::with_capacity(payload.entries.len());
    for (i, entry) in payload.entries.iter().enumerate() {
        let field = format!("entries[{}].tag_id", i);
        match assigned.get(&entry.tag_id) {
            None => {
                v.check(false, &field, "is not assigned to this employee");
            }
            Some((_, false)) => {
                v.check(false, &field, "is no longer active");
            }
            Some((minutes, true)) => {
                let total = total_minutes(entry.count, *minutes);
                v.check(
                    total.is_some(),
                    &format!("entries[{}].count", i),
                    "is too large for this tag",
                );
                totals.extend(total);
            }
        }
    }
    v.finish()?;

    for (entry, total) in payload.entries.iter().zip(totals) {
        sqlx::query(
            r#"
            INSERT INTO logs (employee_id, tag_id, date, count, total_minutes, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                count = VALUES(count),
                total_minutes = VALUES(total_minutes),
                notes = VALUES(notes)
            "#,
        )
        .bind(employee_id)
        .bind(entry.tag_id)
        .bind(payload.date)
        .bind(entry.count)
        .bind(total)
        .bind(entry.notes.as_deref())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(employee_id, date = %payload.date, entries = payload.entries.len(), "Work logs submitted");

    let rows = sqlx::query_as::<_, WorkLog>(&format!(
        "{} WHERE l.employee_id = ? AND l.date = ? ORDER BY t.name",
        SELECT_LOG
    ))
    .bind(employee_id)
    .bind(payload.date)
    .fetch_all(pool.get_ref())
    .await?;
    Ok(response::ok_with_message(rows, "Work logs saved"))
}

#[utoipa::path(
    get,
    path = "/api/logs",
    params(LogQuery),
    responses((status = 200, description = "Paginated work logs", body = [WorkLog])),
    security(("bearer_auth" = [])),
    tag = "Work Logs"
)]
pub async fn list_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LogQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;
    check_range(query.from, query.to)?;

    let mut filters = Filters::new();
    filters
        .push_opt("l.employee_id = ?", employee_id)
        .push_opt("l.tag_id = ?", query.tag_id)
        .push_opt("l.date >= ?", query.from)
        .push_opt("l.date <= ?", query.to);

    let page = fetch_page::<WorkLog>(
        pool.get_ref(),
        SELECT_LOG,
        "SELECT COUNT(*) FROM logs l JOIN tags t ON t.id = l.tag_id",
        &filters,
        "l.date DESC, t.name",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    put,
    path = "/api/logs/{id}",
    params(("id", Path, description = "Work log ID")),
    request_body = UpdateLog,
    responses(
        (status = 200, description = "Work log updated", body = WorkLog),
        (status = 404, description = "Work log not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Work Logs"
)]
pub async fn update_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLog>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let mut v = Validator::new();
    v.between("count", payload.count as i64, 0, MAX_LOG_COUNT as i64)
        .opt_max_len("notes", payload.notes.as_deref(), 512);
    v.finish()?;

    let log = find_log(pool.get_ref(), id).await?;
    auth.ensure_can_access(log.employee_id)?;

    let expected_minutes: i32 = sqlx::query_scalar("SELECT expected_minutes FROM tags WHERE id = ?")
        .bind(log.tag_id)
        .fetch_one(pool.get_ref())
        .await?;
    let total = checked_total("count", payload.count, expected_minutes)?;

    sqlx::query(
        "UPDATE logs SET count = ?, total_minutes = ?, notes = COALESCE(?, notes) WHERE id = ?",
    )
    .bind(payload.count)
    .bind(total)
    .bind(payload.notes.as_deref())
    .bind(id)
    .execute(pool.get_ref())
    .await?;

    let log = find_log(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(log, "Work log updated"))
}

#[utoipa::path(
    delete,
    path = "/api/logs/{id}",
    params(("id", Path, description = "Work log ID")),
    responses(
        (status = 200, description = "Work log deleted"),
        (status = 404, description = "Work log not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Work Logs"
)]
pub async fn delete_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let log = find_log(pool.get_ref(), id).await?;
    auth.ensure_can_access(log.employee_id)?;

    sqlx::query("DELETE FROM logs WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    Ok(response::message("Work log deleted"))
}

/// Totals per employee over a date range
#[utoipa::path(
    get,
    path = "/api/logs/summary",
    params(SummaryQuery),
    responses((status = 200, description = "Per-employee totals", body = [WorkLogSummary])),
    security(("bearer_auth" = [])),
    tag = "Work Logs"
)]
pub async fn log_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;
    check_range(query.from, query.to)?;

    let mut filters = Filters::new();
    filters
        .push_opt("l.employee_id = ?", employee_id)
        .push_opt("l.date >= ?", query.from)
        .push_opt("l.date <= ?", query.to);

    let sql = format!(
        r#"
        SELECT l.employee_id,
               e.name AS employee_name,
               COUNT(DISTINCT l.date) AS days_logged,
               CAST(COALESCE(SUM(l.count), 0) AS SIGNED) AS total_count,
               CAST(COALESCE(SUM(l.total_minutes), 0) AS SIGNED) AS total_minutes
        FROM logs l
        JOIN employees e ON e.id = l.employee_id
        {}
        GROUP BY l.employee_id, e.name
        ORDER BY total_minutes DESC
        "#,
        filters.where_sql()
    );
    let rows = bind_query_as(sqlx::query_as::<_, WorkLogSummary>(&sql), filters.values())
        .fetch_all(pool.get_ref())
        .await?;
    Ok(response::ok(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(date: NaiveDate, entries: Vec<(u64, i32)>) -> SubmitLogs {
        SubmitLogs {
            employee_id: None,
            date,
            entries: entries
                .into_iter()
                .map(|(tag_id, count)| LogEntry {
                    tag_id,
                    count,
                    notes: None,
                })
                .collect(),
        }
    }

    fn failed_fields(result: Result<(), AppError>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_a_normal_day() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert!(validate_submission(&submission(date, vec![(1, 3), (2, 0)])).is_ok());
    }

    #[test]
    fn rejects_future_dates_and_empty_submissions() {
        let tomorrow = today().succ_opt().unwrap();
        assert_eq!(
            failed_fields(validate_submission(&submission(tomorrow, vec![]))),
            vec!["date", "entries"]
        );
    }

    #[test]
    fn rejects_counts_beyond_the_daily_cap() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(
            failed_fields(validate_submission(&submission(date, vec![(1, 100_000)]))),
            vec!["entries[0].count"]
        );
        assert!(validate_submission(&submission(date, vec![(1, MAX_LOG_COUNT)])).is_ok());
    }

    #[test]
    fn overflowing_totals_are_a_validation_error() {
        assert_eq!(checked_total("count", 12, 15).unwrap(), 180);
        match checked_total("count", 100_000, 100_000) {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors, vec![FieldError::new("count", "is too large for this tag")]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn update_rejects_a_count_beyond_the_cap() {
        use crate::api::testing::{bearer, json_body};
        use crate::db::lazy_pool;
        use crate::model::role::Role;
        use actix_web::{App, http::StatusCode, test, web::Data};

        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .app_data(Data::new(crate::config::Config::for_tests()))
                .route("/logs/{id}", web::put().to(update_log)),
        )
        .await;
        let req = test::TestRequest::put()
            .uri("/logs/4")
            .insert_header(bearer(Role::Admin, None))
            .set_json(serde_json::json!({"count": 100_000}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["details"][0]["field"], "count");
    }

    #[test]
    fn rejects_negative_counts_and_repeated_tags() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert_eq!(
            failed_fields(validate_submission(&submission(date, vec![(1, -2), (1, 4)]))),
            vec!["entries[0].count", "entries[1].tag_id"]
        );
    }
}
