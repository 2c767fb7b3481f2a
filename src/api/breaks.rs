use crate::{
    api::response::{self, Pagination},
    api::{check_range, now_local, today},
    auth::auth::AuthUser,
    error::AppError,
    model::breaks::{Break, BreakType},
    utils::dashboard_cache,
    utils::db_utils::{Filters, fetch_page},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SELECT_BREAK: &str = "SELECT id, employee_id, date, break_type, started_at, ended_at, duration_minutes, created_at FROM breaks";

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartBreak {
    pub break_type: BreakType,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BreakQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Defaults to today
    #[param(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct BreakSummary {
    pub employee_id: u64,
    pub employee_name: String,
    pub break_count: i64,
    pub total_minutes: i64,
    /// Breaks not ended yet; at most one
    pub open_breaks: i64,
}

async fn open_break(pool: &MySqlPool, employee_id: u64) -> Result<Option<Break>, AppError> {
    let row = sqlx::query_as::<_, Break>(&format!(
        "{} WHERE employee_id = ? AND ended_at IS NULL ORDER BY started_at DESC LIMIT 1",
        SELECT_BREAK
    ))
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Start a break
#[utoipa::path(
    post,
    path = "/api/breaks/start",
    request_body = StartBreak,
    responses(
        (status = 201, description = "Break started", body = Break),
        (status = 400, description = "Not checked in today"),
        (status = 409, description = "A break is already running")
    ),
    security(("bearer_auth" = [])),
    tag = "Breaks"
)]
pub async fn start_break(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<StartBreak>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    let now = now_local();
    let mut tx = pool.begin().await?;

    let checked_in: Option<u64> = sqlx::query_scalar(
        r#"
        SELECT id FROM attendance
        WHERE employee_id = ? AND date = ? AND check_in IS NOT NULL AND check_out IS NULL
        FOR UPDATE
        "#,
    )
    .bind(employee_id)
    .bind(now.date())
    .fetch_optional(&mut *tx)
    .await?;
    if checked_in.is_none() {
        return Err(AppError::BadRequest(
            "Check in before starting a break".to_string(),
        ));
    }

    let running: Option<u64> =
        sqlx::query_scalar("SELECT id FROM breaks WHERE employee_id = ? AND ended_at IS NULL")
            .bind(employee_id)
            .fetch_optional(&mut *tx)
            .await?;
    if running.is_some() {
        return Err(AppError::Conflict("A break is already running".to_string()));
    }

    let result = sqlx::query(
        "INSERT INTO breaks (employee_id, date, break_type, started_at) VALUES (?, ?, ?, ?)",
    )
    .bind(employee_id)
    .bind(now.date())
    .bind(payload.break_type.as_ref())
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(employee_id, break_type = %payload.break_type, "Break started");
    dashboard_cache::invalidate().await;

    let row = sqlx::query_as::<_, Break>(&format!("{} WHERE id = ?", SELECT_BREAK))
        .bind(result.last_insert_id())
        .fetch_one(pool.get_ref())
        .await?;
    Ok(response::created(row, "Break started"))
}

/// End the running break
#[utoipa::path(
    post,
    path = "/api/breaks/end",
    responses(
        (status = 200, description = "Break ended", body = Break),
        (status = 400, description = "No break is running")
    ),
    security(("bearer_auth" = [])),
    tag = "Breaks"
)]
pub async fn end_break(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    let running = open_break(pool.get_ref(), employee_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("No break is running".to_string()))?;

    let now = now_local();
    let minutes = (now - running.started_at).num_minutes().max(0) as i32;

    sqlx::query(
        "UPDATE breaks SET ended_at = ?, duration_minutes = ? WHERE id = ? AND ended_at IS NULL",
    )
    .bind(now)
    .bind(minutes)
    .bind(running.id)
    .execute(pool.get_ref())
    .await?;

    info!(employee_id, minutes, "Break ended");
    dashboard_cache::invalidate().await;

    let row = sqlx::query_as::<_, Break>(&format!("{} WHERE id = ?", SELECT_BREAK))
        .bind(running.id)
        .fetch_one(pool.get_ref())
        .await?;
    Ok(response::ok_with_message(row, "Break ended"))
}

#[utoipa::path(
    get,
    path = "/api/breaks",
    params(BreakQuery),
    responses((status = 200, description = "Paginated breaks", body = [Break])),
    security(("bearer_auth" = [])),
    tag = "Breaks"
)]
pub async fn list_breaks(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BreakQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;
    check_range(query.from, query.to)?;

    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", employee_id)
        .push_opt("date = ?", query.date)
        .push_opt("date >= ?", query.from)
        .push_opt("date <= ?", query.to);

    let page = fetch_page::<Break>(
        pool.get_ref(),
        SELECT_BREAK,
        "SELECT COUNT(*) FROM breaks",
        &filters,
        "started_at DESC",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

/// Per-employee break totals for one day
#[utoipa::path(
    get,
    path = "/api/breaks/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Break totals per employee", body = [BreakSummary]),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Breaks"
)]
pub async fn break_summary(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let date = query.date.unwrap_or_else(today);

    let rows = sqlx::query_as::<_, BreakSummary>(
        r#"
        SELECT b.employee_id,
               e.name AS employee_name,
               COUNT(*) AS break_count,
               CAST(COALESCE(SUM(b.duration_minutes), 0) AS SIGNED) AS total_minutes,
               CAST(SUM(b.ended_at IS NULL) AS SIGNED) AS open_breaks
        FROM breaks b
        JOIN employees e ON e.id = b.employee_id
        WHERE b.date = ?
        GROUP BY b.employee_id, e.name
        ORDER BY total_minutes DESC
        "#,
    )
    .bind(date)
    .fetch_all(pool.get_ref())
    .await?;
    Ok(response::ok(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::bearer;
    use crate::config::Config;
    use crate::db::lazy_pool;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(lazy_pool()))
                    .app_data(Data::new(Config::for_tests()))
                    .route("/breaks/start", web::post().to(start_break))
                    .route("/breaks/summary", web::get().to(break_summary)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn unknown_break_type_is_rejected() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/breaks/start")
            .insert_header(bearer(Role::Employee, Some(2)))
            .set_json(serde_json::json!({"break_type": "nap"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn summary_is_staff_only() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/breaks/summary")
            .insert_header(bearer(Role::Employee, Some(2)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[core::prelude::v1::test]
    fn break_types_use_snake_case() {
        let parsed: StartBreak = serde_json::from_str(r#"{"break_type": "lunch"}"#).unwrap();
        assert_eq!(parsed.break_type, BreakType::Lunch);
    }
}
