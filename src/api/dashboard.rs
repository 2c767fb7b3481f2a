use crate::{
    api::response,
    api::today,
    auth::auth::AuthUser,
    error::AppError,
    model::asset::AssetAssignment,
    model::attendance::Attendance,
    model::breaks::Break,
    model::dashboard::{DashboardSummary, LastUpload, MyDashboard, StatusCount},
    utils::dashboard_cache,
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use sqlx::MySqlPool;
use tracing::debug;

async fn count(pool: &MySqlPool, sql: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

async fn count_for(pool: &MySqlPool, sql: &str, id: u64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(sql).bind(id).fetch_one(pool).await
}

async fn build_summary(pool: &MySqlPool, date: NaiveDate) -> Result<DashboardSummary, sqlx::Error> {
    let checked_in = async {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM attendance WHERE date = ? AND check_in IS NOT NULL",
        )
        .bind(date)
        .fetch_one(pool)
        .await
    };
    let assets = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM assets GROUP BY status ORDER BY status",
    )
    .fetch_all(pool);
    let last_upload = sqlx::query_as::<_, LastUpload>(
        r#"
        SELECT id, file_name, file_type, status, created_at
        FROM upload_history
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool);

    let (
        total_employees,
        active_employees,
        checked_in_today,
        on_break,
        open_issues,
        active_warnings,
        assets_by_status,
        unmatched_flowace,
        last_upload,
    ) = futures::try_join!(
        count(pool, "SELECT COUNT(*) FROM employees"),
        count(pool, "SELECT COUNT(*) FROM employees WHERE is_active = 1"),
        checked_in,
        count(pool, "SELECT COUNT(*) FROM breaks WHERE ended_at IS NULL"),
        count(pool, "SELECT COUNT(*) FROM issues WHERE status IN ('open', 'in_progress')"),
        count(pool, "SELECT COUNT(*) FROM warnings WHERE is_active = 1"),
        assets,
        count(pool, "SELECT COUNT(*) FROM flowace_records WHERE employee_id IS NULL"),
        last_upload,
    )?;

    Ok(DashboardSummary {
        total_employees,
        active_employees,
        checked_in_today,
        on_break,
        open_issues,
        active_warnings,
        assets_by_status,
        unmatched_flowace,
        last_upload,
        generated_at: Utc::now(),
    })
}

/// Organisation-wide counters
#[utoipa::path(
    get,
    path = "/api/dashboard/summary",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardSummary),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn summary(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    if let Some(cached) = dashboard_cache::cached_summary().await {
        debug!("Dashboard summary served from cache");
        return Ok(response::ok(cached));
    }

    let summary = build_summary(pool.get_ref(), today()).await?;
    dashboard_cache::store_summary(summary.clone()).await;
    Ok(response::ok(summary))
}

/// The caller's own day at a glance
#[utoipa::path(
    get,
    path = "/api/dashboard/me",
    responses(
        (status = 200, description = "Personal dashboard", body = MyDashboard),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn my_dashboard(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    let pool = pool.get_ref();
    let date = today();

    let attendance = sqlx::query_as::<_, Attendance>(
        r#"
        SELECT id, employee_id, date, check_in, check_out, status, notes, created_at
        FROM attendance
        WHERE employee_id = ? AND date = ?
        "#,
    )
    .bind(employee_id)
    .bind(date)
    .fetch_optional(pool);
    let open_break = sqlx::query_as::<_, Break>(
        r#"
        SELECT id, employee_id, date, break_type, started_at, ended_at, duration_minutes, created_at
        FROM breaks
        WHERE employee_id = ? AND ended_at IS NULL
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .bind(employee_id)
    .fetch_optional(pool);
    let assets = sqlx::query_as::<_, AssetAssignment>(
        r#"
        SELECT aa.id, aa.asset_id, a.name AS asset_name, a.asset_tag, aa.employee_id,
               e.name AS employee_name, aa.assigned_at, aa.returned_at,
               aa.condition_on_return, aa.notes, aa.is_active
        FROM asset_assignments aa
        JOIN assets a ON a.id = aa.asset_id
        JOIN employees e ON e.id = aa.employee_id
        WHERE aa.employee_id = ? AND aa.is_active = 1
        ORDER BY aa.assigned_at DESC
        "#,
    )
    .bind(employee_id)
    .fetch_all(pool);

    let (attendance, open_break, active_warnings, open_issues, assets) = futures::try_join!(
        attendance,
        open_break,
        count_for(
            pool,
            "SELECT COUNT(*) FROM warnings WHERE employee_id = ? AND is_active = 1",
            employee_id
        ),
        count_for(
            pool,
            "SELECT COUNT(*) FROM issues WHERE employee_id = ? AND status IN ('open', 'in_progress')",
            employee_id
        ),
        assets,
    )?;

    Ok(response::ok(MyDashboard {
        employee_id,
        date,
        attendance,
        open_break,
        active_warnings,
        open_issues,
        assets,
    }))
}
