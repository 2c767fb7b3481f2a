use crate::{
    api::response::{self, Pagination},
    api::{check_range, now_local, today},
    auth::auth::AuthUser,
    error::AppError,
    model::attendance::{Attendance, AttendanceStatus},
    utils::dashboard_cache,
    utils::db_utils::{Filters, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

const SELECT_ATTENDANCE: &str =
    "SELECT id, employee_id, date, check_in, check_out, status, notes, created_at FROM attendance";

#[derive(Debug, Deserialize, IntoParams)]
pub struct AttendanceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualAttendance {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:30:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:00:00")]
    pub check_out: Option<NaiveTime>,
    pub status: Option<AttendanceStatus>,
    pub notes: Option<String>,
}

/// One attendance row per employee and day; a second insert trips the unique key.
fn check_in_error(err: sqlx::Error) -> AppError {
    AppError::conflict_on_duplicate(err, "Already checked in today")
}

fn manual_entry_error(err: sqlx::Error) -> AppError {
    match AppError::missing_reference(err, "Employee") {
        AppError::Database(e) => AppError::conflict_on_duplicate(
            e,
            "Attendance already exists for this employee and date",
        ),
        other => other,
    }
}

async fn find_attendance(pool: &MySqlPool, id: u64) -> Result<Attendance, AppError> {
    sqlx::query_as::<_, Attendance>(&format!("{} WHERE id = ?", SELECT_ATTENDANCE))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Attendance"))
}

/// Check-in for today
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 201, description = "Checked in", body = Attendance),
        (status = 403, description = "No employee profile"),
        (status = 409, description = "Already checked in today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    let now = now_local();

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, status)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(now.date())
    .bind(now.time())
    .bind(AttendanceStatus::Present.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(check_in_error)?;

    tracing::info!(employee_id, "Checked in");
    dashboard_cache::invalidate().await;

    let row = find_attendance(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(row, "Checked in successfully"))
}

/// Check-out for today
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out", body = Attendance),
        (status = 400, description = "No open check-in today"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, pool: web::Data<MySqlPool>) -> Result<HttpResponse, AppError> {
    let employee_id = auth.own_employee_id()?;
    let now = now_local();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        r#"
        UPDATE attendance
        SET check_out = ?
        WHERE employee_id = ? AND date = ? AND check_in IS NOT NULL AND check_out IS NULL
        "#,
    )
    .bind(now.time())
    .bind(employee_id)
    .bind(now.date())
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::BadRequest(
            "No active check-in found for today".to_string(),
        ));
    }

    // an open break ends with the day
    sqlx::query(
        r#"
        UPDATE breaks
        SET ended_at = ?, duration_minutes = GREATEST(TIMESTAMPDIFF(MINUTE, started_at, ?), 0)
        WHERE employee_id = ? AND ended_at IS NULL
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(employee_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(employee_id, "Checked out");
    dashboard_cache::invalidate().await;

    let row = sqlx::query_as::<_, Attendance>(&format!(
        "{} WHERE employee_id = ? AND date = ?",
        SELECT_ATTENDANCE
    ))
    .bind(employee_id)
    .bind(now.date())
    .fetch_one(pool.get_ref())
    .await?;
    Ok(response::ok_with_message(row, "Checked out successfully"))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Paginated check-in rows", body = [Attendance]),
        (status = 403, description = "Employees may only list their own rows")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;
    check_range(query.from, query.to)?;

    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", employee_id)
        .push_opt("date >= ?", query.from)
        .push_opt("date <= ?", query.to);

    let page = fetch_page::<Attendance>(
        pool.get_ref(),
        SELECT_ATTENDANCE,
        "SELECT COUNT(*) FROM attendance",
        &filters,
        "date DESC, id DESC",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

/// Manual entry by HR/Admin
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = ManualAttendance,
    responses(
        (status = 201, description = "Attendance recorded", body = Attendance),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Attendance already exists for this employee and date")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ManualAttendance>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut v = Validator::new();
    v.check(payload.date <= today(), "date", "must not be in the future")
        .check(
            payload.check_out.is_none() || payload.check_in.is_some(),
            "check_out",
            "requires check_in",
        )
        .opt_max_len("notes", payload.notes.as_deref(), 255);
    v.finish()?;

    let status = payload.status.unwrap_or(if payload.check_in.is_some() {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Absent
    });

    let result = sqlx::query(
        r#"
        INSERT INTO attendance (employee_id, date, check_in, check_out, status, notes)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.date)
    .bind(payload.check_in)
    .bind(payload.check_out)
    .bind(status.as_ref())
    .bind(payload.notes.as_deref())
    .execute(pool.get_ref())
    .await
    .map_err(manual_entry_error)?;

    tracing::info!(
        employee_id = payload.employee_id,
        date = %payload.date,
        by = %auth.username,
        "Manual attendance recorded"
    );
    dashboard_cache::invalidate().await;

    let row = find_attendance(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(row, "Attendance recorded"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{bearer, json_body};
    use crate::config::Config;
    use crate::db::lazy_pool;
    use crate::db::testing::{foreign_key_violation, unique_violation};
    use crate::model::role::Role;
    use actix_web::ResponseError;
    use actix_web::{App, http::StatusCode, test, web::Data};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(lazy_pool()))
                    .app_data(Data::new(Config::for_tests()))
                    .route("/attendance", web::get().to(list_attendance))
                    .route("/attendance", web::post().to(create_attendance))
                    .route("/attendance/check-in", web::post().to(check_in)),
            )
            .await
        };
    }

    #[core::prelude::v1::test]
    fn second_check_in_for_the_day_is_a_conflict() {
        let err = check_in_error(unique_violation());
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Already checked in today");
    }

    #[core::prelude::v1::test]
    fn manual_entry_maps_constraint_failures() {
        let duplicate = manual_entry_error(unique_violation());
        assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            duplicate.to_string(),
            "Attendance already exists for this employee and date"
        );

        let unknown = manual_entry_error(foreign_key_violation());
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(unknown.to_string(), "Employee not found");

        let other = manual_entry_error(sqlx::Error::RowNotFound);
        assert_eq!(other.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn check_in_needs_an_employee_profile() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/attendance/check-in")
            .insert_header(bearer(Role::Admin, None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(resp).await["error"], "No employee profile");
    }

    #[actix_web::test]
    async fn employees_cannot_list_colleagues() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/attendance?employee_id=2")
            .insert_header(bearer(Role::Employee, Some(1)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn backwards_range_is_a_validation_error() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/attendance?from=2024-02-01&to=2024-01-01")
            .insert_header(bearer(Role::Hr, None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["details"][0]["field"], "to");
    }

    #[actix_web::test]
    async fn manual_entry_cannot_be_in_the_future() {
        let app = app!();
        let tomorrow = today().succ_opt().unwrap();
        let req = test::TestRequest::post()
            .uri("/attendance")
            .insert_header(bearer(Role::Hr, None))
            .set_json(serde_json::json!({"employee_id": 1, "date": tomorrow, "check_out": "18:00:00"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = json_body(resp).await;
        assert_eq!(body["details"][0]["field"], "date");
        assert_eq!(body["details"][1]["field"], "check_out");
    }
}
