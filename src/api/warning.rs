use crate::{
    api::now_local,
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    error::AppError,
    model::warning::{Warning, WarningSeverity},
    utils::dashboard_cache,
    utils::db_utils::{Filters, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SELECT_WARNING: &str = r#"
    SELECT id, employee_id, issued_by, reason, message, severity, is_active,
           dismissed_at, created_at
    FROM warnings"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateWarning {
    pub employee_id: u64,
    #[schema(example = "Late check-ins")]
    pub reason: String,
    pub message: String,
    pub severity: WarningSeverity,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct WarningQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    /// `true` for warnings not yet dismissed
    pub active: Option<bool>,
}

async fn find_warning(pool: &MySqlPool, id: u64) -> Result<Warning, AppError> {
    sqlx::query_as::<_, Warning>(&format!("{} WHERE id = ?", SELECT_WARNING))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Warning"))
}

#[utoipa::path(
    post,
    path = "/api/warnings",
    request_body = CreateWarning,
    responses(
        (status = 201, description = "Warning issued", body = Warning),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Warnings"
)]
pub async fn create_warning(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWarning>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut v = Validator::new();
    v.text("reason", &payload.reason, 191)
        .text("message", &payload.message, 5000);
    v.finish()?;

    let result = sqlx::query(
        "INSERT INTO warnings (employee_id, issued_by, reason, message, severity) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(payload.employee_id)
    .bind(&auth.username)
    .bind(payload.reason.trim())
    .bind(payload.message.trim())
    .bind(payload.severity.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::missing_reference(e, "Employee"))?;

    info!(
        employee_id = payload.employee_id,
        severity = %payload.severity,
        by = %auth.username,
        "Warning issued"
    );
    dashboard_cache::invalidate().await;

    let warning = find_warning(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(warning, "Warning issued"))
}

#[utoipa::path(
    get,
    path = "/api/warnings",
    params(WarningQuery),
    responses((status = 200, description = "Paginated warnings", body = [Warning])),
    security(("bearer_auth" = [])),
    tag = "Warnings"
)]
pub async fn list_warnings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WarningQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;

    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", employee_id)
        .push_opt("is_active = ?", query.active);

    let page = fetch_page::<Warning>(
        pool.get_ref(),
        SELECT_WARNING,
        "SELECT COUNT(*) FROM warnings",
        &filters,
        "created_at DESC",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/warnings/{id}",
    params(("id", Path, description = "Warning ID")),
    responses(
        (status = 200, description = "Warning", body = Warning),
        (status = 404, description = "Warning not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Warnings"
)]
pub async fn get_warning(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let warning = find_warning(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_can_access(warning.employee_id)?;
    Ok(response::ok(warning))
}

/// Dismissal flips the flag and keeps the row; only an active warning qualifies.
const DISMISS_SQL: &str =
    "UPDATE warnings SET is_active = 0, dismissed_at = ? WHERE id = ? AND is_active = 1";

fn dismissal(rows_affected: u64) -> Result<(), AppError> {
    if rows_affected == 0 {
        return Err(AppError::Conflict("Warning already dismissed".to_string()));
    }
    Ok(())
}

/// Dismiss (acknowledge) a warning. The row is kept.
#[utoipa::path(
    put,
    path = "/api/warnings/{id}/dismiss",
    params(("id", Path, description = "Warning ID")),
    responses(
        (status = 200, description = "Warning dismissed", body = Warning),
        (status = 404, description = "Warning not found"),
        (status = 409, description = "Already dismissed")
    ),
    security(("bearer_auth" = [])),
    tag = "Warnings"
)]
pub async fn dismiss_warning(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let warning = find_warning(pool.get_ref(), id).await?;
    auth.ensure_can_access(warning.employee_id)?;

    let result = sqlx::query(DISMISS_SQL)
        .bind(now_local())
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    dismissal(result.rows_affected())?;

    info!(id, by = %auth.username, "Warning dismissed");
    dashboard_cache::invalidate().await;

    let warning = find_warning(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(warning, "Warning dismissed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::bearer;
    use crate::config::Config;
    use crate::db::lazy_pool;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};

    #[core::prelude::v1::test]
    fn second_dismissal_is_a_conflict() {
        assert!(dismissal(1).is_ok());
        let err = dismissal(0).unwrap_err();
        assert_eq!(actix_web::ResponseError::status_code(&err), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Warning already dismissed");
    }

    #[core::prelude::v1::test]
    fn dismissal_keeps_the_row() {
        assert!(DISMISS_SQL.starts_with("UPDATE warnings SET is_active = 0"));
        assert!(DISMISS_SQL.ends_with("AND is_active = 1"));
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(lazy_pool()))
                    .app_data(Data::new(Config::for_tests()))
                    .route("/warnings", web::post().to(create_warning))
                    .route("/warnings", web::get().to(list_warnings)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn only_staff_issue_warnings() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/warnings")
            .insert_header(bearer(Role::Employee, Some(3)))
            .set_json(serde_json::json!({
                "employee_id": 4,
                "reason": "Late",
                "message": "Again",
                "severity": "low"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn employees_cannot_list_other_peoples_warnings() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/warnings?employee_id=9")
            .insert_header(bearer(Role::Employee, Some(3)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
