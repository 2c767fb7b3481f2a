use crate::{
    api::attendance_record::{finish_import, parse_or_fail, upload_file_name},
    api::check_range,
    api::employee::find_employee,
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::flowace::{FlowaceRecord, MatchMethod},
    model::upload::FileType,
    service::decode_text,
    service::flowace_csv::parse_flowace_csv,
    service::import::{self, FlowaceImportSummary},
    service::name_matcher::NameMatcher,
    service::reconcile::{self, ReconcileSummary, Thresholds},
    utils::dashboard_cache,
    utils::db_utils::{Filters, fetch_page},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};

const SELECT_FLOWACE: &str = r#"
    SELECT id, employee_id, employee_name, date, active_minutes, idle_minutes,
           productive_minutes, unproductive_minutes, productivity_percent,
           match_method, upload_id, created_at
    FROM flowace_records"#;

#[derive(Debug, Deserialize, IntoParams)]
pub struct FlowaceUploadQuery {
    /// Stored in the upload history
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct FlowaceQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    /// Only rows not tied to an employee
    pub unmatched: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ManualMatch {
    pub employee_id: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReconcileRequest {
    #[schema(value_type = String, format = "date", example = "2026-01-01")]
    pub from: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2026-01-31")]
    pub to: NaiveDate,
}

async fn find_flowace(pool: &MySqlPool, id: u64) -> Result<FlowaceRecord, AppError> {
    sqlx::query_as::<_, FlowaceRecord>(&format!("{} WHERE id = ?", SELECT_FLOWACE))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Flowace record"))
}

/// Upload a Flowace productivity export
#[utoipa::path(
    post,
    path = "/api/flowace/upload",
    params(FlowaceUploadQuery),
    request_body(content = String, content_type = "text/csv", description = "Flowace CSV export"),
    responses(
        (status = 200, description = "Import summary", body = FlowaceImportSummary),
        (status = 400, description = "The file could not be parsed"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Flowace"
)]
#[instrument(skip(pool, config, body, auth), fields(bytes = body.len(), user = %auth.username))]
pub async fn upload_flowace(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<FlowaceUploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let file_name = upload_file_name(query.file_name.as_deref(), "flowace.csv")?;

    let upload = import::begin_upload(pool, file_name, FileType::Flowace, &auth.username).await?;
    let parsed = decode_text(&body).and_then(parse_flowace_csv);
    let file = parse_or_fail(pool, &upload, parsed).await?;

    let employees = match import::load_employee_refs(pool).await {
        Ok(employees) => employees,
        Err(e) => return finish_import::<FlowaceImportSummary>(pool, &upload, Err(e)).await,
    };
    let matcher = NameMatcher::new(&employees, &config.flowace_aliases);

    let result = import::import_flowace(pool, &upload, file, &matcher).await;
    finish_import(pool, &upload, result).await
}

#[utoipa::path(
    get,
    path = "/api/flowace",
    params(FlowaceQuery),
    responses((status = 200, description = "Paginated Flowace rows", body = [FlowaceRecord])),
    security(("bearer_auth" = [])),
    tag = "Flowace"
)]
pub async fn list_flowace(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<FlowaceQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;
    check_range(query.from, query.to)?;

    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", employee_id)
        .push_opt("date >= ?", query.from)
        .push_opt("date <= ?", query.to);
    match query.unmatched {
        Some(true) => filters.push_raw("employee_id IS NULL"),
        Some(false) => filters.push_raw("employee_id IS NOT NULL"),
        None => &mut filters,
    };

    let page = fetch_page::<FlowaceRecord>(
        pool.get_ref(),
        SELECT_FLOWACE,
        "SELECT COUNT(*) FROM flowace_records",
        &filters,
        "date DESC, employee_name",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

/// Tie a Flowace row to an employee by hand. Later uploads keep this match.
#[utoipa::path(
    put,
    path = "/api/flowace/{id}/match",
    params(("id", Path, description = "Flowace record ID")),
    request_body = ManualMatch,
    responses(
        (status = 200, description = "Row matched", body = FlowaceRecord),
        (status = 404, description = "Row or employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Flowace"
)]
pub async fn match_flowace(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ManualMatch>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let record = find_flowace(pool.get_ref(), id).await?;
    let employee = find_employee(pool.get_ref(), payload.employee_id).await?;

    sqlx::query("UPDATE flowace_records SET employee_id = ?, match_method = ? WHERE id = ?")
        .bind(employee.id)
        .bind(MatchMethod::Manual.as_ref())
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(
        id,
        name = %record.employee_name,
        employee_id = employee.id,
        by = %auth.username,
        "Flowace row matched by hand"
    );
    dashboard_cache::invalidate().await;

    let record = find_flowace(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(record, "Flowace row matched"))
}

/// Fold Flowace activity into attendance records
#[utoipa::path(
    post,
    path = "/api/flowace/reconcile",
    request_body = ReconcileRequest,
    responses(
        (status = 200, description = "Reconciliation counts", body = ReconcileSummary),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Flowace"
)]
pub async fn reconcile_flowace(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<ReconcileRequest>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    check_range(Some(payload.from), Some(payload.to))?;

    let thresholds = Thresholds {
        full_day_minutes: config.full_day_minutes,
        half_day_minutes: config.half_day_minutes,
    };
    let summary = reconcile::reconcile_range(
        pool.get_ref(),
        payload.from,
        payload.to,
        &config.flowace_aliases,
        thresholds,
    )
    .await?;

    info!(
        from = %payload.from,
        to = %payload.to,
        rematched = summary.rematched,
        inserted = summary.inserted,
        updated = summary.updated,
        "Flowace reconciled"
    );
    dashboard_cache::invalidate().await;
    Ok(response::ok_with_message(summary, "Reconciliation completed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{bearer, json_body};
    use crate::db::lazy_pool;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(lazy_pool()))
                    .app_data(Data::new(Config::for_tests()))
                    .route("/flowace/upload", web::post().to(upload_flowace))
                    .route("/flowace/reconcile", web::post().to(reconcile_flowace)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn upload_is_staff_only() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/flowace/upload")
            .insert_header(bearer(Role::Employee, Some(1)))
            .set_payload("Employee,Date\nAsha,2026-01-02\n")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn reconcile_rejects_reversed_range() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/flowace/reconcile")
            .insert_header(bearer(Role::Admin, None))
            .set_json(serde_json::json!({"from": "2026-02-10", "to": "2026-02-01"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["details"][0]["field"], "to");
    }
}
