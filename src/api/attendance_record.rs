use crate::{
    api::response::{self, Pagination},
    api::{check_range, today},
    auth::auth::AuthUser,
    error::AppError,
    model::attendance::AttendanceStatus,
    model::attendance_record::{AttendanceRecord, RecordSource},
    model::upload::FileType,
    service::attendance_csv::parse_attendance_csv,
    service::import::{self, ImportRow, ImportSummary, effective_minutes},
    service::srp::parse_srp,
    service::timefmt::MAX_DAY_MINUTES,
    service::{ParseError, decode_text},
    utils::dashboard_cache,
    utils::db_utils::{Filters, SqlUpdate, bind_query, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::{instrument, warn};
use utoipa::{IntoParams, ToSchema};

const SELECT_RECORD: &str = "SELECT id, employee_id, date, in_time, out_time, work_minutes, status, source, flowace_minutes, upload_id, created_at FROM attendance_records";

#[derive(Debug, Deserialize, IntoParams)]
pub struct RecordQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>)]
    pub from: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub to: Option<NaiveDate>,
    pub status: Option<AttendanceStatus>,
    pub source: Option<RecordSource>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRecord {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:00:00")]
    pub in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:30:00")]
    pub out_time: Option<NaiveTime>,
    pub work_minutes: Option<i32>,
    pub status: AttendanceStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRecord {
    #[schema(value_type = Option<String>)]
    pub in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub out_time: Option<NaiveTime>,
    pub work_minutes: Option<i32>,
    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Stored in the upload history
    pub file_name: Option<String>,
    /// Report date when the file does not carry one
    #[param(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    /// Replace records that already exist for the same employee and day
    pub overwrite: Option<bool>,
}

async fn find_record(pool: &MySqlPool, id: u64) -> Result<AttendanceRecord, AppError> {
    sqlx::query_as::<_, AttendanceRecord>(&format!("{} WHERE id = ?", SELECT_RECORD))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Attendance record"))
}

#[utoipa::path(
    get,
    path = "/api/attendance/records",
    params(RecordQuery),
    responses((status = 200, description = "Paginated attendance records", body = [AttendanceRecord])),
    security(("bearer_auth" = [])),
    tag = "Attendance Records"
)]
pub async fn list_records(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RecordQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;
    check_range(query.from, query.to)?;

    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", employee_id)
        .push_opt("date >= ?", query.from)
        .push_opt("date <= ?", query.to)
        .push_opt("status = ?", query.status.map(|s| s.to_string()))
        .push_opt("source = ?", query.source.map(|s| s.to_string()));

    let page = fetch_page::<AttendanceRecord>(
        pool.get_ref(),
        SELECT_RECORD,
        "SELECT COUNT(*) FROM attendance_records",
        &filters,
        "date DESC, employee_id",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/attendance/records/{id}",
    params(("id", Path, description = "Record ID")),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceRecord),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance Records"
)]
pub async fn get_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let record = find_record(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_can_access(record.employee_id)?;
    Ok(response::ok(record))
}

#[utoipa::path(
    post,
    path = "/api/attendance/records",
    request_body = CreateRecord,
    responses(
        (status = 201, description = "Record created", body = AttendanceRecord),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "A record already exists for this employee and date")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance Records"
)]
pub async fn create_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateRecord>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut v = Validator::new();
    v.check(payload.date <= today(), "date", "must not be in the future");
    if let Some(minutes) = payload.work_minutes {
        v.between("work_minutes", minutes as i64, 0, MAX_DAY_MINUTES as i64);
    }
    v.finish()?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (employee_id, date, in_time, out_time, work_minutes, status, source)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_id)
    .bind(payload.date)
    .bind(payload.in_time)
    .bind(payload.out_time)
    .bind(effective_minutes(
        payload.work_minutes,
        payload.in_time,
        payload.out_time,
    ))
    .bind(payload.status.as_ref())
    .bind(RecordSource::Manual.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| match AppError::missing_reference(e, "Employee") {
        AppError::Database(e) => AppError::conflict_on_duplicate(
            e,
            "A record already exists for this employee and date",
        ),
        other => other,
    })?;

    let record = find_record(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(record, "Attendance record created"))
}

#[utoipa::path(
    put,
    path = "/api/attendance/records/{id}",
    params(("id", Path, description = "Record ID")),
    request_body = UpdateRecord,
    responses(
        (status = 200, description = "Record updated", body = AttendanceRecord),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance Records"
)]
pub async fn update_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateRecord>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let mut v = Validator::new();
    if let Some(minutes) = payload.work_minutes {
        v.between("work_minutes", minutes as i64, 0, MAX_DAY_MINUTES as i64);
    }
    v.finish()?;

    let mut update = SqlUpdate::new("attendance_records");
    update
        .set_opt("in_time", payload.in_time)
        .set_opt("out_time", payload.out_time)
        .set_opt("work_minutes", payload.work_minutes)
        .set_opt("status", payload.status.map(|s| s.to_string()));
    let (sql, values) = update
        .build(id)
        .ok_or_else(|| AppError::BadRequest("Nothing to update".to_string()))?;

    find_record(pool.get_ref(), id).await?;
    bind_query(sqlx::query(&sql), &values)
        .execute(pool.get_ref())
        .await?;

    let record = find_record(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(record, "Attendance record updated"))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/records/{id}",
    params(("id", Path, description = "Record ID")),
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance Records"
)]
pub async fn delete_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let result = sqlx::query("DELETE FROM attendance_records WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Attendance record"));
    }
    Ok(response::message("Attendance record deleted"))
}

/// The name stored in upload history; it has to fit `upload_history.file_name`.
pub(crate) fn upload_file_name<'a>(
    requested: Option<&'a str>,
    default: &'a str,
) -> Result<&'a str, AppError> {
    let name = requested.map(str::trim).unwrap_or(default);
    let mut v = Validator::new();
    v.text("file_name", name, 255);
    v.finish()?;
    Ok(name)
}

/// Parses the body, or records the upload as failed and returns 400.
pub(crate) async fn parse_or_fail<T>(
    pool: &MySqlPool,
    upload: &import::UploadHandle,
    parsed: Result<T, ParseError>,
) -> Result<T, AppError> {
    match parsed {
        Ok(v) => Ok(v),
        Err(e) => {
            warn!(upload_id = upload.id, error = %e, "Upload rejected");
            import::fail_upload(pool, upload, &e.to_string()).await;
            Err(e.into())
        }
    }
}

pub(crate) async fn finish_import<T: Serialize>(
    pool: &MySqlPool,
    upload: &import::UploadHandle,
    result: Result<T, AppError>,
) -> Result<HttpResponse, AppError> {
    match result {
        Ok(summary) => {
            dashboard_cache::invalidate().await;
            Ok(response::ok_with_message(summary, "Import completed"))
        }
        Err(e) => {
            import::fail_upload(pool, upload, &e.to_string()).await;
            Err(e)
        }
    }
}

/// Upload an SRP attendance report
#[utoipa::path(
    post,
    path = "/api/attendance/upload/srp",
    params(UploadQuery),
    request_body(content = String, content_type = "text/plain", description = "SRP report text"),
    responses(
        (status = 200, description = "Import summary", body = ImportSummary),
        (status = 400, description = "The file could not be parsed"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance Records"
)]
#[instrument(skip(pool, body, auth), fields(bytes = body.len(), user = %auth.username))]
pub async fn upload_srp(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let file_name = upload_file_name(query.file_name.as_deref(), "report.srp")?;

    let upload = import::begin_upload(pool, file_name, FileType::Srp, &auth.username).await?;
    let parsed = decode_text(&body).and_then(|text| parse_srp(text, query.date));
    let report = parse_or_fail(pool, &upload, parsed).await?;

    let date = report.report_date;
    let rows = report
        .rows
        .into_iter()
        .map(|r| ImportRow::from_srp(r, date))
        .collect();
    let result = import::import_attendance(
        pool,
        &upload,
        RecordSource::Srp,
        Some(date),
        rows,
        report.skipped,
        query.overwrite.unwrap_or(false),
    )
    .await;
    finish_import(pool, &upload, result).await
}

/// Upload an attendance CSV
#[utoipa::path(
    post,
    path = "/api/attendance/upload/csv",
    params(UploadQuery),
    request_body(content = String, content_type = "text/csv", description = "CSV with employee_code,date,in_time,out_time,status"),
    responses(
        (status = 200, description = "Import summary", body = ImportSummary),
        (status = 400, description = "The file could not be parsed"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance Records"
)]
#[instrument(skip(pool, body, auth), fields(bytes = body.len(), user = %auth.username))]
pub async fn upload_csv(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let pool = pool.get_ref();
    let file_name = upload_file_name(query.file_name.as_deref(), "attendance.csv")?;

    let upload = import::begin_upload(pool, file_name, FileType::Csv, &auth.username).await?;
    let parsed = decode_text(&body).and_then(parse_attendance_csv);
    let file = parse_or_fail(pool, &upload, parsed).await?;

    let report_date = file.rows.iter().map(|r| r.date).max();
    let rows = file.rows.into_iter().map(ImportRow::from).collect();
    let result = import::import_attendance(
        pool,
        &upload,
        RecordSource::Csv,
        report_date,
        rows,
        file.skipped,
        query.overwrite.unwrap_or(false),
    )
    .await;
    finish_import(pool, &upload, result).await
}
