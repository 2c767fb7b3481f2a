use crate::{
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    error::AppError,
    model::upload::{FileType, UploadHistory, UploadStatus},
    utils::db_utils::{Filters, fetch_page},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::IntoParams;

const SELECT_UPLOAD: &str = r#"
    SELECT id, batch_id, file_name, file_type, uploaded_by, status, report_date,
           total_rows, inserted_rows, updated_rows, duplicate_rows, skipped_rows,
           error_message, created_at
    FROM upload_history"#;

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadHistoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub file_type: Option<FileType>,
    pub status: Option<UploadStatus>,
}

#[utoipa::path(
    get,
    path = "/api/uploads",
    params(UploadHistoryQuery),
    responses(
        (status = 200, description = "Paginated upload history", body = [UploadHistory]),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn list_uploads(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<UploadHistoryQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut filters = Filters::new();
    filters
        .push_opt("file_type = ?", query.file_type.map(|t| t.to_string()))
        .push_opt("status = ?", query.status.map(|s| s.to_string()));

    let page = fetch_page::<UploadHistory>(
        pool.get_ref(),
        SELECT_UPLOAD,
        "SELECT COUNT(*) FROM upload_history",
        &filters,
        "created_at DESC, id DESC",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/uploads/{id}",
    params(("id", Path, description = "Upload ID")),
    responses(
        (status = 200, description = "Upload", body = UploadHistory),
        (status = 404, description = "Upload not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn get_upload(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let upload = sqlx::query_as::<_, UploadHistory>(&format!("{} WHERE id = ?", SELECT_UPLOAD))
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or(AppError::NotFound("Upload"))?;
    Ok(response::ok(upload))
}
