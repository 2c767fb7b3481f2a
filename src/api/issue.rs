use crate::{
    api::now_local,
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    error::AppError,
    model::issue::{Issue, IssueCategory, IssuePriority, IssueStatus},
    utils::dashboard_cache,
    utils::db_utils::{Filters, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

const SELECT_ISSUE: &str = r#"
    SELECT id, employee_id, title, description, category, priority, status,
           admin_response, resolved_at, created_at
    FROM issues"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIssue {
    /// Staff may raise an issue on someone's behalf
    pub employee_id: Option<u64>,
    #[schema(example = "Laptop fan is loud")]
    pub title: String,
    pub description: String,
    pub category: IssueCategory,
    pub priority: IssuePriority,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIssueStatus {
    pub status: IssueStatus,
    pub admin_response: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct IssueQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    pub category: Option<IssueCategory>,
}

async fn find_issue(pool: &MySqlPool, id: u64) -> Result<Issue, AppError> {
    sqlx::query_as::<_, Issue>(&format!("{} WHERE id = ?", SELECT_ISSUE))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Issue"))
}

#[utoipa::path(
    post,
    path = "/api/issues",
    request_body = CreateIssue,
    responses(
        (status = 201, description = "Issue raised", body = Issue),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Issues"
)]
pub async fn create_issue(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateIssue>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.target_employee(payload.employee_id)?;

    let mut v = Validator::new();
    v.text("title", &payload.title, 191)
        .text("description", &payload.description, 5000);
    v.finish()?;

    let result = sqlx::query(
        r#"
        INSERT INTO issues (employee_id, title, description, category, priority, status)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(payload.title.trim())
    .bind(payload.description.trim())
    .bind(payload.category.as_ref())
    .bind(payload.priority.as_ref())
    .bind(IssueStatus::Open.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::missing_reference(e, "Employee"))?;

    info!(employee_id, priority = %payload.priority, "Issue raised");
    dashboard_cache::invalidate().await;

    let issue = find_issue(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(issue, "Issue raised"))
}

#[utoipa::path(
    get,
    path = "/api/issues",
    params(IssueQuery),
    responses((status = 200, description = "Paginated issues", body = [Issue])),
    security(("bearer_auth" = [])),
    tag = "Issues"
)]
pub async fn list_issues(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<IssueQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;

    let mut filters = Filters::new();
    filters
        .push_opt("employee_id = ?", employee_id)
        .push_opt("status = ?", query.status.map(|s| s.to_string()))
        .push_opt("priority = ?", query.priority.map(|p| p.to_string()))
        .push_opt("category = ?", query.category.map(|c| c.to_string()));

    let page = fetch_page::<Issue>(
        pool.get_ref(),
        SELECT_ISSUE,
        "SELECT COUNT(*) FROM issues",
        &filters,
        "created_at DESC",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/issues/{id}",
    params(("id", Path, description = "Issue ID")),
    responses(
        (status = 200, description = "Issue", body = Issue),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Issues"
)]
pub async fn get_issue(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let issue = find_issue(pool.get_ref(), path.into_inner()).await?;
    auth.ensure_can_access(issue.employee_id)?;
    Ok(response::ok(issue))
}

/// Move an issue through its workflow
#[utoipa::path(
    put,
    path = "/api/issues/{id}/status",
    params(("id", Path, description = "Issue ID")),
    request_body = UpdateIssueStatus,
    responses(
        (status = 200, description = "Status changed", body = Issue),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "HR/Admin only"),
        (status = 404, description = "Issue not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Issues"
)]
pub async fn update_issue_status(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateIssueStatus>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let mut v = Validator::new();
    v.opt_max_len("admin_response", payload.admin_response.as_deref(), 5000);
    v.finish()?;

    let mut tx = pool.begin().await?;
    let stored: String = sqlx::query_scalar("SELECT status FROM issues WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Issue"))?;
    let current: IssueStatus = stored.parse().map_err(|_| {
        warn!(id, status = %stored, "Issue has an unknown status");
        AppError::Internal(anyhow::anyhow!("unknown issue status {}", stored))
    })?;

    let next = payload.status;
    if !current.can_transition_to(next) {
        return Err(AppError::BadRequest(format!(
            "Cannot move an issue from {} to {}",
            current, next
        )));
    }

    let resolved_at = next.is_closed().then(now_local);
    sqlx::query(
        r#"
        UPDATE issues
        SET status = ?, resolved_at = ?, admin_response = COALESCE(?, admin_response)
        WHERE id = ?
        "#,
    )
    .bind(next.as_ref())
    .bind(resolved_at)
    .bind(payload.admin_response.as_deref())
    .bind(id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(id, from = %current, to = %next, by = %auth.username, "Issue status changed");
    dashboard_cache::invalidate().await;

    let issue = find_issue(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(issue, "Issue status updated"))
}
