use crate::{
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    error::AppError,
    model::assignment::Assignment,
    utils::db_utils::{Filters, fetch_page},
};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SELECT_ASSIGNMENT: &str = r#"
    SELECT a.id, a.employee_id, a.tag_id, t.name AS tag_name, t.expected_minutes,
           t.is_active AS tag_active, a.created_at
    FROM assignments a
    JOIN tags t ON t.id = a.tag_id"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTags {
    pub employee_id: u64,
    #[schema(example = json!([1, 2, 3]))]
    pub tag_ids: Vec<u64>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct AssignResult {
    pub assigned: Vec<u64>,
    /// Tags the employee already had
    pub already_assigned: Vec<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AssignmentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub tag_id: Option<u64>,
}

/// Assign tags to an employee
#[utoipa::path(
    post,
    path = "/api/assignments",
    request_body = AssignTags,
    responses(
        (status = 200, description = "Assignment result", body = AssignResult),
        (status = 400, description = "No tags given, or unknown/inactive tags"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Assignments"
)]
pub async fn assign_tags(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<AssignTags>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut tag_ids = payload.tag_ids.clone();
    tag_ids.sort_unstable();
    tag_ids.dedup();
    if tag_ids.is_empty() {
        return Err(AppError::field("tag_ids", "must not be empty"));
    }

    let mut tx = pool.begin().await?;
    let employee: Option<u64> = sqlx::query_scalar("SELECT id FROM employees WHERE id = ?")
        .bind(payload.employee_id)
        .fetch_optional(&mut *tx)
        .await?;
    if employee.is_none() {
        return Err(AppError::NotFound("Employee"));
    }

    let placeholders = vec!["?"; tag_ids.len()].join(", ");
    let sql = format!("SELECT id FROM tags WHERE is_active = 1 AND id IN ({})", placeholders);
    let mut known = sqlx::query_scalar::<_, u64>(&sql);
    for id in &tag_ids {
        known = known.bind(*id);
    }
    let known: Vec<u64> = known.fetch_all(&mut *tx).await?;
    let missing: Vec<String> = tag_ids
        .iter()
        .filter(|id| !known.contains(id))
        .map(|id| id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Unknown or inactive tags: {}",
            missing.join(", ")
        )));
    }

    // duplicates are the only rows IGNORE can skip now
    let mut result = AssignResult::default();
    for tag_id in tag_ids {
        let inserted = sqlx::query("INSERT IGNORE INTO assignments (employee_id, tag_id) VALUES (?, ?)")
            .bind(payload.employee_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        if inserted.rows_affected() == 0 {
            result.already_assigned.push(tag_id);
        } else {
            result.assigned.push(tag_id);
        }
    }
    tx.commit().await?;

    info!(
        employee_id = payload.employee_id,
        assigned = result.assigned.len(),
        "Tags assigned"
    );
    Ok(response::ok_with_message(result, "Tags assigned"))
}

#[utoipa::path(
    get,
    path = "/api/assignments",
    params(AssignmentQuery),
    responses((status = 200, description = "Paginated assignments", body = [Assignment])),
    security(("bearer_auth" = [])),
    tag = "Assignments"
)]
pub async fn list_assignments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssignmentQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;

    let mut filters = Filters::new();
    filters
        .push_opt("a.employee_id = ?", employee_id)
        .push_opt("a.tag_id = ?", query.tag_id);

    let page = fetch_page::<Assignment>(
        pool.get_ref(),
        SELECT_ASSIGNMENT,
        "SELECT COUNT(*) FROM assignments a JOIN tags t ON t.id = a.tag_id",
        &filters,
        "a.employee_id, t.name",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    delete,
    path = "/api/assignments/{id}",
    params(("id", Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment removed"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Assignments"
)]
pub async fn delete_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let result = sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(path.into_inner())
        .execute(pool.get_ref())
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Assignment"));
    }
    Ok(response::message("Assignment removed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::bearer;
    use crate::config::Config;
    use crate::db::lazy_pool;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};

    #[actix_web::test]
    async fn empty_tag_list_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(lazy_pool()))
                .app_data(Data::new(Config::for_tests()))
                .route("/assignments", web::post().to(assign_tags)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/assignments")
            .insert_header(bearer(Role::Hr, None))
            .set_json(serde_json::json!({"employee_id": 1, "tag_ids": []}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
