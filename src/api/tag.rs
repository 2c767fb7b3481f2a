use crate::{
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    error::AppError,
    model::tag::{MAX_EXPECTED_MINUTES, Tag},
    utils::db_utils::{Filters, SqlUpdate, bind_query, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

const SELECT_TAG: &str =
    "SELECT id, name, description, category, expected_minutes, is_active, created_at FROM tags";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTag {
    #[schema(example = "Invoice review")]
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[schema(example = 15)]
    pub expected_minutes: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTag {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub expected_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TagQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

pub async fn find_tag(pool: &MySqlPool, id: u64) -> Result<Tag, AppError> {
    sqlx::query_as::<_, Tag>(&format!("{} WHERE id = ?", SELECT_TAG))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Tag"))
}

#[utoipa::path(
    post,
    path = "/api/tags",
    request_body = CreateTag,
    responses(
        (status = 201, description = "Tag created", body = Tag),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Tag name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Tags"
)]
pub async fn create_tag(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateTag>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut v = Validator::new();
    v.text("name", &payload.name, 128)
        .opt_max_len("description", payload.description.as_deref(), 512)
        .opt_max_len("category", payload.category.as_deref(), 64)
        .between(
            "expected_minutes",
            payload.expected_minutes as i64,
            0,
            MAX_EXPECTED_MINUTES as i64,
        );
    v.finish()?;

    let result = sqlx::query(
        "INSERT INTO tags (name, description, category, expected_minutes) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.name.trim())
    .bind(payload.description.as_deref())
    .bind(payload.category.as_deref())
    .bind(payload.expected_minutes)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, "Tag name already exists"))?;

    let tag = find_tag(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(tag, "Tag created"))
}

#[utoipa::path(
    get,
    path = "/api/tags",
    params(TagQuery),
    responses((status = 200, description = "Paginated tags", body = [Tag])),
    security(("bearer_auth" = [])),
    tag = "Tags"
)]
pub async fn list_tags(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<TagQuery>,
) -> Result<HttpResponse, AppError> {
    let mut filters = Filters::new();
    filters
        .push_search("(name LIKE ? OR description LIKE ?)", query.search.as_deref())
        .push_opt("category = ?", query.category.clone())
        .push_opt("is_active = ?", query.is_active);

    let page = fetch_page::<Tag>(
        pool.get_ref(),
        SELECT_TAG,
        "SELECT COUNT(*) FROM tags",
        &filters,
        "name",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/tags/{id}",
    params(("id", Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag", body = Tag),
        (status = 404, description = "Tag not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tags"
)]
pub async fn get_tag(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(find_tag(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/tags/{id}",
    params(("id", Path, description = "Tag ID")),
    request_body = UpdateTag,
    responses(
        (status = 200, description = "Tag updated", body = Tag),
        (status = 404, description = "Tag not found"),
        (status = 409, description = "Tag name already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Tags"
)]
pub async fn update_tag(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateTag>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let mut v = Validator::new();
    if let Some(name) = &payload.name {
        v.text("name", name, 128);
    }
    if let Some(minutes) = payload.expected_minutes {
        v.between("expected_minutes", minutes as i64, 0, MAX_EXPECTED_MINUTES as i64);
    }
    v.opt_max_len("description", payload.description.as_deref(), 512)
        .opt_max_len("category", payload.category.as_deref(), 64);
    v.finish()?;

    let payload = payload.into_inner();
    let mut update = SqlUpdate::new("tags");
    update
        .set_opt("name", payload.name.map(|n| n.trim().to_string()))
        .set_opt("description", payload.description)
        .set_opt("category", payload.category)
        .set_opt("expected_minutes", payload.expected_minutes)
        .set_opt("is_active", payload.is_active);
    let (sql, values) = update
        .build(id)
        .ok_or_else(|| AppError::BadRequest("Nothing to update".to_string()))?;

    find_tag(pool.get_ref(), id).await?;
    bind_query(sqlx::query(&sql), &values)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AppError::conflict_on_duplicate(e, "Tag name already exists"))?;

    let tag = find_tag(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(tag, "Tag updated"))
}

/// Deactivate a tag. Existing logs keep pointing at it.
#[utoipa::path(
    delete,
    path = "/api/tags/{id}",
    params(("id", Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag deactivated"),
        (status = 404, description = "Tag not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Tags"
)]
pub async fn delete_tag(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();
    find_tag(pool.get_ref(), id).await?;

    sqlx::query("UPDATE tags SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    Ok(response::message("Tag deactivated"))
}
