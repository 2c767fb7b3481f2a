use crate::{
    api::now_local,
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    error::AppError,
    model::asset::{Asset, AssetAssignment, AssetStatus, ReturnCondition},
    utils::dashboard_cache,
    utils::db_utils::{Filters, SqlUpdate, bind_query, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SELECT_ASSET: &str = r#"
    SELECT id, name, asset_tag, category, serial_number, status, purchase_date, notes, created_at
    FROM assets"#;

const SELECT_ASSET_ASSIGNMENT: &str = r#"
    SELECT aa.id, aa.asset_id, a.name AS asset_name, a.asset_tag, aa.employee_id,
           e.name AS employee_name, aa.assigned_at, aa.returned_at,
           aa.condition_on_return, aa.notes, aa.is_active
    FROM asset_assignments aa
    JOIN assets a ON a.id = aa.asset_id
    JOIN employees e ON e.id = aa.employee_id"#;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAsset {
    #[schema(example = "ThinkPad T14")]
    pub name: String,
    #[schema(example = "LAP-0042")]
    pub asset_tag: String,
    #[schema(example = "laptop")]
    pub category: String,
    pub serial_number: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAsset {
    pub name: Option<String>,
    pub asset_tag: Option<String>,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    /// `assigned` can only be reached through the assign endpoint
    pub status: Option<AssetStatus>,
    #[schema(value_type = Option<String>, format = "date")]
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignAsset {
    pub employee_id: u64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnAsset {
    pub condition: Option<ReturnCondition>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AssetQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches name, asset tag or serial number
    pub search: Option<String>,
    pub category: Option<String>,
    pub status: Option<AssetStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AssetAssignmentQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
    pub active: Option<bool>,
}

async fn find_asset(pool: &MySqlPool, id: u64) -> Result<Asset, AppError> {
    sqlx::query_as::<_, Asset>(&format!("{} WHERE id = ?", SELECT_ASSET))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Asset"))
}

async fn find_asset_assignment(pool: &MySqlPool, id: u64) -> Result<AssetAssignment, AppError> {
    sqlx::query_as::<_, AssetAssignment>(&format!("{} WHERE aa.id = ?", SELECT_ASSET_ASSIGNMENT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Asset assignment"))
}

/// Locks the asset row and returns its stored status.
/// Only an available asset with no open assignment can be handed out.
fn ensure_assignable(status: &str, active_assignment: Option<u64>) -> Result<(), AppError> {
    if status != AssetStatus::Available.as_ref() {
        return Err(AppError::Conflict(format!("Asset is {}", status)));
    }
    if active_assignment.is_some() {
        return Err(AppError::Conflict("Asset is already assigned".to_string()));
    }
    Ok(())
}

fn status_after_return(condition: Option<ReturnCondition>) -> AssetStatus {
    condition
        .map(ReturnCondition::next_status)
        .unwrap_or(AssetStatus::Available)
}

async fn lock_asset(tx: &mut Transaction<'_, MySql>, id: u64) -> Result<String, AppError> {
    sqlx::query_scalar::<_, String>("SELECT status FROM assets WHERE id = ? FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("Asset"))
}

async fn active_assignment(
    tx: &mut Transaction<'_, MySql>,
    asset_id: u64,
) -> Result<Option<u64>, AppError> {
    let id = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM asset_assignments WHERE asset_id = ? AND is_active = 1 FOR UPDATE",
    )
    .bind(asset_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(id)
}

#[utoipa::path(
    post,
    path = "/api/assets",
    request_body = CreateAsset,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Asset tag already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn create_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAsset>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut v = Validator::new();
    v.text("name", &payload.name, 128)
        .text("asset_tag", &payload.asset_tag, 64)
        .text("category", &payload.category, 64)
        .opt_max_len("serial_number", payload.serial_number.as_deref(), 128)
        .opt_max_len("notes", payload.notes.as_deref(), 512);
    v.finish()?;

    let result = sqlx::query(
        r#"
        INSERT INTO assets (name, asset_tag, category, serial_number, status, purchase_date, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.name.trim())
    .bind(payload.asset_tag.trim())
    .bind(payload.category.trim())
    .bind(payload.serial_number.as_deref())
    .bind(AssetStatus::Available.as_ref())
    .bind(payload.purchase_date)
    .bind(payload.notes.as_deref())
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, "Asset tag already exists"))?;

    info!(asset_tag = %payload.asset_tag, "Asset created");
    dashboard_cache::invalidate().await;

    let asset = find_asset(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(asset, "Asset created"))
}

#[utoipa::path(
    get,
    path = "/api/assets",
    params(AssetQuery),
    responses((status = 200, description = "Paginated assets", body = [Asset])),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn list_assets(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssetQuery>,
) -> Result<HttpResponse, AppError> {
    let mut filters = Filters::new();
    filters
        .push_search(
            "(name LIKE ? OR asset_tag LIKE ? OR serial_number LIKE ?)",
            query.search.as_deref(),
        )
        .push_opt("category = ?", query.category.clone())
        .push_opt("status = ?", query.status.map(|s| s.to_string()));

    let page = fetch_page::<Asset>(
        pool.get_ref(),
        SELECT_ASSET,
        "SELECT COUNT(*) FROM assets",
        &filters,
        "asset_tag",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/assets/{id}",
    params(("id", Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn get_asset(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(find_asset(pool.get_ref(), path.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/api/assets/{id}",
    params(("id", Path, description = "Asset ID")),
    request_body = UpdateAsset,
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 404, description = "Asset not found"),
        (status = 409, description = "Asset tag taken, or status change while assigned")
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn update_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAsset>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let mut v = Validator::new();
    if let Some(name) = &payload.name {
        v.text("name", name, 128);
    }
    if let Some(tag) = &payload.asset_tag {
        v.text("asset_tag", tag, 64);
    }
    if let Some(category) = &payload.category {
        v.text("category", category, 64);
    }
    v.opt_max_len("serial_number", payload.serial_number.as_deref(), 128)
        .opt_max_len("notes", payload.notes.as_deref(), 512)
        .check(
            payload.status != Some(AssetStatus::Assigned),
            "status",
            "use the assign endpoint",
        );
    v.finish()?;

    let payload = payload.into_inner();
    let mut update = SqlUpdate::new("assets");
    update
        .set_opt("name", payload.name.map(|s| s.trim().to_string()))
        .set_opt("asset_tag", payload.asset_tag.map(|s| s.trim().to_string()))
        .set_opt("category", payload.category.map(|s| s.trim().to_string()))
        .set_opt("serial_number", payload.serial_number)
        .set_opt("status", payload.status.map(|s| s.to_string()))
        .set_opt("purchase_date", payload.purchase_date)
        .set_opt("notes", payload.notes);
    let (sql, values) = update
        .build(id)
        .ok_or_else(|| AppError::BadRequest("Nothing to update".to_string()))?;

    let mut tx = pool.begin().await?;
    let current = lock_asset(&mut tx, id).await?;
    if payload.status.is_some() && current == AssetStatus::Assigned.as_ref() {
        return Err(AppError::Conflict(
            "Return the asset before changing its status".to_string(),
        ));
    }
    bind_query(sqlx::query(&sql), &values)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::conflict_on_duplicate(e, "Asset tag already exists"))?;
    tx.commit().await?;

    if payload.status.is_some() {
        dashboard_cache::invalidate().await;
    }
    let asset = find_asset(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(asset, "Asset updated"))
}

/// Retire an asset. Assigned assets must be returned first.
#[utoipa::path(
    delete,
    path = "/api/assets/{id}",
    params(("id", Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Asset retired"),
        (status = 404, description = "Asset not found"),
        (status = 409, description = "Asset is assigned")
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn delete_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await?;
    let status = lock_asset(&mut tx, id).await?;
    if status == AssetStatus::Assigned.as_ref() || active_assignment(&mut tx, id).await?.is_some() {
        return Err(AppError::Conflict(
            "Asset is assigned; return it first".to_string(),
        ));
    }
    sqlx::query("UPDATE assets SET status = ? WHERE id = ?")
        .bind(AssetStatus::Retired.as_ref())
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(id, "Asset retired");
    dashboard_cache::invalidate().await;
    Ok(response::message("Asset retired"))
}

/// Hand an available asset to an employee
#[utoipa::path(
    post,
    path = "/api/assets/{id}/assign",
    params(("id", Path, description = "Asset ID")),
    request_body = AssignAsset,
    responses(
        (status = 201, description = "Asset assigned", body = AssetAssignment),
        (status = 404, description = "Asset or employee not found"),
        (status = 409, description = "Asset is not available")
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn assign_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AssignAsset>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let asset_id = path.into_inner();

    let mut v = Validator::new();
    v.opt_max_len("notes", payload.notes.as_deref(), 512);
    v.finish()?;

    let mut tx = pool.begin().await?;
    let status = lock_asset(&mut tx, asset_id).await?;
    ensure_assignable(&status, active_assignment(&mut tx, asset_id).await?)?;

    let employee: Option<u64> =
        sqlx::query_scalar("SELECT id FROM employees WHERE id = ? AND is_active = 1")
            .bind(payload.employee_id)
            .fetch_optional(&mut *tx)
            .await?;
    if employee.is_none() {
        return Err(AppError::NotFound("Employee"));
    }

    let result = sqlx::query(
        "INSERT INTO asset_assignments (asset_id, employee_id, assigned_at, notes) VALUES (?, ?, ?, ?)",
    )
    .bind(asset_id)
    .bind(payload.employee_id)
    .bind(now_local())
    .bind(payload.notes.as_deref())
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, "Asset is already assigned"))?;

    sqlx::query("UPDATE assets SET status = ? WHERE id = ?")
        .bind(AssetStatus::Assigned.as_ref())
        .bind(asset_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(asset_id, employee_id = payload.employee_id, by = %auth.username, "Asset assigned");
    dashboard_cache::invalidate().await;

    let assignment = find_asset_assignment(pool.get_ref(), result.last_insert_id()).await?;
    Ok(response::created(assignment, "Asset assigned"))
}

/// Take an asset back. Damaged returns go to maintenance.
#[utoipa::path(
    post,
    path = "/api/assets/{id}/return",
    params(("id", Path, description = "Asset ID")),
    request_body = ReturnAsset,
    responses(
        (status = 200, description = "Asset returned", body = AssetAssignment),
        (status = 400, description = "Asset is not assigned"),
        (status = 404, description = "Asset not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn return_asset(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReturnAsset>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let asset_id = path.into_inner();

    let mut v = Validator::new();
    v.opt_max_len("notes", payload.notes.as_deref(), 512);
    v.finish()?;

    let mut tx = pool.begin().await?;
    lock_asset(&mut tx, asset_id).await?;
    let assignment_id = active_assignment(&mut tx, asset_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Asset is not assigned".to_string()))?;

    sqlx::query(
        r#"
        UPDATE asset_assignments
        SET is_active = 0, returned_at = ?, condition_on_return = ?, notes = COALESCE(?, notes)
        WHERE id = ?
        "#,
    )
    .bind(now_local())
    .bind(payload.condition.map(|c| c.to_string()))
    .bind(payload.notes.as_deref())
    .bind(assignment_id)
    .execute(&mut *tx)
    .await?;

    let next = status_after_return(payload.condition);
    sqlx::query("UPDATE assets SET status = ? WHERE id = ?")
        .bind(next.as_ref())
        .bind(asset_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(asset_id, status = %next, by = %auth.username, "Asset returned");
    dashboard_cache::invalidate().await;

    let assignment = find_asset_assignment(pool.get_ref(), assignment_id).await?;
    Ok(response::ok_with_message(assignment, "Asset returned"))
}

#[utoipa::path(
    get,
    path = "/api/assets/{id}/history",
    params(("id", Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Every assignment of the asset, newest first", body = [AssetAssignment]),
        (status = 404, description = "Asset not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn asset_history(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let asset_id = path.into_inner();
    find_asset(pool.get_ref(), asset_id).await?;

    let rows = sqlx::query_as::<_, AssetAssignment>(&format!(
        "{} WHERE aa.asset_id = ? ORDER BY aa.assigned_at DESC, aa.id DESC",
        SELECT_ASSET_ASSIGNMENT
    ))
    .bind(asset_id)
    .fetch_all(pool.get_ref())
    .await?;
    Ok(response::ok(rows))
}

#[utoipa::path(
    get,
    path = "/api/asset-assignments",
    params(AssetAssignmentQuery),
    responses((status = 200, description = "Paginated asset assignments", body = [AssetAssignment])),
    security(("bearer_auth" = [])),
    tag = "Assets"
)]
pub async fn list_asset_assignments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssetAssignmentQuery>,
) -> Result<HttpResponse, AppError> {
    let employee_id = auth.scope_employee(query.employee_id)?;

    let mut filters = Filters::new();
    filters
        .push_opt("aa.employee_id = ?", employee_id)
        .push_opt("aa.is_active = ?", query.active);

    let page = fetch_page::<AssetAssignment>(
        pool.get_ref(),
        SELECT_ASSET_ASSIGNMENT,
        r#"
        SELECT COUNT(*)
        FROM asset_assignments aa
        JOIN assets a ON a.id = aa.asset_id
        JOIN employees e ON e.id = aa.employee_id"#,
        &filters,
        "aa.assigned_at DESC",
        Pagination::new(query.page, query.per_page),
    )
    .await?;
    Ok(response::ok(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{bearer, json_body};
    use crate::config::Config;
    use crate::db::lazy_pool;
    use crate::db::testing::unique_violation;
    use crate::model::role::Role;
    use actix_web::{App, ResponseError, http::StatusCode, test, web::Data};

    #[core::prelude::v1::test]
    fn assigned_assets_cannot_be_assigned_again() {
        assert!(ensure_assignable("available", None).is_ok());

        let err = ensure_assignable("assigned", Some(3)).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Asset is assigned");

        let err = ensure_assignable("available", Some(3)).unwrap_err();
        assert_eq!(err.to_string(), "Asset is already assigned");
        assert!(ensure_assignable("retired", None).is_err());

        // a concurrent assignment loses on the one-active-assignment key
        let err = AppError::conflict_on_duplicate(unique_violation(), "Asset is already assigned");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[core::prelude::v1::test]
    fn returned_assets_become_available_unless_damaged() {
        assert_eq!(status_after_return(None), AssetStatus::Available);
        assert_eq!(status_after_return(Some(ReturnCondition::Good)), AssetStatus::Available);
        assert_eq!(status_after_return(Some(ReturnCondition::Fair)), AssetStatus::Available);
        assert_eq!(
            status_after_return(Some(ReturnCondition::Damaged)),
            AssetStatus::Maintenance
        );
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(lazy_pool()))
                    .app_data(Data::new(Config::for_tests()))
                    .route("/assets", web::post().to(create_asset))
                    .route("/assets/{id}", web::put().to(update_asset))
                    .route("/assets/{id}/assign", web::post().to(assign_asset)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn create_checks_required_fields() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/assets")
            .insert_header(bearer(Role::Admin, None))
            .set_json(serde_json::json!({"name": "Monitor", "asset_tag": "", "category": " "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = json_body(resp).await;
        assert_eq!(body["details"][0]["field"], "asset_tag");
        assert_eq!(body["details"][1]["field"], "category");
    }

    #[actix_web::test]
    async fn status_cannot_be_set_to_assigned_directly() {
        let app = app!();
        let req = test::TestRequest::put()
            .uri("/assets/3")
            .insert_header(bearer(Role::Hr, None))
            .set_json(serde_json::json!({"status": "assigned"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["details"][0]["field"], "status");
    }

    #[actix_web::test]
    async fn employees_cannot_assign_assets() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/assets/3/assign")
            .insert_header(bearer(Role::Employee, Some(5)))
            .set_json(serde_json::json!({"employee_id": 5}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
