use crate::{
    api::response::{self, Pagination},
    auth::auth::AuthUser,
    error::AppError,
    model::employee::Employee,
    utils::dashboard_cache,
    utils::db_utils::{Filters, SqlUpdate, bind_query, fetch_page},
    utils::validation::Validator,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const SELECT_EMPLOYEE: &str = "SELECT id, employee_code, name, email, department, designation, phone, joined_on, is_active, created_at FROM employees";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "EMP001")]
    pub employee_code: String,
    #[schema(example = "Asha Rao")]
    pub name: String,
    #[schema(example = "asha.rao@company.com", format = "email")]
    pub email: String,
    #[schema(example = "Operations")]
    pub department: Option<String>,
    #[schema(example = "Analyst")]
    pub designation: Option<String>,
    pub phone: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub joined_on: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEmployee {
    pub employee_code: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub phone: Option<String>,
    #[schema(format = "date", value_type = Option<String>)]
    pub joined_on: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches name, code or email
    pub search: Option<String>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
}

fn validate_create(payload: &CreateEmployee) -> Result<(), AppError> {
    let mut v = Validator::new();
    v.text("employee_code", &payload.employee_code, 32)
        .text("name", &payload.name, 128)
        .email("email", &payload.email)
        .opt_max_len("department", payload.department.as_deref(), 64)
        .opt_max_len("designation", payload.designation.as_deref(), 64)
        .opt_max_len("phone", payload.phone.as_deref(), 32);
    v.finish()
}

fn validate_update(payload: &UpdateEmployee) -> Result<(), AppError> {
    let mut v = Validator::new();
    if let Some(code) = &payload.employee_code {
        v.text("employee_code", code, 32);
    }
    if let Some(name) = &payload.name {
        v.text("name", name, 128);
    }
    if let Some(email) = &payload.email {
        v.email("email", email);
    }
    v.opt_max_len("department", payload.department.as_deref(), 64)
        .opt_max_len("designation", payload.designation.as_deref(), 64)
        .opt_max_len("phone", payload.phone.as_deref(), 32);
    v.finish()
}

pub async fn find_employee(pool: &MySqlPool, id: u64) -> Result<Employee, AppError> {
    sqlx::query_as::<_, Employee>(&format!("{} WHERE id = ?", SELECT_EMPLOYEE))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Employee"))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "HR/Admin only"),
        (status = 409, description = "Employee code or email already exists")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    validate_create(&payload)?;

    let result = sqlx::query(
        r#"
        INSERT INTO employees (employee_code, name, email, department, designation, phone, joined_on)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_code.trim())
    .bind(payload.name.trim())
    .bind(payload.email.trim())
    .bind(payload.department.as_deref().unwrap_or("").trim())
    .bind(payload.designation.as_deref().unwrap_or("").trim())
    .bind(payload.phone.as_deref())
    .bind(payload.joined_on)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::conflict_on_duplicate(e, "Employee code or email already exists"))?;

    let id = result.last_insert_id();
    info!(employee_id = id, by = %auth.username, "Employee created");
    dashboard_cache::invalidate().await;

    let employee = find_employee(pool.get_ref(), id).await?;
    Ok(response::created(employee, "Employee created successfully"))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = [Employee]),
        (status = 403, description = "HR/Admin only")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;

    let mut filters = Filters::new();
    filters
        .push_search(
            "(name LIKE ? OR employee_code LIKE ? OR email LIKE ?)",
            query.search.as_deref(),
        )
        .push_opt("department = ?", query.department.clone())
        .push_opt("is_active = ?", query.is_active);

    let page = fetch_page::<Employee>(
        pool.get_ref(),
        SELECT_EMPLOYEE,
        "SELECT COUNT(*) FROM employees",
        &filters,
        "id DESC",
        Pagination::new(query.page, query.per_page),
    )
    .await?;

    Ok(response::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 403, description = "Employees may only read their own profile"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    auth.ensure_can_access(id)?;
    Ok(response::ok(find_employee(pool.get_ref(), id).await?))
}

/// Update Employee. Only the provided fields change.
#[utoipa::path(
    put,
    path = "/api/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Validation failed or nothing to update"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee code or email already exists")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateEmployee>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    validate_update(&payload)?;
    let id = path.into_inner();

    let payload = payload.into_inner();
    let mut update = SqlUpdate::new("employees");
    update
        .set_opt("employee_code", payload.employee_code.map(|s| s.trim().to_string()))
        .set_opt("name", payload.name.map(|s| s.trim().to_string()))
        .set_opt("email", payload.email.map(|s| s.trim().to_string()))
        .set_opt("department", payload.department)
        .set_opt("designation", payload.designation)
        .set_opt("phone", payload.phone)
        .set_opt("joined_on", payload.joined_on)
        .set_opt("is_active", payload.is_active);

    let (sql, values) = update
        .build(id)
        .ok_or_else(|| AppError::BadRequest("Nothing to update".to_string()))?;

    // existence first: MySQL reports 0 affected rows for unchanged values too
    let employee = find_employee(pool.get_ref(), id).await?;
    bind_query(sqlx::query(&sql), &values)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AppError::conflict_on_duplicate(e, "Employee code or email already exists"))?;

    if payload.is_active.is_some_and(|active| active != employee.is_active) {
        dashboard_cache::invalidate().await;
    }

    let employee = find_employee(pool.get_ref(), id).await?;
    Ok(response::ok_with_message(employee, "Employee updated successfully"))
}

/// Deactivate Employee. Records stay for history.
#[utoipa::path(
    delete,
    path = "/api/employees/{id}",
    params(("id", Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee deactivated"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_hr_or_admin()?;
    let id = path.into_inner();

    find_employee(pool.get_ref(), id).await?;
    sqlx::query("UPDATE employees SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    info!(employee_id = id, by = %auth.username, "Employee deactivated");
    dashboard_cache::invalidate().await;
    Ok(response::message("Employee deactivated"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{bearer, json_body};
    use crate::config::Config;
    use crate::db::lazy_pool;
    use crate::model::role::Role;
    use actix_web::{App, http::StatusCode, test, web::Data};

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(Data::new(lazy_pool()))
                    .app_data(Data::new(Config::for_tests()))
                    .route("/employees", web::post().to(create_employee))
                    .route("/employees/{id}", web::get().to(get_employee)),
            )
            .await
        };
    }

    fn valid_body() -> serde_json::Value {
        serde_json::json!({"employee_code": "EMP9", "name": "Test", "email": "t@example.com"})
    }

    #[actix_web::test]
    async fn create_requires_a_token() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/employees")
            .set_json(valid_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn employees_cannot_create_employees() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/employees")
            .insert_header(bearer(Role::Employee, Some(1)))
            .set_json(valid_body())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn create_reports_every_invalid_field() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/employees")
            .insert_header(bearer(Role::Hr, None))
            .set_json(serde_json::json!({"employee_code": " ", "name": "", "email": "nope"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body = json_body(resp).await;
        let fields: Vec<_> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, vec!["employee_code", "name", "email"]);
    }

    #[actix_web::test]
    async fn employees_only_see_themselves() {
        let app = app!();
        let req = test::TestRequest::get()
            .uri("/employees/8")
            .insert_header(bearer(Role::Employee, Some(7)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[core::prelude::v1::test]
    fn update_validation_only_checks_provided_fields() {
        let payload = UpdateEmployee {
            employee_code: None,
            name: None,
            email: Some("bad".to_string()),
            department: None,
            designation: None,
            phone: None,
            joined_on: None,
            is_active: None,
        };
        assert!(matches!(validate_update(&payload), Err(AppError::Validation(e)) if e.len() == 1));
    }
}
