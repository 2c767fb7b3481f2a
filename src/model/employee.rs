use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP001",
        "name": "Asha Rao",
        "email": "asha.rao@company.com",
        "department": "Operations",
        "designation": "Analyst",
        "phone": "+919800000000",
        "joined_on": "2024-01-01",
        "is_active": true,
        "created_at": "2024-01-01T09:00:00Z"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP001")]
    pub employee_code: String,

    #[schema(example = "Asha Rao")]
    pub name: String,

    #[schema(example = "asha.rao@company.com")]
    pub email: String,

    #[schema(example = "Operations")]
    pub department: String,

    #[schema(example = "Analyst")]
    pub designation: String,

    #[schema(example = "+919800000000", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "2024-01-01", value_type = Option<String>, format = "date")]
    pub joined_on: Option<NaiveDate>,

    pub is_active: bool,

    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// The slice of an employee the name matcher and importers need.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EmployeeRef {
    pub id: u64,
    pub employee_code: String,
    pub name: String,
}
