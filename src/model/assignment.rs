use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Tag assigned to an employee, joined with the tag's details.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Assignment {
    pub id: u64,
    pub employee_id: u64,
    pub tag_id: u64,
    pub tag_name: String,
    pub expected_minutes: i32,
    pub tag_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
