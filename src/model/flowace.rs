use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// How a flowace row got tied to an employee.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchMethod {
    Alias,
    Exact,
    Compact,
    Substring,
    FirstName,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct FlowaceRecord {
    pub id: u64,
    pub employee_id: Option<u64>,
    #[schema(example = "Asha R")]
    pub employee_name: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub active_minutes: i32,
    pub idle_minutes: i32,
    pub productive_minutes: i32,
    pub unproductive_minutes: i32,
    pub productivity_percent: Option<f64>,
    pub match_method: Option<String>,
    pub upload_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
