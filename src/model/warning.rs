use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Warning {
    pub id: u64,
    pub employee_id: u64,
    pub issued_by: Option<String>,
    pub reason: String,
    pub message: String,
    #[schema(example = "medium")]
    pub severity: String,
    pub is_active: bool,
    #[schema(value_type = Option<String>)]
    pub dismissed_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
