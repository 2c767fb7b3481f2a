use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BreakType {
    Lunch,
    Short,
    Personal,
    Other,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Break {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "lunch")]
    pub break_type: String,
    #[schema(value_type = String, example = "2026-01-05T13:00:00")]
    pub started_at: NaiveDateTime,
    #[schema(value_type = Option<String>, example = "2026-01-05T13:40:00")]
    pub ended_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<i32>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
