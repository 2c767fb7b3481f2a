use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordSource {
    Manual,
    Srp,
    Csv,
    Flowace,
}

/// Imported (or manually keyed) daily attendance.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:12:00")]
    pub in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:20:00")]
    pub out_time: Option<NaiveTime>,
    #[schema(example = 548)]
    pub work_minutes: i32,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = "srp")]
    pub source: String,
    pub flowace_minutes: Option<i32>,
    pub upload_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
