use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileType {
    Srp,
    Csv,
    Flowace,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct UploadHistory {
    pub id: u64,
    #[schema(example = "1f0c9a3e-7d7c-4a43-9a8e-2f0c4c0b9a11")]
    pub batch_id: String,
    pub file_name: String,
    #[schema(example = "srp")]
    pub file_type: String,
    pub uploaded_by: Option<String>,
    #[schema(example = "completed")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub report_date: Option<NaiveDate>,
    pub total_rows: i32,
    pub inserted_rows: i32,
    pub updated_rows: i32,
    pub duplicate_rows: i32,
    pub skipped_rows: i32,
    pub error_message: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
