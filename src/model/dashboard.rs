use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::asset::AssetAssignment;
use crate::model::attendance::Attendance;
use crate::model::breaks::Break;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct StatusCount {
    #[schema(example = "available")]
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct LastUpload {
    pub id: u64,
    pub file_name: String,
    pub file_type: String,
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Organisation-wide counters for the admin dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_employees: i64,
    pub active_employees: i64,
    pub checked_in_today: i64,
    pub on_break: i64,
    pub open_issues: i64,
    pub active_warnings: i64,
    pub assets_by_status: Vec<StatusCount>,
    pub unmatched_flowace: i64,
    pub last_upload: Option<LastUpload>,
    #[schema(value_type = String, format = "date-time")]
    pub generated_at: DateTime<Utc>,
}

/// What an employee sees on their own landing page.
#[derive(Debug, Serialize, ToSchema)]
pub struct MyDashboard {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub attendance: Option<Attendance>,
    pub open_break: Option<Break>,
    pub active_warnings: i64,
    pub open_issues: i64,
    pub assets: Vec<AssetAssignment>,
}
