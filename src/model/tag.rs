use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A single unit of work is capped at one day.
pub const MAX_EXPECTED_MINUTES: i32 = 24 * 60;

/// A recurring task employees log counts against.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Tag {
    pub id: u64,
    #[schema(example = "Invoice review")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "finance")]
    pub category: Option<String>,
    /// Minutes one unit of this task is expected to take
    #[schema(example = 15)]
    pub expected_minutes: i32,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
