use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Upper bound on one day's count for a single tag.
pub const MAX_LOG_COUNT: i32 = 10_000;

/// `count * expected_minutes`, or `None` when it does not fit a minutes column.
pub fn total_minutes(count: i32, expected_minutes: i32) -> Option<i32> {
    count.checked_mul(expected_minutes).filter(|m| *m >= 0)
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkLog {
    pub id: u64,
    pub employee_id: u64,
    pub tag_id: u64,
    pub tag_name: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub count: i32,
    pub total_minutes: i32,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct WorkLogSummary {
    pub employee_id: u64,
    pub employee_name: String,
    pub days_logged: i64,
    pub total_count: i64,
    pub total_minutes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_minutes_multiplies_within_bounds() {
        assert_eq!(total_minutes(12, 15), Some(180));
        assert_eq!(total_minutes(0, 15), Some(0));
        assert_eq!(
            total_minutes(MAX_LOG_COUNT, crate::model::tag::MAX_EXPECTED_MINUTES),
            Some(14_400_000)
        );
    }

    #[test]
    fn total_minutes_refuses_overflow() {
        assert_eq!(total_minutes(100_000, 100_000), None);
        assert_eq!(total_minutes(i32::MAX, 2), None);
    }
}
