use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Rejected,
}

impl IssueStatus {
    pub fn can_transition_to(self, next: IssueStatus) -> bool {
        use IssueStatus::*;
        matches!(
            (self, next),
            (Open, InProgress | Resolved | Rejected)
                | (InProgress, Resolved | Rejected | Open)
                | (Resolved | Rejected, Open)
        )
    }

    pub fn is_closed(self) -> bool {
        matches!(self, IssueStatus::Resolved | IssueStatus::Rejected)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueCategory {
    Hardware,
    Software,
    Hr,
    Payroll,
    Attendance,
    Other,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Issue {
    pub id: u64,
    pub employee_id: u64,
    pub title: String,
    pub description: String,
    #[schema(example = "hardware")]
    pub category: String,
    #[schema(example = "high")]
    pub priority: String,
    #[schema(example = "open")]
    pub status: String,
    pub admin_response: Option<String>,
    #[schema(value_type = Option<String>)]
    pub resolved_at: Option<NaiveDateTime>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn transitions() {
        use IssueStatus::*;
        assert!(Open.can_transition_to(InProgress));
        assert!(Open.can_transition_to(Resolved));
        assert!(InProgress.can_transition_to(Open));
        assert!(Resolved.can_transition_to(Open));
        assert!(!Resolved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(InProgress));
        assert!(!Open.can_transition_to(Open));
    }

    #[test]
    fn stored_status_round_trips_through_strum() {
        assert_eq!(IssueStatus::InProgress.as_ref(), "in_progress");
        assert_eq!(IssueStatus::from_str("in_progress").unwrap(), IssueStatus::InProgress);
        assert!(IssueStatus::from_str("done").is_err());
    }
}
