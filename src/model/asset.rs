use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetStatus {
    Available,
    Assigned,
    Maintenance,
    Retired,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReturnCondition {
    Good,
    Fair,
    Damaged,
}

impl ReturnCondition {
    /// Where the asset goes after being handed back in this condition.
    pub fn next_status(self) -> AssetStatus {
        match self {
            ReturnCondition::Damaged => AssetStatus::Maintenance,
            ReturnCondition::Good | ReturnCondition::Fair => AssetStatus::Available,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Asset {
    pub id: u64,
    #[schema(example = "ThinkPad T14")]
    pub name: String,
    #[schema(example = "LAP-0042")]
    pub asset_tag: String,
    #[schema(example = "laptop")]
    pub category: String,
    pub serial_number: Option<String>,
    #[schema(example = "available")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub purchase_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AssetAssignment {
    pub id: u64,
    pub asset_id: u64,
    pub asset_name: String,
    pub asset_tag: String,
    pub employee_id: u64,
    pub employee_name: String,
    #[schema(value_type = String)]
    pub assigned_at: NaiveDateTime,
    #[schema(value_type = Option<String>)]
    pub returned_at: Option<NaiveDateTime>,
    pub condition_on_return: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damaged_returns_go_to_maintenance() {
        assert_eq!(ReturnCondition::Damaged.next_status(), AssetStatus::Maintenance);
        assert_eq!(ReturnCondition::Good.next_status(), AssetStatus::Available);
        assert_eq!(ReturnCondition::Fair.next_status(), AssetStatus::Available);
    }
}
