use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Day status shared by self check-in rows and imported records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    Leave,
    WeeklyOff,
    Holiday,
    MissedPunch,
}

/// Self-service check-in/check-out row.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-01-05")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "09:30:00")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "18:05:00")]
    pub check_out: Option<NaiveTime>,
    #[schema(example = "present")]
    pub status: String,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl AttendanceStatus {
    /// Accepts stored names (`half_day`) and the short codes attendance
    /// exports use (`HD`, `WO`, `½P` ...).
    pub fn from_report_code(raw: &str) -> Option<Self> {
        let code = raw.trim().to_uppercase();
        let status = match code.as_str() {
            "P" | "PR" | "PRESENT" => AttendanceStatus::Present,
            "A" | "AB" | "ABSENT" => AttendanceStatus::Absent,
            "HD" | "H/D" | "½P" | "P/2" | "HALF_DAY" | "HALFDAY" => AttendanceStatus::HalfDay,
            "L" | "CL" | "SL" | "EL" | "LV" | "LEAVE" => AttendanceStatus::Leave,
            "WO" | "W/O" | "OFF" | "WEEKLY_OFF" => AttendanceStatus::WeeklyOff,
            "H" | "HO" | "HL" | "HOLIDAY" => AttendanceStatus::Holiday,
            "MIS" | "MP" | "SP" | "MISSED_PUNCH" => AttendanceStatus::MissedPunch,
            _ => return None,
        };
        Some(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_codes() {
        assert_eq!(AttendanceStatus::from_report_code("p"), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::from_report_code(" WO "), Some(AttendanceStatus::WeeklyOff));
        assert_eq!(AttendanceStatus::from_report_code("½P"), Some(AttendanceStatus::HalfDay));
        assert_eq!(AttendanceStatus::from_report_code("half_day"), Some(AttendanceStatus::HalfDay));
        assert_eq!(AttendanceStatus::from_report_code("CL"), Some(AttendanceStatus::Leave));
        assert_eq!(AttendanceStatus::from_report_code("XYZ"), None);
    }

    #[test]
    fn stored_form_is_snake_case() {
        assert_eq!(AttendanceStatus::MissedPunch.as_ref(), "missed_punch");
        assert_eq!(AttendanceStatus::WeeklyOff.to_string(), "weekly_off");
    }
}
