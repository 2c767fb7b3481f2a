pub mod asset;
pub mod assignment;
pub mod attendance;
pub mod attendance_record;
pub mod breaks;
pub mod dashboard;
pub mod employee;
pub mod flowace;
pub mod issue;
pub mod response;
pub mod tag;
pub mod upload;
pub mod warning;
pub mod work_log;

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};

use crate::error::AppError;

/// Calendar date on the server's local clock.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Local wall-clock time truncated to whole seconds.
pub fn now_local() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Rejects a `from`/`to` pair that runs backwards.
pub fn check_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), AppError> {
    match (from, to) {
        (Some(f), Some(t)) if f > t => Err(AppError::field("to", "must not be before from")),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use actix_web::body::MessageBody;
    use actix_web::dev::ServiceResponse;

    use crate::auth::jwt::issue_test_token;
    use crate::model::role::Role;

    pub fn bearer(role: Role, employee_id: Option<u64>) -> (&'static str, String) {
        let token = issue_test_token("test-secret", role as u8, employee_id);
        ("Authorization", format!("Bearer {}", token))
    }

    pub async fn json_body<B: MessageBody>(resp: ServiceResponse<B>) -> serde_json::Value {
        let body = actix_web::test::read_body(resp).await;
        serde_json::from_slice(&body).expect("json body")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backwards_range_is_rejected() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert!(check_range(Some(a), Some(b)).is_ok());
        assert!(check_range(Some(a), None).is_ok());
        assert!(matches!(check_range(Some(b), Some(a)), Err(AppError::Validation(_))));
    }
}
