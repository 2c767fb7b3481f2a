//! Field checks collected into a single 400 response.
//!
//! ```ignore
//! let mut v = Validator::new();
//! v.not_blank("name", &payload.name).email("email", &payload.email);
//! v.finish()?;
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AppError, FieldError};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    pub fn not_blank(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, "must not be empty")
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        let ok = value.chars().count() <= max;
        self.check(ok, field, &format!("must be at most {} characters", max))
    }

    /// Runs `not_blank` and `max_len` together, which is what most text columns need.
    pub fn text(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        self.not_blank(field, value).max_len(field, value, max)
    }

    pub fn opt_max_len(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        match value {
            Some(v) => self.max_len(field, v, max),
            None => self,
        }
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            EMAIL_RE.is_match(value.trim()),
            field,
            "must be a valid email address",
        )
    }

    pub fn between(&mut self, field: &str, value: i64, min: i64, max: i64) -> &mut Self {
        self.check(
            (min..=max).contains(&value),
            field,
            &format!("must be between {} and {}", min, max),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failure() {
        let mut v = Validator::new();
        v.text("name", "  ", 10)
            .email("email", "not-an-email")
            .between("count", -1, 0, 10);

        match v.finish() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["name", "email", "count"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn passes_clean_input() {
        let mut v = Validator::new();
        v.text("name", "Asha Rao", 64)
            .email("email", "asha@example.com")
            .opt_max_len("phone", None, 5);
        assert!(v.is_valid());
        assert!(v.finish().is_ok());
    }

    #[test]
    fn between_is_inclusive() {
        let mut v = Validator::new();
        v.between("count", 0, 0, 10).between("count", 10, 0, 10);
        assert!(v.is_valid());
        v.between("count", 11, 0, 10);
        match v.finish() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].message, "must be between 0 and 10");
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn max_len_counts_characters() {
        let mut v = Validator::new();
        v.max_len("name", "ééé", 3);
        assert!(v.is_valid());
        v.max_len("name", "éééé", 3);
        assert!(!v.is_valid());
    }
}
