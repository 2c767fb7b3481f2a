pub mod attendance_csv;
pub mod flowace_csv;
pub mod import;
pub mod name_matcher;
pub mod reconcile;
pub mod srp;
pub mod timefmt;

use derive_more::Display;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Display, PartialEq, Eq)]
pub enum ParseError {
    #[display(fmt = "file is empty")]
    Empty,
    #[display(fmt = "file is not valid UTF-8 text")]
    Encoding,
    #[display(fmt = "missing required column '{}'", _0)]
    MissingColumn(&'static str),
    #[display(fmt = "could not find the report date; pass ?date=YYYY-MM-DD")]
    MissingDate,
    #[display(fmt = "no data rows found")]
    NoRows,
    #[display(fmt = "malformed file: {}", _0)]
    Malformed(String),
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// A row-shaped line the parser could not map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SkippedLine {
    pub line_no: usize,
    pub reason: String,
}

impl SkippedLine {
    pub fn new(line_no: usize, reason: impl Into<String>) -> Self {
        Self {
            line_no,
            reason: reason.into(),
        }
    }
}

/// Decodes an upload body, dropping a UTF-8 byte-order mark.
pub fn decode_text(bytes: &[u8]) -> Result<&str, ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(text)
}

/// Header cell reduced to lowercase alphanumerics, so `Emp. Code` == `emp_code`.
pub fn normalize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Index of the first header whose normalised form is one of `names`.
pub fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| names.contains(&h.as_str()))
}
