use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::{Query, QueryAs, QueryScalar};
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use crate::api::response::{Paginated, Pagination};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Null,
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I64(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

macro_rules! bind_all {
    ($query:expr, $values:expr) => {{
        let mut q = $query;
        for value in $values {
            q = match value.clone() {
                SqlValue::String(v) => q.bind(v),
                SqlValue::U64(v) => q.bind(v),
                SqlValue::I64(v) => q.bind(v),
                SqlValue::F64(v) => q.bind(v),
                SqlValue::Bool(v) => q.bind(v),
                SqlValue::Date(v) => q.bind(v),
                SqlValue::Time(v) => q.bind(v),
                SqlValue::DateTime(v) => q.bind(v),
                SqlValue::Null => q.bind(None::<String>),
            };
        }
        q
    }};
}

pub fn bind_query<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    values: &[SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    bind_all!(query, values)
}

pub fn bind_query_as<'q, O>(
    query: QueryAs<'q, MySql, O, MySqlArguments>,
    values: &[SqlValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    bind_all!(query, values)
}

pub fn bind_query_scalar<'q, O>(
    query: QueryScalar<'q, MySql, O, MySqlArguments>,
    values: &[SqlValue],
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
    bind_all!(query, values)
}

/// ===============================
/// WHERE clause builder
/// ===============================
#[derive(Debug, Default)]
pub struct Filters {
    clauses: Vec<String>,
    values: Vec<SqlValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// `clause` must contain exactly one `?` per value.
    pub fn push(&mut self, clause: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.values.push(value.into());
        self
    }

    pub fn push_many(&mut self, clause: &str, values: Vec<SqlValue>) -> &mut Self {
        self.clauses.push(clause.to_string());
        self.values.extend(values);
        self
    }

    /// A clause with no placeholders, e.g. `col IS NULL`.
    pub fn push_raw(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    pub fn push_opt<T: Into<SqlValue>>(&mut self, clause: &str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.push(clause, v);
        }
        self
    }

    /// Same `%term%` bound once per `?` in `clause`.
    pub fn push_search(&mut self, clause: &str, term: Option<&str>) -> &mut Self {
        if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
            let like = format!("%{}%", term);
            let n = clause.matches('?').count();
            self.push_many(clause, vec![SqlValue::String(like); n]);
        }
        self
    }

    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

/// Runs `select_sql` and `count_sql` with the same filters and returns one page.
///
/// `select_sql` and `count_sql` must end right before the WHERE clause;
/// `order_by` is appended verbatim.
pub async fn fetch_page<T>(
    pool: &MySqlPool,
    select_sql: &str,
    count_sql: &str,
    filters: &Filters,
    order_by: &str,
    pagination: Pagination,
) -> Result<Paginated<T>, sqlx::Error>
where
    T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let where_sql = filters.where_sql();

    let count_sql = format!("{}{}", count_sql, where_sql);
    let total = bind_query_scalar(sqlx::query_scalar::<_, i64>(&count_sql), filters.values())
        .fetch_one(pool)
        .await?;

    let data_sql = format!("{}{} ORDER BY {} LIMIT ? OFFSET ?", select_sql, where_sql, order_by);
    debug!(sql = %data_sql, values = ?filters.values(), page = pagination.page, "Fetching page");

    let rows = bind_query_as(sqlx::query_as::<_, T>(&data_sql), filters.values())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok(pagination.wrap(rows, total))
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    table: &'static str,
    assignments: Vec<String>,
    values: Vec<SqlValue>,
}

impl SqlUpdate {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        self.assignments.push(format!("{} = ?", column));
        self.values.push(value.into());
        self
    }

    /// Only sets the column when a value was provided.
    pub fn set_opt<T: Into<SqlValue>>(&mut self, column: &'static str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.set(column, v);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Builds `UPDATE table SET ... WHERE id = ?`; `None` when nothing changes.
    pub fn build(&self, id: u64) -> Option<(String, Vec<SqlValue>)> {
        if self.is_empty() {
            return None;
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            self.table,
            self.assignments.join(", ")
        );
        let mut values = self.values.clone();
        values.push(SqlValue::U64(id));
        Some((sql, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_render_where_clause() {
        let mut filters = Filters::new();
        assert_eq!(filters.where_sql(), "");

        filters
            .push("employee_id = ?", 7u64)
            .push_opt::<bool>("is_active = ?", None)
            .push_search("(name LIKE ? OR email LIKE ?)", Some(" ann "));

        assert_eq!(
            filters.where_sql(),
            " WHERE employee_id = ? AND (name LIKE ? OR email LIKE ?)"
        );
        assert_eq!(
            filters.values(),
            &[
                SqlValue::U64(7),
                SqlValue::String("%ann%".into()),
                SqlValue::String("%ann%".into()),
            ]
        );
    }

    #[test]
    fn raw_clauses_bind_nothing() {
        let mut filters = Filters::new();
        filters.push_raw("employee_id IS NULL").push("date >= ?", 3i64);
        assert_eq!(filters.where_sql(), " WHERE employee_id IS NULL AND date >= ?");
        assert_eq!(filters.values(), &[SqlValue::I64(3)]);
    }

    #[test]
    fn blank_search_is_ignored() {
        let mut filters = Filters::new();
        filters.push_search("name LIKE ?", Some("   "));
        assert!(filters.values().is_empty());
    }

    #[test]
    fn update_only_sets_provided_columns() {
        let mut update = SqlUpdate::new("employees");
        update
            .set_opt("name", Some("Asha"))
            .set_opt::<String>("email", None)
            .set("is_active", false);

        let (sql, values) = update.build(3).unwrap();
        assert_eq!(sql, "UPDATE employees SET name = ?, is_active = ? WHERE id = ?");
        assert_eq!(
            values,
            vec![SqlValue::String("Asha".into()), SqlValue::Bool(false), SqlValue::U64(3)]
        );
    }

    #[test]
    fn empty_update_builds_nothing() {
        assert!(SqlUpdate::new("tags").build(1).is_none());
    }
}
