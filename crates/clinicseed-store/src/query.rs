use std::cmp::Ordering;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use clinicseed_core::Record;

/// A row predicate understood by every backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Column equals the value.
    Eq(String, Value),
    /// Text column equals the value ignoring ASCII case.
    EqIgnoreCase(String, String),
    /// Column is null or absent.
    IsNull(String),
    /// Column equals one of the values.
    In(String, Vec<Value>),
    /// Text column starts with the prefix, case-sensitive.
    StartsWith(String, String),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Self::Eq(column, _)
            | Self::EqIgnoreCase(column, _)
            | Self::IsNull(column)
            | Self::In(column, _)
            | Self::StartsWith(column, _) => column,
        }
    }

    /// Evaluate the predicate against an in-memory row.
    pub fn matches(&self, record: &Record) -> bool {
        let current = record.get(self.column());
        match self {
            Self::Eq(_, expected) => current.is_some_and(|value| values_equal(value, expected)),
            Self::EqIgnoreCase(_, expected) => current
                .and_then(Value::as_str)
                .is_some_and(|value| value.eq_ignore_ascii_case(expected)),
            Self::IsNull(_) => current.is_none_or(Value::is_null),
            Self::In(_, expected) => current.is_some_and(|value| {
                expected.iter().any(|candidate| values_equal(value, candidate))
            }),
            Self::StartsWith(_, prefix) => current
                .and_then(Value::as_str)
                .is_some_and(|value| value.starts_with(prefix.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Filtered, optionally ordered and limited row selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    /// Columns to return; empty means every column.
    pub columns: Vec<String>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.into(), value.into()))
    }

    pub fn is_in(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter(Filter::In(column.into(), values))
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|column| column.to_string()).collect();
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check every identifier the query mentions.
    pub fn validate(&self) -> StoreResult<()> {
        for filter in &self.filters {
            validate_identifier(filter.column())?;
        }
        for column in &self.columns {
            validate_identifier(column)?;
        }
        if let Some((column, _)) = &self.order {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

/// Accept `[a-z_][a-z0-9_]*` identifiers only.
///
/// Table and column names are interpolated into SQL and URLs, so anything
/// else is rejected before it reaches a backend.
pub fn validate_identifier(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_');
    let valid_rest = chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');

    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Escape `LIKE` metacharacters so `value` matches literally.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// JSON equality that treats `1` and `1.0` as the same number.
pub(crate) fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => left == right,
        },
        _ => left == right,
    }
}

/// Total order over JSON scalars used for in-memory sorting: nulls first,
/// then booleans, numbers, strings, and everything else by its text.
pub(crate) fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (left, right) {
        (Some(Value::Bool(left)), Some(Value::Bool(right))) => left.cmp(right),
        (Some(Value::Number(left)), Some(Value::Number(right))) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        (Some(left), Some(right)) if rank(Some(left)) == 4 && rank(Some(right)) == 4 => {
            left.to_string().cmp(&right.to_string())
        }
        _ => rank(left).cmp(&rank(right)),
    }
}
