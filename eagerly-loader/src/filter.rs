//! Filter expressions applied to batched fetches.
//!
//! Constraints narrow a node's fetch by adding filters to its
//! [`FetchQuery`](crate::fetch::FetchQuery). A [`Filter`] can be rendered to a
//! SQL fragment for database-backed fetchers, or evaluated directly against an
//! entity by in-memory ones.
//!
//! ```rust
//! use eagerly_loader::{Filter, Value};
//!
//! let filter = Filter::and([
//!     Filter::Equals("published".into(), Value::Bool(true)),
//!     Filter::Gt("score".into(), Value::Int(10)),
//! ]);
//! let (sql, params) = filter.to_sql(0);
//! assert_eq!(sql, "(published = $1 AND score > $2)");
//! assert_eq!(params.len(), 2);
//! ```

use std::cmp::Ordering;

use crate::entity::Entity;
use crate::value::Value;

/// A complete filter over entity attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, Value),
    /// Not equals comparison.
    NotEquals(String, Value),

    /// Less than comparison.
    Lt(String, Value),
    /// Less than or equal comparison.
    Lte(String, Value),
    /// Greater than comparison.
    Gt(String, Value),
    /// Greater than or equal comparison.
    Gte(String, Value),

    /// In a list of values.
    In(String, Vec<Value>),
    /// Not in a list of values.
    NotIn(String, Vec<Value>),

    /// Contains (LIKE %value%).
    Contains(String, Value),
    /// Starts with (LIKE value%).
    StartsWith(String, Value),
    /// Ends with (LIKE %value).
    EndsWith(String, Value),

    /// Is null check.
    IsNull(String),
    /// Is not null check.
    IsNotNull(String),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Create an equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals(field.into(), value.into())
    }

    /// Create an AND filter, dropping empty operands.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.into_iter().next().unwrap_or_default(),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter, dropping empty operands.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.into_iter().next().unwrap_or_default(),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        match self {
            Self::And(mut filters) if !other.is_none() => {
                filters.push(other);
                Self::And(filters)
            }
            this => Self::and([this, other]),
        }
    }

    /// Evaluate the filter against an entity's attributes.
    ///
    /// Evaluation follows `to_sql`: missing attributes behave as `Null`, any
    /// comparison or list test involving `Null` is `false`, and equality
    /// matches keys loosely, so `"1"` equals `1`. Comparisons between values
    /// that have no ordering evaluate to `false`.
    pub fn matches(&self, entity: &dyn Entity) -> bool {
        let attr = |field: &str| entity.attribute(field).unwrap_or(Value::Null);
        match self {
            Self::None => true,
            Self::Equals(field, value) => loose_eq(&attr(field), value) == Some(true),
            Self::NotEquals(field, value) => loose_eq(&attr(field), value) == Some(false),
            Self::Lt(field, value) => ordering(&attr(field), value) == Some(Ordering::Less),
            Self::Lte(field, value) => matches!(
                ordering(&attr(field), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Self::Gt(field, value) => ordering(&attr(field), value) == Some(Ordering::Greater),
            Self::Gte(field, value) => matches!(
                ordering(&attr(field), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::In(field, values) => key_in(&attr(field), values) == Some(true),
            Self::NotIn(field, values) => key_in(&attr(field), values) == Some(false),
            Self::Contains(field, value) => str_op(&attr(field), value, |a, b| a.contains(b)),
            Self::StartsWith(field, value) => str_op(&attr(field), value, |a, b| a.starts_with(b)),
            Self::EndsWith(field, value) => str_op(&attr(field), value, |a, b| a.ends_with(b)),
            Self::IsNull(field) => attr(field).is_null(),
            Self::IsNotNull(field) => !attr(field).is_null(),
            Self::And(filters) => filters.iter().all(|f| f.matches(entity)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entity)),
            Self::Not(filter) => !filter.matches(entity),
        }
    }

    /// Render the filter as a SQL fragment with `$n` placeholders.
    ///
    /// `param_offset` is the number of parameters already bound before this
    /// fragment.
    pub fn to_sql(&self, param_offset: usize) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = self.build_sql(param_offset, &mut params);
        (sql, params)
    }

    fn build_sql(&self, offset: usize, params: &mut Vec<Value>) -> String {
        let bind = |value: &Value, params: &mut Vec<Value>| {
            params.push(value.clone());
            format!("${}", offset + params.len())
        };
        match self {
            Self::None => "TRUE".to_string(),
            Self::Equals(field, value) => format!("{} = {}", field, bind(value, params)),
            Self::NotEquals(field, value) => format!("{} != {}", field, bind(value, params)),
            Self::Lt(field, value) => format!("{} < {}", field, bind(value, params)),
            Self::Lte(field, value) => format!("{} <= {}", field, bind(value, params)),
            Self::Gt(field, value) => format!("{} > {}", field, bind(value, params)),
            Self::Gte(field, value) => format!("{} >= {}", field, bind(value, params)),
            Self::In(field, values) | Self::NotIn(field, values) => {
                if values.is_empty() {
                    return if matches!(self, Self::In(..)) { "FALSE" } else { "TRUE" }.to_string();
                }
                let placeholders: Vec<_> = values.iter().map(|v| bind(v, params)).collect();
                let op = if matches!(self, Self::In(..)) { "IN" } else { "NOT IN" };
                format!("{} {} ({})", field, op, placeholders.join(", "))
            }
            Self::Contains(field, value) => {
                let pattern = Value::String(format!("%{}%", like_text(value)));
                format!("{} LIKE {}", field, bind(&pattern, params))
            }
            Self::StartsWith(field, value) => {
                let pattern = Value::String(format!("{}%", like_text(value)));
                format!("{} LIKE {}", field, bind(&pattern, params))
            }
            Self::EndsWith(field, value) => {
                let pattern = Value::String(format!("%{}", like_text(value)));
                format!("{} LIKE {}", field, bind(&pattern, params))
            }
            Self::IsNull(field) => format!("{} IS NULL", field),
            Self::IsNotNull(field) => format!("{} IS NOT NULL", field),
            Self::And(filters) | Self::Or(filters) => {
                let joiner = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                let parts: Vec<_> = filters.iter().map(|f| f.build_sql(offset, params)).collect();
                format!("({})", parts.join(joiner))
            }
            Self::Not(filter) => format!("NOT ({})", filter.build_sql(offset, params)),
        }
    }
}

/// `None` when either side is null, as SQL yields unknown.
fn loose_eq(value: &Value, other: &Value) -> Option<bool> {
    if value.is_null() || other.is_null() {
        return None;
    }
    if value.compare(other) == Some(Ordering::Equal) {
        return Some(true);
    }
    let key = value.key_repr();
    Some(key.is_some() && key == other.key_repr())
}

fn ordering(value: &Value, other: &Value) -> Option<Ordering> {
    if value.is_null() || other.is_null() {
        return None;
    }
    value.compare(other)
}

fn key_in(value: &Value, values: &[Value]) -> Option<bool> {
    let key = value.key_repr()?;
    Some(values.iter().any(|v| v.key_repr().as_deref() == Some(key.as_str())))
}

fn str_op(value: &Value, pattern: &Value, op: impl Fn(&str, &str) -> bool) -> bool {
    match (value.as_str(), pattern.as_str()) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn like_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
