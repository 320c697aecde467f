//! Filter expressions in the program's query grammar.
//!
//! An [`Expression`] is built explicitly by the caller and serialized with
//! [`Expression::serialize`]. Binary combinations are always parenthesized,
//! so the program never has to apply its own precedence rules:
//!
//! ```
//! use taskw_client::filter::{or_, token};
//!
//! let expr = or_(token("+alarm"), token("+urgent"));
//! assert_eq!(expr.serialize(), "(+alarm or +urgent)");
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::ops::{BitAnd, BitOr};
use uuid::Uuid;

use crate::error::{ClientError, Result};

/// Right-hand side of a field filter.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Rendered in UTC with a trailing `Z` so the program does not read it as local time.
    Instant(DateTime<Utc>),
    Uuid(Uuid),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{}", value),
            // Debug keeps the fractional part of whole floats: 1.0, not 1.
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Self::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
            Self::Instant(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%SZ")),
            Self::Uuid(value) => write!(f, "{}", value),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<NaiveDateTime> for FilterValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Instant(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl TryFrom<&Value> for FilterValue {
    type Error = ClientError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::String(value) => Ok(Self::Str(value.clone())),
            Value::Bool(value) => Ok(Self::Bool(*value)),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Ok(Self::Int(value)),
                None => number
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| ClientError::usage(format!("unsupported number {}", number))),
            },
            other => Err(ClientError::usage(format!(
                "unexpected filter value: {}",
                other
            ))),
        }
    }
}

/// Ordered `field[__operator] -> value` filters. Entries are ANDed by the program.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FilterValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FieldMap::push`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.entries.push((key.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn serialize(&self) -> String {
        let parts: Vec<String> = self
            .entries
            .iter()
            .map(|(key, value)| format!("{}:{}", field_path(key), value))
            .collect();
        if parts.is_empty() {
            return String::new();
        }
        format!("({})", parts.join(" "))
    }
}

/// `description__contains` -> `description.contains`.
pub fn field_path(key: &str) -> String {
    key.replace("__", ".")
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Literal filter fragment, e.g. `+alarm` or `status:pending`.
    Token(String),
    Fields(FieldMap),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    /// Implicit conjunction of a flat argument list; empty parts are dropped.
    All(Vec<Expression>),
}

impl Default for Expression {
    fn default() -> Self {
        Self::All(Vec::new())
    }
}

impl Expression {
    /// Matches every task.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn and(self, other: Expression) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Expression) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    pub fn serialize(&self) -> String {
        match self {
            Self::Token(token) => token.clone(),
            Self::Fields(fields) => fields.serialize(),
            Self::And(left, right) => {
                format!("({} and {})", left.serialize(), right.serialize())
            }
            Self::Or(left, right) => {
                format!("({} or {})", left.serialize(), right.serialize())
            }
            Self::All(parts) => {
                let parts: Vec<String> = parts
                    .iter()
                    .map(Expression::serialize)
                    .filter(|part| !part.is_empty())
                    .collect();
                if parts.is_empty() {
                    String::new()
                } else {
                    format!("({})", parts.join(" "))
                }
            }
        }
    }

    /// Builds an expression from loosely typed input: a string is a token, an
    /// object is a field map, and an array is an implicit conjunction of
    /// strings and objects. Everything else is rejected.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Array(_) => Err(ClientError::usage(format!(
                        "Unexpected parameter type: {}",
                        item
                    ))),
                    other => Self::from_json(other),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::All),
            Value::String(token) => Ok(Self::Token(token.clone())),
            Value::Object(map) => {
                let mut fields = FieldMap::new();
                for (key, value) in map {
                    fields.push(key.clone(), FilterValue::try_from(value)?);
                }
                Ok(Self::Fields(fields))
            }
            other => Err(ClientError::usage(format!(
                "Unexpected parameter type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl From<FieldMap> for Expression {
    fn from(fields: FieldMap) -> Self {
        Self::Fields(fields)
    }
}

impl From<&str> for Expression {
    fn from(token: &str) -> Self {
        Self::Token(token.to_string())
    }
}

impl From<String> for Expression {
    fn from(token: String) -> Self {
        Self::Token(token)
    }
}

impl BitAnd for Expression {
    type Output = Expression;

    fn bitand(self, rhs: Expression) -> Expression {
        self.and(rhs)
    }
}

impl BitOr for Expression {
    type Output = Expression;

    fn bitor(self, rhs: Expression) -> Expression {
        self.or(rhs)
    }
}

pub fn token(value: impl Into<String>) -> Expression {
    Expression::Token(value.into())
}

/// Single-entry field filter; chain more with [`FieldMap::with`].
pub fn field(key: impl Into<String>, value: impl Into<FilterValue>) -> Expression {
    Expression::Fields(FieldMap::new().with(key, value))
}

pub fn all<I, E>(parts: I) -> Expression
where
    I: IntoIterator<Item = E>,
    E: Into<Expression>,
{
    Expression::All(parts.into_iter().map(Into::into).collect())
}

pub fn and_(left: Expression, right: Expression) -> Expression {
    left.and(right)
}

pub fn or_(left: Expression, right: Expression) -> Expression {
    left.or(right)
}
