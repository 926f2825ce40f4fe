//! Query-related data models.
//!
//! This module defines the values bound to generated statements and list paging.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::record::ColumnType;

/// Default row limit for list results.
pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// A value bound to a generated statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value of unknown type
    Null,
    /// NULL bound with the parameter type of its column.
    ///
    /// PostgreSQL does not cast an untyped text NULL into uuid, timestamp, bool or bigint
    /// columns, so generated statements carry the column type.
    TypedNull(ColumnType),
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::TypedNull(_))
    }

    /// Give an untyped NULL the parameter type of `column_type`; other values pass through.
    pub fn typed_for(self, column_type: ColumnType) -> Self {
        match self {
            Self::Null => Self::TypedNull(column_type),
            other => other,
        }
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null | Self::TypedNull(_) => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Uuid(_) => "uuid",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Limit/offset paging for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u64,
}

impl Page {
    /// Create a page, clamping the limit to `1..=MAX_ROW_LIMIT`.
    pub fn new(limit: u32, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_ROW_LIMIT),
            offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_LIMIT, 0)
    }
}
