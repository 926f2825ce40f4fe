//! Parameter binding utilities for generated statements.
//!
//! One generic binder serves every backend: the where-clauses list exactly the Rust types
//! a [`SqlValue`] can carry, and each supported driver implements all of them. A typed
//! NULL is bound as `None` of its column's Rust type so the parameter type matches the
//! column.

use crate::models::{ColumnType, SqlValue};
use chrono::{DateTime, Utc};
use sqlx::query::{Query, QueryAs};
use sqlx::{Database, Encode, Type};
use uuid::Uuid;

/// Bind values, in order, to a statement.
pub(crate) fn bind_query<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    values: &'q [SqlValue],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    &'q str: Encode<'q, DB> + Type<DB>,
    Option<&'q str>: Encode<'q, DB> + Type<DB>,
    Option<bool>: Encode<'q, DB> + Type<DB>,
    Option<i64>: Encode<'q, DB> + Type<DB>,
    Option<Uuid>: Encode<'q, DB> + Type<DB>,
    Option<DateTime<Utc>>: Encode<'q, DB> + Type<DB>,
    Uuid: Encode<'q, DB> + Type<DB>,
    DateTime<Utc>: Encode<'q, DB> + Type<DB>,
{
    for value in values {
        query = match value {
            SqlValue::Null | SqlValue::TypedNull(ColumnType::Text { .. }) => {
                query.bind(None::<&'q str>)
            }
            SqlValue::TypedNull(ColumnType::Bool) => query.bind(None::<bool>),
            SqlValue::TypedNull(ColumnType::BigInt) => query.bind(None::<i64>),
            SqlValue::TypedNull(ColumnType::Uuid) => query.bind(None::<Uuid>),
            SqlValue::TypedNull(ColumnType::Timestamp) => query.bind(None::<DateTime<Utc>>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Uuid(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}

/// Bind values, in order, to a statement whose rows decode into `O`.
pub(crate) fn bind_query_as<'q, DB, O>(
    mut query: QueryAs<'q, DB, O, <DB as Database>::Arguments<'q>>,
    values: &'q [SqlValue],
) -> QueryAs<'q, DB, O, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    &'q str: Encode<'q, DB> + Type<DB>,
    Option<&'q str>: Encode<'q, DB> + Type<DB>,
    Option<bool>: Encode<'q, DB> + Type<DB>,
    Option<i64>: Encode<'q, DB> + Type<DB>,
    Option<Uuid>: Encode<'q, DB> + Type<DB>,
    Option<DateTime<Utc>>: Encode<'q, DB> + Type<DB>,
    Uuid: Encode<'q, DB> + Type<DB>,
    DateTime<Utc>: Encode<'q, DB> + Type<DB>,
{
    for value in values {
        query = match value {
            SqlValue::Null | SqlValue::TypedNull(ColumnType::Text { .. }) => {
                query.bind(None::<&'q str>)
            }
            SqlValue::TypedNull(ColumnType::Bool) => query.bind(None::<bool>),
            SqlValue::TypedNull(ColumnType::BigInt) => query.bind(None::<i64>),
            SqlValue::TypedNull(ColumnType::Uuid) => query.bind(None::<Uuid>),
            SqlValue::TypedNull(ColumnType::Timestamp) => query.bind(None::<DateTime<Utc>>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Uuid(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }
    query
}
