//! The base contract shared by every persisted record type.
//!
//! A record type declares its domain columns and input shapes; identity and timestamp
//! columns are common to all of them and owned by [`RecordMeta`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::models::query::SqlValue;

/// Identity column present on every table.
pub const ID_COLUMN: &str = "id";
/// Insert timestamp column, assigned by the store.
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Modification timestamp column, reassigned by the store on every update.
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Identity and timestamps of a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RecordMeta {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Logical column types; the statement builder maps them per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Variable-length string with a maximum length
    Text { max_len: u32 },
    Bool,
    BigInt,
    Uuid,
    Timestamp,
}

/// Declaration of one domain column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub unique: bool,
}

impl ColumnDef {
    /// A required column.
    pub const fn required(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: false,
            unique: false,
        }
    }

    /// A nullable column.
    pub const fn optional(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            nullable: true,
            unique: false,
        }
    }

    /// Mark the column as unique.
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A persisted entity type.
///
/// Rows are decoded with `sqlx::FromRow` for every supported backend, so a record type
/// usually only needs `#[derive(FromRow)]` with a `#[sqlx(flatten)]` [`RecordMeta`] field.
pub trait Record:
    for<'r> FromRow<'r, PgRow>
    + for<'r> FromRow<'r, MySqlRow>
    + for<'r> FromRow<'r, SqliteRow>
    + Clone
    + std::fmt::Debug
    + Send
    + Sync
    + Unpin
    + 'static
{
    /// Fields supplied to `create`.
    type Draft: Draft;
    /// Fields changed by `update`.
    type Patch: Patch;

    /// Domain columns, excluding `id`, `created_at` and `updated_at`.
    const COLUMNS: &'static [ColumnDef];

    /// Storage table name. Defaults to the lower-cased type name with an `s` appended.
    fn table_name() -> String {
        table_name_for(std::any::type_name::<Self>())
    }

    fn meta(&self) -> &RecordMeta;

    fn id(&self) -> Uuid {
        self.meta().id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.meta().created_at
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.meta().updated_at
    }
}

/// Input for creating a record.
pub trait Draft: Send + Sync {
    /// Caller-supplied id; `None` lets the repository generate one.
    fn id(&self) -> Option<Uuid>;

    /// Domain column values to insert.
    fn values(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Input for updating a record. Only the returned columns are written.
pub trait Patch: Send + Sync {
    fn changes(&self) -> Vec<(&'static str, SqlValue)>;
}

/// Derive a table name from a (possibly path-qualified) type name: `app::User` → `users`.
pub fn table_name_for(type_name: &str) -> String {
    // Drop generic arguments before taking the last path segment.
    let base = type_name.split('<').next().unwrap_or(type_name);
    let short = base.rsplit("::").next().unwrap_or(base);
    format!("{}s", short.to_lowercase())
}
