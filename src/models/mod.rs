//! Data models for the record store.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod record;
pub mod user;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, Page, SqlValue};
pub use record::{ColumnDef, ColumnType, Draft, Patch, Record, RecordMeta};
pub use user::{NewUser, User, UserPatch};
