//! Database access layer.
//!
//! This module provides:
//! - Connection pool management with checkout accounting
//! - Transaction-scoped sessions with staged writes
//! - Per-dialect statement generation for record tables
//! - The generic record repository
//! - Database dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub(crate) mod params;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod session;

pub use pool::{ConnectionPool, DbConnection, DbPool, PoolStatus, PooledConnection};
pub use repository::{IdGenerator, RandomIdGenerator, Repository};
pub use schema::{Statement, StatementBuilder};
pub use session::{DbTransaction, PendingWrite, Session, SessionFactory, SessionState, WriteKind};
