//! Record Store Library
//!
//! A small data-access layer for SQL databases (SQLite, PostgreSQL, MySQL): a pooled
//! connection manager, transaction-scoped sessions, and a generic repository over record
//! types that carry a UUID id and store-assigned timestamps.
//!
//! ```no_run
//! use record_store::config::PoolOptions;
//! use record_store::db::{ConnectionPool, Repository, SessionFactory};
//! use record_store::models::{NewUser, User};
//!
//! # async fn run() -> record_store::error::DbResult<()> {
//! let pool = ConnectionPool::initialize("sqlite:app.db?mode=rwc", PoolOptions::default()).await?;
//! let users: Repository<User> = Repository::new(SessionFactory::new(pool.clone()));
//! users.ensure_table().await?;
//! let user = users.create(NewUser::new("a@x.com", "h1", "A")).await?;
//! assert_eq!(users.get_by_id(user.meta.id).await?, Some(user));
//! pool.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, PoolOptions};
pub use db::{ConnectionPool, Repository, Session, SessionFactory};
pub use error::{DbError, DbResult};
