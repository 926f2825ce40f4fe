//! Database dispatch macros for reducing code duplication.
//!
//! The pool, connection and transaction wrappers are enums with one variant per backend.
//! These macros expand a single body once per variant, with a local type alias naming the
//! backend so generic sqlx calls resolve without annotations.

/// Macro for generating database dispatch match arms.
///
/// `$enum` is one of the backend enums re-exported from `crate::db`
/// (`DbPool`, `DbConnection`, `DbTransaction`).
///
/// # Example
///
/// ```ignore
/// let rows = impl_db_dispatch!(DbTransaction, tx, t, Db => {
///     sqlx::query::<Db>("DELETE FROM users").execute(&mut **t).await
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($enum:ident, $value:expr, $p:ident => $body:expr) => {
        match $value {
            $crate::db::$enum::MySql($p) => $body,
            $crate::db::$enum::Postgres($p) => $body,
            $crate::db::$enum::SQLite($p) => $body,
        }
    };
    ($enum:ident, $value:expr, $p:ident, $db:ident => $body:expr) => {
        match $value {
            $crate::db::$enum::MySql($p) => {
                #[allow(dead_code)]
                type $db = ::sqlx::MySql;
                $body
            }
            $crate::db::$enum::Postgres($p) => {
                #[allow(dead_code)]
                type $db = ::sqlx::Postgres;
                $body
            }
            $crate::db::$enum::SQLite($p) => {
                #[allow(dead_code)]
                type $db = ::sqlx::Sqlite;
                $body
            }
        }
    };
}

pub use impl_db_dispatch;
