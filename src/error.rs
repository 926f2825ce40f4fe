//! Error types for the record store.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Pool and session failures keep their own variants so callers can decide on retries
//! without string matching; store-side failures inside a transaction surface as
//! [`DbError::Persistence`] with the original failure attached as the source.

use std::time::Duration;
use thiserror::Error;

/// Classification of a failed statement, derived from the driver's error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    NotNullViolation,
    CheckViolation,
    /// The connection broke while the statement was running.
    Connectivity,
    Other,
}

impl std::fmt::Display for DatabaseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::UniqueViolation => "unique violation",
            Self::ForeignKeyViolation => "foreign key violation",
            Self::NotNullViolation => "not-null violation",
            Self::CheckViolation => "check violation",
            Self::Connectivity => "connectivity",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Connection pool exhausted: no connection available within {}ms", .timeout.as_millis())]
    PoolExhausted { timeout: Duration },

    #[error("Session {session_id} is closed: {message}")]
    SessionClosed { session_id: String, message: String },

    #[error("Persistence failed: {message}")]
    Persistence {
        message: String,
        #[source]
        cause: Box<DbError>,
    },

    #[error("Database error ({kind}): {message}")]
    Database {
        message: String,
        /// e.g., "23505" for a unique violation on PostgreSQL
        sql_state: Option<String>,
        kind: DatabaseErrorKind,
        /// Constraint name, when the driver reports one.
        constraint: Option<String>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a pool exhaustion error for the configured acquire timeout.
    pub fn pool_exhausted(timeout: Duration) -> Self {
        Self::PoolExhausted { timeout }
    }

    /// Create a session closed error.
    pub fn session_closed(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionClosed {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    /// Wrap a failure that happened inside a transaction.
    ///
    /// Pool-level failures (`Connection`, `PoolExhausted`) and session misuse are returned
    /// unchanged; an existing `Persistence` error is not wrapped twice.
    pub fn persistence(message: impl Into<String>, cause: DbError) -> Self {
        match cause {
            Self::Connection { .. }
            | Self::PoolExhausted { .. }
            | Self::SessionClosed { .. }
            | Self::Persistence { .. } => cause,
            cause => Self::Persistence {
                message: message.into(),
                cause: Box::new(cause),
            },
        }
    }

    /// Create a database error.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        kind: DatabaseErrorKind,
        constraint: Option<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            kind,
            constraint,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map a failure raised by a statement running inside a transaction.
    ///
    /// Unlike `From<sqlx::Error>`, broken connections become `Database` errors with the
    /// `Connectivity` kind: the pool itself is fine, the unit of work is not.
    pub fn from_statement(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let kind = match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => DatabaseErrorKind::UniqueViolation,
                    sqlx::error::ErrorKind::ForeignKeyViolation => {
                        DatabaseErrorKind::ForeignKeyViolation
                    }
                    sqlx::error::ErrorKind::NotNullViolation => DatabaseErrorKind::NotNullViolation,
                    sqlx::error::ErrorKind::CheckViolation => DatabaseErrorKind::CheckViolation,
                    _ => DatabaseErrorKind::Other,
                };
                DbError::database(
                    db_err.message(),
                    db_err.code().map(|c| c.to_string()),
                    kind,
                    db_err.constraint().map(String::from),
                )
            }
            sqlx::Error::Io(io_err) => DbError::database(
                format!("I/O error: {}", io_err),
                None,
                DatabaseErrorKind::Connectivity,
                None,
            ),
            sqlx::Error::Tls(tls_err) => DbError::database(
                format!("TLS error: {}", tls_err),
                None,
                DatabaseErrorKind::Connectivity,
                None,
            ),
            sqlx::Error::Protocol(msg) => DbError::database(
                format!("Protocol error: {}", msg),
                None,
                DatabaseErrorKind::Connectivity,
                None,
            ),
            other => DbError::from(other),
        }
    }

    /// The database error kind, looking through a `Persistence` wrapper.
    pub fn database_kind(&self) -> Option<DatabaseErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Persistence { cause, .. } => cause.database_kind(),
            _ => None,
        }
    }

    /// True for a unique constraint violation, directly or as the cause of a persistence failure.
    pub fn is_unique_violation(&self) -> bool {
        self.database_kind() == Some(DatabaseErrorKind::UniqueViolation)
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::PoolExhausted { .. } => {
                Some("Retry with backoff or raise pool_size / max_overflow")
            }
            Self::SessionClosed { .. } => Some("Open a new session with scoped_session()"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::PoolExhausted { .. } => true,
            _ => self.database_kind() == Some(DatabaseErrorKind::Connectivity),
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => DbError::from_statement(sqlx::Error::Database(db_err)),
            sqlx::Error::RowNotFound => DbError::internal("No rows returned"),
            // The configured timeout is not known here; the pool maps this itself.
            sqlx::Error::PoolTimedOut => DbError::pool_exhausted(Duration::ZERO),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Re-initialize the pool")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::internal(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
