//! Connection-related data models.
//!
//! This module parses connection strings of the form
//! `<dialect>+<driver>://<user>:<password>@<host>:<port>/<database>` and maps them onto
//! what the sqlx drivers understand.

use serde::{Deserialize, Serialize};
use url::Url;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse a database type from a dialect name (the part before `+` in the scheme).
    pub fn from_dialect(dialect: &str) -> Option<Self> {
        match dialect.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// URL scheme understood by the sqlx driver.
    pub fn driver_scheme(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgres",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A validated connection string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    /// Driver named after `+` in the scheme, e.g. `asyncpg` in `postgresql+asyncpg://`.
    pub driver: Option<String>,
    /// The URL handed to sqlx. Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    /// Database name (or file stem for SQLite).
    pub database: Option<String>,
}

impl ConnectionConfig {
    /// Parse and validate a connection string.
    pub fn parse(connection_string: &str) -> Result<Self, ConnectionConfigError> {
        let trimmed = connection_string.trim();
        if trimmed.is_empty() {
            return Err(ConnectionConfigError::Empty);
        }

        let url = Url::parse(trimmed).map_err(|e| ConnectionConfigError::Malformed(e.to_string()))?;
        let scheme = url.scheme();
        let (dialect, driver) = match scheme.split_once('+') {
            Some((dialect, driver)) if !driver.is_empty() => (dialect, Some(driver.to_string())),
            Some((_, _)) => {
                return Err(ConnectionConfigError::Malformed(format!(
                    "empty driver in scheme '{}'",
                    scheme
                )));
            }
            None => (scheme, None),
        };

        let db_type = DatabaseType::from_dialect(dialect)
            .ok_or_else(|| ConnectionConfigError::UnknownDialect(dialect.to_string()))?;

        if db_type != DatabaseType::SQLite && url.host_str().is_none_or(str::is_empty) {
            return Err(ConnectionConfigError::Malformed("missing host".to_string()));
        }

        // Url lower-cases the scheme; keep everything after it exactly as given.
        let rest = &trimmed[scheme.len()..];
        let driver_url = format!("{}{}", db_type.driver_scheme(), rest);

        Ok(Self {
            db_type,
            driver,
            database: database_name(&url, db_type),
            connection_string: driver_url,
        })
    }

    /// True for `sqlite::memory:` style connection strings.
    pub fn is_in_memory(&self) -> bool {
        self.db_type == DatabaseType::SQLite && self.connection_string.contains(":memory:")
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        mask_password(&self.connection_string)
    }
}

/// Replace the password part of a URL with `****`.
pub fn mask_password(connection_string: &str) -> String {
    // Credentials only exist between `://` and the first `@` of the authority.
    let Some(scheme_end) = connection_string.find("://").map(|p| p + 3) else {
        return connection_string.to_string();
    };
    let authority_end = connection_string[scheme_end..]
        .find(['/', '?', '#'])
        .map_or(connection_string.len(), |p| scheme_end + p);
    let authority = &connection_string[scheme_end..authority_end];

    if let Some(at_pos) = authority.rfind('@') {
        if let Some(colon_pos) = authority[..at_pos].find(':') {
            let prefix = &connection_string[..scheme_end + colon_pos + 1];
            let suffix = &connection_string[scheme_end + at_pos..];
            return format!("{}****{}", prefix, suffix);
        }
    }
    connection_string.to_string()
}

fn database_name(url: &Url, db_type: DatabaseType) -> Option<String> {
    let last = url.path().rsplit('/').next().filter(|s| !s.is_empty())?;
    let name = match db_type {
        DatabaseType::SQLite => last.trim_end_matches(".sqlite").trim_end_matches(".db"),
        _ => last,
    };
    Some(name.to_string()).filter(|s| !s.is_empty())
}

/// Errors that can occur when parsing a connection string.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    /// Connection string is empty
    #[error("Connection string cannot be empty")]
    Empty,

    /// Connection string is not a valid URL
    #[error("Malformed connection string: {0}")]
    Malformed(String),

    /// Could not determine database type from the scheme
    #[error("Unknown database dialect: {0}")]
    UnknownDialect(String),
}
