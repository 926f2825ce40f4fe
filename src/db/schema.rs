//! SQL generation for record tables.
//!
//! Every statement a session runs against a record table is built here, per dialect.
//! Values always travel as bind parameters; identifiers come from record declarations and
//! are validated and quoted before use.
//!
//! # Timestamps
//!
//! `created_at` and `updated_at` are assigned by the store through column defaults. An
//! update sets `updated_at` to the later of the current time and the previous value plus
//! the smallest step the column can represent, so it strictly advances even when two
//! updates land within the same clock tick.

use crate::error::{DbError, DbResult};
use crate::models::record::{CREATED_AT_COLUMN, ID_COLUMN, UPDATED_AT_COLUMN};
use crate::models::{ColumnDef, ColumnType, DatabaseType, Draft, Page, Patch, Record, SqlValue};
use uuid::Uuid;

/// A statement with its bind values in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl Statement {
    fn new(sql: String, values: Vec<SqlValue>) -> Self {
        Self { sql, values }
    }
}

/// Builds statements for record type `R` in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder {
    db_type: DatabaseType,
}

impl StatementBuilder {
    pub fn new(db_type: DatabaseType) -> Self {
        Self { db_type }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// `SELECT ... WHERE id = ?`
    pub fn select_by_id<R: Record>(&self, id: Uuid) -> DbResult<Statement> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.select_list::<R>()?,
            self.table::<R>()?,
            self.quote(ID_COLUMN),
            self.placeholder(1)
        );
        Ok(Statement::new(sql, vec![SqlValue::Uuid(id)]))
    }

    /// One page of rows, oldest first.
    pub fn select_page<R: Record>(&self, page: Page) -> DbResult<Statement> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}, {} LIMIT {} OFFSET {}",
            self.select_list::<R>()?,
            self.table::<R>()?,
            self.quote(CREATED_AT_COLUMN),
            self.quote(ID_COLUMN),
            self.placeholder(1),
            self.placeholder(2)
        );
        let offset = i64::try_from(page.offset)
            .map_err(|_| DbError::invalid_input(format!("offset {} is too large", page.offset)))?;
        Ok(Statement::new(
            sql,
            vec![SqlValue::Int(i64::from(page.limit)), SqlValue::Int(offset)],
        ))
    }

    /// Insert with a caller-chosen id. Timestamps come from column defaults.
    pub fn insert<R: Record>(&self, id: Uuid, draft: &R::Draft) -> DbResult<Statement> {
        let fields = check_fields::<R>(draft.values(), "insert")?;

        let mut columns = vec![self.quote(ID_COLUMN)];
        let mut values = vec![SqlValue::Uuid(id)];
        for (name, value) in fields {
            columns.push(self.quote(name));
            values.push(value);
        }
        let placeholders: Vec<String> = (1..=values.len()).map(|i| self.placeholder(i)).collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table::<R>()?,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(Statement::new(sql, values))
    }

    /// Update the patched columns and advance `updated_at`.
    ///
    /// An empty patch still touches `updated_at`.
    pub fn update<R: Record>(&self, id: Uuid, patch: &R::Patch) -> DbResult<Statement> {
        let changes = check_fields::<R>(patch.changes(), "update")?;

        let mut assignments = Vec::with_capacity(changes.len() + 1);
        let mut values = Vec::with_capacity(changes.len() + 1);
        for (index, (name, value)) in changes.into_iter().enumerate() {
            assignments.push(format!("{} = {}", self.quote(name), self.placeholder(index + 1)));
            values.push(value);
        }
        assignments.push(format!(
            "{} = {}",
            self.quote(UPDATED_AT_COLUMN),
            self.advanced_updated_at()
        ));
        values.push(SqlValue::Uuid(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.table::<R>()?,
            assignments.join(", "),
            self.quote(ID_COLUMN),
            self.placeholder(values.len())
        );
        Ok(Statement::new(sql, values))
    }

    pub fn delete<R: Record>(&self, id: Uuid) -> DbResult<Statement> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.table::<R>()?,
            self.quote(ID_COLUMN),
            self.placeholder(1)
        );
        Ok(Statement::new(sql, vec![SqlValue::Uuid(id)]))
    }

    /// `CREATE TABLE IF NOT EXISTS` for the record's table.
    pub fn create_table<R: Record>(&self) -> DbResult<String> {
        let mut columns = vec![
            format!("{} {} PRIMARY KEY", self.quote(ID_COLUMN), self.uuid_type()),
            format!(
                "{} {} NOT NULL DEFAULT {}",
                self.quote(CREATED_AT_COLUMN),
                self.timestamp_type(),
                self.now_default()
            ),
            format!(
                "{} {} NOT NULL DEFAULT {}",
                self.quote(UPDATED_AT_COLUMN),
                self.timestamp_type(),
                self.now_default()
            ),
        ];
        for column in R::COLUMNS {
            columns.push(self.column_sql(column)?);
        }

        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table::<R>()?,
            columns.join(", ")
        ))
    }

    fn table<R: Record>(&self) -> DbResult<String> {
        let table = R::table_name();
        validate_identifier(&table)?;
        Ok(self.quote(&table))
    }

    fn select_list<R: Record>(&self) -> DbResult<String> {
        let mut columns = vec![
            self.quote(ID_COLUMN),
            self.quote(CREATED_AT_COLUMN),
            self.quote(UPDATED_AT_COLUMN),
        ];
        for column in R::COLUMNS {
            validate_identifier(column.name)?;
            columns.push(self.quote(column.name));
        }
        Ok(columns.join(", "))
    }

    fn column_sql(&self, column: &ColumnDef) -> DbResult<String> {
        validate_identifier(column.name)?;
        let mut sql = format!("{} {}", self.quote(column.name), self.sql_type(column.column_type));
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if column.unique {
            sql.push_str(" UNIQUE");
        }
        Ok(sql)
    }

    /// 1-based placeholder for the n-th bind value.
    pub fn placeholder(&self, index: usize) -> String {
        match self.db_type {
            DatabaseType::PostgreSQL => format!("${}", index),
            DatabaseType::MySQL | DatabaseType::SQLite => "?".to_string(),
        }
    }

    /// Quote a validated identifier.
    pub fn quote(&self, ident: &str) -> String {
        match self.db_type {
            DatabaseType::MySQL => format!("`{}`", ident),
            DatabaseType::PostgreSQL | DatabaseType::SQLite => format!("\"{}\"", ident),
        }
    }

    fn sql_type(&self, column_type: ColumnType) -> String {
        match (self.db_type, column_type) {
            (DatabaseType::SQLite, ColumnType::Text { .. }) => "TEXT".to_string(),
            (_, ColumnType::Text { max_len }) => format!("VARCHAR({})", max_len),
            (DatabaseType::SQLite, ColumnType::Bool | ColumnType::BigInt) => "INTEGER".to_string(),
            (_, ColumnType::Bool) => "BOOLEAN".to_string(),
            (_, ColumnType::BigInt) => "BIGINT".to_string(),
            (_, ColumnType::Uuid) => self.uuid_type().to_string(),
            (_, ColumnType::Timestamp) => self.timestamp_type().to_string(),
        }
    }

    fn uuid_type(&self) -> &'static str {
        match self.db_type {
            DatabaseType::PostgreSQL => "UUID",
            DatabaseType::MySQL => "BINARY(16)",
            DatabaseType::SQLite => "BLOB",
        }
    }

    fn timestamp_type(&self) -> &'static str {
        match self.db_type {
            DatabaseType::PostgreSQL => "TIMESTAMPTZ",
            DatabaseType::MySQL => "TIMESTAMP(6)",
            DatabaseType::SQLite => "TEXT",
        }
    }

    fn now_default(&self) -> &'static str {
        match self.db_type {
            DatabaseType::PostgreSQL => "now()",
            DatabaseType::MySQL => "CURRENT_TIMESTAMP(6)",
            DatabaseType::SQLite => "(strftime('%Y-%m-%d %H:%M:%f', 'now'))",
        }
    }

    fn advanced_updated_at(&self) -> String {
        let column = self.quote(UPDATED_AT_COLUMN);
        match self.db_type {
            DatabaseType::PostgreSQL => {
                format!("GREATEST(now(), {} + INTERVAL '1 microsecond')", column)
            }
            DatabaseType::MySQL => {
                format!("GREATEST(CURRENT_TIMESTAMP(6), {} + INTERVAL 1 MICROSECOND)", column)
            }
            // SQLite keeps milliseconds; text in this format orders chronologically.
            DatabaseType::SQLite => format!(
                "MAX(strftime('%Y-%m-%d %H:%M:%f', 'now'), strftime('%Y-%m-%d %H:%M:%f', {}, '+0.001 seconds'))",
                column
            ),
        }
    }
}

/// Accept only plain identifiers: an ASCII letter or underscore followed by letters,
/// digits or underscores, at most 63 characters.
pub fn validate_identifier(ident: &str) -> DbResult<()> {
    let mut chars = ident.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || ident.len() > 63 {
        return Err(DbError::invalid_input(format!(
            "Invalid identifier '{}'",
            ident
        )));
    }
    Ok(())
}

/// Every field must name a declared domain column, at most once. NULLs come back typed
/// for their column.
fn check_fields<R: Record>(
    fields: Vec<(&'static str, SqlValue)>,
    action: &str,
) -> DbResult<Vec<(&'static str, SqlValue)>> {
    let mut checked: Vec<(&'static str, SqlValue)> = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let column = R::COLUMNS.iter().find(|c| c.name == name).ok_or_else(|| {
            DbError::invalid_input(format!(
                "Cannot {} column '{}' on {}",
                action,
                name,
                R::table_name()
            ))
        })?;
        if checked.iter().any(|(other, _)| *other == name) {
            return Err(DbError::invalid_input(format!(
                "Column '{}' given more than once",
                name
            )));
        }
        if value.is_null() && !column.nullable {
            return Err(DbError::invalid_input(format!(
                "Column '{}' on {} cannot be null",
                name,
                R::table_name()
            )));
        }
        checked.push((name, value.typed_for(column.column_type)));
    }
    Ok(checked)
}
