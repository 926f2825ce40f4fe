//! Sessions: one transaction on one pooled connection.
//!
//! A [`Session`] moves through `Created → Active → Committed | RolledBack → Closed`.
//! Writes are staged with [`Session::add`], [`Session::stage_update`] and
//! [`Session::stage_delete`] and only reach the store on [`Session::flush`] or
//! [`Session::commit`]. Reads run immediately and do not see unflushed writes.
//!
//! Dropping a session with an open transaction rolls it back and returns the connection.

use crate::db::params::{bind_query, bind_query_as};
use crate::db::pool::{Checkout, ConnectionPool};
use crate::db::schema::{Statement, StatementBuilder};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Page, Record};
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Database-specific transaction wrapper.
pub enum DbTransaction {
    /// MySQL transaction
    MySql(Transaction<'static, MySql>),
    /// PostgreSQL transaction
    Postgres(Transaction<'static, Postgres>),
    /// SQLite transaction
    SQLite(Transaction<'static, Sqlite>),
}

impl DbTransaction {
    /// Get the database type for this transaction.
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbTransaction::MySql(_) => DatabaseType::MySQL,
            DbTransaction::Postgres(_) => DatabaseType::PostgreSQL,
            DbTransaction::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        crate::impl_db_dispatch!(DbTransaction, self, tx => {
            tx.commit().await.map_err(DbError::from_statement)
        })
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        crate::impl_db_dispatch!(DbTransaction, self, tx => {
            tx.rollback().await.map_err(DbError::from_statement)
        })
    }
}

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Committed,
    RolledBack,
    /// Terminal.
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Closed => "closed",
        }
    }

    /// Committed, rolled back, or closed.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack | Self::Closed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// A write staged in a session, not yet sent to the store.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub kind: WriteKind,
    pub table: String,
    pub id: Uuid,
    pub statement: Statement,
}

/// Produces sessions bound to one connection pool.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    pool: ConnectionPool,
}

impl SessionFactory {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// A session in the `Created` state. No connection is held until [`Session::begin`].
    pub fn session(&self) -> Session {
        Session::new(self.pool.clone())
    }

    /// A session with its transaction already begun.
    ///
    /// Fails with [`DbError::PoolExhausted`] or [`DbError::Connection`] when no connection
    /// can be checked out.
    pub async fn scoped_session(&self) -> DbResult<Session> {
        let mut session = self.session();
        session.begin().await?;
        Ok(session)
    }
}

/// A unit of work on a single pooled connection.
pub struct Session {
    id: String,
    state: SessionState,
    pool: ConnectionPool,
    builder: StatementBuilder,
    log_queries: bool,
    tx: Option<DbTransaction>,
    checkout: Option<Checkout>,
    pending: Vec<PendingWrite>,
    /// First statement failure; the transaction can only be rolled back after this.
    failure: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("db_type", &self.builder.db_type())
            .field("pending", &self.pending.len())
            .field("failed", &self.failure.is_some())
            .finish()
    }
}

impl Session {
    fn new(pool: ConnectionPool) -> Self {
        let builder = StatementBuilder::new(pool.db_type());
        let log_queries = pool.options().log_queries_or_default();
        Self {
            id: generate_session_id(),
            state: SessionState::Created,
            pool,
            builder,
            log_queries,
            tx: None,
            checkout: None,
            pending: Vec::new(),
            failure: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn db_type(&self) -> DatabaseType {
        self.builder.db_type()
    }

    /// Writes staged since the last flush, in staging order.
    pub fn pending_writes(&self) -> &[PendingWrite] {
        &self.pending
    }

    /// Check out a connection and start the transaction.
    pub async fn begin(&mut self) -> DbResult<()> {
        match self.state {
            SessionState::Created => {}
            SessionState::Active => {
                return Err(DbError::invalid_input(format!(
                    "Session {} already has an active transaction",
                    self.id
                )));
            }
            _ => return Err(self.closed_error("begin")),
        }

        let (tx, checkout) = self.pool.begin().await?;
        self.tx = Some(tx);
        self.checkout = Some(checkout);
        self.state = SessionState::Active;

        debug!(session_id = %self.id, "Session started");
        Ok(())
    }

    /// Load a record by id. Staged writes are not visible until flushed.
    pub async fn get<R: Record>(&mut self, id: Uuid) -> DbResult<Option<R>> {
        self.ensure_active("get")?;
        let statement = self.builder.select_by_id::<R>(id)?;
        self.fetch_optional(&statement).await
    }

    /// One page of records, oldest first.
    pub async fn list<R: Record>(&mut self, page: Page) -> DbResult<Vec<R>> {
        self.ensure_active("list")?;
        let statement = self.builder.select_page::<R>(page)?;
        self.fetch_all(&statement).await
    }

    /// Stage an insert.
    pub fn add<R: Record>(&mut self, id: Uuid, draft: &R::Draft) -> DbResult<()> {
        self.ensure_active("add")?;
        let statement = self.builder.insert::<R>(id, draft)?;
        self.stage::<R>(WriteKind::Insert, id, statement);
        Ok(())
    }

    /// Stage an update of the patched columns.
    pub fn stage_update<R: Record>(&mut self, id: Uuid, patch: &R::Patch) -> DbResult<()> {
        self.ensure_active("update")?;
        let statement = self.builder.update::<R>(id, patch)?;
        self.stage::<R>(WriteKind::Update, id, statement);
        Ok(())
    }

    /// Stage a delete.
    pub fn stage_delete<R: Record>(&mut self, id: Uuid) -> DbResult<()> {
        self.ensure_active("delete")?;
        let statement = self.builder.delete::<R>(id)?;
        self.stage::<R>(WriteKind::Delete, id, statement);
        Ok(())
    }

    /// Send staged writes to the store, in order, without committing.
    ///
    /// Returns the rows affected by each write. On failure the remaining writes are
    /// discarded and the session can only be rolled back.
    pub async fn flush(&mut self) -> DbResult<Vec<u64>> {
        self.ensure_active("flush")?;
        let pending = std::mem::take(&mut self.pending);
        let mut affected = Vec::with_capacity(pending.len());

        for write in &pending {
            let rows = self.run(&write.statement).await.map_err(|err| {
                warn!(
                    session_id = %self.id,
                    table = %write.table,
                    id = %write.id,
                    kind = ?write.kind,
                    "Flush failed"
                );
                err
            })?;
            affected.push(rows);
        }

        if !pending.is_empty() {
            debug!(session_id = %self.id, writes = pending.len(), "Flushed staged writes");
        }
        Ok(affected)
    }

    /// Run one statement immediately, e.g. DDL. Returns rows affected.
    pub async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        self.ensure_active("execute")?;
        let statement = Statement {
            sql: sql.to_string(),
            values: Vec::new(),
        };
        self.run(&statement).await
    }

    /// Flush staged writes and commit.
    ///
    /// If any statement failed earlier, or the flush fails, the transaction is rolled
    /// back instead and the store failure comes back as [`DbError::Persistence`].
    pub async fn commit(&mut self) -> DbResult<()> {
        self.ensure_active("commit")?;

        if let Some(failure) = self.failure.clone() {
            self.rollback_active().await;
            return Err(DbError::persistence(
                format!("Session {} rolled back after an earlier failure", self.id),
                DbError::internal(failure),
            ));
        }

        if let Err(err) = self.flush().await {
            self.rollback_active().await;
            return Err(DbError::persistence(
                format!("Session {} rolled back after a failed flush", self.id),
                err,
            ));
        }

        let result = match self.tx.take() {
            Some(tx) => tx.commit().await,
            None => Err(DbError::internal("Active session without a transaction")),
        };
        self.release();

        match result {
            Ok(()) => {
                self.state = SessionState::Committed;
                debug!(session_id = %self.id, "Session committed");
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::RolledBack;
                warn!(session_id = %self.id, error = %err, "Commit failed");
                Err(DbError::persistence(
                    format!("Session {} failed to commit", self.id),
                    err,
                ))
            }
        }
    }

    /// Discard staged writes and undo flushed ones.
    ///
    /// A no-op after commit or rollback; an error once closed.
    pub async fn rollback(&mut self) -> DbResult<()> {
        match self.state {
            SessionState::Active => {
                let discarded = self.pending.len();
                let result = match self.tx.take() {
                    Some(tx) => tx.rollback().await,
                    None => Ok(()),
                };
                self.pending.clear();
                self.state = SessionState::RolledBack;
                self.release();
                debug!(session_id = %self.id, discarded, "Session rolled back");
                result
            }
            SessionState::Created => {
                self.state = SessionState::RolledBack;
                Ok(())
            }
            SessionState::Committed | SessionState::RolledBack => Ok(()),
            SessionState::Closed => Err(self.closed_error("rollback")),
        }
    }

    /// Roll back anything uncommitted and release the connection. Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if self.state == SessionState::Active {
            self.rollback_active().await;
        }
        self.release();
        self.state = SessionState::Closed;
        debug!(session_id = %self.id, "Session closed");
    }

    fn ensure_active(&self, operation: &str) -> DbResult<()> {
        match self.state {
            SessionState::Active => match &self.checkout {
                Some(checkout) => checkout.ensure_live(),
                None => Err(DbError::internal("Active session without a connection")),
            },
            SessionState::Created => Err(DbError::invalid_input(format!(
                "Session {} must begin() before {}",
                self.id, operation
            ))),
            _ => Err(self.closed_error(operation)),
        }
    }

    fn closed_error(&self, operation: &str) -> DbError {
        DbError::session_closed(
            self.id.clone(),
            format!("cannot {} after the session is {}", operation, self.state),
        )
    }

    fn stage<R: Record>(&mut self, kind: WriteKind, id: Uuid, statement: Statement) {
        debug!(session_id = %self.id, table = %R::table_name(), %id, ?kind, "Staged write");
        self.pending.push(PendingWrite {
            kind,
            table: R::table_name(),
            id,
            statement,
        });
    }

    async fn run(&mut self, statement: &Statement) -> DbResult<u64> {
        self.log_statement(statement);
        let tx = self.transaction()?;
        let result = crate::impl_db_dispatch!(DbTransaction, tx, t, Db => {
            bind_query(sqlx::query::<Db>(&statement.sql), &statement.values)
                .execute(&mut **t)
                .await
                .map(|done| done.rows_affected())
        });
        result.map_err(|err| self.fail(err))
    }

    async fn fetch_optional<R: Record>(&mut self, statement: &Statement) -> DbResult<Option<R>> {
        self.log_statement(statement);
        let tx = self.transaction()?;
        let result = crate::impl_db_dispatch!(DbTransaction, tx, t, Db => {
            bind_query_as(sqlx::query_as::<Db, R>(&statement.sql), &statement.values)
                .fetch_optional(&mut **t)
                .await
        });
        result.map_err(|err| self.fail(err))
    }

    async fn fetch_all<R: Record>(&mut self, statement: &Statement) -> DbResult<Vec<R>> {
        self.log_statement(statement);
        let tx = self.transaction()?;
        let result = crate::impl_db_dispatch!(DbTransaction, tx, t, Db => {
            bind_query_as(sqlx::query_as::<Db, R>(&statement.sql), &statement.values)
                .fetch_all(&mut **t)
                .await
        });
        result.map_err(|err| self.fail(err))
    }

    fn transaction(&mut self) -> DbResult<&mut DbTransaction> {
        self.tx
            .as_mut()
            .ok_or_else(|| DbError::internal("Active session without a transaction"))
    }

    fn fail(&mut self, err: sqlx::Error) -> DbError {
        let err = DbError::from_statement(err);
        warn!(session_id = %self.id, error = %err, "Statement failed");
        if self.failure.is_none() {
            self.failure = Some(err.to_string());
        }
        err
    }

    fn log_statement(&self, statement: &Statement) {
        if self.log_queries {
            info!(
                session_id = %self.id,
                sql = %statement.sql,
                params = statement.values.len(),
                "Executing statement"
            );
        } else {
            debug!(session_id = %self.id, sql = %statement.sql, "Executing statement");
        }
    }

    /// Roll back an active transaction, logging rather than returning a failure.
    async fn rollback_active(&mut self) {
        if let Err(err) = self.rollback().await {
            warn!(session_id = %self.id, error = %err, "Rollback failed");
        }
    }

    fn release(&mut self) {
        if let Some(mut checkout) = self.checkout.take() {
            checkout.release();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.tx.is_some() {
            // sqlx rolls the transaction back before the connection is reused.
            debug!(
                session_id = %self.id,
                state = %self.state,
                "Session dropped with an open transaction"
            );
        }
    }
}

fn generate_session_id() -> String {
    format!("ses_{}", Uuid::new_v4().simple())
}
