//! Generic repository over a [`Record`] type.
//!
//! Each operation runs in its own scoped session: begin, work, commit. Any failure rolls
//! the session back, releases its connection, and is returned to the caller; pool and
//! session errors as they are, everything else as [`DbError::Persistence`].

use crate::db::schema::StatementBuilder;
use crate::db::session::{Session, SessionFactory};
use crate::error::{DbError, DbResult};
use crate::models::{Draft, Page, Record};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Source of ids for newly created records.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> Uuid;
}

/// Random (v4) UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn generate(&self) -> Uuid {
        Uuid::new_v4()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> Uuid + Send + Sync,
{
    fn generate(&self) -> Uuid {
        self()
    }
}

/// Create, read, update and delete records of type `R`.
pub struct Repository<R: Record> {
    sessions: SessionFactory,
    ids: Arc<dyn IdGenerator>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            ids: Arc::clone(&self.ids),
            _record: PhantomData,
        }
    }
}

impl<R: Record> std::fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("table", &R::table_name())
            .field("sessions", &self.sessions)
            .finish()
    }
}

impl<R: Record> Repository<R> {
    pub fn new(sessions: SessionFactory) -> Self {
        Self {
            sessions,
            ids: Arc::new(RandomIdGenerator),
            _record: PhantomData,
        }
    }

    /// Replace the id source, e.g. with a deterministic one in tests.
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn table_name(&self) -> String {
        R::table_name()
    }

    pub fn sessions(&self) -> &SessionFactory {
        &self.sessions
    }

    /// Create the record's table if it does not exist.
    pub async fn ensure_table(&self) -> DbResult<()> {
        let mut session = self.sessions.scoped_session().await?;
        let outcome = match StatementBuilder::new(session.db_type()).create_table::<R>() {
            Ok(ddl) => session.execute(&ddl).await.map(|_| ()),
            Err(err) => Err(err),
        };
        self.finish(session, outcome, "ensure_table").await?;
        info!(table = %R::table_name(), "Table ready");
        Ok(())
    }

    /// Load a record by id; `None` if no row has that id.
    pub async fn get_by_id(&self, id: Uuid) -> DbResult<Option<R>> {
        let mut session = self.sessions.scoped_session().await?;
        let outcome = session.get::<R>(id).await;
        let found = self.finish_read(session, outcome, "get_by_id").await?;
        debug!(table = %R::table_name(), %id, found = found.is_some(), "Loaded record");
        Ok(found)
    }

    /// Insert a record and return it with its id and store-assigned timestamps.
    ///
    /// Uses the draft's id when it has one, otherwise a generated one.
    pub async fn create(&self, draft: R::Draft) -> DbResult<R> {
        let id = draft.id().unwrap_or_else(|| self.ids.generate());
        let mut session = self.sessions.scoped_session().await?;
        let outcome = async {
            session.add::<R>(id, &draft)?;
            session.flush().await?;
            session.get::<R>(id).await?.ok_or_else(|| {
                DbError::internal(format!("Inserted row {} is not visible", id))
            })
        }
        .await;
        let record = self.finish(session, outcome, "create").await?;
        info!(table = %R::table_name(), %id, "Record created");
        Ok(record)
    }

    /// Apply `patch` and return the updated record; `None` if no row has that id.
    pub async fn update(&self, id: Uuid, patch: R::Patch) -> DbResult<Option<R>> {
        let mut session = self.sessions.scoped_session().await?;
        let outcome = async {
            session.stage_update::<R>(id, &patch)?;
            let affected = session.flush().await?;
            if affected.first().copied().unwrap_or(0) == 0 {
                return Ok(None);
            }
            session.get::<R>(id).await
        }
        .await;
        let updated = self.finish(session, outcome, "update").await?;
        if updated.is_some() {
            info!(table = %R::table_name(), %id, "Record updated");
        }
        Ok(updated)
    }

    /// Delete a record. Returns whether a row was removed.
    pub async fn delete(&self, id: Uuid) -> DbResult<bool> {
        let mut session = self.sessions.scoped_session().await?;
        let outcome = async {
            session.stage_delete::<R>(id)?;
            let affected = session.flush().await?;
            Ok::<_, DbError>(affected.first().copied().unwrap_or(0) > 0)
        }
        .await;
        let deleted = self.finish(session, outcome, "delete").await?;
        if deleted {
            info!(table = %R::table_name(), %id, "Record deleted");
        }
        Ok(deleted)
    }

    /// One page of records, oldest first.
    pub async fn list(&self, page: Page) -> DbResult<Vec<R>> {
        let mut session = self.sessions.scoped_session().await?;
        let outcome = session.list::<R>(page).await;
        self.finish_read(session, outcome, "list").await
    }

    /// Commit on success; roll back on failure. Either way the connection is released.
    async fn finish<T>(
        &self,
        mut session: Session,
        outcome: DbResult<T>,
        action: &str,
    ) -> DbResult<T> {
        let result = match outcome {
            Ok(value) => session.commit().await.map(|()| value),
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!(session_id = %session.id(), error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        };
        session.close().await;
        result.map_err(|err| self.failure(action, err))
    }

    /// Reads never commit; closing rolls the transaction back.
    async fn finish_read<T>(
        &self,
        mut session: Session,
        outcome: DbResult<T>,
        action: &str,
    ) -> DbResult<T> {
        session.close().await;
        outcome.map_err(|err| self.failure(action, err))
    }

    fn failure(&self, action: &str, err: DbError) -> DbError {
        warn!(table = %R::table_name(), action, error = %err, "Repository operation failed");
        DbError::persistence(format!("{} on {} failed", action, R::table_name()), err)
    }
}
