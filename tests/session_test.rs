//! Integration tests for session lifecycle and unit-of-work semantics.

use record_store::config::PoolOptions;
use record_store::db::{ConnectionPool, Repository, SessionFactory, SessionState, WriteKind};
use record_store::error::{DatabaseErrorKind, DbError};
use record_store::models::{NewUser, User, UserPatch};
use std::time::Duration;
use uuid::Uuid;

async fn setup(dir: &tempfile::TempDir) -> (ConnectionPool, SessionFactory) {
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("session.db").display());
    let pool = ConnectionPool::initialize(
        &url,
        PoolOptions::default()
            .with_pool_size(2)
            .with_max_overflow(2)
            .with_acquire_timeout(Duration::from_secs(5)),
    )
    .await
    .unwrap();
    let factory = SessionFactory::new(pool.clone());
    Repository::<User>::new(factory.clone())
        .ensure_table()
        .await
        .unwrap();
    (pool, factory)
}

#[tokio::test]
async fn test_flushed_writes_visible_only_inside_session() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;
    let id = Uuid::new_v4();

    let mut writer = factory.scoped_session().await.unwrap();
    writer
        .add::<User>(id, &NewUser::new("a@x.com", "h1", "A"))
        .unwrap();

    // Staged but unflushed: not visible even to the same session.
    assert_eq!(writer.pending_writes().len(), 1);
    assert_eq!(writer.pending_writes()[0].kind, WriteKind::Insert);
    assert!(writer.get::<User>(id).await.unwrap().is_none());

    assert_eq!(writer.flush().await.unwrap(), vec![1]);
    assert!(writer.pending_writes().is_empty());
    let inside = writer.get::<User>(id).await.unwrap().unwrap();
    assert_eq!(inside.email, "a@x.com");

    let mut reader = factory.scoped_session().await.unwrap();
    assert!(reader.get::<User>(id).await.unwrap().is_none());
    reader.close().await;

    writer.commit().await.unwrap();
    assert_eq!(writer.state(), SessionState::Committed);

    let mut reader = factory.scoped_session().await.unwrap();
    assert_eq!(reader.get::<User>(id).await.unwrap(), Some(inside));
    reader.close().await;

    writer.close().await;
    assert_eq!(pool.checked_out(), 0);
    pool.dispose().await;
}

#[tokio::test]
async fn test_rollback_discards_flushed_and_staged_writes() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;
    let flushed = Uuid::new_v4();
    let staged = Uuid::new_v4();

    let mut session = factory.scoped_session().await.unwrap();
    session
        .add::<User>(flushed, &NewUser::new("a@x.com", "h1", "A"))
        .unwrap();
    session.flush().await.unwrap();
    session
        .add::<User>(staged, &NewUser::new("b@x.com", "h2", "B"))
        .unwrap();
    session.rollback().await.unwrap();
    assert_eq!(session.state(), SessionState::RolledBack);
    assert_eq!(pool.checked_out(), 0);

    let mut check = factory.scoped_session().await.unwrap();
    assert!(check.get::<User>(flushed).await.unwrap().is_none());
    assert!(check.get::<User>(staged).await.unwrap().is_none());
    check.close().await;

    pool.dispose().await;
}

#[tokio::test]
async fn test_finished_session_rejects_data_operations() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;

    let mut session = factory.scoped_session().await.unwrap();
    session.commit().await.unwrap();

    let err = session.get::<User>(Uuid::new_v4()).await.unwrap_err();
    match &err {
        DbError::SessionClosed { session_id, .. } => assert_eq!(session_id, session.id()),
        other => panic!("expected SessionClosed, got {other:?}"),
    }
    assert!(matches!(
        session.add::<User>(Uuid::new_v4(), &NewUser::new("a@x.com", "h", "A")),
        Err(DbError::SessionClosed { .. })
    ));
    assert!(matches!(
        session.commit().await,
        Err(DbError::SessionClosed { .. })
    ));
    // Rolling back a finished transaction has nothing to undo.
    session.rollback().await.unwrap();

    session.close().await;
    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(
        session.rollback().await,
        Err(DbError::SessionClosed { .. })
    ));
    assert!(matches!(
        session.begin().await,
        Err(DbError::SessionClosed { .. })
    ));

    pool.dispose().await;
}

#[tokio::test]
async fn test_session_must_begin_before_use() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;

    let mut session = factory.session();
    assert_eq!(session.state(), SessionState::Created);
    assert_eq!(pool.checked_out(), 0);
    assert!(matches!(
        session.flush().await,
        Err(DbError::InvalidInput { .. })
    ));

    session.begin().await.unwrap();
    assert_eq!(pool.checked_out(), 1);
    assert!(matches!(
        session.begin().await,
        Err(DbError::InvalidInput { .. })
    ));

    session.close().await;
    assert_eq!(pool.checked_out(), 0);
    pool.dispose().await;
}

#[tokio::test]
async fn test_failed_flush_forces_rollback_on_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;

    let mut session = factory.scoped_session().await.unwrap();
    session
        .add::<User>(Uuid::new_v4(), &NewUser::new("a@x.com", "h1", "A"))
        .unwrap();
    session
        .add::<User>(Uuid::new_v4(), &NewUser::new("a@x.com", "h2", "B"))
        .unwrap();

    let err = session.flush().await.unwrap_err();
    assert_eq!(err.database_kind(), Some(DatabaseErrorKind::UniqueViolation));

    let err = session.commit().await.unwrap_err();
    assert!(matches!(err, DbError::Persistence { .. }));
    assert_eq!(session.state(), SessionState::RolledBack);
    assert_eq!(pool.checked_out(), 0);

    let users = Repository::<User>::new(factory.clone());
    assert!(users.list(Default::default()).await.unwrap().is_empty());

    pool.dispose().await;
}

#[tokio::test]
async fn test_commit_with_failing_staged_writes_is_persistence_error() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;

    let mut session = factory.scoped_session().await.unwrap();
    session
        .add::<User>(Uuid::new_v4(), &NewUser::new("a@x.com", "h1", "A"))
        .unwrap();
    session
        .add::<User>(Uuid::new_v4(), &NewUser::new("a@x.com", "h2", "B"))
        .unwrap();

    let err = session.commit().await.unwrap_err();
    assert!(matches!(err, DbError::Persistence { .. }));
    assert!(err.is_unique_violation());
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(session.state(), SessionState::RolledBack);
    assert_eq!(pool.checked_out(), 0);

    let users = Repository::<User>::new(factory.clone());
    assert!(users.list(Default::default()).await.unwrap().is_empty());

    pool.dispose().await;
}

#[tokio::test]
async fn test_commit_flushes_staged_writes() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;
    let id = Uuid::new_v4();

    let mut session = factory.scoped_session().await.unwrap();
    session
        .add::<User>(id, &NewUser::new("a@x.com", "h1", "A"))
        .unwrap();
    session.flush().await.unwrap();
    session
        .stage_update::<User>(
            id,
            &UserPatch {
                name: Some("Ann".to_string()),
                ..UserPatch::default()
            },
        )
        .unwrap();
    session.commit().await.unwrap();
    session.close().await;

    let users = Repository::<User>::new(factory);
    let user = users.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(user.name, "Ann");
    assert!(user.meta.updated_at > user.meta.created_at);

    pool.dispose().await;
}

#[tokio::test]
async fn test_dropped_session_rolls_back_and_releases() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;
    let id = Uuid::new_v4();

    {
        let mut session = factory.scoped_session().await.unwrap();
        session
            .add::<User>(id, &NewUser::new("a@x.com", "h1", "A"))
            .unwrap();
        session.flush().await.unwrap();
    }
    assert_eq!(pool.checked_out(), 0);

    // A cancelled unit of work releases its connection the same way.
    let cancelled = tokio::time::timeout(Duration::from_millis(50), async {
        let mut session = factory.scoped_session().await.unwrap();
        session
            .add::<User>(Uuid::new_v4(), &NewUser::new("b@x.com", "h2", "B"))
            .unwrap();
        session.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        session.commit().await
    })
    .await;
    assert!(cancelled.is_err());
    assert_eq!(pool.checked_out(), 0);

    let users = Repository::<User>::new(factory);
    assert!(users.get_by_id(id).await.unwrap().is_none());
    assert!(users.list(Default::default()).await.unwrap().is_empty());

    pool.dispose().await;
}

#[tokio::test]
async fn test_session_fails_after_pool_disposed() {
    let dir = tempfile::tempdir().unwrap();
    let (pool, factory) = setup(&dir).await;

    let mut session = factory.scoped_session().await.unwrap();
    pool.dispose().await;

    assert!(matches!(
        session.get::<User>(Uuid::new_v4()).await,
        Err(DbError::Connection { .. })
    ));
    assert!(matches!(
        factory.scoped_session().await,
        Err(DbError::Connection { .. })
    ));

    session.close().await;
    assert_eq!(pool.checked_out(), 0);
}
