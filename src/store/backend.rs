//! libSQL store — connection handling and transaction scope.
//!
//! Repository operations live in [`super::repo`] and take an explicit
//! `&Connection`, so the same function runs against the base connection
//! (pre-flight reads) or inside a [`StoreTransaction`] (onboarding writes).

use std::path::Path;
use std::sync::Arc;

use libsql::{Connection, Database as LibSqlDatabase, Transaction, TransactionBehavior};
use tracing::info;

use crate::error::DatabaseError;
use crate::store::migrations;

/// libSQL-backed store.
///
/// Holds a single connection reused for all non-transactional operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    /// Serializes transactions. libsql transactions are connection-scoped
    /// and the base connection is shared, so at most one may be open.
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");

        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Connection for non-transactional reads and writes.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Wait for any in-flight transaction to finish and keep new ones out
    /// for the guard's lifetime.
    ///
    /// Statements on a connection join whatever transaction is open on it,
    /// so a read on the base connection during another task's transaction
    /// would see its uncommitted rows. Readers that must only see committed
    /// state take this guard first.
    pub async fn read_guard(&self) -> ReadGuard {
        ReadGuard {
            _guard: Arc::clone(&self.write_lock).lock_owned().await,
        }
    }

    /// Begin an atomic unit of work.
    ///
    /// Waits for any in-flight transaction to finish, then starts an
    /// IMMEDIATE transaction so the write lock is held for the whole scope.
    /// The returned guard rolls back on drop unless committed.
    pub async fn begin(&self) -> Result<StoreTransaction, DatabaseError> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(|e| DatabaseError::Transaction(format!("begin: {e}")))?;
        Ok(StoreTransaction { tx, _guard: guard })
    }
}

/// Holds the store-wide write lock without opening a transaction, shielding
/// base-connection reads from in-flight transactions.
pub struct ReadGuard {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

/// An open transaction plus the store-wide write lock.
///
/// Dropping without `commit` rolls everything back (libsql issues the
/// ROLLBACK in the transaction's drop), so an early `?` return or a panic
/// can never leave partial writes behind.
pub struct StoreTransaction {
    tx: Transaction,
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

impl StoreTransaction {
    /// The transaction's connection, for passing to repository operations.
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    pub async fn commit(self) -> Result<(), DatabaseError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("commit: {e}")))
    }

    pub async fn rollback(self) -> Result<(), DatabaseError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("rollback: {e}")))
    }
}

/// Map a libsql write error, classifying unique-constraint violations.
///
/// SQLite reports these as `UNIQUE constraint failed: table.col[, table.col]`;
/// the table prefix is stripped so callers see just the field names.
pub(crate) fn map_write_error(op: &str, e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if let Some(rest) = msg.split("UNIQUE constraint failed: ").nth(1) {
        let fields = rest
            .trim()
            .trim_end_matches(')')
            .split(", ")
            .map(|col| col.rsplit('.').next().unwrap_or(col).trim())
            .collect::<Vec<_>>()
            .join(", ");
        return DatabaseError::Constraint(fields);
    }
    DatabaseError::Query(format!("{op}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::repo;

    #[tokio::test]
    async fn guarded_reads_never_see_uncommitted_writes() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());

        let tx = store.begin().await.unwrap();
        let client = repo::create_client(tx.conn(), "Acme", crate::model::ClientType::Organization)
            .await
            .unwrap();
        repo::create_client_phone(tx.conn(), &client.id, "555", None)
            .await
            .unwrap();

        // A guarded reader must block behind the open transaction instead
        // of observing the ownerless client or the phone claim.
        let reader = tokio::spawn({
            let store = Arc::clone(&store);
            let client_id = client.id.clone();
            async move {
                let _guard = store.read_guard().await;
                let client = repo::find_client(store.conn(), &client_id).await.unwrap();
                let phone = repo::find_client_phone_by_number(store.conn(), "555")
                    .await
                    .unwrap();
                (client, phone)
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!reader.is_finished(), "reader must wait for the transaction");

        tx.rollback().await.unwrap();
        let (client, phone) = reader.await.unwrap();
        assert!(client.is_none(), "rolled-back client must not be visible");
        assert!(phone.is_none(), "rolled-back phone claim must not be visible");
    }

    #[tokio::test]
    async fn guarded_reads_see_committed_writes() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());

        let tx = store.begin().await.unwrap();
        let client = repo::create_client(tx.conn(), "Acme", crate::model::ClientType::Individual)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let _guard = store.read_guard().await;
        let found = repo::find_client(store.conn(), &client.id).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn local_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");

        let client_id = {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            repo::create_client(store.conn(), "Acme", crate::model::ClientType::Organization)
                .await
                .unwrap()
                .id
        };

        let store = LibSqlStore::new_local(&path).await.unwrap();
        let found = repo::find_client(store.conn(), &client_id).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn begin_commit_persists_writes() {
        let store = LibSqlStore::new_memory().await.unwrap();

        let tx = store.begin().await.unwrap();
        let client = repo::create_client(tx.conn(), "Acme", crate::model::ClientType::Organization)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let found = repo::find_client(store.conn(), &client.id).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let store = LibSqlStore::new_memory().await.unwrap();

        let tx = store.begin().await.unwrap();
        let client = repo::create_client(tx.conn(), "Acme", crate::model::ClientType::Individual)
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        let found = repo::find_client(store.conn(), &client.id).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn drop_without_commit_rolls_back() {
        let store = LibSqlStore::new_memory().await.unwrap();

        let client_id = {
            let tx = store.begin().await.unwrap();
            let client = repo::create_client(tx.conn(), "Acme", crate::model::ClientType::Individual)
                .await
                .unwrap();
            client.id
            // tx dropped here
        };

        let found = repo::find_client(store.conn(), &client_id).await.unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn unique_violation_maps_to_constraint_with_field_name() {
        let e = libsql::Error::SqliteFailure(
            2067,
            "UNIQUE constraint failed: users.email".to_string(),
        );
        match map_write_error("create_user", e) {
            DatabaseError::Constraint(fields) => assert_eq!(fields, "email"),
            other => panic!("expected Constraint, got {other:?}"),
        }
    }

    #[test]
    fn composite_unique_violation_lists_all_fields() {
        let e = libsql::Error::SqliteFailure(
            2067,
            "UNIQUE constraint failed: agent_channels.client_id, agent_channels.agent_id, agent_channels.channel_id"
                .to_string(),
        );
        match map_write_error("create_agent_channel", e) {
            DatabaseError::Constraint(fields) => {
                assert_eq!(fields, "client_id, agent_id, channel_id")
            }
            other => panic!("expected Constraint, got {other:?}"),
        }
    }

    #[test]
    fn other_errors_map_to_query() {
        let e = libsql::Error::SqliteFailure(1, "no such table: nope".to_string());
        match map_write_error("find_agent", e) {
            DatabaseError::Query(msg) => assert!(msg.contains("find_agent")),
            other => panic!("expected Query, got {other:?}"),
        }
    }
}
