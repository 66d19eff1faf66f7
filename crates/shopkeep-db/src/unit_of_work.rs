//! # Unit of Work
//!
//! One atomic commit-or-rollback scope shared by every ledger write.
//!
//! ## Why A Write Lock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite has no SELECT ... FOR UPDATE. Two debits racing:               │
//! │                                                                         │
//! │   task A: SELECT balance → 500        task B: SELECT balance → 500     │
//! │   task A: INSERT -400                 task B: INSERT -400              │
//! │                                       balance = -300   ✗               │
//! │                                                                         │
//! │  With the unit of work:                                                │
//! │                                                                         │
//! │   task A: lock ─► BEGIN ─► check ─► INSERT ─► COMMIT ─► unlock         │
//! │   task B:        (waits on lock) ─────────────────────► lock ─► BEGIN  │
//! │                                             check → 100 ─► Insufficient│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is an async mutex owned by [`Database`](crate::Database), so it
//! serialises writers across every clone of the handle. Reads outside a unit
//! of work go straight to the pool.
//!
//! ## Rules
//! - Inside a unit of work, only [`UnitOfWork::conn`] may be used. Going back
//!   to the pool can deadlock a single-connection (in-memory) database.
//! - Dropping a unit of work without calling [`UnitOfWork::commit`] rolls the
//!   transaction back before the lock is released.

use std::fmt::Display;
use std::sync::Arc;

use sqlx::sqlite::SqliteConnection;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// A transaction that holds the database write lock.
///
/// Field order matters: `tx` drops (rolls back) before `_guard` unlocks.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedMutexGuard<()>,
    label: &'static str,
}

impl UnitOfWork {
    /// Waits for the write lock, then opens a transaction.
    pub(crate) async fn begin(
        pool: &SqlitePool,
        write_lock: Arc<Mutex<()>>,
        label: &'static str,
    ) -> DbResult<Self> {
        let guard = write_lock.lock_owned().await;
        let tx = pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(unit = label, "Unit of work started");

        Ok(UnitOfWork {
            tx,
            _guard: guard,
            label,
        })
    }

    /// The connection every statement of this unit of work runs on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub async fn commit(self) -> DbResult<()> {
        let label = self.label;
        self.tx.commit().await.map_err(DbError::from)?;
        debug!(unit = label, "Unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> DbResult<()> {
        let label = self.label;
        self.tx.rollback().await.map_err(DbError::from)?;
        debug!(unit = label, "Unit of work rolled back");
        Ok(())
    }

    /// Commits on `Ok`, rolls back on `Err`.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let mut uow = db.begin("add_sale").await?;
    /// let result = add_sale_in(uow.conn(), &input).await;
    /// uow.finish(result).await
    /// ```
    ///
    /// A failed rollback is logged; the original error is what the caller
    /// gets back (SQLite discards the transaction when the connection drops
    /// it either way).
    pub async fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<DbError> + Display,
    {
        match result {
            Ok(value) => {
                self.commit().await.map_err(E::from)?;
                Ok(value)
            }
            Err(err) => {
                let label = self.label;
                warn!(unit = label, error = %err, "Rolling back unit of work");
                if let Err(rollback_err) = self.rollback().await {
                    warn!(unit = label, error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::error::LedgerError;
    use crate::pool::{Database, DbConfig};

    async fn count_wholesalers(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM wholesalers")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn insert_wholesaler(conn: &mut sqlx::SqliteConnection, id: &str) {
        sqlx::query("INSERT INTO wholesalers (id, name, created_at) VALUES (?, 'Acme', ?)")
            .bind(id)
            .bind(chrono::Utc::now())
            .execute(conn)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_finish_commits_ok() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut uow = db.begin("test_commit").await.unwrap();
        insert_wholesaler(uow.conn(), "w-1").await;
        let result: Result<(), LedgerError> = Ok(());
        uow.finish(result).await.unwrap();

        assert_eq!(count_wholesalers(&db).await, 1);
    }

    #[tokio::test]
    async fn test_finish_rolls_back_err() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut uow = db.begin("test_rollback").await.unwrap();
        insert_wholesaler(uow.conn(), "w-1").await;
        let result: Result<(), LedgerError> =
            Err(LedgerError::ConcurrentModification("test".to_string()));
        assert!(uow.finish(result).await.is_err());

        assert_eq!(count_wholesalers(&db).await, 0);
    }

    #[tokio::test]
    async fn test_drop_rolls_back_and_releases_lock() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut uow = db.begin("test_drop").await.unwrap();
            insert_wholesaler(uow.conn(), "w-1").await;
        }

        // The lock is free again and nothing was written
        let uow = db.begin("test_after_drop").await.unwrap();
        uow.commit().await.unwrap();
        assert_eq!(count_wholesalers(&db).await, 0);
    }
}
