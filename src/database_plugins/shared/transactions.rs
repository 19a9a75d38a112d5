// ABOUTME: Transaction management with an RAII guard for multi-statement operations
// ABOUTME: Rolls back automatically on drop unless committed; used by archive-and-rotate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! RAII transaction guard
//!
//! ```text
//! let mut guard = TransactionGuard::new(pool.begin().await?);
//! sqlx::query("UPDATE conversations ...").execute(guard.executor()?).await?;
//! sqlx::query("INSERT INTO conversations ...").execute(guard.executor()?).await?;
//! guard.commit().await?;
//! ```
//!
//! If the guard is dropped before `commit()` (early return, `?`, or the caller's
//! future being cancelled) the transaction is rolled back by `SQLx`.

use sqlx::{Database, Transaction};
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};

/// RAII guard for database transactions ensuring automatic rollback on drop
pub struct TransactionGuard<'c, DB: Database> {
    transaction: Option<Transaction<'c, DB>>,
    committed: bool,
}

impl<'c, DB: Database> TransactionGuard<'c, DB> {
    /// Wrap a transaction obtained from `pool.begin()`
    #[must_use]
    pub fn new(transaction: Transaction<'c, DB>) -> Self {
        debug!("TransactionGuard created - transaction will auto-rollback if not committed");
        Self {
            transaction: Some(transaction),
            committed: false,
        }
    }

    /// Commit the transaction and consume the guard
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction was already consumed or the commit fails
    pub async fn commit(mut self) -> AppResult<()> {
        let tx = self
            .transaction
            .take()
            .ok_or_else(|| AppError::internal("Transaction already consumed - cannot commit"))?;
        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Transaction commit failed: {e}")))?;
        self.committed = true;
        debug!("TransactionGuard committed successfully");
        Ok(())
    }

    /// Explicitly roll back the transaction and consume the guard
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction was already consumed or the rollback fails
    pub async fn rollback(mut self) -> AppResult<()> {
        let tx = self
            .transaction
            .take()
            .ok_or_else(|| AppError::internal("Transaction already consumed - cannot rollback"))?;
        tx.rollback()
            .await
            .map_err(|e| AppError::database(format!("Transaction rollback failed: {e}")))?;
        debug!("TransactionGuard rolled back explicitly");
        Ok(())
    }

    /// Connection to run statements on inside the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the guard was already committed or rolled back
    pub fn executor(&mut self) -> AppResult<&mut <DB as Database>::Connection> {
        self.transaction.as_deref_mut().ok_or_else(|| {
            AppError::internal("Transaction already consumed - guard used after commit/rollback")
        })
    }
}

impl<DB: Database> Drop for TransactionGuard<'_, DB> {
    fn drop(&mut self) {
        if self.transaction.is_some() && !self.committed {
            warn!("TransactionGuard dropped without commit - transaction will be rolled back");
        }
    }
}

/// Type alias for `SQLite` transaction guard
pub type SqliteTransactionGuard<'c> = TransactionGuard<'c, sqlx::Sqlite>;

/// Type alias for `PostgreSQL` transaction guard
#[cfg(feature = "postgresql")]
pub type PostgresTransactionGuard<'c> = TransactionGuard<'c, sqlx::Postgres>;

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    async fn pool() -> sqlx::SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE items (name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    async fn count(pool: &sqlx::SqlitePool) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM items")
            .fetch_one(pool)
            .await
            .unwrap()
            .get("n")
    }

    #[tokio::test]
    async fn test_dropped_guard_rolls_back() {
        let pool = pool().await;
        {
            let mut guard: SqliteTransactionGuard = TransactionGuard::new(pool.begin().await.unwrap());
            sqlx::query("INSERT INTO items (name) VALUES ('a')")
                .execute(guard.executor().unwrap())
                .await
                .unwrap();
        }
        assert_eq!(count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_committed_guard_persists() {
        let pool = pool().await;
        let mut guard = TransactionGuard::new(pool.begin().await.unwrap());
        sqlx::query("INSERT INTO items (name) VALUES ('a')")
            .execute(guard.executor().unwrap())
            .await
            .unwrap();
        guard.commit().await.unwrap();
        assert_eq!(count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_explicit_rollback_discards_writes() {
        let pool = pool().await;
        let mut guard = TransactionGuard::new(pool.begin().await.unwrap());
        sqlx::query("INSERT INTO items (name) VALUES ('a')")
            .execute(guard.executor().unwrap())
            .await
            .unwrap();
        guard.rollback().await.unwrap();
        assert_eq!(count(&pool).await, 0);
    }
}
