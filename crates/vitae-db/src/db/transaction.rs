//! Database transaction utilities
//!
//! Claim and finalize both need a row lock and a conditional write to land together,
//! so they run through a [`TransactionGuard`] and end with [`TransactionGuard::finish`].

use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::ops::{Deref, DerefMut};
use vitae_core::{PipelineError, PipelineResult};

/// A database transaction wrapper that logs when it is dropped unfinished
///
/// # Example
///
/// ```ignore
/// use vitae_db::db::transaction::TransactionGuard;
///
/// async fn example(pool: &sqlx::PgPool) -> vitae_core::PipelineResult<()> {
///     let mut tx = TransactionGuard::begin(pool, "example").await?;
///     let result = do_work(tx.conn()).await;
///     tx.finish(result).await
/// }
/// ```
pub struct TransactionGuard {
    transaction: Option<Transaction<'static, Postgres>>,
    label: &'static str,
}

impl TransactionGuard {
    /// Begin a new database transaction
    ///
    /// Failing to open a transaction at all is logged at error level here, since
    /// callers only see it as one more recoverable database error.
    pub async fn begin(pool: &PgPool, label: &'static str) -> PipelineResult<Self> {
        let transaction = pool.begin().await.map_err(|e| {
            tracing::error!(error = %e, operation = label, "Failed to begin database transaction");
            PipelineError::Database(e)
        })?;

        Ok(Self {
            transaction: Some(transaction),
            label,
        })
    }

    /// The connection the transaction runs on
    pub fn conn(&mut self) -> &mut PgConnection {
        let tx: &mut Transaction<'static, Postgres> = self;
        &mut **tx
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> PipelineResult<()> {
        if let Some(tx) = self.transaction.take() {
            tx.commit().await.map_err(|e| {
                tracing::error!(error = %e, operation = self.label, "Failed to commit database transaction");
                PipelineError::Database(e)
            })?;
        }
        Ok(())
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> PipelineResult<()> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    /// Commit when `result` is `Ok`, roll back when it is `Err`.
    ///
    /// The original error wins over a rollback failure.
    pub async fn finish<T>(self, result: PipelineResult<T>) -> PipelineResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                let label = self.label;
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!(
                        error = %rollback_err,
                        operation = label,
                        "Rollback failed after error"
                    );
                }
                Err(e)
            }
        }
    }
}

impl Deref for TransactionGuard {
    type Target = Transaction<'static, Postgres>;

    fn deref(&self) -> &Self::Target {
        self.transaction
            .as_ref()
            .expect("Transaction was already committed or rolled back")
    }
}

impl DerefMut for TransactionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.transaction
            .as_mut()
            .expect("Transaction was already committed or rolled back")
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        // sqlx rolls back an unfinished transaction when it is dropped
        if self.transaction.is_some() {
            tracing::warn!(
                operation = self.label,
                "Transaction was dropped without explicit commit or rollback - rolling back"
            );
        }
    }
}
