//! Transactional destinations for collected trends.
//!
//! A cycle opens one [`TrendBatch`], stages every record with
//! [`TrendBatch::add_many`] and then either commits or rolls back. Nothing
//! staged is visible to readers before a successful commit.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use trendscope_db::{insert_trends, DbError, NewTrend};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("transaction error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Failure reported by a non-database sink.
    #[error("sink error: {0}")]
    Backend(String),
}

/// One open unit of work.
#[async_trait]
pub trait TrendBatch: Send {
    /// Stage `trends`, returning the number of rows staged.
    async fn add_many(&mut self, trends: &[NewTrend]) -> Result<u64, PersistenceError>;

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError>;

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError>;
}

#[async_trait]
pub trait TrendSink: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn TrendBatch>, PersistenceError>;
}

/// Postgres sink; each batch is one database transaction.
#[derive(Debug, Clone)]
pub struct PgTrendSink {
    pool: PgPool,
    collection_run_id: Option<i64>,
}

impl PgTrendSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            collection_run_id: None,
        }
    }

    /// Tag every inserted row with the collection run that produced it.
    #[must_use]
    pub fn for_run(pool: PgPool, collection_run_id: i64) -> Self {
        Self {
            pool,
            collection_run_id: Some(collection_run_id),
        }
    }
}

struct PgTrendBatch {
    tx: Transaction<'static, Postgres>,
    collection_run_id: Option<i64>,
}

#[async_trait]
impl TrendSink for PgTrendSink {
    async fn begin(&self) -> Result<Box<dyn TrendBatch>, PersistenceError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTrendBatch {
            tx,
            collection_run_id: self.collection_run_id,
        }))
    }
}

#[async_trait]
impl TrendBatch for PgTrendBatch {
    async fn add_many(&mut self, trends: &[NewTrend]) -> Result<u64, PersistenceError> {
        Ok(insert_trends(&mut *self.tx, self.collection_run_id, trends).await?)
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// In-memory sink for dry runs and tests. Committed batches are appended to
/// a shared vector; staged records are discarded on rollback.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    committed: Arc<Mutex<Vec<NewTrend>>>,
    fail_on_commit: bool,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every commit fails, for exercising rollback paths.
    #[must_use]
    pub fn failing_on_commit() -> Self {
        Self {
            fail_on_commit: true,
            ..Self::default()
        }
    }

    /// Snapshot of everything committed so far.
    #[must_use]
    pub fn committed(&self) -> Vec<NewTrend> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct MemoryBatch {
    staged: Vec<NewTrend>,
    target: Arc<Mutex<Vec<NewTrend>>>,
    fail_on_commit: bool,
}

#[async_trait]
impl TrendSink for MemorySink {
    async fn begin(&self) -> Result<Box<dyn TrendBatch>, PersistenceError> {
        Ok(Box::new(MemoryBatch {
            staged: Vec::new(),
            target: Arc::clone(&self.committed),
            fail_on_commit: self.fail_on_commit,
        }))
    }
}

#[async_trait]
impl TrendBatch for MemoryBatch {
    async fn add_many(&mut self, trends: &[NewTrend]) -> Result<u64, PersistenceError> {
        self.staged.extend_from_slice(trends);
        Ok(trends.len() as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), PersistenceError> {
        if self.fail_on_commit {
            return Err(PersistenceError::Backend(
                "commit rejected by memory sink".to_string(),
            ));
        }
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(self.staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), PersistenceError> {
        Ok(())
    }
}
