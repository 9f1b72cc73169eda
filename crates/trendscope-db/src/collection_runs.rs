//! Bookkeeping for scheduled and manual runs (`collection_runs`).
//!
//! A run moves `queued` → `running` → `succeeded` | `failed`; each transition
//! is guarded on the current status so a run cannot be completed twice.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

pub const RUN_TYPE_TRENDS: &str = "trends";
pub const RUN_TYPE_ANALYSIS: &str = "analysis";
pub const RUN_TYPE_RETENTION: &str = "retention";
pub const RUN_TYPE_METRICS: &str = "metrics";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub run_type: String,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Creates a new run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a `run_type` or
/// `trigger_source` rejected by the table's check constraints).
pub async fn create_collection_run(
    pool: &PgPool,
    run_type: &str,
    trigger_source: &str,
) -> Result<CollectionRunRow, DbError> {
    let row = sqlx::query_as::<_, CollectionRunRow>(
        "INSERT INTO collection_runs (public_id, run_type, trigger_source, status) \
         VALUES ($1, $2, $3, 'queued') \
         RETURNING id, public_id, run_type, trigger_source, status, \
                   started_at, completed_at, records_processed, error_message, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(run_type)
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a queued run as `running`.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// queued, or [`DbError::Sqlx`] if the update fails.
pub async fn start_collection_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a running run as `succeeded` with its processed-record count.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// running, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_collection_run(
    pool: &PgPool,
    id: i64,
    records_processed: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = 'succeeded', completed_at = NOW(), records_processed = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(records_processed)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a running run as `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidCollectionRunTransition`] if the run is not
/// running, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_collection_run(
    pool: &PgPool,
    id: i64,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE collection_runs \
         SET status = 'failed', completed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCollectionRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no run has this `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_run(pool: &PgPool, id: i64) -> Result<CollectionRunRow, DbError> {
    sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, run_type, trigger_source, status, \
                started_at, completed_at, records_processed, error_message, created_at \
         FROM collection_runs \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_collection_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<CollectionRunRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectionRunRow>(
        "SELECT id, public_id, run_type, trigger_source, status, \
                started_at, completed_at, records_processed, error_message, created_at \
         FROM collection_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
