//! Stored cross-platform analysis reports (`trend_analyses`).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendAnalysisRow {
    pub id: i64,
    pub public_id: Uuid,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub trends_analyzed: i32,
    pub report: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Persist one analysis report covering `[window_start, window_end]`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_trend_analysis(
    pool: &PgPool,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    trends_analyzed: i32,
    report: &serde_json::Value,
) -> Result<TrendAnalysisRow, DbError> {
    let row = sqlx::query_as::<_, TrendAnalysisRow>(
        "INSERT INTO trend_analyses (public_id, window_start, window_end, trends_analyzed, report) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, public_id, window_start, window_end, trends_analyzed, report, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(window_start)
    .bind(window_end)
    .bind(trends_analyzed)
    .bind(report)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// The newest stored report, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_trend_analysis(pool: &PgPool) -> Result<Option<TrendAnalysisRow>, DbError> {
    let row = sqlx::query_as::<_, TrendAnalysisRow>(
        "SELECT id, public_id, window_start, window_end, trends_analyzed, report, created_at \
         FROM trend_analyses \
         ORDER BY created_at DESC, id DESC \
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
