//! Storage for collected trend snapshots (`trends`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use trendscope_core::{PerformanceLevel, Platform, TrendItem};

use crate::DbError;

/// Why a collected item could not be turned into a storable record.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {reason}")]
pub struct TrendMappingError {
    pub field: &'static str,
    pub reason: String,
}

impl TrendMappingError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A validated record ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrend {
    pub platform: Platform,
    pub external_id: String,
    pub keyword: String,
    pub category: String,
    pub volume: i64,
    pub metrics: BTreeMap<String, u64>,
    pub engagement_rate: f64,
    pub performance_level: PerformanceLevel,
    pub growth_rate: f64,
    pub sentiment_score: f64,
    pub hashtags: Vec<String>,
    pub related_keywords: Vec<String>,
    pub detected_at: DateTime<Utc>,
}

impl TryFrom<&TrendItem> for NewTrend {
    type Error = TrendMappingError;

    fn try_from(item: &TrendItem) -> Result<Self, Self::Error> {
        let external_id = item.external_id.trim();
        if external_id.is_empty() {
            return Err(TrendMappingError::new("external_id", "must not be empty"));
        }

        let volume = i64::try_from(item.volume).map_err(|_| {
            TrendMappingError::new("volume", format!("{} does not fit in BIGINT", item.volume))
        })?;

        if !item.engagement_rate.is_finite() || item.engagement_rate < 0.0 {
            return Err(TrendMappingError::new(
                "engagement_rate",
                format!("{} is not a finite non-negative rate", item.engagement_rate),
            ));
        }

        if !item.growth_rate.is_finite() {
            return Err(TrendMappingError::new(
                "growth_rate",
                format!("{} is not finite", item.growth_rate),
            ));
        }

        if !item.sentiment_score.is_finite() || !(-1.0..=1.0).contains(&item.sentiment_score) {
            return Err(TrendMappingError::new(
                "sentiment_score",
                format!("{} is outside [-1, 1]", item.sentiment_score),
            ));
        }

        let category = if item.category.trim().is_empty() {
            TrendItem::DEFAULT_CATEGORY.to_string()
        } else {
            item.category.clone()
        };

        Ok(Self {
            platform: item.platform,
            external_id: external_id.to_string(),
            keyword: item.keyword_or_title.clone(),
            category,
            volume,
            metrics: item.metrics.clone(),
            engagement_rate: item.engagement_rate,
            performance_level: item.performance_level,
            growth_rate: item.growth_rate,
            sentiment_score: item.sentiment_score,
            hashtags: item.hashtags.clone(),
            related_keywords: item.related_keywords.clone(),
            detected_at: item.detected_at,
        })
    }
}

/// Fresh engagement figures for an already stored trend.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendMetricsUpdate {
    pub metrics: BTreeMap<String, u64>,
    pub engagement_rate: f64,
    pub performance_level: PerformanceLevel,
    pub growth_rate: f64,
}

impl TrendMetricsUpdate {
    /// # Errors
    ///
    /// Returns [`TrendMappingError`] for a negative or non-finite engagement
    /// rate, or a non-finite growth rate.
    pub fn new(
        metrics: BTreeMap<String, u64>,
        engagement_rate: f64,
        performance_level: PerformanceLevel,
        growth_rate: f64,
    ) -> Result<Self, TrendMappingError> {
        if !engagement_rate.is_finite() || engagement_rate < 0.0 {
            return Err(TrendMappingError::new(
                "engagement_rate",
                format!("{engagement_rate} is not a finite non-negative rate"),
            ));
        }
        if !growth_rate.is_finite() {
            return Err(TrendMappingError::new(
                "growth_rate",
                format!("{growth_rate} is not finite"),
            ));
        }
        Ok(Self {
            metrics,
            engagement_rate,
            performance_level,
            growth_rate,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrendRow {
    pub id: i64,
    pub collection_run_id: Option<i64>,
    pub platform: String,
    pub external_id: String,
    pub keyword: String,
    pub category: String,
    pub volume: i64,
    pub metrics: Json<BTreeMap<String, u64>>,
    pub engagement_rate: f64,
    pub performance_level: String,
    pub growth_rate: f64,
    pub sentiment_score: f64,
    pub hashtags: Json<Vec<String>>,
    pub related_keywords: Json<Vec<String>>,
    pub detected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TrendRow {
    /// Convert back into the domain record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidTrendRow`] if a text column holds a value the
    /// domain enums do not recognize.
    pub fn into_trend_item(self) -> Result<TrendItem, DbError> {
        let id = self.id;
        let platform: Platform = self.platform.parse().map_err(|e| DbError::InvalidTrendRow {
            id,
            reason: format!("{e}"),
        })?;
        let performance_level = match self.performance_level.as_str() {
            "excellent" => PerformanceLevel::Excellent,
            "good" => PerformanceLevel::Good,
            "average" => PerformanceLevel::Average,
            "poor" => PerformanceLevel::Poor,
            other => {
                return Err(DbError::InvalidTrendRow {
                    id,
                    reason: format!("unknown performance level '{other}'"),
                })
            }
        };

        Ok(TrendItem {
            platform,
            external_id: self.external_id,
            keyword_or_title: self.keyword,
            category: self.category,
            volume: u64::try_from(self.volume).unwrap_or(0),
            metrics: self.metrics.0,
            engagement_rate: self.engagement_rate,
            performance_level,
            growth_rate: self.growth_rate,
            sentiment_score: self.sentiment_score,
            hashtags: self.hashtags.0,
            related_keywords: self.related_keywords.0,
            detected_at: self.detected_at,
        })
    }
}

const TREND_COLUMNS: &str = "id, collection_run_id, platform, external_id, keyword, category, \
     volume, metrics, engagement_rate, performance_level, growth_rate, sentiment_score, \
     hashtags, related_keywords, detected_at, created_at";

/// Insert a batch of trends on an existing connection.
///
/// Callers pass `&mut *tx` so the batch lands inside their transaction; this
/// function never commits.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on the first failing insert.
pub async fn insert_trends(
    conn: &mut PgConnection,
    collection_run_id: Option<i64>,
    trends: &[NewTrend],
) -> Result<u64, DbError> {
    let mut inserted = 0_u64;
    for trend in trends {
        let result = sqlx::query(
            "INSERT INTO trends \
                 (collection_run_id, platform, external_id, keyword, category, volume, metrics, \
                  engagement_rate, performance_level, growth_rate, sentiment_score, \
                  hashtags, related_keywords, detected_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(collection_run_id)
        .bind(trend.platform.as_str())
        .bind(&trend.external_id)
        .bind(&trend.keyword)
        .bind(&trend.category)
        .bind(trend.volume)
        .bind(Json(&trend.metrics))
        .bind(trend.engagement_rate)
        .bind(trend.performance_level.as_str())
        .bind(trend.growth_rate)
        .bind(trend.sentiment_score)
        .bind(Json(&trend.hashtags))
        .bind(Json(&trend.related_keywords))
        .bind(trend.detected_at)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

/// Overwrite the engagement figures of every stored snapshot of one item.
///
/// Runs on the caller's connection so a refresh can update many items in
/// one transaction. Returns the number of rows changed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_trend_metrics(
    conn: &mut PgConnection,
    ids: &[i64],
    update: &TrendMetricsUpdate,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE trends \
         SET metrics = $2, engagement_rate = $3, performance_level = $4, growth_rate = $5, \
             metrics_refreshed_at = NOW() \
         WHERE id = ANY($1)",
    )
    .bind(ids)
    .bind(Json(&update.metrics))
    .bind(update.engagement_rate)
    .bind(update.performance_level.as_str())
    .bind(update.growth_rate)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Most recent trends, newest first, optionally restricted to one platform.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_trends(
    pool: &PgPool,
    platform: Option<Platform>,
    limit: i64,
) -> Result<Vec<TrendRow>, DbError> {
    let sql = format!(
        "SELECT {TREND_COLUMNS} FROM trends \
         WHERE ($1::TEXT IS NULL OR platform = $1) \
         ORDER BY detected_at DESC, id DESC \
         LIMIT $2"
    );
    let rows = sqlx::query_as::<_, TrendRow>(&sql)
        .bind(platform.map(Platform::as_str))
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Every trend detected at or after `since`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_trends_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<TrendRow>, DbError> {
    let sql = format!(
        "SELECT {TREND_COLUMNS} FROM trends \
         WHERE detected_at >= $1 \
         ORDER BY detected_at ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, TrendRow>(&sql)
        .bind(since)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_trends(pool: &PgPool, platform: Option<Platform>) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM trends WHERE ($1::TEXT IS NULL OR platform = $1)",
    )
    .bind(platform.map(Platform::as_str))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Retention sweep: delete every trend detected before `cutoff`.
///
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn delete_trends_older_than(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, DbError> {
    let result = sqlx::query("DELETE FROM trends WHERE detected_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
