//! Tracked runs shared by the CLI and the scheduler.
//!
//! Each job records a `collection_runs` row (create → start → complete or
//! fail). Marking a run failed is best effort: the caller sees the job's
//! own error.

use std::collections::BTreeMap;

use chrono::{Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use sqlx::PgPool;
use thiserror::Error;
use trendscope_core::Platform;
use trendscope_db::collection_runs::{
    RUN_TYPE_ANALYSIS, RUN_TYPE_METRICS, RUN_TYPE_RETENTION, RUN_TYPE_TRENDS,
};
use trendscope_db::{DbError, TrendMetricsUpdate};

use crate::analysis::{analyze_trends, AnalysisReport};
use crate::manager::{CollectorManager, PersistReport};
use crate::sink::{PersistenceError, PgTrendSink};

pub const TRIGGER_CLI: &str = "cli";
pub const TRIGGER_SCHEDULER: &str = "scheduler";

/// Trends detected this recently get their engagement refreshed.
pub const METRICS_REFRESH_WINDOW_HOURS: i64 = 24;
const METRICS_REFRESH_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("all {0} active collectors failed")]
    AllCollectorsFailed(usize),

    #[error("failed to encode analysis report: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug)]
pub struct AnalysisSummary {
    pub run_id: i64,
    pub analysis_id: i64,
    pub report: AnalysisReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsRefreshReport {
    pub run_id: i64,
    /// Distinct items looked up upstream.
    pub items: usize,
    pub refreshed: usize,
    pub failed: usize,
    /// Items whose platform has no configured adapter.
    pub skipped: usize,
    pub rows_updated: u64,
}

async fn fail_run_best_effort(
    pool: &PgPool,
    run_id: i64,
    run_type: &'static str,
    message: &str,
) {
    if let Err(mark_err) = trendscope_db::fail_collection_run(pool, run_id, message).await {
        tracing::error!(
            run_id,
            error = %mark_err,
            "failed to mark {run_type} run as failed"
        );
    }
}

async fn open_run(pool: &PgPool, run_type: &'static str, trigger: &str) -> Result<i64, JobError> {
    let run = trendscope_db::create_collection_run(pool, run_type, trigger).await?;
    if let Err(e) = trendscope_db::start_collection_run(pool, run.id).await {
        fail_run_best_effort(pool, run.id, run_type, &e.to_string()).await;
        return Err(e.into());
    }
    Ok(run.id)
}

async fn close_run(
    pool: &PgPool,
    run_id: i64,
    run_type: &'static str,
    records: u64,
) -> Result<(), JobError> {
    let records = i32::try_from(records).unwrap_or(i32::MAX);
    if let Err(e) = trendscope_db::complete_collection_run(pool, run_id, records).await {
        fail_run_best_effort(pool, run_id, run_type, &e.to_string()).await;
        return Err(e.into());
    }
    Ok(())
}

/// Run one collection cycle and persist it in a single transaction tagged
/// with a new run.
///
/// # Errors
///
/// Returns [`JobError::AllCollectorsFailed`] when every active collector
/// failed, or a database/persistence error. The run is marked failed in
/// each case.
pub async fn run_trend_collection(
    pool: &PgPool,
    manager: &CollectorManager,
    trigger: &str,
) -> Result<PersistReport, JobError> {
    let run_id = open_run(pool, RUN_TYPE_TRENDS, trigger).await?;
    tracing::info!(run_id, trigger, "trend collection started");

    let sink = PgTrendSink::for_run(pool.clone(), run_id);
    let report = match manager.update_persistent_store(&sink).await {
        Ok(report) => report,
        Err(e) => {
            fail_run_best_effort(pool, run_id, RUN_TYPE_TRENDS, &e.to_string()).await;
            return Err(e.into());
        }
    };

    if report.succeeded_platforms.is_empty() && !report.failed_platforms.is_empty() {
        let err = JobError::AllCollectorsFailed(report.failed_platforms.len());
        fail_run_best_effort(pool, run_id, RUN_TYPE_TRENDS, &err.to_string()).await;
        return Err(err);
    }
    if !report.failed_platforms.is_empty() {
        tracing::warn!(
            run_id,
            failed = ?report.failed_platforms,
            "some collectors failed during collection"
        );
    }

    close_run(pool, run_id, RUN_TYPE_TRENDS, report.persisted).await?;
    Ok(report)
}

/// Analyze trends detected in the last `window_days` and store the report.
///
/// Stored rows that no longer map to a domain record are logged and skipped.
///
/// # Errors
///
/// Returns a database error or [`JobError::Encode`]; the run is marked
/// failed.
pub async fn run_trend_analysis(
    pool: &PgPool,
    window_days: u32,
    trigger: &str,
) -> Result<AnalysisSummary, JobError> {
    let run_id = open_run(pool, RUN_TYPE_ANALYSIS, trigger).await?;

    let result: Result<(i64, AnalysisReport), JobError> = async {
        let window_end = Utc::now();
        let window_start = window_end - ChronoDuration::days(i64::from(window_days));
        let rows = trendscope_db::list_trends_since(pool, window_start).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match row.into_trend_item() {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(error = %e, "skipping malformed trend row"),
            }
        }

        let report = analyze_trends(&items, window_start, window_end);
        let json = serde_json::to_value(&report)?;
        let analyzed = i32::try_from(report.trends_analyzed).unwrap_or(i32::MAX);
        let row =
            trendscope_db::insert_trend_analysis(pool, window_start, window_end, analyzed, &json)
                .await?;
        Ok((row.id, report))
    }
    .await;

    match result {
        Ok((analysis_id, report)) => {
            let analyzed = u64::try_from(report.trends_analyzed).unwrap_or(u64::MAX);
            close_run(pool, run_id, RUN_TYPE_ANALYSIS, analyzed).await?;
            tracing::info!(
                run_id,
                analysis_id,
                trends = report.trends_analyzed,
                platforms = report.platforms.len(),
                "trend analysis stored"
            );
            Ok(AnalysisSummary {
                run_id,
                analysis_id,
                report,
            })
        }
        Err(e) => {
            fail_run_best_effort(pool, run_id, RUN_TYPE_ANALYSIS, &e.to_string()).await;
            Err(e)
        }
    }
}

/// Delete trends detected more than `retention_days` ago.
///
/// # Errors
///
/// Returns a database error; the run is marked failed.
pub async fn run_retention(
    pool: &PgPool,
    retention_days: u32,
    trigger: &str,
) -> Result<u64, JobError> {
    let run_id = open_run(pool, RUN_TYPE_RETENTION, trigger).await?;
    let cutoff = Utc::now() - ChronoDuration::days(i64::from(retention_days));

    let deleted = match trendscope_db::delete_trends_older_than(pool, cutoff).await {
        Ok(deleted) => deleted,
        Err(e) => {
            fail_run_best_effort(pool, run_id, RUN_TYPE_RETENTION, &e.to_string()).await;
            return Err(e.into());
        }
    };

    close_run(pool, run_id, RUN_TYPE_RETENTION, deleted).await?;
    tracing::info!(run_id, deleted, retention_days, "retention sweep finished");
    Ok(deleted)
}

/// Re-fetch engagement for every item detected in the last
/// [`METRICS_REFRESH_WINDOW_HOURS`] and update the stored snapshots.
///
/// Each distinct `(platform, external_id)` is fetched once and all of its
/// snapshots are updated. Lookups that fail are logged and skipped; the
/// successful ones are written in a single transaction.
///
/// # Errors
///
/// Returns a database error; the run is marked failed and no row changes.
pub async fn run_metrics_refresh(
    pool: &PgPool,
    manager: &CollectorManager,
    trigger: &str,
) -> Result<MetricsRefreshReport, JobError> {
    let run_id = open_run(pool, RUN_TYPE_METRICS, trigger).await?;
    tracing::info!(run_id, trigger, "metrics refresh started");

    match refresh_metrics(pool, manager, run_id).await {
        Ok(report) => {
            close_run(pool, run_id, RUN_TYPE_METRICS, report.rows_updated).await?;
            tracing::info!(
                run_id,
                refreshed = report.refreshed,
                failed = report.failed,
                skipped = report.skipped,
                rows = report.rows_updated,
                "metrics refresh finished"
            );
            Ok(report)
        }
        Err(e) => {
            fail_run_best_effort(pool, run_id, RUN_TYPE_METRICS, &e.to_string()).await;
            Err(e)
        }
    }
}

async fn refresh_metrics(
    pool: &PgPool,
    manager: &CollectorManager,
    run_id: i64,
) -> Result<MetricsRefreshReport, JobError> {
    let since = Utc::now() - ChronoDuration::hours(METRICS_REFRESH_WINDOW_HOURS);
    let rows = trendscope_db::list_trends_since(pool, since).await?;

    let mut snapshots: BTreeMap<(Platform, String), Vec<i64>> = BTreeMap::new();
    for row in rows {
        match row.platform.parse::<Platform>() {
            Ok(platform) => snapshots
                .entry((platform, row.external_id))
                .or_default()
                .push(row.id),
            Err(e) => tracing::warn!(id = row.id, error = %e, "skipping malformed trend row"),
        }
    }

    let mut report = MetricsRefreshReport {
        run_id,
        items: snapshots.len(),
        ..MetricsRefreshReport::default()
    };

    manager.begin_cycle();
    let mut lookups = Vec::with_capacity(snapshots.len());
    for ((platform, external_id), ids) in snapshots {
        match manager.adapter(platform).filter(|a| a.is_configured()) {
            Some(adapter) => lookups.push((adapter, external_id, ids)),
            None => report.skipped += 1,
        }
    }

    let fetched: Vec<Option<(Vec<i64>, TrendMetricsUpdate)>> = stream::iter(lookups)
        .map(|(adapter, external_id, ids)| async move {
            let platform = adapter.platform();
            let metrics = match adapter.fetch_engagement_metrics(&external_id).await {
                Ok(metrics) => metrics,
                Err(e) => {
                    tracing::warn!(
                        %platform,
                        external_id = %external_id,
                        kind = e.kind(),
                        error = %e,
                        "engagement refresh failed, keeping stored figures"
                    );
                    return None;
                }
            };
            match TrendMetricsUpdate::new(
                metrics.metrics,
                metrics.engagement_rate,
                metrics.performance_level,
                metrics.growth_rate,
            ) {
                Ok(update) => Some((ids, update)),
                Err(e) => {
                    tracing::warn!(
                        %platform,
                        external_id = %external_id,
                        error = %e,
                        "discarding refreshed metrics"
                    );
                    None
                }
            }
        })
        .buffer_unordered(METRICS_REFRESH_CONCURRENCY)
        .collect::<Vec<_>>()
        .boxed()
        .await;

    let mut tx = pool.begin().await.map_err(DbError::from)?;
    for entry in fetched {
        let Some((ids, update)) = entry else {
            report.failed += 1;
            continue;
        };
        report.rows_updated += trendscope_db::update_trend_metrics(&mut *tx, &ids, &update).await?;
        report.refreshed += 1;
    }
    tx.commit().await.map_err(DbError::from)?;

    Ok(report)
}
