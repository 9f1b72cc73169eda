//! Daily analysis and retention jobs.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use trendscope_collectors::jobs::TRIGGER_SCHEDULER;

use super::cron_from_env;

pub(crate) const DEFAULT_ANALYZE_CRON: &str = "0 30 3 * * *";
pub(crate) const DEFAULT_PRUNE_CRON: &str = "0 0 4 * * *";

/// Trends covered by each daily analysis.
const ANALYSIS_WINDOW_DAYS: u32 = 1;

/// Register the daily cross-platform analysis.
///
/// Runs at 03:30 UTC by default, overridable with `ANALYZE_TRENDS_CRON`.
pub(super) async fn register_analysis_job(
    scheduler: &JobScheduler,
    pool: PgPool,
) -> Result<(), JobSchedulerError> {
    let cron = cron_from_env("ANALYZE_TRENDS_CRON", DEFAULT_ANALYZE_CRON);
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);

        Box::pin(async move {
            tracing::info!("scheduler: starting daily trend analysis");
            match trendscope_collectors::run_trend_analysis(
                &pool,
                ANALYSIS_WINDOW_DAYS,
                TRIGGER_SCHEDULER,
            )
            .await
            {
                Ok(summary) => tracing::info!(
                    analysis_id = summary.analysis_id,
                    trends = summary.report.trends_analyzed,
                    "scheduler: daily trend analysis complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: daily trend analysis failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered analysis job");
    Ok(())
}

/// Register the daily retention sweep.
///
/// Runs at 04:00 UTC by default, overridable with `PRUNE_TRENDS_CRON`.
pub(super) async fn register_retention_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    retention_days: u32,
) -> Result<(), JobSchedulerError> {
    let cron = cron_from_env("PRUNE_TRENDS_CRON", DEFAULT_PRUNE_CRON);
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);

        Box::pin(async move {
            match trendscope_collectors::run_retention(&pool, retention_days, TRIGGER_SCHEDULER)
                .await
            {
                Ok(deleted) => tracing::info!(
                    deleted,
                    retention_days,
                    "scheduler: retention sweep complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: retention sweep failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, retention_days, "scheduler: registered retention job");
    Ok(())
}
