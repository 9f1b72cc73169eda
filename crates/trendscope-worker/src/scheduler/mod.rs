//! Background job scheduler.
//!
//! Registers the recurring trend collection cycle, the metrics refresh of
//! recent trends, and the daily analysis and retention jobs. Each cron
//! expression can be overridden from the environment.

mod maintenance;

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use trendscope_collectors::jobs::TRIGGER_SCHEDULER;
use trendscope_collectors::CollectorManager;
use trendscope_core::{AppConfig, CollectorsSettings};

pub(crate) const DEFAULT_COLLECT_CRON: &str = "0 0 * * * *";
pub(crate) const DEFAULT_METRICS_CRON: &str = "0 30 * * * *";

/// `value` when it holds a non-blank expression, otherwise `default`.
pub(crate) fn cron_or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn cron_from_env(key: &str, default: &str) -> String {
    cron_or_default(std::env::var(key).ok(), default)
}

/// Builds and starts the background job scheduler.
///
/// The returned [`JobScheduler`] must be kept alive for the lifetime of the
/// process; dropping it stops every job.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    settings: Arc<CollectorsSettings>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    // Built once so TikTok tokens survive between runs.
    let manager = Arc::new(CollectorManager::connect(&config, &settings).await);

    register_collect_job(&scheduler, pool.clone(), Arc::clone(&manager)).await?;
    register_metrics_job(&scheduler, pool.clone(), manager).await?;
    maintenance::register_analysis_job(&scheduler, pool.clone()).await?;
    maintenance::register_retention_job(&scheduler, pool, config.retention_days).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Register the trend collection cycle.
///
/// Runs hourly by default (`0 0 * * * *`), overridable with
/// `COLLECT_TRENDS_CRON`.
async fn register_collect_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    manager: Arc<CollectorManager>,
) -> Result<(), JobSchedulerError> {
    let cron = cron_from_env("COLLECT_TRENDS_CRON", DEFAULT_COLLECT_CRON);
    let active = manager.adapters().len();
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let manager = Arc::clone(&manager);

        Box::pin(async move {
            tracing::info!("scheduler: starting trend collection run");
            match trendscope_collectors::run_trend_collection(&pool, &manager, TRIGGER_SCHEDULER)
                .await
            {
                Ok(report) => tracing::info!(
                    persisted = report.persisted,
                    failed = report.failed_platforms.len(),
                    skipped = report.skipped_platforms.len(),
                    "scheduler: trend collection run complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: trend collection run failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, collectors = active, "scheduler: registered collect job");
    Ok(())
}

/// Register the engagement refresh of trends detected in the last day.
///
/// Runs at half past every hour by default, overridable with
/// `REFRESH_METRICS_CRON`.
async fn register_metrics_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    manager: Arc<CollectorManager>,
) -> Result<(), JobSchedulerError> {
    let cron = cron_from_env("REFRESH_METRICS_CRON", DEFAULT_METRICS_CRON);
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let manager = Arc::clone(&manager);

        Box::pin(async move {
            match trendscope_collectors::run_metrics_refresh(&pool, &manager, TRIGGER_SCHEDULER)
                .await
            {
                Ok(report) => tracing::info!(
                    refreshed = report.refreshed,
                    failed = report.failed,
                    rows = report.rows_updated,
                    "scheduler: metrics refresh complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: metrics refresh failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered metrics refresh job");
    Ok(())
}
