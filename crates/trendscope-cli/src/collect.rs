//! Collection command handlers.

use trendscope_collectors::jobs::TRIGGER_CLI;
use trendscope_collectors::{CollectorManager, MemorySink, PersistReport};
use trendscope_core::{AppConfig, CollectorsSettings, Platform};

async fn build_manager(
    config: &AppConfig,
    settings: &CollectorsSettings,
    platform: Option<Platform>,
) -> anyhow::Result<CollectorManager> {
    let mut manager = CollectorManager::connect(config, settings).await;
    if let Some(platform) = platform {
        manager = manager.only(platform);
        if manager.adapters().is_empty() {
            anyhow::bail!("platform '{platform}' is disabled or failed to initialise");
        }
    }
    if manager.adapters().is_empty() {
        anyhow::bail!("no collectors are enabled in {}", config.collectors_path.display());
    }
    tracing::info!(
        collectors = manager.adapters().len(),
        platforms = %join_platforms(
            &manager.adapters().iter().map(|a| a.platform()).collect::<Vec<_>>()
        ),
        "collectors initialised"
    );
    Ok(manager)
}

fn join_platforms(platforms: &[Platform]) -> String {
    if platforms.is_empty() {
        return "-".to_string();
    }
    platforms
        .iter()
        .copied()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_report(report: &PersistReport) {
    println!("collected:  {}", report.collected);
    println!("dropped:    {}", report.dropped);
    println!("persisted:  {}", report.persisted);
    println!("succeeded:  {}", join_platforms(&report.succeeded_platforms));
    println!("failed:     {}", join_platforms(&report.failed_platforms));
    println!("skipped:    {}", join_platforms(&report.skipped_platforms));
}

/// Run one tracked collection cycle and persist it.
///
/// # Errors
///
/// Returns an error if no collector is available, every active collector
/// failed, or the batch cannot be written.
pub(crate) async fn run_collect(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    settings: &CollectorsSettings,
    platform: Option<Platform>,
) -> anyhow::Result<()> {
    let manager = build_manager(config, settings, platform).await?;
    let report = trendscope_collectors::run_trend_collection(pool, &manager, TRIGGER_CLI).await?;
    print_report(&report);
    Ok(())
}

/// Refresh engagement figures of trends detected in the last day.
///
/// # Errors
///
/// Returns an error if no collector is available or the update cannot be
/// written.
pub(crate) async fn run_refresh_metrics(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    settings: &CollectorsSettings,
    platform: Option<Platform>,
) -> anyhow::Result<()> {
    let manager = build_manager(config, settings, platform).await?;
    let report = trendscope_collectors::run_metrics_refresh(pool, &manager, TRIGGER_CLI).await?;
    if report.failed > 0 {
        tracing::warn!(failed = report.failed, "some engagement lookups failed");
    }
    println!("run:        {}", report.run_id);
    println!("items:      {}", report.items);
    println!("refreshed:  {}", report.refreshed);
    println!("failed:     {}", report.failed);
    println!("skipped:    {}", report.skipped);
    println!("rows:       {}", report.rows_updated);
    Ok(())
}

/// Collect and map one cycle into memory, printing what would be stored.
///
/// # Errors
///
/// Returns an error if no collector is available.
pub(crate) async fn run_collect_dry(
    config: &AppConfig,
    settings: &CollectorsSettings,
    platform: Option<Platform>,
) -> anyhow::Result<()> {
    let manager = build_manager(config, settings, platform).await?;
    let sink = MemorySink::new();
    let report = manager.update_persistent_store(&sink).await?;

    println!("dry-run: nothing was written to the database");
    print_report(&report);
    println!();
    println!(
        "{:<10}{:<14}{:>12}{:>10}  KEYWORD",
        "PLATFORM", "LEVEL", "VOLUME", "RATE"
    );
    for trend in sink.committed() {
        println!(
            "{:<10}{:<14}{:>12}{:>9.2}%  {}",
            trend.platform.as_str(),
            trend.performance_level.to_string(),
            trend.volume,
            trend.engagement_rate,
            trend.keyword
        );
    }
    Ok(())
}
