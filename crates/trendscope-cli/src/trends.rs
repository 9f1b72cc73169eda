//! Read-only listings plus the retention and analysis commands.

use trendscope_collectors::jobs::TRIGGER_CLI;
use trendscope_core::Platform;

/// Show the newest stored trends.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_list_trends(
    pool: &sqlx::PgPool,
    platform: Option<Platform>,
    limit: i64,
) -> anyhow::Result<()> {
    let rows = trendscope_db::list_recent_trends(pool, platform, limit).await?;
    if rows.is_empty() {
        println!("no trends stored yet; run `collect` first");
        return Ok(());
    }

    println!(
        "{:<10}{:<18}{:<12}{:>12}{:>9}  KEYWORD",
        "PLATFORM", "DETECTED", "LEVEL", "VOLUME", "RATE"
    );
    for row in &rows {
        let detected = row.detected_at.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<10}{:<18}{:<12}{:>12}{:>8.2}%  {}",
            row.platform,
            detected,
            row.performance_level,
            row.volume,
            row.engagement_rate,
            row.keyword
        );
    }
    Ok(())
}

/// Show recent tracked runs.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_list_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = trendscope_db::list_collection_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no runs recorded yet");
        return Ok(());
    }

    println!(
        "{:<8}{:<11}{:<11}{:<11}{:<18}{:>8}  ERROR",
        "ID", "TYPE", "TRIGGER", "STATUS", "CREATED", "RECORDS"
    );
    for run in &runs {
        let created = run.created_at.format("%Y-%m-%d %H:%M").to_string();
        println!(
            "{:<8}{:<11}{:<11}{:<11}{:<18}{:>8}  {}",
            run.id,
            run.run_type,
            run.trigger_source,
            run.status,
            created,
            run.records_processed,
            run.error_message.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the sweep fails.
pub(crate) async fn run_prune(pool: &sqlx::PgPool, days: u32) -> anyhow::Result<()> {
    let deleted = trendscope_collectors::run_retention(pool, days, TRIGGER_CLI).await?;
    println!("deleted {deleted} trends older than {days} days");
    Ok(())
}

/// Analyze the last `days` of trends, store the report and print it.
///
/// # Errors
///
/// Returns an error if the analysis cannot be computed or stored.
pub(crate) async fn run_analyze(pool: &sqlx::PgPool, days: u32) -> anyhow::Result<()> {
    let summary = trendscope_collectors::run_trend_analysis(pool, days, TRIGGER_CLI).await?;
    let report = &summary.report;

    println!(
        "analysis #{} stored: {} trends from {} to {}",
        summary.analysis_id,
        report.trends_analyzed,
        report.window_start.format("%Y-%m-%d %H:%M UTC"),
        report.window_end.format("%Y-%m-%d %H:%M UTC"),
    );
    println!();
    println!(
        "{:<10}{:>7}{:>11}{:>11}{:>11}{:>11}",
        "PLATFORM", "COUNT", "MEAN ER", "MEDIAN ER", "GROWTH", "SENTIMENT"
    );
    for (platform, stats) in &report.platforms {
        println!(
            "{:<10}{:>7}{:>10.2}%{:>10.2}%{:>11.3}{:>11.3}",
            platform.as_str(),
            stats.count,
            stats.engagement.mean,
            stats.engagement.median,
            stats.avg_growth_rate,
            stats.avg_sentiment
        );
    }

    if !report.correlations.is_empty() {
        println!();
        println!("significant correlations:");
        for c in &report.correlations {
            println!("  {} ~ {}: {:+.2}", c.left, c.right, c.coefficient);
        }
    }

    if !report.segments.is_empty() {
        println!();
        println!(
            "{:<12}{:>6}{:>12}{:>11}{:>10}  REPRESENTATIVES",
            "SEGMENT", "SIZE", "VOLUME", "MEAN ER", "GROWTH"
        );
        for s in &report.segments {
            let reps: Vec<&str> = s
                .representative_trends
                .iter()
                .map(|m| m.keyword.as_str())
                .collect();
            println!(
                "{:<12}{:>6}{:>12.0}{:>10.2}%{:>10.2}  {}",
                s.name,
                s.size,
                s.characteristics.volume,
                s.characteristics.engagement_rate,
                s.characteristics.growth_rate,
                reps.join(" | ")
            );
        }
    }

    let rising: Vec<_> = report
        .predictions
        .iter()
        .filter(|p| p.score > 0.5)
        .take(10)
        .collect();
    if !rising.is_empty() {
        println!();
        println!("rising trends:");
        for p in rising {
            println!(
                "  [{}] {} ({}, score {:.2})",
                p.platform.as_str(),
                p.keyword,
                p.expected_growth,
                p.score
            );
        }
    }
    Ok(())
}
