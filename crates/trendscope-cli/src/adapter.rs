//! Ad hoc platform queries printed as JSON.

use clap::Subcommand;
use serde::Serialize;
use trendscope_collectors::build_adapter;
use trendscope_core::{AppConfig, CollectorsSettings, Platform};

/// Sub-commands available under `adapter`.
#[derive(Debug, Subcommand)]
pub enum AdapterCommands {
    /// Fetch trending items without storing them
    Trending {
        #[arg(long, default_value_t = 10)]
        max_results: u32,
    },
    /// Detailed view of one content item, with recommendations
    Detail { content_id: String },
    /// Current engagement metrics of one content item
    Metrics { content_id: String },
    /// Profile of a competitor account
    Competitor { account_id: String },
    /// Audience breakdown across the given content items
    Audience {
        #[arg(required = true)]
        content_ids: Vec<String>,
    },
    /// Content suggestions derived from current trends
    Suggest {
        #[arg(long, default_value = "general")]
        category: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one query against the adapter for `platform`.
///
/// Works on disabled platforms too; only credentials are required.
///
/// # Errors
///
/// Returns an error if the adapter cannot be built, is missing credentials,
/// or the platform call fails.
pub(crate) async fn run_adapter_command(
    config: &AppConfig,
    settings: &CollectorsSettings,
    platform: Platform,
    command: AdapterCommands,
) -> anyhow::Result<()> {
    let adapter = build_adapter(platform, config, &settings.for_platform(platform)).await?;
    if !adapter.is_configured() {
        anyhow::bail!("{platform} credentials are not configured");
    }

    match command {
        AdapterCommands::Trending { max_results } => {
            print_json(&adapter.fetch_trending(max_results).await?)
        }
        AdapterCommands::Detail { content_id } => {
            print_json(&adapter.fetch_content_detail(&content_id).await?)
        }
        AdapterCommands::Metrics { content_id } => {
            print_json(&adapter.fetch_engagement_metrics(&content_id).await?)
        }
        AdapterCommands::Competitor { account_id } => {
            print_json(&adapter.fetch_competitor_profile(&account_id).await?)
        }
        AdapterCommands::Audience { content_ids } => {
            print_json(&adapter.fetch_audience_insights(&content_ids).await?)
        }
        AdapterCommands::Suggest { category } => {
            print_json(&adapter.suggest_content(&category).await?)
        }
    }
}
