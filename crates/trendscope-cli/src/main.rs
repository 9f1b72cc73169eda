mod adapter;
mod collect;
mod trends;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trendscope_core::Platform;

use crate::adapter::AdapterCommands;

#[derive(Debug, Parser)]
#[command(name = "trendscope-cli")]
#[command(about = "Trendscope command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one collection cycle across every enabled platform
    Collect {
        /// Restrict the cycle to one platform
        #[arg(long)]
        platform: Option<Platform>,

        /// Collect and map without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Refresh engagement of trends detected in the last day
    RefreshMetrics {
        /// Restrict the refresh to one platform
        #[arg(long)]
        platform: Option<Platform>,
    },
    /// Show the most recently detected trends
    Trends {
        /// Filter to one platform
        #[arg(long)]
        platform: Option<Platform>,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show recent collection, metrics, analysis and retention runs
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Delete trends older than the retention window
    Prune {
        /// Override `TRENDSCOPE_RETENTION_DAYS`
        #[arg(long)]
        days: Option<u32>,
    },
    /// Analyze recent trends across platforms and store the report
    Analyze {
        /// Size of the analysis window in days
        #[arg(long, default_value_t = 1)]
        days: u32,
    },
    /// Ad hoc queries against a single platform
    Adapter {
        #[arg(long)]
        platform: Platform,

        #[command(subcommand)]
        command: AdapterCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = trendscope_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Db { command }) => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Ping => {
                    trendscope_db::health_check(&pool).await?;
                    println!("database ok");
                }
                DbCommands::Migrate => {
                    let applied = trendscope_db::run_migrations(&pool).await?;
                    println!("migrations up to date ({applied} applied)");
                }
            }
        }
        Some(Commands::Collect { platform, dry_run }) => {
            let settings = trendscope_core::load_collectors_settings(&config.collectors_path)?;
            if dry_run {
                collect::run_collect_dry(&config, &settings, platform).await?;
            } else {
                let pool = connect(&config).await?;
                collect::run_collect(&pool, &config, &settings, platform).await?;
            }
        }
        Some(Commands::RefreshMetrics { platform }) => {
            let settings = trendscope_core::load_collectors_settings(&config.collectors_path)?;
            let pool = connect(&config).await?;
            collect::run_refresh_metrics(&pool, &config, &settings, platform).await?;
        }
        Some(Commands::Trends { platform, limit }) => {
            let pool = connect(&config).await?;
            trends::run_list_trends(&pool, platform, limit).await?;
        }
        Some(Commands::Runs { limit }) => {
            let pool = connect(&config).await?;
            trends::run_list_runs(&pool, limit).await?;
        }
        Some(Commands::Prune { days }) => {
            let pool = connect(&config).await?;
            trends::run_prune(&pool, days.unwrap_or(config.retention_days)).await?;
        }
        Some(Commands::Analyze { days }) => {
            let pool = connect(&config).await?;
            trends::run_analyze(&pool, days).await?;
        }
        Some(Commands::Adapter { platform, command }) => {
            let settings = trendscope_core::load_collectors_settings(&config.collectors_path)?;
            adapter::run_adapter_command(&config, &settings, platform, command).await?;
        }
        None => println!("trendscope-cli ready; run with --help for commands"),
    }

    Ok(())
}

async fn connect(config: &trendscope_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = trendscope_db::PoolConfig::from_app_config(config);
    let pool = trendscope_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}
