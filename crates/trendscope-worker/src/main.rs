mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(trendscope_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = Arc::new(trendscope_core::load_collectors_settings(
        &config.collectors_path,
    )?);

    let pool_config = trendscope_db::PoolConfig::from_app_config(&config);
    let pool = trendscope_db::connect_pool(&config.database_url, pool_config).await?;
    trendscope_db::run_migrations(&pool).await?;

    let mut scheduler =
        scheduler::build_scheduler(pool.clone(), Arc::clone(&config), settings).await?;
    tracing::info!(env = %config.env, "trendscope worker started");

    shutdown_signal().await;
    scheduler.shutdown().await?;
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping scheduler");
}
