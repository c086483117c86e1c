mod run;
mod schedule;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "traysync")]
#[command(about = "Mirror the Tray product catalog into the staging table")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one sync now and print the summary
    Sync,
    /// Run syncs on the TRAYSYNC_CRON schedule until interrupted
    Schedule,
    /// Apply pending database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = traysync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::debug!(?config, "configuration loaded");

    let pool_config = traysync_db::PoolConfig::from_app_config(&config);
    let pool = traysync_db::connect_pool(&config.database_url, pool_config).await?;
    traysync_db::ping(&pool).await?;
    tracing::info!("database reachable");
    let applied = traysync_db::run_migrations(&pool).await?;
    tracing::info!(applied, "database migrations up to date");

    match cli.command {
        Commands::Migrate => Ok(()),
        Commands::Sync => run::sync_once(&config, pool).await,
        Commands::Schedule => schedule::run_scheduled(&config, pool).await,
    }
}
