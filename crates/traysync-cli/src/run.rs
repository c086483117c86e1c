//! Wiring from [`AppConfig`] to a ready [`SyncOrchestrator`].

use sqlx::PgPool;
use traysync_catalog::TrayClient;
use traysync_core::AppConfig;
use traysync_sync::{
    PgStagingSink, RunStatus, RunSummary, SyncOrchestrator, SyncSettings, WebhookNotifier,
};

pub(crate) type Orchestrator = SyncOrchestrator<PgStagingSink, WebhookNotifier>;

/// Builds the catalog client, sink, and notifier from configuration.
pub(crate) fn build_orchestrator(config: &AppConfig, pool: PgPool) -> anyhow::Result<Orchestrator> {
    let client = TrayClient::new(
        &config.tray_url,
        &config.tray_token,
        config.request_timeout_secs,
        &config.user_agent,
        config.tray_extra_query.clone(),
    )?;
    let notifier = WebhookNotifier::new(
        config.webhook_url.clone(),
        config.request_timeout_secs,
        &config.user_agent,
    )?;

    Ok(SyncOrchestrator::new(
        client,
        SyncSettings::from_app_config(config),
        PgStagingSink::new(pool),
        notifier,
    ))
}

/// `traysync sync`: one run, summary on stdout. An incomplete run exits
/// non-zero after printing.
pub(crate) async fn sync_once(config: &AppConfig, pool: PgPool) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(config, pool)?;
    let summary = orchestrator.run().await?;
    print_summary(&summary);

    if let RunStatus::Incomplete { reason } = summary.status {
        anyhow::bail!("sync run {} incomplete: {reason}", summary.run_id);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("run:              {}", summary.run_id);
    println!("status:           {}", summary.status);
    println!("rows staged:      {}", summary.inserted_rows);
    println!("valid records:    {}", summary.valid_records);
    println!("invalid records:  {}", summary.invalid_records);
    println!("pages:            {}", summary.pages);
    println!("429 retries:      {}", summary.rate_limit_retries);
    println!("elapsed:          {:.1}s", summary.elapsed_secs);
}
