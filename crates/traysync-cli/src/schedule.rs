//! `traysync schedule`: recurring runs on a cron expression.
//!
//! Runs never overlap. A tick that fires while the previous run is still
//! going is skipped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};
use traysync_core::AppConfig;

use crate::run::{build_orchestrator, Orchestrator};

/// Registers the sync job and blocks until ctrl-c or SIGTERM.
pub(crate) async fn run_scheduled(config: &AppConfig, pool: PgPool) -> anyhow::Result<()> {
    let orchestrator = Arc::new(build_orchestrator(config, pool)?);
    let guard = Arc::new(RunGuard::default());

    let mut scheduler = JobScheduler::new().await?;
    let job = Job::new_async(config.cron.as_str(), move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);
        let guard = Arc::clone(&guard);
        Box::pin(async move {
            run_tick(&orchestrator, &guard).await;
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron = %config.cron, "scheduler: registered catalog sync job");

    shutdown_signal().await;
    scheduler.shutdown().await?;
    Ok(())
}

async fn run_tick(orchestrator: &Orchestrator, guard: &RunGuard) {
    let Some(_active) = guard.try_acquire() else {
        tracing::warn!("scheduler: previous sync still running; skipping this tick");
        return;
    };

    tracing::info!("scheduler: starting catalog sync");
    if let Err(e) = orchestrator.run().await {
        tracing::error!(error = %e, "scheduler: catalog sync failed");
    }
}

/// Single-flight flag for scheduled runs.
#[derive(Debug, Default)]
struct RunGuard {
    active: AtomicBool,
}

impl RunGuard {
    fn try_acquire(&self) -> Option<ActiveRun<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActiveRun { guard: self })
    }
}

/// Clears the flag on drop, including when the run future is cancelled.
struct ActiveRun<'a> {
    guard: &'a RunGuard,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.guard.active.store(false, Ordering::Release);
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let guard = RunGuard::default();
        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.try_acquire().is_none());
    }

    #[test]
    fn guard_is_released_on_drop() {
        let guard = RunGuard::default();
        drop(guard.try_acquire());
        assert!(guard.try_acquire().is_some());
    }
}
