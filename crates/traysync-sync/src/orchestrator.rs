//! One end-to-end sync run.
//!
//! A run clears the sink, pulls pages from a fresh [`PagedFetcher`], turns
//! each page into batches, and writes every batch before asking for the next
//! page. At most one page of rows is held in memory at a time.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::Instrument;
use traysync_catalog::{
    FetchOutcome, FetchReport, FetchStep, PagedFetcher, RateWindow, RecordProcessor, RetryPolicy,
    TrayClient,
};
use traysync_core::AppConfig;
use uuid::Uuid;

use crate::error::SyncError;
use crate::notify::Notifier;
use crate::sink::BatchSink;
use crate::summary::{RunStatus, RunSummary};

/// Tunables for a run, usually taken from [`AppConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub rate_budget: u32,
    pub rate_window: Duration,
    pub retry_policy: RetryPolicy,
    pub processor: RecordProcessor,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            rate_budget: traysync_catalog::rate_window::DEFAULT_RATE_BUDGET,
            rate_window: traysync_catalog::rate_window::DEFAULT_RATE_WINDOW,
            retry_policy: RetryPolicy::default(),
            processor: RecordProcessor::default(),
        }
    }
}

impl SyncSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            rate_budget: config.rate_budget,
            rate_window: Duration::from_millis(config.rate_window_ms),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.backoff_base_secs,
                config.backoff_cap_secs,
            ),
            processor: RecordProcessor::new(config.batch_size, config.raw_payload),
        }
    }
}

#[derive(Default)]
struct Tally {
    inserted_rows: u64,
    valid_records: usize,
    invalid_records: usize,
}

pub struct SyncOrchestrator<S, N> {
    client: TrayClient,
    settings: SyncSettings,
    sink: S,
    notifier: N,
}

impl<S, N> SyncOrchestrator<S, N>
where
    S: BatchSink + Sync,
    N: Notifier + Sync,
{
    #[must_use]
    pub fn new(client: TrayClient, settings: SyncSettings, sink: S, notifier: N) -> Self {
        Self {
            client,
            settings,
            sink,
            notifier,
        }
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Runs one sync and hands the summary to the notifier.
    ///
    /// An early stop (503, malformed page, exhausted 429 retries) still
    /// returns `Ok` with [`RunStatus::Incomplete`]. A notification failure is
    /// logged and does not change the result.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Catalog`] on a transport failure or unexpected status.
    /// - [`SyncError::Sink`] if clearing or writing to the sink fails.
    ///
    /// Rows written for earlier pages stay in the sink and no notification is
    /// sent.
    pub async fn run(&self) -> Result<RunSummary, SyncError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_run", %run_id);
        async move {
            let started_at = Utc::now();
            let clock = Instant::now();
            tracing::info!("sync run started");

            let (report, tally) = self.stage_catalog().await.inspect_err(|err| {
                tracing::error!(error = %err, "sync run failed");
            })?;

            let status = match report.outcome {
                FetchOutcome::Done(_) => RunStatus::Completed,
                FetchOutcome::Aborted(reason) => RunStatus::Incomplete { reason },
            };

            let summary = RunSummary {
                run_id,
                started_at,
                finished_at: Utc::now(),
                inserted_rows: tally.inserted_rows,
                valid_records: tally.valid_records,
                invalid_records: tally.invalid_records,
                pages: report.pages,
                rate_limit_retries: report.rate_limit_retries,
                elapsed_secs: clock.elapsed().as_secs_f64(),
                status,
            };

            match summary.status {
                RunStatus::Completed => tracing::info!(
                    rows = summary.inserted_rows,
                    invalid = summary.invalid_records,
                    pages = summary.pages,
                    retries = summary.rate_limit_retries,
                    elapsed_secs = summary.elapsed_secs,
                    "sync run completed"
                ),
                RunStatus::Incomplete { reason } => tracing::warn!(
                    rows = summary.inserted_rows,
                    invalid = summary.invalid_records,
                    pages = summary.pages,
                    retries = summary.rate_limit_retries,
                    elapsed_secs = summary.elapsed_secs,
                    %reason,
                    "sync run stopped early"
                ),
            }

            if let Err(err) = self.notifier.notify(&summary).await {
                tracing::warn!(error = %err, "failed to deliver run notification");
            }

            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn stage_catalog(&self) -> Result<(FetchReport, Tally), SyncError> {
        self.sink.clear().await?;

        let window = RateWindow::new(self.settings.rate_budget, self.settings.rate_window);
        let mut fetcher = PagedFetcher::new(&self.client, window, self.settings.retry_policy);
        let mut tally = Tally::default();

        loop {
            match fetcher.next_page().await? {
                FetchStep::Page(page) => {
                    let processed = self.settings.processor.process(page.records);
                    tally.valid_records += processed.valid;
                    tally.invalid_records += processed.invalid;

                    let mut page_rows = 0u64;
                    for batch in &processed.batches {
                        page_rows += self.sink.insert_batch(batch).await?;
                    }
                    tally.inserted_rows += page_rows;

                    tracing::info!(
                        page = page.number,
                        rows = page_rows,
                        invalid = processed.invalid,
                        total_rows = tally.inserted_rows,
                        "page staged"
                    );
                }
                FetchStep::Finished(report) => return Ok((report, tally)),
            }
        }
    }
}
