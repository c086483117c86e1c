//! Sequential page loop over the catalog.
//!
//! [`PagedFetcher`] walks `pagina=1, 2, ...` one request at a time, pacing
//! requests through a per-run [`RateWindow`] and reacting to each classified
//! response through [`RetryPolicy`]. It is pull-based: the caller asks for the
//! next page only after it has finished with the previous one, which bounds the
//! records held in memory to a single page.
//!
//! ```text
//! Idle ──▶ Fetching ──records──▶ Advancing ──▶ Fetching (page + 1)
//!             │  ▲
//!             │  └──────── Backoff ◀── 429 (retries left)
//!             ├── [] / 404 ───────────▶ Done
//!             └── 503 / malformed / 429 exhausted / transport ──▶ Aborted
//! ```

use serde_json::Value;

use crate::client::{PageResponse, TrayClient};
use crate::error::CatalogError;
use crate::rate_window::RateWindow;
use crate::retry::{AbortReason, EndReason, RetryDecision, RetryPolicy};

/// Where the fetch loop is. `page` is always the page currently being (or
/// about to be) requested.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FetchState {
    Idle,
    Fetching { page: u32, retries: u32 },
    /// Page `page - 1` was handed to the caller.
    Advancing { page: u32 },
    Backoff {
        page: u32,
        retries: u32,
        delay: std::time::Duration,
    },
    Done { page: u32, reason: EndReason },
    Aborted { page: u32, reason: AbortReason },
}

/// How a fetch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The catalog signalled the end of its data.
    Done(EndReason),
    /// The loop stopped early; the caller should treat the run as incomplete.
    Aborted(AbortReason),
}

impl FetchOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, FetchOutcome::Done(_))
    }
}

/// Final tallies of a fetch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Pages successfully fetched (the page the loop stopped on is excluded).
    pub pages: u32,
    /// 429 retries across all pages.
    pub rate_limit_retries: u32,
    pub outcome: FetchOutcome,
}

/// One successfully fetched, non-empty page.
#[derive(Debug)]
pub struct FetchedPage {
    pub number: u32,
    pub records: Vec<Value>,
    /// 429 retries it took to get this page.
    pub retries: u32,
}

/// Result of one [`PagedFetcher::next_page`] call.
#[derive(Debug)]
pub enum FetchStep {
    Page(FetchedPage),
    Finished(FetchReport),
}

pub struct PagedFetcher<'a> {
    client: &'a TrayClient,
    window: RateWindow,
    policy: RetryPolicy,
    state: FetchState,
    rate_limit_retries: u32,
}

impl<'a> PagedFetcher<'a> {
    /// Creates an idle fetcher. The window is owned by this fetcher for the
    /// lifetime of the run.
    #[must_use]
    pub fn new(client: &'a TrayClient, window: RateWindow, policy: RetryPolicy) -> Self {
        Self {
            client,
            window,
            policy,
            state: FetchState::Idle,
            rate_limit_retries: 0,
        }
    }

    /// Drives the state machine until a page is fetched or the loop ends.
    ///
    /// Once the loop has ended, every further call returns the same
    /// [`FetchStep::Finished`] report.
    ///
    /// # Errors
    ///
    /// Returns the [`CatalogError`] of a transport failure or unexpected
    /// status. The fetcher moves to its aborted state first, so the error is
    /// reported exactly once and later calls return [`FetchStep::Finished`].
    pub async fn next_page(&mut self) -> Result<FetchStep, CatalogError> {
        loop {
            match self.state.clone() {
                FetchState::Idle => {
                    tracing::info!("starting catalog pagination at page 1");
                    self.state = FetchState::Fetching {
                        page: 1,
                        retries: 0,
                    };
                }
                FetchState::Advancing { page } => {
                    self.state = FetchState::Fetching { page, retries: 0 };
                }
                FetchState::Backoff {
                    page,
                    retries,
                    delay,
                } => {
                    tokio::time::sleep(delay).await;
                    self.state = FetchState::Fetching { page, retries };
                }
                FetchState::Fetching { page, retries } => {
                    if let Some(fetched) = self.fetch(page, retries).await? {
                        return Ok(FetchStep::Page(fetched));
                    }
                }
                FetchState::Done { page, reason } => {
                    return Ok(FetchStep::Finished(
                        self.report(page, FetchOutcome::Done(reason)),
                    ));
                }
                FetchState::Aborted { page, reason } => {
                    return Ok(FetchStep::Finished(
                        self.report(page, FetchOutcome::Aborted(reason)),
                    ));
                }
            }
        }
    }

    /// One request for `page`. Returns the page on success; otherwise moves
    /// the state machine and returns `None`.
    async fn fetch(
        &mut self,
        page: u32,
        retries: u32,
    ) -> Result<Option<FetchedPage>, CatalogError> {
        self.window.acquire().await;
        tracing::debug!(page, retries, "requesting catalog page");

        let response = match self.client.fetch_page(page).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(page, error = %err, "catalog request failed; aborting run");
                self.state = FetchState::Aborted {
                    page,
                    reason: AbortReason::TransportFailure,
                };
                return Err(err);
            }
        };

        if let PageResponse::Records(records) = response {
            tracing::info!(page, records = records.len(), "catalog page received");
            self.state = FetchState::Advancing { page: page + 1 };
            return Ok(Some(FetchedPage {
                number: page,
                records,
                retries,
            }));
        }

        let retry_after_hint = match &response {
            PageResponse::RateLimited { retry_after_secs } => *retry_after_secs,
            PageResponse::Malformed { reason } => {
                tracing::error!(page, reason = %reason, "catalog page is not a JSON array");
                None
            }
            _ => None,
        };

        if let Some(class) = response.failure_class() {
            let decision = self.policy.decide(class, retries);
            self.apply(page, retries, decision, retry_after_hint);
        }
        Ok(None)
    }

    fn apply(
        &mut self,
        page: u32,
        retries: u32,
        decision: RetryDecision,
        retry_after_hint: Option<u64>,
    ) {
        self.state = match decision {
            RetryDecision::Retry { attempt, after } => {
                self.rate_limit_retries += 1;
                tracing::warn!(
                    page,
                    attempt,
                    max_retries = self.policy.max_retries,
                    delay_secs = after.as_secs(),
                    retry_after_hint,
                    "rate limited by catalog; backing off"
                );
                FetchState::Backoff {
                    page,
                    retries: attempt,
                    delay: after,
                }
            }
            RetryDecision::EndOfData(reason) => {
                tracing::info!(page, ?reason, "end of catalog reached");
                FetchState::Done { page, reason }
            }
            RetryDecision::Abort(reason) => {
                tracing::warn!(page, retries, %reason, "stopping catalog pagination early");
                FetchState::Aborted { page, reason }
            }
        };
    }

    fn report(&self, page: u32, outcome: FetchOutcome) -> FetchReport {
        FetchReport {
            pages: page.saturating_sub(1),
            rate_limit_retries: self.rate_limit_retries,
            outcome,
        }
    }
}
