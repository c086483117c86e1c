//! Per-page failure policy for the catalog fetch loop.
//!
//! [`RetryPolicy::decide`] maps a classified page outcome to what the fetch
//! loop does next. Only 429 is retried; everything else either ends
//! pagination normally or aborts the run. Transport failures never reach the
//! policy: they surface as [`crate::CatalogError`] and are fatal.
//!
//! # Backoff schedule (defaults: base 5 s, cap 60 s, 5 retries)
//!
//! | Retry | Sleep before re-fetching the same page |
//! |-------|----------------------------------------|
//! | 1     | min(60, 5 × 2¹) = 10 s                 |
//! | 2     | min(60, 5 × 2²) = 20 s                 |
//! | 3     | min(60, 5 × 2³) = 40 s                 |
//! | 4     | min(60, 5 × 2⁴) = 60 s                 |
//! | 5     | min(60, 5 × 2⁵) = 60 s                 |
//!
//! A sixth consecutive 429 on the same page aborts the run.

use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 5;
pub const DEFAULT_BACKOFF_CAP_SECS: u64 = 60;

/// A page outcome that is not a non-empty list of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// HTTP 429.
    RateLimited,
    /// HTTP 404.
    NotFound,
    /// HTTP 503.
    ServiceUnavailable,
    /// 2xx whose body is not a JSON array.
    MalformedResponse,
    /// 2xx with `[]`.
    EmptyPage,
}

/// Why pagination ended successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    EmptyPage,
    NotFound,
}

/// Why a run stopped before reaching the end of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    ServiceUnavailable,
    MalformedResponse,
    RateLimitExhausted { retries: u32 },
    /// A request failed outright (network, timeout, unexpected status). The
    /// fetch loop also returns the underlying error.
    TransportFailure,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::TransportFailure => write!(f, "catalog request failed"),
            AbortReason::ServiceUnavailable => write!(f, "catalog API unavailable (503)"),
            AbortReason::MalformedResponse => write!(f, "catalog returned a malformed page"),
            AbortReason::RateLimitExhausted { retries } => {
                write!(f, "still rate limited after {retries} retries")
            }
        }
    }
}

/// What the fetch loop does after a [`FailureClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep `after`, then re-fetch the same page.
    Retry { attempt: u32, after: Duration },
    /// Stop; the catalog has no more pages.
    EndOfData(EndReason),
    /// Stop; the run is incomplete.
    Abort(AbortReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed per page after the first 429.
    pub max_retries: u32,
    pub backoff_base_secs: u64,
    pub backoff_cap_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            backoff_cap_secs: DEFAULT_BACKOFF_CAP_SECS,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_base_secs: u64, backoff_cap_secs: u64) -> Self {
        Self {
            max_retries,
            backoff_base_secs,
            backoff_cap_secs,
        }
    }

    /// Delay before retry number `attempt` (1-based): `min(cap, base * 2^attempt)`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        // Cap the shift to prevent overflow on extreme configs.
        let secs = self
            .backoff_base_secs
            .saturating_mul(1u64 << attempt.min(62))
            .min(self.backoff_cap_secs);
        Duration::from_secs(secs)
    }

    /// Decides the next step for a page that failed `class`, given how many
    /// 429 retries this page has already used.
    #[must_use]
    pub fn decide(&self, class: FailureClass, retries_so_far: u32) -> RetryDecision {
        match class {
            FailureClass::RateLimited => {
                if retries_so_far >= self.max_retries {
                    RetryDecision::Abort(AbortReason::RateLimitExhausted {
                        retries: retries_so_far,
                    })
                } else {
                    let attempt = retries_so_far + 1;
                    RetryDecision::Retry {
                        attempt,
                        after: self.backoff(attempt),
                    }
                }
            }
            FailureClass::NotFound => RetryDecision::EndOfData(EndReason::NotFound),
            FailureClass::EmptyPage => RetryDecision::EndOfData(EndReason::EmptyPage),
            FailureClass::ServiceUnavailable => {
                RetryDecision::Abort(AbortReason::ServiceUnavailable)
            }
            FailureClass::MalformedResponse => {
                RetryDecision::Abort(AbortReason::MalformedResponse)
            }
        }
    }
}
