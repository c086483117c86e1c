//! Catalog side of a sync run: the paged HTTP client, request pacing, the
//! per-page failure policy, and turning raw pages into staging rows.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod process;
pub mod rate_window;
pub mod retry;
pub mod types;

pub use client::{PageResponse, TrayClient};
pub use error::CatalogError;
pub use fetcher::{FetchOutcome, FetchReport, FetchStep, FetchedPage, PagedFetcher};
pub use process::{ProcessedPage, RecordProcessor};
pub use rate_window::RateWindow;
pub use retry::{AbortReason, EndReason, FailureClass, RetryDecision, RetryPolicy};
pub use types::{StockLocation, TrayProduct};
