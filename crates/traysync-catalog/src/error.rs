use thiserror::Error;

/// Fatal catalog errors. Anything that reaches the caller as a `CatalogError`
/// ends the run without a summary; recoverable page outcomes (429, 404, 503,
/// malformed bodies) are classified into [`crate::client::PageResponse`]
/// instead.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network, TLS, or timeout failure from the underlying HTTP client.
    #[error("HTTP error fetching page {page}: {source}")]
    Http {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid catalog base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}
