use thiserror::Error;
use traysync_catalog::CatalogError;
use traysync_db::DbError;

/// Errors that end a run without a summary.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("staging sink: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Db(#[from] DbError),

    /// A sink refused the batch for a reason of its own.
    #[error("batch rejected: {0}")]
    Rejected(String),
}

/// Delivery failures. These are logged by the orchestrator and never fail a
/// run.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned HTTP {status}")]
    UnexpectedStatus { status: u16 },
}
