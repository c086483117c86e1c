//! Runs the catalog into the staging store and reports the result.

pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod sink;
pub mod summary;

pub use error::{NotifyError, SinkError, SyncError};
pub use notify::{format_message, Notifier, WebhookNotifier};
pub use orchestrator::{SyncOrchestrator, SyncSettings};
pub use sink::{BatchSink, PgStagingSink};
pub use summary::{RunStatus, RunSummary};
