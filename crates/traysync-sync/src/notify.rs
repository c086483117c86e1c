//! End-of-run notification.

use std::future::Future;
use std::time::Duration;

use serde_json::json;

use crate::error::NotifyError;
use crate::summary::{RunStatus, RunSummary};

/// Receives the summary of every run that ends without a fatal error.
pub trait Notifier {
    fn notify(&self, summary: &RunSummary) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Posts `{"text": "<message>"}` to a chat webhook.
///
/// Without a URL every notification is skipped.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("url", &self.url.as_ref().map(|_| "[redacted]"))
            .finish_non_exhaustive()
    }
}

impl WebhookNotifier {
    /// # Errors
    ///
    /// Returns [`NotifyError::ClientBuild`] if the `reqwest::Client` cannot be
    /// built.
    pub fn new(
        url: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .map_err(NotifyError::ClientBuild)?;

        let url = url.filter(|u| !u.trim().is_empty());
        if url.is_none() {
            tracing::warn!("no webhook URL configured; run notifications are disabled");
        }

        Ok(Self { client, url })
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&json!({ "text": format_message(summary) }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        tracing::info!(run_id = %summary.run_id, "run notification sent");
        Ok(())
    }
}

/// Chat message for `summary`. Uses `*bold*` markup.
#[must_use]
pub fn format_message(summary: &RunSummary) -> String {
    let headline = match summary.status {
        RunStatus::Completed => "*Catalog sync finished*".to_owned(),
        RunStatus::Incomplete { reason } => format!("*Catalog sync incomplete*: {reason}"),
    };

    format!(
        "{headline}\n\n\
         - Rows staged: *{rows}*\n\
         - Invalid records: *{invalid}*\n\
         - Pages: *{pages}*\n\
         - Elapsed: *{elapsed:.1}s*\n\
         - Run: {run_id}",
        rows = summary.inserted_rows,
        invalid = summary.invalid_records,
        pages = summary.pages,
        elapsed = summary.elapsed_secs,
        run_id = summary.run_id,
    )
}
