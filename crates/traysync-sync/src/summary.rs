use chrono::{DateTime, Utc};
use traysync_catalog::AbortReason;
use uuid::Uuid;

/// How a run that produced a summary ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The catalog signalled the end of its data.
    Completed,
    /// The run stopped early; the staging table holds a partial catalog.
    Incomplete { reason: AbortReason },
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Incomplete { reason } => write!(f, "incomplete ({reason})"),
        }
    }
}

/// Tallies of one sync run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Rows the sink reported as written.
    pub inserted_rows: u64,
    /// Records that passed validation, including those with no stock.
    pub valid_records: usize,
    /// Records dropped by validation.
    pub invalid_records: usize,
    pub pages: u32,
    pub rate_limit_retries: u32,
    pub elapsed_secs: f64,
    pub status: RunStatus,
}

impl RunSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
