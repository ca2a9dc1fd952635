use crate::ids::BackgroundJobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A parent record tracking aggregate progress of one or many queue
/// messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub id: BackgroundJobId,
    pub kind: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    pub status: BackgroundJobStatus,
    pub total: u64,
    pub done: u64,
    pub failed: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub parent_id: Option<BackgroundJobId>,
}

/// Longest prefix of `lastError` surfaced on the job status endpoint.
/// An unbounded message stored on every failed message would bloat the
/// job row.
const LAST_ERROR_MAX_LEN: usize = 500;

impl BackgroundJob {
    pub fn new(kind: impl Into<String>, total: u64) -> Self {
        Self {
            id: BackgroundJobId::new(),
            kind: kind.into(),
            parameters: HashMap::new(),
            status: BackgroundJobStatus::Pending,
            total,
            done: 0,
            failed: 0,
            started_at: None,
            completed_at: None,
            last_error: None,
            parent_id: None,
        }
    }

    pub fn start(&mut self, at: DateTime<Utc>) {
        if self.status == BackgroundJobStatus::Pending {
            self.status = BackgroundJobStatus::Running;
            self.started_at = Some(at);
        }
    }

    pub fn record_success(&mut self) {
        self.done += 1;
        self.maybe_complete();
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.failed += 1;
        let mut message = error.into();
        message.truncate(LAST_ERROR_MAX_LEN);
        self.last_error = Some(message);
        self.maybe_complete();
    }

    fn maybe_complete(&mut self) {
        if self.done + self.failed >= self.total
            && matches!(self.status, BackgroundJobStatus::Running)
        {
            self.status = BackgroundJobStatus::Completed;
            self.completed_at = Some(Utc::now());
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            BackgroundJobStatus::Completed
                | BackgroundJobStatus::Failed
                | BackgroundJobStatus::Cancelled
        )
    }
}
