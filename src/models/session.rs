use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Terminal or running state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    Failed,
}

/// Statistics and lifecycle of one source's crawl run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlSession {
    pub id: Uuid,
    pub source: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_pages: usize,
    pub total_items: usize,
    pub successful_items: usize,
    pub failed_items: usize,
    pub duplicate_items: usize,
    pub status: SessionStatus,
    pub error_message: Option<String>,
}

impl CrawlSession {
    /// Starts a new running session for `source`.
    pub fn start(source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            start_time: Utc::now(),
            end_time: None,
            total_pages: 0,
            total_items: 0,
            successful_items: 0,
            failed_items: 0,
            duplicate_items: 0,
            status: SessionStatus::Running,
            error_message: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
        self.end_time = Some(Utc::now());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Failed;
        self.error_message = Some(message.into());
        self.end_time = Some(Utc::now());
    }

    /// Every discovered link ends up successful, duplicate or failed.
    pub fn is_reconciled(&self) -> bool {
        self.successful_items + self.duplicate_items + self.failed_items == self.total_items
    }

    pub fn is_finished(&self) -> bool {
        self.status != SessionStatus::Running
    }
}
