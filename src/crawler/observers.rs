use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use strum::Display;
use tracing::{debug, error, info};

use crate::crawler::events::{CrawlEvent, Observer};
use crate::store::PersistenceSink;

/// Logs every lifecycle event.
#[derive(Debug, Default)]
pub struct LoggingObserver;

#[async_trait]
impl Observer for LoggingObserver {
    fn name(&self) -> &str {
        "logging"
    }

    async fn handle(&self, event: &CrawlEvent, source: &str) -> anyhow::Result<()> {
        match event {
            CrawlEvent::Started(session) => {
                info!(source, session = %session.id, "Crawl started");
            }
            CrawlEvent::Extracted(property) => {
                debug!(
                    source,
                    link = %property.link,
                    title = property.title.as_deref().unwrap_or_default(),
                    "Listing extracted"
                );
            }
            CrawlEvent::Completed(session) => info!(
                source,
                pages = session.total_pages,
                total = session.total_items,
                successful = session.successful_items,
                duplicates = session.duplicate_items,
                failed = session.failed_items,
                "Crawl completed"
            ),
            CrawlEvent::Failed { error, session } => error!(
                source,
                error = %error,
                successful = session.successful_items,
                "Crawl failed"
            ),
            CrawlEvent::Enriched(property) => {
                debug!(source, link = %property.link, "Listing enriched");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Progress of one source as seen through its events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceProgress {
    pub status: ProgressStatus,
    pub processed_items: usize,
    pub total_items: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Default for SourceProgress {
    fn default() -> Self {
        Self {
            status: ProgressStatus::Idle,
            processed_items: 0,
            total_items: 0,
            start_time: None,
            end_time: None,
        }
    }
}

/// Tracks per-source progress; queryable while crawls are running.
#[derive(Debug, Default)]
pub struct ProgressObserver {
    progress: RwLock<HashMap<String, SourceProgress>>,
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self, source: &str) -> Option<SourceProgress> {
        self.progress.read().get(source).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, SourceProgress> {
        self.progress.read().clone()
    }
}

#[async_trait]
impl Observer for ProgressObserver {
    fn name(&self) -> &str {
        "progress"
    }

    async fn handle(&self, event: &CrawlEvent, source: &str) -> anyhow::Result<()> {
        let mut progress = self.progress.write();
        let entry = progress.entry(source.to_string()).or_default();

        match event {
            CrawlEvent::Started(session) => {
                entry.status = ProgressStatus::Running;
                entry.start_time = Some(session.start_time);
                entry.processed_items = 0;
            }
            CrawlEvent::Extracted(_) => entry.processed_items += 1,
            CrawlEvent::Completed(session) => {
                entry.status = ProgressStatus::Completed;
                entry.total_items = session.total_items;
                entry.end_time = session.end_time;
            }
            CrawlEvent::Failed { session, .. } => {
                entry.status = ProgressStatus::Failed;
                entry.total_items = session.total_items;
                entry.end_time = session.end_time;
            }
            CrawlEvent::Enriched(_) => {}
        }
        Ok(())
    }
}

/// Writes enriched listings and finished sessions to the store.
pub struct PersistenceObserver {
    sink: Arc<dyn PersistenceSink>,
}

impl PersistenceObserver {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Observer for PersistenceObserver {
    fn name(&self) -> &str {
        "persistence"
    }

    async fn handle(&self, event: &CrawlEvent, source: &str) -> anyhow::Result<()> {
        match event {
            CrawlEvent::Enriched(property) => {
                let outcome = self
                    .sink
                    .upsert_record(property)
                    .await
                    .with_context(|| format!("saving listing {}", property.link))?;
                debug!(source, link = %property.link, ?outcome, "Listing saved");
            }
            CrawlEvent::Completed(session) | CrawlEvent::Failed { session, .. } => {
                self.sink
                    .save_session(session)
                    .await
                    .with_context(|| format!("saving session {}", session.id))?;
            }
            CrawlEvent::Started(_) | CrawlEvent::Extracted(_) => {}
        }
        Ok(())
    }
}
