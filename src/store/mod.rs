//! Persistence for listings and crawl sessions.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{CrawlSession, Property};

/// Write path and aggregates of the listing store.
///
/// `upsert_record` is keyed by link: writing a listing whose link is
/// already stored replaces it (keeping the stored id), so concurrent
/// writers for the same link resolve last-writer-wins.
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    async fn exists_by_link(&self, link: &str) -> Result<bool, StoreError>;

    async fn upsert_record(&self, record: &Property) -> Result<UpsertOutcome, StoreError>;

    async fn save_session(&self, session: &CrawlSession) -> Result<(), StoreError>;

    /// Stored listing count per source.
    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, StoreError>;

    /// Most recent sessions first.
    async fn recent_sessions(&self, limit: usize) -> Result<Vec<CrawlSession>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Applies upsert-by-link to an in-memory listing table.
pub(crate) fn upsert_into(
    records: &mut BTreeMap<String, Property>,
    record: &Property,
) -> UpsertOutcome {
    let mut incoming = record.clone();
    incoming.updated_at = chrono::Utc::now();

    match records.get_mut(&record.link) {
        Some(existing) => {
            incoming.id = existing.id;
            incoming.crawled_at = existing.crawled_at.min(incoming.crawled_at);
            *existing = incoming;
            UpsertOutcome::Updated
        }
        None => {
            records.insert(record.link.clone(), incoming);
            UpsertOutcome::Inserted
        }
    }
}

pub(crate) fn count_sources<'a>(
    records: impl IntoIterator<Item = &'a Property>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.source.clone()).or_insert(0) += 1;
    }
    counts
}

pub(crate) fn most_recent(sessions: &[CrawlSession], limit: usize) -> Vec<CrawlSession> {
    let mut sorted = sessions.to_vec();
    sorted.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    sorted.truncate(limit);
    sorted
}
