use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{count_sources, most_recent, upsert_into, PersistenceSink, UpsertOutcome};
use crate::error::StoreError;
use crate::models::{CrawlSession, Property};

/// In-process store. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, Property>>,
    sessions: RwLock<Vec<CrawlSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `records`, as if persisted by an earlier run.
    pub fn with_records(records: impl IntoIterator<Item = Property>) -> Self {
        let store = Self::new();
        {
            let mut table = store.records.write();
            for record in records {
                table.insert(record.link.clone(), record);
            }
        }
        store
    }

    pub fn records(&self) -> Vec<Property> {
        self.records.read().values().cloned().collect()
    }

    pub fn record(&self, link: &str) -> Option<Property> {
        self.records.read().get(link).cloned()
    }

    pub fn sessions(&self) -> Vec<CrawlSession> {
        self.sessions.read().clone()
    }
}

#[async_trait]
impl PersistenceSink for MemoryStore {
    async fn exists_by_link(&self, link: &str) -> Result<bool, StoreError> {
        Ok(self.records.read().contains_key(link))
    }

    async fn upsert_record(&self, record: &Property) -> Result<UpsertOutcome, StoreError> {
        Ok(upsert_into(&mut self.records.write(), record))
    }

    async fn save_session(&self, session: &CrawlSession) -> Result<(), StoreError> {
        self.sessions.write().push(session.clone());
        Ok(())
    }

    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        Ok(count_sources(self.records.read().values()))
    }

    async fn recent_sessions(&self, limit: usize) -> Result<Vec<CrawlSession>, StoreError> {
        Ok(most_recent(&self.sessions.read(), limit))
    }
}
