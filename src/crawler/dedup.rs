use std::sync::Arc;

use crate::error::StoreError;
use crate::store::PersistenceSink;

/// Admits only links that are not stored yet.
///
/// Two sources may admit the same link concurrently; the write path is
/// upsert-by-link so the race produces one record.
#[derive(Clone)]
pub struct DedupGate {
    sink: Arc<dyn PersistenceSink>,
}

impl DedupGate {
    pub fn new(sink: Arc<dyn PersistenceSink>) -> Self {
        Self { sink }
    }

    pub async fn admit(&self, link: &str) -> Result<bool, StoreError> {
        Ok(!self.sink.exists_by_link(link).await?)
    }
}
