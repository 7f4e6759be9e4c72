use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{count_sources, most_recent, upsert_into, PersistenceSink, UpsertOutcome};
use crate::error::StoreError;
use crate::models::{CrawlSession, Property};

const LISTINGS_FILE: &str = "listings.json";
const SESSIONS_FILE: &str = "sessions.json";

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<String, Property>,
    sessions: Vec<CrawlSession>,
}

/// Store backed by two pretty-printed JSON files in a data directory.
///
/// Both tables are kept in memory and rewritten in full after every
/// mutation while the lock is held, so writes never interleave. A
/// mutation whose write fails is rolled back in memory.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileStore {
    /// Opens the store in `dir`, creating it if needed and loading any
    /// previously saved listings and sessions.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let records: Vec<Property> = read_json(&dir.join(LISTINGS_FILE)).await?;
        let sessions: Vec<CrawlSession> = read_json(&dir.join(SESSIONS_FILE)).await?;
        info!(
            dir = %dir.display(),
            listings = records.len(),
            sessions = sessions.len(),
            "Opened JSON store"
        );

        Ok(Self {
            dir,
            tables: Mutex::new(Tables {
                records: records.into_iter().map(|r| (r.link.clone(), r)).collect(),
                sessions,
            }),
        })
    }

    async fn write_listings(&self, tables: &Tables) -> Result<(), StoreError> {
        let listings: Vec<&Property> = tables.records.values().collect();
        write_json(&self.dir.join(LISTINGS_FILE), &listings).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), "Wrote store file");
    Ok(())
}

#[async_trait]
impl PersistenceSink for JsonFileStore {
    async fn exists_by_link(&self, link: &str) -> Result<bool, StoreError> {
        Ok(self.tables.lock().await.records.contains_key(link))
    }

    async fn upsert_record(&self, record: &Property) -> Result<UpsertOutcome, StoreError> {
        let mut tables = self.tables.lock().await;
        let previous = tables.records.get(&record.link).cloned();
        let outcome = upsert_into(&mut tables.records, record);

        if let Err(e) = self.write_listings(&tables).await {
            match previous {
                Some(previous) => tables.records.insert(record.link.clone(), previous),
                None => tables.records.remove(&record.link),
            };
            return Err(e);
        }
        Ok(outcome)
    }

    async fn save_session(&self, session: &CrawlSession) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let mut sessions = tables.sessions.clone();
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        write_json(&self.dir.join(SESSIONS_FILE), &sessions).await?;
        tables.sessions = sessions;
        Ok(())
    }

    async fn count_by_source(&self) -> Result<BTreeMap<String, usize>, StoreError> {
        Ok(count_sources(self.tables.lock().await.records.values()))
    }

    async fn recent_sessions(&self, limit: usize) -> Result<Vec<CrawlSession>, StoreError> {
        Ok(most_recent(&self.tables.lock().await.sessions, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let mut property = Property::new("https://mogi.vn/can-ho-id9", "mogi.vn", Utc::now()).unwrap();
        property.title = Some("Căn hộ Quận 7".to_string());
        let mut session = CrawlSession::start("mogi.vn");
        session.total_items = 1;
        session.successful_items = 1;
        session.complete();

        {
            let store = JsonFileStore::open(dir.path()).await.unwrap();
            store.upsert_record(&property).await.unwrap();
            store.save_session(&session).await.unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).await.unwrap();
        assert!(reopened.exists_by_link("https://mogi.vn/can-ho-id9").await.unwrap());
        assert_eq!(
            reopened.count_by_source().await.unwrap(),
            BTreeMap::from([("mogi.vn".to_string(), 1)])
        );
        assert_eq!(reopened.recent_sessions(10).await.unwrap(), vec![session]);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_one_record_per_link() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonFileStore::open(dir.path()).await.unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut property =
                        Property::new("https://bds123.vn/nha-pr7.html", "bds123.vn", Utc::now())
                            .unwrap();
                    property.bedrooms = Some(i);
                    store.upsert_record(&property).await.unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let counts = store.count_by_source().await.unwrap();
        assert_eq!(counts.get("bds123.vn"), Some(&1));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_tables_unchanged() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("data");
        let store = JsonFileStore::open(&dir).await.unwrap();

        let mut stored = Property::new("https://mogi.vn/nha-id1", "mogi.vn", Utc::now()).unwrap();
        stored.title = Some("Nhà phố".to_string());
        store.upsert_record(&stored).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();

        let fresh = Property::new("https://mogi.vn/nha-id2", "mogi.vn", Utc::now()).unwrap();
        assert!(matches!(
            store.upsert_record(&fresh).await,
            Err(StoreError::Io(_))
        ));
        assert!(!store.exists_by_link("https://mogi.vn/nha-id2").await.unwrap());

        let mut changed = stored.clone();
        changed.title = Some("Biệt thự".to_string());
        assert!(store.upsert_record(&changed).await.is_err());
        let records = store.tables.lock().await.records.clone();
        assert_eq!(records.len(), 1);
        assert_eq!(records["https://mogi.vn/nha-id1"].title.as_deref(), Some("Nhà phố"));

        assert!(store.save_session(&CrawlSession::start("mogi.vn")).await.is_err());
        assert_eq!(store.recent_sessions(10).await.unwrap(), vec![]);
    }
}
