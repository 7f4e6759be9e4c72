use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::crawler::controller::{CrawlController, CrawlOutcome};
use crate::crawler::dedup::DedupGate;
use crate::crawler::enrichment::{EnrichmentBatcher, FlushSet};
use crate::crawler::events::{panic_message, EventBus};
use crate::crawler::observers::{LoggingObserver, PersistenceObserver, ProgressObserver};
use crate::llm::InferenceClient;
use crate::models::{CrawlSession, SessionStatus};
use crate::scrapers::{AdapterRegistry, Fetcher};
use crate::store::PersistenceSink;

/// Final state and counters of one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub status: SessionStatus,
    pub total_pages: usize,
    pub total_items: usize,
    pub successful_items: usize,
    pub duplicate_items: usize,
    pub failed_items: usize,
    pub error: Option<String>,
}

impl SourceReport {
    fn from_session(session: &CrawlSession) -> Self {
        Self {
            source: session.source.clone(),
            status: session.status,
            total_pages: session.total_pages,
            total_items: session.total_items,
            successful_items: session.successful_items,
            duplicate_items: session.duplicate_items,
            failed_items: session.failed_items,
            error: session.error_message.clone(),
        }
    }

    fn failed(source: &str, error: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            status: SessionStatus::Failed,
            total_pages: 0,
            total_items: 0,
            successful_items: 0,
            duplicate_items: 0,
            failed_items: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub sources: Vec<SourceReport>,
    pub total_extracted: usize,
    pub finished_at: DateTime<Utc>,
}

impl CrawlReport {
    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.source == name)
    }
}

/// Runs one controller per source concurrently and waits for every
/// enrichment flush before reporting.
pub struct CrawlSupervisor {
    config: Arc<AppConfig>,
    registry: AdapterRegistry,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn PersistenceSink>,
    inference: Option<Arc<dyn InferenceClient>>,
    progress: Arc<ProgressObserver>,
}

impl CrawlSupervisor {
    pub fn new(
        config: Arc<AppConfig>,
        registry: AdapterRegistry,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn PersistenceSink>,
        inference: Option<Arc<dyn InferenceClient>>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            sink,
            inference,
            progress: Arc::new(ProgressObserver::new()),
        }
    }

    pub fn progress(&self) -> Arc<ProgressObserver> {
        self.progress.clone()
    }

    /// Crawls every enabled source.
    pub async fn run(&self) -> CrawlReport {
        let names: Vec<String> = self
            .config
            .enabled_sources()
            .map(|s| s.name.clone())
            .collect();
        self.run_sources(&names).await
    }

    /// Crawls the named sources. Unknown sources are reported as failed.
    pub async fn run_sources(&self, names: &[String]) -> CrawlReport {
        let flushes = FlushSet::new();
        let bus = self.build_bus(flushes.clone());
        info!(sources = ?names, "Starting crawl");

        let mut reports: HashMap<String, SourceReport> = HashMap::new();
        let mut controllers = JoinSet::new();

        for name in names {
            let Some(source) = self.config.source(name).cloned() else {
                error!(source = %name, "Unknown source");
                reports.insert(name.clone(), SourceReport::failed(name, "unknown source"));
                continue;
            };
            let Some(adapter) = self.registry.get(name) else {
                error!(source = %name, "No adapter registered");
                reports.insert(name.clone(), SourceReport::failed(name, "no adapter registered"));
                continue;
            };

            let mut controller = CrawlController::new(
                source,
                adapter,
                self.fetcher.clone(),
                DedupGate::new(self.sink.clone()),
                bus.clone(),
                self.config.clone(),
            );
            let name = name.clone();
            controllers.spawn(async move {
                let outcome = AssertUnwindSafe(controller.run()).catch_unwind().await;
                (name, outcome.map_err(|panic| panic_message(&panic)))
            });
        }

        while let Some(joined) = controllers.join_next().await {
            match joined {
                Ok((name, Ok(CrawlOutcome { session, .. }))) => {
                    reports.insert(name, SourceReport::from_session(&session));
                }
                Ok((name, Err(panic))) => {
                    error!(source = %name, panic = %panic, "Crawl controller panicked");
                    reports.insert(
                        name.clone(),
                        SourceReport::failed(&name, format!("controller panicked: {panic}")),
                    );
                }
                Err(e) => error!(error = %e, "Crawl task did not finish"),
            }
        }

        info!(pending = flushes.pending(), "Waiting for enrichment flushes");
        flushes.wait_all().await;

        let sources: Vec<SourceReport> = names.iter().filter_map(|n| reports.remove(n)).collect();
        let total_extracted = sources.iter().map(|s| s.successful_items).sum();
        info!(total_extracted, "Crawl finished");

        CrawlReport {
            sources,
            total_extracted,
            finished_at: Utc::now(),
        }
    }

    fn build_bus(&self, flushes: FlushSet) -> EventBus {
        let persistence = Arc::new(PersistenceObserver::new(self.sink.clone()));
        let downstream = EventBus::builder().subscribe(persistence.clone()).build();
        let batcher = EnrichmentBatcher::new(
            self.inference.clone(),
            self.config.llm.batch_size,
            self.config.llm.timeout,
            downstream,
            flushes,
        );

        EventBus::builder()
            .subscribe(Arc::new(LoggingObserver))
            .subscribe(self.progress.clone())
            .subscribe(Arc::new(batcher))
            .subscribe(persistence)
            .build()
    }
}
