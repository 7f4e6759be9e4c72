use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use strum::Display;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, SourceConfig};
use crate::crawler::dedup::DedupGate;
use crate::crawler::events::{CrawlEvent, EventBus};
use crate::error::CrawlError;
use crate::models::{CandidateLink, CrawlSession, Field, Property};
use crate::scrapers::{Fetcher, SourceAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// What one controller run produced.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    /// Listings extracted successfully, in publication order.
    pub records: Vec<Property>,
    pub session: CrawlSession,
}

/// Crawls one source: discovers listing links page by page, filters out
/// known links and extracts the rest in concurrent batches.
pub struct CrawlController {
    source: Arc<SourceConfig>,
    adapter: Arc<dyn SourceAdapter>,
    fetcher: Arc<dyn Fetcher>,
    gate: DedupGate,
    bus: EventBus,
    config: Arc<AppConfig>,
    state: ControllerState,
    session: CrawlSession,
}

impl CrawlController {
    pub fn new(
        source: Arc<SourceConfig>,
        adapter: Arc<dyn SourceAdapter>,
        fetcher: Arc<dyn Fetcher>,
        gate: DedupGate,
        bus: EventBus,
        config: Arc<AppConfig>,
    ) -> Self {
        let session = CrawlSession::start(source.name.clone());
        Self {
            source,
            adapter,
            fetcher,
            gate,
            bus,
            config,
            state: ControllerState::Idle,
            session,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn session(&self) -> &CrawlSession {
        &self.session
    }

    /// Runs the crawl to completion. Never fails: errors end the session
    /// as `Failed` and are reported through the event bus.
    pub async fn run(&mut self) -> CrawlOutcome {
        let name = self.source.name.clone();
        self.session = CrawlSession::start(name.clone());
        self.state = ControllerState::Running;
        self.bus
            .publish(CrawlEvent::Started(self.session.clone()), &name)
            .await;

        let mut records = Vec::new();
        match self.crawl(&mut records).await {
            Ok(()) => {
                self.session.complete();
                self.state = ControllerState::Completed;
                self.bus
                    .publish(CrawlEvent::Completed(self.session.clone()), &name)
                    .await;
            }
            Err(e) => {
                let error = e.to_string();
                self.session.fail(error.clone());
                self.state = ControllerState::Failed;
                self.bus
                    .publish(
                        CrawlEvent::Failed {
                            error,
                            session: self.session.clone(),
                        },
                        &name,
                    )
                    .await;
            }
        }

        CrawlOutcome {
            records,
            session: self.session.clone(),
        }
    }

    async fn crawl(&mut self, records: &mut Vec<Property>) -> Result<(), CrawlError> {
        // No login flow exists, so such sources cannot be crawled.
        if self.source.login_required {
            return Err(CrawlError::Session(format!(
                "{} requires a logged-in session and no login is configured",
                self.source.name
            )));
        }

        let mut seen = HashSet::new();

        for search_url in self.source.search_urls.clone() {
            info!(source = %self.source.name, url = %search_url, "Crawling search URL");
            let links = self.discover(&search_url, &mut seen).await?;
            info!(source = %self.source.name, admitted = links.len(), "Links admitted");
            self.extract_all(&links, records).await;
        }
        Ok(())
    }

    /// Walks search result pages in batches and returns the links that
    /// pass in-run and stored deduplication.
    async fn discover(
        &mut self,
        search_url: &str,
        seen: &mut HashSet<String>,
    ) -> Result<Vec<CandidateLink>, CrawlError> {
        let page_limit = self.config.page_limit;
        let batch_size = self.config.link_batch_size.max(1);
        let mut admitted = Vec::new();
        let mut page = 1;

        while page <= page_limit {
            let last = (page + batch_size - 1).min(page_limit);
            let urls: Vec<String> = (page..=last)
                .map(|p| self.adapter.build_page_url(search_url, p))
                .collect();
            debug!(source = %self.source.name, first = page, last, "Fetching search pages");

            let outcomes = self
                .fetcher
                .fetch_many(&urls, self.config.fetch_concurrency)
                .await?;

            let mut fetched = 0;
            for outcome in outcomes {
                let document = match outcome.result {
                    Ok(document) => document,
                    Err(e) => {
                        warn!(source = %self.source.name, url = %outcome.url, error = %e, "Search page failed");
                        continue;
                    }
                };
                fetched += 1;
                for link in self.adapter.extract_links(&document) {
                    if self.admit(&link, seen).await? {
                        admitted.push(link);
                    }
                }
            }
            self.session.total_pages += fetched;

            if fetched == 0 {
                info!(source = %self.source.name, page, "No search pages fetched, stopping pagination");
                break;
            }
            page = last + 1;
            if page <= page_limit {
                tokio::time::sleep(self.source.delay).await;
            }
        }

        Ok(admitted)
    }

    async fn admit(
        &mut self,
        link: &CandidateLink,
        seen: &mut HashSet<String>,
    ) -> Result<bool, CrawlError> {
        self.session.total_items += 1;
        if !seen.insert(link.url.clone()) || !self.gate.admit(&link.url).await? {
            self.session.duplicate_items += 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn extract_all(&mut self, links: &[CandidateLink], records: &mut Vec<Property>) {
        let name = self.source.name.clone();
        let batch_size = self.config.detail_batch_size.max(1);

        for (i, batch) in links.chunks(batch_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.source.delay).await;
            }

            let results = join_all(batch.iter().map(|link| self.extract_one(link))).await;
            for result in results {
                match result {
                    Ok(property) => {
                        self.session.successful_items += 1;
                        records.push(property.clone());
                        self.bus.publish(CrawlEvent::Extracted(property), &name).await;
                    }
                    Err(e) => {
                        self.session.failed_items += 1;
                        warn!(source = %name, error = %e, "Listing extraction failed");
                    }
                }
            }
        }
    }

    async fn extract_one(&self, link: &CandidateLink) -> Result<Property, CrawlError> {
        let document = self
            .fetcher
            .fetch_one(&link.url)
            .await
            .result
            .map_err(|message| CrawlError::Fetch {
                url: link.url.clone(),
                message,
            })?;

        let fields = self.adapter.extract_details(&document, &link.url);
        if fields.is_empty() {
            return Err(CrawlError::Parse {
                url: link.url.clone(),
                message: "no fields found on detail page".to_string(),
            });
        }

        let mut property = Property::from_fields(&link.url, &self.source.name, &fields, Utc::now())
            .map_err(|e| CrawlError::Parse {
                url: link.url.clone(),
                message: e.to_string(),
            })?;
        if property.is_missing(Field::Title) && !link.title.is_empty() {
            property.apply_field(Field::Title, &link.title).ok();
        }
        Ok(property)
    }
}
