//! Scripted collaborators for pipeline tests.
//!
//! Pages use a tiny line format instead of HTML: search pages list
//! `link <url>` lines, detail pages list `<field>: <value>` lines.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;

use crate::crawler::events::{CrawlEvent, EventKind, Observer};
use crate::error::{CrawlError, InferenceError};
use crate::llm::InferenceClient;
use crate::models::{CandidateLink, Field, FieldMap, Property};
use crate::scrapers::{FetchOutcome, Fetcher, RenderedDocument, SourceAdapter};

/// Fetcher serving canned pages. Unknown URLs fail individually; URLs
/// marked with `failing_batch` make the whole `fetch_many` call fail.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, String>,
    failing_batches: HashSet<String>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), body.into());
        self
    }

    pub fn failing_batch(mut self, url: &str) -> Self {
        self.failing_batches.insert(url.to_string());
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_one(&self, url: &str) -> FetchOutcome {
        match self.pages.get(url) {
            Some(body) => FetchOutcome::success(RenderedDocument::new(url, body.clone())),
            None => FetchOutcome::failure(url, "404 Not Found"),
        }
    }

    async fn fetch_many(
        &self,
        urls: &[String],
        _concurrency: usize,
    ) -> Result<Vec<FetchOutcome>, CrawlError> {
        if let Some(url) = urls.iter().find(|u| self.failing_batches.contains(*u)) {
            return Err(CrawlError::Fetch {
                url: url.clone(),
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(join_all(urls.iter().map(|u| self.fetch_one(u))).await)
    }
}

/// Adapter for the line format, recording which detail pages it parsed.
pub struct ScriptedAdapter {
    name: String,
    detail_calls: Mutex<Vec<String>>,
}

impl ScriptedAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            detail_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().clone()
    }
}

impl SourceAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_page_url(&self, search_url: &str, page: usize) -> String {
        format!("{search_url}?p={page}")
    }

    fn extract_links(&self, document: &RenderedDocument) -> Vec<CandidateLink> {
        document
            .html
            .lines()
            .filter_map(|line| line.trim().strip_prefix("link "))
            .map(|url| CandidateLink {
                url: url.trim().to_string(),
                title: String::new(),
            })
            .collect()
    }

    fn extract_details(&self, document: &RenderedDocument, url: &str) -> FieldMap {
        self.detail_calls.lock().push(url.to_string());
        document
            .html
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                let field = key.trim().parse::<Field>().ok()?;
                Some((field, value.trim().to_string()))
            })
            .collect()
    }
}

/// Search page body listing `links`.
pub fn search_page(links: &[&str]) -> String {
    links.iter().map(|l| format!("link {l}\n")).collect()
}

/// Detail page body with the given fields.
pub fn detail_page(fields: &[(Field, &str)]) -> String {
    fields.iter().map(|(f, v)| format!("{f}: {v}\n")).collect()
}

enum Reply {
    Text(String),
    RateLimited,
}

/// Inference client with a fixed reply and optional latency. Tracks how
/// many calls overlapped.
pub struct ScriptedInference {
    reply: Reply,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_reply(Reply::Text(text.into()))
    }

    pub fn rate_limited() -> Self {
        Self::with_reply(Reply::RateLimited)
    }

    /// Never answers within any reasonable timeout.
    pub fn hanging() -> Self {
        Self::replying("[]").with_delay(Duration::from_secs(3600))
    }

    fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedInference {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.reply {
            Reply::Text(text) => Ok(text.clone()),
            Reply::RateLimited => Err(InferenceError::RateLimited),
        }
    }
}

/// Observer keeping every event it receives.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(String, CrawlEvent)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<(String, CrawlEvent)> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|(_, e)| e.kind()).collect()
    }

    pub fn enriched(&self) -> Vec<Property> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, e)| match e {
                CrawlEvent::Enriched(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Observer for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, event: &CrawlEvent, source: &str) -> anyhow::Result<()> {
        self.events.lock().push((source.to_string(), event.clone()));
        Ok(())
    }
}
