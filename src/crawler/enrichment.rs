//! Batched completion of missing listing fields through an inference
//! provider.
//!
//! The batcher collects `Extracted` listings per source and hands full
//! batches to a flush task. Flushes run on a [`FlushSet`] owned by the
//! supervisor, so a crawl is not reported finished until every flush has
//! republished its listings as `Enriched`. Listings are republished even
//! when the provider fails or times out.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::crawler::events::{CrawlEvent, EventBus, Observer};
use crate::error::{CrawlError, InferenceError};
use crate::llm::InferenceClient;
use crate::models::{Field, Property};
use crate::normalize::PROPERTY_TYPES;

static CODE_FENCE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[a-zA-Z]*\s*").expect("valid regex"));
static CODE_FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*```$").expect("valid regex"));

/// Background flush tasks, awaited before a run is reported complete.
#[derive(Clone, Default)]
pub struct FlushSet {
    tasks: Arc<Mutex<JoinSet<()>>>,
}

impl FlushSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.lock().spawn(task);
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Waits for every flush, including ones spawned while waiting.
    pub async fn wait_all(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock());
            if tasks.is_empty() {
                return;
            }
            while let Some(result) = tasks.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "Flush task did not finish");
                }
            }
        }
    }
}

/// Buffers extracted listings and enriches them in batches.
pub struct EnrichmentBatcher {
    threshold: usize,
    buffers: Mutex<HashMap<String, Vec<Property>>>,
    scheduled: AtomicUsize,
    flushes: FlushSet,
    flusher: Arc<Flusher>,
}

struct Flusher {
    client: Option<Arc<dyn InferenceClient>>,
    /// Single permit: one inference request in flight across all sources.
    channel: Semaphore,
    timeout: Duration,
    downstream: EventBus,
}

impl EnrichmentBatcher {
    /// `client` is `None` when enrichment is disabled; batches are then
    /// republished unchanged.
    pub fn new(
        client: Option<Arc<dyn InferenceClient>>,
        threshold: usize,
        timeout: Duration,
        downstream: EventBus,
        flushes: FlushSet,
    ) -> Self {
        Self {
            threshold: threshold.max(1),
            buffers: Mutex::new(HashMap::new()),
            scheduled: AtomicUsize::new(0),
            flushes,
            flusher: Arc::new(Flusher {
                client,
                channel: Semaphore::new(1),
                timeout,
                downstream,
            }),
        }
    }

    /// Number of flushes scheduled so far.
    pub fn scheduled_flushes(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Listings waiting in `source`'s buffer.
    pub fn buffered(&self, source: &str) -> usize {
        self.buffers.lock().get(source).map_or(0, Vec::len)
    }

    fn push(&self, source: &str, property: Property) -> Option<Vec<Property>> {
        let mut buffers = self.buffers.lock();
        let buffer = buffers.entry(source.to_string()).or_default();
        buffer.push(property);
        (buffer.len() >= self.threshold).then(|| std::mem::take(buffer))
    }

    fn drain(&self, source: &str) -> Option<Vec<Property>> {
        self.buffers
            .lock()
            .remove(source)
            .filter(|buffer| !buffer.is_empty())
    }

    fn schedule(&self, source: &str, batch: Vec<Property>) {
        let flush_no = self.scheduled.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(source, flush_no, size = batch.len(), "Scheduling enrichment flush");

        let flusher = self.flusher.clone();
        let source = source.to_string();
        self.flushes
            .spawn(async move { flusher.flush(&source, batch).await });
    }
}

#[async_trait]
impl Observer for EnrichmentBatcher {
    fn name(&self) -> &str {
        "enrichment"
    }

    async fn handle(&self, event: &CrawlEvent, source: &str) -> anyhow::Result<()> {
        let batch = match event {
            CrawlEvent::Extracted(property) => self.push(source, property.clone()),
            CrawlEvent::Completed(_) | CrawlEvent::Failed { .. } => self.drain(source),
            CrawlEvent::Started(_) | CrawlEvent::Enriched(_) => None,
        };
        if let Some(batch) = batch {
            self.schedule(source, batch);
        }
        Ok(())
    }
}

impl Flusher {
    async fn flush(&self, source: &str, mut batch: Vec<Property>) {
        if let Some(client) = &self.client {
            match self.enrich(client.as_ref(), &batch).await {
                Ok(answers) => {
                    let applied = merge(&mut batch, &answers);
                    info!(source, size = batch.len(), applied, "Enrichment merged");
                }
                Err(e) => warn!(
                    source,
                    size = batch.len(),
                    error = %e,
                    "Enrichment failed, saving listings as extracted"
                ),
            }
        }

        for property in batch {
            self.downstream
                .publish(CrawlEvent::Enriched(property), source)
                .await;
        }
    }

    async fn enrich(
        &self,
        client: &dyn InferenceClient,
        batch: &[Property],
    ) -> Result<Vec<Map<String, Value>>, CrawlError> {
        let missing = missing_union(batch);
        if missing.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_prompt(batch, &missing);

        let _permit = self
            .channel
            .acquire()
            .await
            .map_err(|e| CrawlError::Enrichment(e.to_string()))?;

        let text = tokio::time::timeout(self.timeout, client.complete(&prompt))
            .await
            .map_err(|_| InferenceError::Timeout(self.timeout))
            .and_then(|result| result)
            .map_err(|e| CrawlError::Enrichment(e.to_string()))?;

        parse_response(&text).map_err(|e| CrawlError::Enrichment(e.to_string()))
    }
}

/// Fields missing on at least one listing of the batch.
pub fn missing_union(batch: &[Property]) -> BTreeSet<Field> {
    batch.iter().flat_map(Property::missing_fields).collect()
}

pub fn build_prompt(batch: &[Property], missing: &BTreeSet<Field>) -> String {
    let missing_list = missing
        .iter()
        .map(Field::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = format!(
        "You are a Vietnamese real-estate expert.\n\
         Below are several listings. Some fields are filled in, some are missing.\n\
         From each listing's own text, fill in these missing fields: {missing_list}\n\
         \n\
         Rules:\n\
         - Answer with a JSON array only, one object per listing.\n\
         - Every object must contain \"id\" exactly as given.\n\
         - Only include missing fields. Never repeat fields that already have a value.\n\
         - Do not guess. Use null when the text does not state a value.\n\
         - legal: only the exact phrase from the text (sổ đỏ, sổ hồng, hợp đồng mua bán, ...).\n\
         - amenity_location: nearby schools, hospitals, markets, parks, transport, quoted from the text.\n\
         - property_type: one of {}.\n\
         \n\
         Listings:\n",
        PROPERTY_TYPES.join(", ")
    );

    for (i, property) in batch.iter().enumerate() {
        let _ = writeln!(prompt, "\n{}. id: {}", i + 1, property.id);
        for (field, value) in populated_fields(property) {
            let _ = writeln!(prompt, "{field}: {value}");
        }
    }
    prompt
}

fn populated_fields(property: &Property) -> Vec<(Field, String)> {
    use strum::IntoEnumIterator;
    Field::iter()
        .filter_map(|field| property.field_value(field).map(|value| (field, value)))
        .collect()
}

/// Extracts the JSON array of answer objects from a provider reply.
pub fn parse_response(text: &str) -> Result<Vec<Map<String, Value>>, InferenceError> {
    let trimmed = text.trim();
    let unfenced = CODE_FENCE_OPEN_RE.replace(trimmed, "");
    let unfenced = CODE_FENCE_CLOSE_RE.replace(&unfenced, "");

    let (Some(start), Some(end)) = (unfenced.find('['), unfenced.rfind(']')) else {
        return Err(InferenceError::Unparseable(snippet(trimmed)));
    };
    if end < start {
        return Err(InferenceError::Unparseable(snippet(trimmed)));
    }

    let values: Vec<Value> = serde_json::from_str(&unfenced[start..=end])
        .map_err(|e| InferenceError::Unparseable(e.to_string()))?;

    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

fn snippet(text: &str) -> String {
    text.chars().take(120).collect()
}

/// Applies answers to the listings they name by id.
///
/// Only fields still missing are written, through the same normalizers
/// used at extraction, so merging the same answers twice changes
/// nothing. Returns the number of fields written.
pub fn merge(batch: &mut [Property], answers: &[Map<String, Value>]) -> usize {
    let mut applied = 0;

    for answer in answers {
        let Some(id) = answer
            .get("id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id.trim()).ok())
        else {
            debug!("Ignoring answer without a valid id");
            continue;
        };
        let Some(property) = batch.iter_mut().find(|p| p.id == id) else {
            debug!(%id, "Ignoring answer for unknown listing");
            continue;
        };

        for (key, value) in answer {
            let Some(field) = field_for_key(key) else {
                continue;
            };
            let Some(raw) = answer_text(value) else {
                continue;
            };
            if !property.is_missing(field) {
                continue;
            }
            match property.apply_field(field, &raw) {
                Ok(()) => applied += 1,
                Err(e) => debug!(link = %property.link, error = %e, "Ignoring enrichment value"),
            }
        }
    }

    applied
}

/// Maps an answer key to a field, accepting the camelCase spellings
/// models tend to echo back.
fn field_for_key(key: &str) -> Option<Field> {
    key.parse::<Field>().ok().or(match key {
        "postedDate" => Some(Field::PostedDate),
        "amenityLocation" => Some(Field::AmenityLocation),
        "propertyType" | "type" => Some(Field::PropertyType),
        "bedroom" => Some(Field::Bedrooms),
        "bathroom" => Some(Field::Bathrooms),
        _ => None,
    })
}

fn answer_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
