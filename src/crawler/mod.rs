//! Crawl orchestration: per-source controllers, the event bus and its
//! observers, enrichment batching and the supervisor tying them together.

pub mod controller;
pub mod dedup;
pub mod enrichment;
pub mod events;
pub mod observers;
pub mod supervisor;

pub use controller::{ControllerState, CrawlController, CrawlOutcome};
pub use dedup::DedupGate;
pub use enrichment::{EnrichmentBatcher, FlushSet};
pub use events::{CrawlEvent, EventBus, EventKind, Observer};
pub use observers::{
    LoggingObserver, PersistenceObserver, ProgressObserver, ProgressStatus, SourceProgress,
};
pub use supervisor::{CrawlReport, CrawlSupervisor, SourceReport};
