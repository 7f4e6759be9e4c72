//! Crawl lifecycle events and their fan-out to observers.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use strum::{Display, EnumDiscriminants};
use tracing::warn;

use crate::models::{CrawlSession, Property};

/// Something that happened during a source's crawl.
#[derive(Debug, Clone, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Display, Hash))]
#[strum_discriminants(strum(serialize_all = "snake_case"))]
pub enum CrawlEvent {
    Started(CrawlSession),
    Extracted(Property),
    Completed(CrawlSession),
    Failed { error: String, session: CrawlSession },
    Enriched(Property),
}

impl CrawlEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }
}

/// Receives crawl events. Events an observer does not care about are
/// ignored with `Ok(())`.
#[async_trait]
pub trait Observer: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: &CrawlEvent, source: &str) -> anyhow::Result<()>;
}

/// Ordered, immutable set of observers.
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Arc<[Arc<dyn Observer>]>,
}

pub struct EventBusBuilder {
    observers: Vec<Arc<dyn Observer>>,
}

impl EventBus {
    pub fn builder() -> EventBusBuilder {
        EventBusBuilder {
            observers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Delivers `event` to every observer in registration order.
    ///
    /// Observer errors and panics are logged and never stop delivery to
    /// the remaining observers.
    pub async fn publish(&self, event: CrawlEvent, source: &str) {
        for observer in self.observers.iter() {
            let result = AssertUnwindSafe(observer.handle(&event, source))
                .catch_unwind()
                .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    observer = observer.name(),
                    event = %event.kind(),
                    source,
                    error = %format!("{e:#}"),
                    "Observer failed"
                ),
                Err(panic) => warn!(
                    observer = observer.name(),
                    event = %event.kind(),
                    source,
                    panic = %panic_message(&panic),
                    "Observer panicked"
                ),
            }
        }
    }
}

impl EventBusBuilder {
    pub fn subscribe(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> EventBus {
        EventBus {
            observers: self.observers.into(),
        }
    }
}

pub(crate) fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingObserver;
    use pretty_assertions::assert_eq;

    struct FailingObserver;

    #[async_trait]
    impl Observer for FailingObserver {
        fn name(&self) -> &str {
            "failing"
        }

        async fn handle(&self, _event: &CrawlEvent, _source: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    struct PanickingObserver;

    #[async_trait]
    impl Observer for PanickingObserver {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn handle(&self, _event: &CrawlEvent, _source: &str) -> anyhow::Result<()> {
            panic!("observer bug")
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_delivery() {
        let recorder = Arc::new(RecordingObserver::default());
        let bus = EventBus::builder()
            .subscribe(Arc::new(FailingObserver))
            .subscribe(Arc::new(PanickingObserver))
            .subscribe(recorder.clone())
            .build();

        bus.publish(CrawlEvent::Started(CrawlSession::start("mogi.vn")), "mogi.vn")
            .await;
        let mut session = CrawlSession::start("mogi.vn");
        session.complete();
        bus.publish(CrawlEvent::Completed(session), "mogi.vn").await;

        assert_eq!(bus.len(), 3);
        assert_eq!(
            recorder.kinds(),
            vec![EventKind::Started, EventKind::Completed]
        );
    }

    #[test]
    fn test_event_kind_names() {
        let event = CrawlEvent::Failed {
            error: "blocked".to_string(),
            session: CrawlSession::start("bds123.vn"),
        };
        assert_eq!(event.kind(), EventKind::Failed);
        assert_eq!(EventKind::Enriched.to_string(), "enriched");
    }
}
