use crate::config::SourceConfig;
use crate::scrapers::bds123::Bds123Adapter;
use crate::scrapers::mogi::MogiAdapter;
use crate::scrapers::muaban::MuabanAdapter;
use crate::scrapers::traits::SourceAdapter;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Source adapters keyed by source name
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an adapter for every built-in source in `sources`
    pub fn with_builtin<'a>(sources: impl IntoIterator<Item = &'a Arc<SourceConfig>>) -> Self {
        let mut registry = Self::new();
        for source in sources {
            let adapter: Option<Arc<dyn SourceAdapter>> = match source.name.as_str() {
                MogiAdapter::NAME => Some(Arc::new(MogiAdapter::new(&source.base_url))),
                Bds123Adapter::NAME => Some(Arc::new(Bds123Adapter::new(&source.base_url))),
                MuabanAdapter::NAME => Some(Arc::new(MuabanAdapter::new(&source.base_url))),
                _ => None,
            };
            if let Some(adapter) = adapter {
                registry.register(adapter);
            } else {
                tracing::warn!(source = %source.name, "No built-in adapter for source");
            }
        }
        registry
    }

    /// Registers `adapter` under its own name, replacing any previous one
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}
