//! Test Helper Utilities
//!
//! Shared fixtures for classify-engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use classify_common::{Error, EventBus, Result};
use classify_engine::collection::GenericEngine;
use classify_engine::data::{Configurable, DataKind, Datum, RawDatum};
use classify_engine::enrichment::RecordStream;
use classify_engine::{
    Classify, Collection, CollectionConfig, CollectionEvent, MemoryRepository, Provider,
    ProviderError, ProviderRecord, TypeRegistry,
};
use classify_common::config::EngineConfig;
use futures::{stream, StreamExt};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Orchestrator with built-in kinds and an in-memory repository
pub fn create_test_classify() -> Classify {
    Classify::new(
        TypeRegistry::with_defaults(),
        EventBus::new(),
        Arc::new(MemoryRepository::new()),
        EngineConfig::default(),
    )
}

/// Standalone `simple` collection named "films"
pub fn create_test_collection(config: CollectionConfig) -> (Arc<Collection>, EventBus<CollectionEvent>) {
    let bus = EventBus::new();
    let collection = Collection::new("films", Arc::new(GenericEngine), config, bus.clone())
        .expect("valid test config");
    (Arc::new(collection), bus)
}

/// Provider yielding `count` records, one every `delay`
pub struct MockProvider {
    pub name: String,
    pub count: usize,
    pub delay: Duration,
}

impl MockProvider {
    pub fn new(name: &str, count: usize) -> Arc<dyn Provider> {
        Self::slow(name, count, Duration::ZERO)
    }

    pub fn slow(name: &str, count: usize, delay: Duration) -> Arc<dyn Provider> {
        Arc::new(Self {
            name: name.to_string(),
            count,
            delay,
        })
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> std::result::Result<RecordStream, ProviderError> {
        let name = self.name.clone();
        let query = query.to_string();
        let delay = self.delay;
        Ok(stream::iter(0..self.count)
            .then(move |i| {
                let record = ProviderRecord::new(format!("{}-{}", name, i), query.clone(), "movie");
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok::<_, ProviderError>(record)
                }
            })
            .boxed())
    }
}

/// Datum recording the order its configuration step runs in
#[derive(Debug)]
pub struct TrackedDatum {
    pub name: String,
    pub kind: DataKind,
    pub fail: bool,
    pub dependencies: Vec<Datum>,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl TrackedDatum {
    pub fn new(name: &str, kind: DataKind, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            fail: false,
            dependencies: Vec::new(),
            log: Arc::clone(log),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_dependency(mut self, dependency: TrackedDatum) -> Self {
        self.dependencies.push(Arc::new(dependency));
        self
    }
}

impl RawDatum for TrackedDatum {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DataKind {
        self.kind
    }

    fn dependencies(&self) -> Option<&[Datum]> {
        if self.dependencies.is_empty() {
            None
        } else {
            Some(self.dependencies.as_slice())
        }
    }

    fn configurable(&self) -> Option<&dyn Configurable> {
        Some(self)
    }
}

impl Configurable for TrackedDatum {
    fn apply_config(&self, _blob: &Value) -> Result<()> {
        self.log.lock().unwrap().push(self.name.clone());
        if self.fail {
            return Err(Error::ValidationFailure(format!("{} rejected", self.name)));
        }
        Ok(())
    }
}

/// Names of the items in a list
pub fn names(items: &[classify_engine::Item]) -> Vec<String> {
    items.iter().map(|i| i.name().to_string()).collect()
}
