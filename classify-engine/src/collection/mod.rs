//! Collection state machine
//!
//! A collection owns an optional staging buffer, an item store, its
//! providers and the imports linked to it. Per item:
//!
//! ```text
//! new -> staged (buffer) -> evicted | validated -> committed -> enriched -> removed
//! new -> committed                       (buffering disabled)
//! ```
//!
//! # Concurrency
//! All state sits behind one async mutex. The stage/commit critical section
//! of `on_input` runs under it, so concurrent inputs for one fingerprint
//! never lose a raw input. Events are published while the lock is held,
//! which keeps them in transition order. Enrichment passes run outside the
//! lock and merge their results back under it.

pub mod config;
pub mod engine;
pub mod event;

pub use config::CollectionConfig;
pub use engine::{CollectionEngine, GenericEngine, MoviesEngine};
pub use event::{CollectionEvent, EventSource};

use crate::buffer::Buffer;
use crate::data::{DataConfigs, Datum};
use crate::enrichment::{EnrichmentCoordinator, MatchSelector, NoSelection, Provider};
use crate::identity::Fingerprint;
use crate::imports::ImportSource;
use crate::item::{Item, NameCleaner, ProviderRecord};
use crate::store::ItemStore;
use chrono::Utc;
use classify_common::{Error, EventBus, EventStatus, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Summary of a collection for listings
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub kind: String,
    pub config: CollectionConfig,
    pub buffered: bool,
    pub staged: usize,
    pub committed: usize,
    pub providers: Vec<String>,
    pub imports: Vec<String>,
}

struct CollectionState {
    name: String,
    config: CollectionConfig,
    cleaner: NameCleaner,
    buffer: Option<Buffer>,
    store: ItemStore,
    providers: BTreeMap<String, Arc<dyn Provider>>,
    imports: BTreeMap<String, Arc<dyn ImportSource>>,
    data_configs: DataConfigs,
    selector: Arc<dyn MatchSelector>,
}

impl CollectionState {
    /// Locate an item, staged first
    fn find(&self, id: &Fingerprint) -> Result<(EventSource, &Item)> {
        if let Some(item) = self.buffer.as_ref().and_then(|b| b.get(id)) {
            return Ok((EventSource::Buffer, item));
        }
        self.store.get(id).map(|item| (EventSource::Items, item))
    }

    fn find_mut(&mut self, id: &Fingerprint) -> Option<&mut Item> {
        if let Some(buffer) = self.buffer.as_mut() {
            if buffer.contains(id) {
                return buffer.get_mut(id);
            }
        }
        self.store.get_mut(id)
    }

    /// Union of the linked imports' blobs, overridden by the collection's own
    fn recompute_data_configs(&mut self) {
        let mut merged = DataConfigs::new();
        for source in self.imports.values() {
            merged.extend(source.data_configs());
        }
        merged.extend(self.config.data.clone());
        self.data_configs = merged;
    }
}

/// One named collection
pub struct Collection {
    engine: Arc<dyn CollectionEngine>,
    bus: EventBus<CollectionEvent>,
    state: Mutex<CollectionState>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl Collection {
    /// Create a collection publishing on `bus`
    ///
    /// Fails with `ValidationFailure` when `config` is invalid.
    pub fn new(
        name: impl Into<String>,
        engine: Arc<dyn CollectionEngine>,
        config: CollectionConfig,
        bus: EventBus<CollectionEvent>,
    ) -> Result<Self> {
        config.validate()?;

        let buffer = config.buffered.then(|| Buffer::new(config.buffer_size));
        let mut state = CollectionState {
            name: name.into(),
            cleaner: config.cleaner(),
            config,
            buffer,
            store: ItemStore::new(),
            providers: BTreeMap::new(),
            imports: BTreeMap::new(),
            data_configs: DataConfigs::new(),
            selector: Arc::new(NoSelection),
        };
        state.recompute_data_configs();

        Ok(Self {
            engine,
            bus,
            state: Mutex::new(state),
        })
    }

    pub async fn name(&self) -> String {
        self.state.lock().await.name.clone()
    }

    pub(crate) async fn rename(&self, name: &str) {
        self.state.lock().await.name = name.to_string();
    }

    pub fn kind(&self) -> &str {
        self.engine.kind()
    }

    pub async fn config(&self) -> CollectionConfig {
        self.state.lock().await.config.clone()
    }

    pub async fn info(&self) -> CollectionInfo {
        let state = self.state.lock().await;
        CollectionInfo {
            name: state.name.clone(),
            kind: self.engine.kind().to_string(),
            config: state.config.clone(),
            buffered: state.buffer.is_some(),
            staged: state.buffer.as_ref().map_or(0, Buffer::len),
            committed: state.store.len(),
            providers: state.providers.keys().cloned().collect(),
            imports: state.imports.keys().cloned().collect(),
        }
    }

    /// Merge a JSON patch into the configuration
    ///
    /// A smaller `buffer_size` evicts the oldest staged items with promotion.
    /// Toggling `buffered` behaves like `activate_buffer`/`disable_buffer`.
    pub async fn update_config(&self, patch: &Value) -> Result<CollectionConfig> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let config = state.config.merged(patch)?;

        match (state.buffer.as_mut(), config.buffered) {
            (Some(buffer), true) => {
                for evicted in buffer.set_capacity(config.buffer_size) {
                    self.promote(state.name.as_str(), &mut state.store, evicted);
                }
            }
            (Some(buffer), false) => {
                let discarded = buffer.remove_all();
                state.buffer = None;
                info!(collection = %state.name, discarded, "Buffer disabled");
            }
            (None, true) => {
                state.buffer = Some(Buffer::new(config.buffer_size));
                info!(collection = %state.name, capacity = config.buffer_size, "Buffer activated");
            }
            (None, false) => {}
        }

        state.cleaner = config.cleaner();
        state.config = config;
        state.recompute_data_configs();
        debug!(collection = %state.name, "Configuration updated");
        Ok(state.config.clone())
    }

    /// Replace the best-match selector run after each enrichment pass
    pub async fn set_selector(&self, selector: Arc<dyn MatchSelector>) {
        self.state.lock().await.selector = selector;
    }

    // ========================================================================
    // Providers and imports
    // ========================================================================

    /// Register a provider; a provider with the same name is replaced
    pub async fn add_provider(&self, provider: Arc<dyn Provider>) {
        let mut state = self.state.lock().await;
        let name = provider.name().to_string();
        if state.providers.insert(name.clone(), provider).is_some() {
            debug!(collection = %state.name, provider = %name, "Provider replaced");
        } else {
            info!(collection = %state.name, provider = %name, "Provider added");
        }
    }

    pub async fn delete_provider(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .providers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("provider '{}'", name)))
    }

    pub async fn providers(&self) -> Vec<String> {
        self.state.lock().await.providers.keys().cloned().collect()
    }

    /// Link an import; its data configs join the collection's
    pub async fn add_import(&self, id: &str, source: Arc<dyn ImportSource>) {
        let mut state = self.state.lock().await;
        state.imports.insert(id.to_string(), source);
        state.recompute_data_configs();
    }

    pub async fn delete_import(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.imports.remove(id).is_none() {
            return Err(Error::NotFound(format!(
                "import {} in collection '{}'",
                id, state.name
            )));
        }
        state.recompute_data_configs();
        Ok(())
    }

    pub async fn imports(&self) -> Vec<String> {
        self.state.lock().await.imports.keys().cloned().collect()
    }

    /// Effective per-data-kind configuration
    pub async fn data_configs(&self) -> DataConfigs {
        self.state.lock().await.data_configs.clone()
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Handle one datum from an import
    ///
    /// Dependencies are configured first (pre-order), then the datum itself.
    /// A failing dependency aborts the datum with `DependencyFailure`. The
    /// datum then merges into the existing item with the same fingerprint
    /// (staged or committed) or creates a new one. Returns the item as it
    /// stands after the optional enrichment pass.
    pub async fn on_input(&self, datum: Datum) -> Result<Item> {
        let (id, enrich) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            prepare(&datum, &state.data_configs)?;

            let id = Fingerprint::new(datum.kind(), datum.name());
            self.stage_or_commit(state, id, &datum)?;
            let enrich = state.config.auto_enrich && !state.providers.is_empty();
            (id, enrich)
        };

        if enrich {
            return self.enrich(id, None).await;
        }

        let state = self.state.lock().await;
        state.find(&id).map(|(_, item)| item.clone())
    }

    fn stage_or_commit(
        &self,
        state: &mut CollectionState,
        id: Fingerprint,
        datum: &Datum,
    ) -> Result<()> {
        let name = state.name.as_str();

        if let Some(buffer) = state.buffer.as_mut() {
            if let Some(staged) = buffer.get(&id) {
                let mut item = staged.clone();
                merge_input(&mut item, datum, &state.cleaner);
                self.publish(name, EventSource::Buffer, EventStatus::Update, &item);
                // Same size: re-arrival only refreshes recency
                if let Some(evicted) = buffer.add(id, item) {
                    self.promote(name, &mut state.store, evicted);
                }
                return Ok(());
            }
        }

        if state.store.contains(&id) {
            let cleaner = &state.cleaner;
            let item = state
                .store
                .modify(&id, |item| merge_input(item, datum, cleaner))?;
            self.publish(name, EventSource::Items, EventStatus::Update, item);
            return Ok(());
        }

        let mut item = Item::new(id);
        merge_input(&mut item, datum, &state.cleaner);

        match state.buffer.as_mut() {
            Some(buffer) => {
                self.publish(name, EventSource::Buffer, EventStatus::Add, &item);
                if let Some(evicted) = buffer.add(id, item) {
                    self.promote(name, &mut state.store, evicted);
                }
                Ok(())
            }
            None => {
                state.store.add(id, item.clone())?;
                self.publish(name, EventSource::Items, EventStatus::Add, &item);
                Ok(())
            }
        }
    }

    /// Commit an evicted item; eviction never drops staged work
    fn promote(&self, collection: &str, store: &mut ItemStore, item: Item) {
        let id = item.id;
        match store.add(id, item.clone()) {
            Ok(()) => {
                debug!(collection, id = %id, "Evicted item promoted");
                self.publish(collection, EventSource::Items, EventStatus::Add, &item);
            }
            Err(e) => {
                warn!(collection, id = %id, error = %e, "Evicted item rejected by store");
            }
        }
    }

    fn publish(&self, collection: &str, source: EventSource, status: EventStatus, item: &Item) {
        self.bus.emit(CollectionEvent {
            collection: collection.to_string(),
            source,
            status,
            id: item.id,
            item: item.clone(),
            timestamp: Utc::now(),
        });
    }

    // ========================================================================
    // Enrichment
    // ========================================================================

    /// Run one enrichment pass for `id` and publish one update tagged `source`
    ///
    /// With no provider registered the update is still published.
    pub async fn search(&self, source: EventSource, id: Fingerprint) -> Result<Item> {
        self.enrich(id, Some(source)).await
    }

    /// Enrichment pass; without a `source` the update is tagged with where
    /// the item lives once the pass completes
    async fn enrich(&self, id: Fingerprint, source: Option<EventSource>) -> Result<Item> {
        let (query, providers, coordinator) = {
            let state = self.state.lock().await;
            let (_, item) = state.find(&id)?;
            (
                item.query().to_string(),
                state.providers.values().cloned().collect::<Vec<_>>(),
                EnrichmentCoordinator::with_deadline(state.config.provider_deadline()),
            )
        };

        let results = if providers.is_empty() {
            BTreeMap::new()
        } else {
            coordinator.run(&query, &providers).await
        };

        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let selector = Arc::clone(&state.selector);
        let source = source.unwrap_or_else(|| {
            if state.buffer.as_ref().is_some_and(|b| b.contains(&id)) {
                EventSource::Buffer
            } else {
                EventSource::Items
            }
        });

        // The item may have been validated or evicted during the pass
        let item = state.find_mut(&id).ok_or_else(|| {
            Error::NotFound(format!("item {} removed during enrichment", id))
        })?;
        item.merge_enrichment(results);
        if item.selected_match.is_none() {
            let selected = selector.select(item);
            item.selected_match = selected;
        }
        let item = item.clone();

        self.publish(&state.name, source, EventStatus::Update, &item);
        debug!(collection = %state.name, id = %id, query = %query, "Enrichment pass complete");
        Ok(item)
    }

    // ========================================================================
    // Validation and buffer control
    // ========================================================================

    /// Confirm a staged item and commit it
    ///
    /// `selected` becomes the item's selected match when given. The item is
    /// committed before `items/add` is published.
    pub async fn validate(&self, id: Fingerprint, selected: Option<ProviderRecord>) -> Result<Item> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let buffer = state
            .buffer
            .as_mut()
            .ok_or_else(|| Error::InvalidState("buffer not initialized".to_string()))?;
        let mut item = buffer.validate(&id)?;
        if selected.is_some() {
            item.selected_match = selected;
        }

        state.store.add(id, item.clone())?;
        self.publish(&state.name, EventSource::Items, EventStatus::Add, &item);
        info!(collection = %state.name, id = %id, "Item validated");
        Ok(item)
    }

    /// Enable staging; keeps the current buffer when already active
    pub async fn activate_buffer(&self) {
        let mut state = self.state.lock().await;
        state.config.buffered = true;
        if state.buffer.is_none() {
            state.buffer = Some(Buffer::new(state.config.buffer_size));
            info!(collection = %state.name, capacity = state.config.buffer_size, "Buffer activated");
        }
    }

    /// Disable staging; staged items are discarded without promotion
    pub async fn disable_buffer(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(mut buffer) = state.buffer.take() else {
            return Err(Error::InvalidState("buffer already disabled".to_string()));
        };
        let discarded = buffer.remove_all();
        state.config.buffered = false;
        info!(collection = %state.name, discarded, "Buffer disabled");
        Ok(())
    }

    pub async fn is_buffered(&self) -> bool {
        self.state.lock().await.buffer.is_some()
    }

    // ========================================================================
    // Item management
    // ========================================================================

    /// Staged items in arrival order
    pub async fn get_buffer(&self) -> Vec<Item> {
        let state = self.state.lock().await;
        state
            .buffer
            .as_ref()
            .map(Buffer::get_current_list)
            .unwrap_or_default()
    }

    /// Committed items (unordered)
    pub async fn get_items(&self) -> Vec<Item> {
        self.state.lock().await.store.get_current_list()
    }

    /// Committed item by id
    pub async fn get_item(&self, id: Fingerprint) -> Result<Item> {
        self.state.lock().await.store.get(&id).cloned()
    }

    /// Remove a committed item
    pub async fn remove_item(&self, id: Fingerprint) -> Result<Item> {
        let mut state = self.state.lock().await;
        let item = state.store.remove(&id)?;
        self.publish(&state.name, EventSource::Items, EventStatus::Remove, &item);
        Ok(item)
    }

    /// Drop a staged item without promotion
    pub async fn delete_buffer_item(&self, id: Fingerprint) -> Result<Item> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let buffer = state
            .buffer
            .as_mut()
            .ok_or_else(|| Error::InvalidState("buffer not initialized".to_string()))?;
        let item = buffer
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("item {} in buffer", id)))?;
        self.publish(&state.name, EventSource::Buffer, EventStatus::Remove, &item);
        Ok(item)
    }

    /// Set the selected match of a committed item
    pub async fn select_match(&self, id: Fingerprint, record: ProviderRecord) -> Result<Item> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let item = state
            .store
            .modify(&id, |item| item.selected_match = Some(record))?
            .clone();
        self.publish(&state.name, EventSource::Items, EventStatus::Update, &item);
        Ok(item)
    }
}

/// Configure a datum and its dependencies, dependencies first
fn prepare(datum: &Datum, configs: &DataConfigs) -> Result<()> {
    if let Some(dependencies) = datum.dependencies() {
        for dependency in dependencies {
            prepare(dependency, configs).map_err(|e| Error::dependency(dependency.name(), e))?;
        }
    }

    if let Some(configurable) = datum.configurable() {
        let blob = configs.get(&datum.kind()).unwrap_or(&Value::Null);
        configurable.apply_config(blob)?;
    }
    Ok(())
}

fn merge_input(item: &mut Item, datum: &Datum, cleaner: &NameCleaner) {
    item.add_raw_input(Arc::clone(datum), cleaner);
    if let Some(dependencies) = datum.dependencies() {
        for dependency in dependencies {
            item.link_raw_datum(Arc::clone(dependency));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FileDatum, SimpleDatum};
    use crate::enrichment::mock::MockProvider;
    use serde_json::json;

    fn collection(config: CollectionConfig) -> (Collection, classify_common::EventSubscription<CollectionEvent>) {
        let bus = EventBus::new();
        let events = bus.subscribe();
        let collection = Collection::new("films", Arc::new(GenericEngine), config, bus).unwrap();
        (collection, events)
    }

    fn datum(name: &str) -> Datum {
        Arc::new(SimpleDatum::new(name))
    }

    #[tokio::test]
    async fn test_unbuffered_commits_directly() {
        let (collection, mut events) = collection(CollectionConfig {
            buffered: false,
            ..CollectionConfig::default()
        });

        let item = collection.on_input(datum("alien")).await.unwrap();
        assert_eq!(collection.get_items().await.len(), 1);
        assert!(collection.get_buffer().await.is_empty());

        let event = events.try_recv().unwrap();
        assert!(event.is(EventSource::Items, EventStatus::Add));
        assert_eq!(event.id, item.id);
        assert_eq!(event.collection, "films");
        assert!(format!("{:?}", collection).starts_with("Collection"));
    }

    #[tokio::test]
    async fn test_repeated_input_merges_into_staged_item() {
        let (collection, mut events) = collection(CollectionConfig::default());

        collection.on_input(datum("alien")).await.unwrap();
        let item = collection.on_input(datum("alien")).await.unwrap();
        assert_eq!(item.raw_inputs.len(), 2);
        assert_eq!(collection.get_buffer().await.len(), 1);

        let tags: Vec<_> = events.drain().iter().map(CollectionEvent::tag).collect();
        assert_eq!(tags, vec!["buffer/add", "buffer/update"]);
    }

    #[tokio::test]
    async fn test_input_merges_into_committed_item() {
        let (collection, mut events) = collection(CollectionConfig::default());

        let staged = collection.on_input(datum("alien")).await.unwrap();
        collection.validate(staged.id, None).await.unwrap();
        let merged = collection.on_input(datum("alien")).await.unwrap();

        assert_eq!(merged.raw_inputs.len(), 2);
        assert!(collection.get_buffer().await.is_empty());

        let tags: Vec<_> = events.drain().iter().map(CollectionEvent::tag).collect();
        assert_eq!(tags, vec!["buffer/add", "items/add", "items/update"]);
    }

    #[tokio::test]
    async fn test_validate_with_disabled_buffer() {
        let (collection, _events) = collection(CollectionConfig {
            buffered: false,
            ..CollectionConfig::default()
        });
        let err = collection
            .validate(Fingerprint::from(1), None)
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[tokio::test]
    async fn test_validate_stores_selected_match() {
        let (collection, _events) = collection(CollectionConfig::default());
        let staged = collection.on_input(datum("heat")).await.unwrap();

        let record = ProviderRecord::new("949", "Heat", "movie");
        let item = collection
            .validate(staged.id, Some(record.clone()))
            .await
            .unwrap();
        assert_eq!(item.selected_match, Some(record.clone()));
        assert_eq!(
            collection.get_item(staged.id).await.unwrap().selected_match,
            Some(record)
        );
    }

    #[tokio::test]
    async fn test_auto_enrich_publishes_single_update() {
        let (collection, mut events) = collection(CollectionConfig::default());
        collection.add_provider(Arc::new(MockProvider::new("A", 2))).await;
        collection.add_provider(Arc::new(MockProvider::new("B", 1))).await;

        let item = collection.on_input(datum("alien")).await.unwrap();
        assert_eq!(item.enrichment_results["A"].len(), 2);
        assert_eq!(item.enrichment_results["B"].len(), 1);

        let tags: Vec<_> = events.drain().iter().map(CollectionEvent::tag).collect();
        assert_eq!(tags, vec!["buffer/add", "buffer/update"]);
    }

    #[tokio::test]
    async fn test_auto_enrich_off_skips_providers() {
        let (collection, _events) = collection(CollectionConfig {
            auto_enrich: false,
            ..CollectionConfig::default()
        });
        collection.add_provider(Arc::new(MockProvider::new("A", 2))).await;

        let item = collection.on_input(datum("alien")).await.unwrap();
        assert!(item.enrichment_results.is_empty());

        let item = collection.search(EventSource::Buffer, item.id).await.unwrap();
        assert_eq!(item.enrichment_results["A"].len(), 2);
    }

    struct FirstRecord;

    impl MatchSelector for FirstRecord {
        fn select(&self, item: &Item) -> Option<ProviderRecord> {
            item.enrichment_results.values().flatten().next().cloned()
        }
    }

    #[tokio::test]
    async fn test_selector_sets_selected_match() {
        let (collection, _events) = collection(CollectionConfig::default());
        collection.set_selector(Arc::new(FirstRecord)).await;
        collection.add_provider(Arc::new(MockProvider::new("A", 2))).await;

        let item = collection.on_input(datum("alien")).await.unwrap();
        assert_eq!(item.selected_match.unwrap().id, "A-0");
    }

    #[tokio::test]
    async fn test_search_unknown_item_is_not_found() {
        let (collection, _events) = collection(CollectionConfig::default());
        let err = collection
            .search(EventSource::Items, Fingerprint::from(3))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_provider_registry() {
        let (collection, _events) = collection(CollectionConfig::default());
        collection.add_provider(Arc::new(MockProvider::new("tmdb", 0))).await;
        assert_eq!(collection.providers().await, vec!["tmdb"]);

        collection.delete_provider("tmdb").await.unwrap();
        assert!(collection
            .delete_provider("tmdb")
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_shrinking_buffer_promotes_oldest() {
        let (collection, _events) = collection(CollectionConfig {
            buffer_size: 3,
            ..CollectionConfig::default()
        });
        for name in ["a", "b", "c"] {
            collection.on_input(datum(name)).await.unwrap();
        }

        collection
            .update_config(&json!({ "buffer_size": 1 }))
            .await
            .unwrap();

        let staged: Vec<_> = collection
            .get_buffer()
            .await
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(staged, vec!["c"]);
        assert_eq!(collection.get_items().await.len(), 2);
    }

    #[tokio::test]
    async fn test_collection_blob_filters_files() {
        let (collection, _events) = collection(CollectionConfig::default());
        collection
            .update_config(&json!({ "data": { "file": { "extensions": ["mkv"] } } }))
            .await
            .unwrap();

        let accepted: Datum = Arc::new(FileDatum::from_path("/m/alien.mkv"));
        let rejected: Datum = Arc::new(FileDatum::from_path("/m/alien.txt"));
        collection.on_input(accepted).await.unwrap();
        let err = collection.on_input(rejected).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
        assert_eq!(collection.get_buffer().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_buffer_item_and_remove_item() {
        let (collection, mut events) = collection(CollectionConfig::default());
        let a = collection.on_input(datum("a")).await.unwrap();
        let b = collection.on_input(datum("b")).await.unwrap();
        collection.validate(b.id, None).await.unwrap();

        collection.delete_buffer_item(a.id).await.unwrap();
        collection.remove_item(b.id).await.unwrap();
        assert!(collection.get_buffer().await.is_empty());
        assert!(collection.get_items().await.is_empty());
        assert!(collection.remove_item(b.id).await.unwrap_err().is_not_found());

        let tags: Vec<_> = events.drain().iter().map(CollectionEvent::tag).collect();
        assert_eq!(
            tags,
            vec!["buffer/add", "buffer/add", "items/add", "buffer/remove", "items/remove"]
        );
    }
}
