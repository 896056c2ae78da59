//! Top-level orchestrator
//!
//! `Classify` owns the collections and imports of one service instance.
//! It resolves kinds through the `TypeRegistry`, persists records through
//! the `Repository`, and shares one event bus with every collection.
//!
//! # Import lifecycle
//! - Adding an import equal (same kind, `eq_source`) to an existing one
//!   links the new collections to the existing import instead
//! - An import left with no linked collection is stopped and deleted
//! - Start/stop/wait select imports by id and by linked collection name;
//!   an empty filter selects everything

use crate::collection::config::merge_params;
use crate::collection::{Collection, CollectionConfig, CollectionEvent, CollectionInfo};
use crate::imports::{Import, ImportInfo, IngestFailure, IngestReport};
use crate::registry::TypeRegistry;
use crate::repository::{Record, RecordMatch, Repository, Table};
use classify_common::config::{CollectionBootstrap, EngineConfig};
use classify_common::{Error, EventBus, EventSubscription, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Collections, imports and their shared infrastructure
pub struct Classify {
    registry: TypeRegistry,
    bus: EventBus<CollectionEvent>,
    repository: Arc<dyn Repository>,
    defaults: EngineConfig,
    collections: RwLock<BTreeMap<String, Arc<Collection>>>,
    imports: RwLock<BTreeMap<String, Arc<Import>>>,
}

impl Classify {
    pub fn new(
        registry: TypeRegistry,
        bus: EventBus<CollectionEvent>,
        repository: Arc<dyn Repository>,
        defaults: EngineConfig,
    ) -> Self {
        Self {
            registry,
            bus,
            repository,
            defaults,
            collections: RwLock::new(BTreeMap::new()),
            imports: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn bus(&self) -> &EventBus<CollectionEvent> {
        &self.bus
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> EventSubscription<CollectionEvent> {
        self.bus.subscribe()
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// Create a collection of a registered kind
    ///
    /// `config` is merged over the kind's defaults. Fails with
    /// `AlreadyExists` on a duplicate name, `NotFound` on an unknown kind
    /// and `ValidationFailure` on an invalid config.
    pub async fn add_collection(
        &self,
        name: &str,
        kind: &str,
        config: Option<&Value>,
    ) -> Result<Arc<Collection>> {
        let collection = self.build_collection(name, kind, config).await?;
        let record = collection_record(&collection).await?;
        self.repository.insert(Table::Collections, &record).await?;

        self.collections
            .write()
            .await
            .insert(name.to_string(), Arc::clone(&collection));
        info!(collection = name, kind, "Collection created");
        Ok(collection)
    }

    async fn build_collection(
        &self,
        name: &str,
        kind: &str,
        config: Option<&Value>,
    ) -> Result<Arc<Collection>> {
        if name.trim().is_empty() {
            return Err(Error::ValidationFailure(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.collections.read().await.contains_key(name) {
            return Err(Error::AlreadyExists(format!("collection '{}'", name)));
        }

        let engine = self.registry.collection_engine(kind)?;
        let base = CollectionConfig {
            buffer_size: self.defaults.default_buffer_size,
            provider_deadline_ms: self.defaults.provider_deadline_ms,
            ..engine.default_config()
        };
        let config = base.merged(config.unwrap_or(&Value::Null))?;

        Ok(Arc::new(Collection::new(
            name,
            engine,
            config,
            self.bus.clone(),
        )?))
    }

    /// Create the collections listed in the bootstrap file
    ///
    /// Collections that already exist (restored from the repository) are
    /// left untouched.
    pub async fn seed_collections(&self, seeds: &[CollectionBootstrap]) -> Result<()> {
        for seed in seeds {
            match self
                .add_collection(&seed.name, &seed.kind, seed.config.as_ref())
                .await
            {
                Ok(_) => {}
                Err(Error::AlreadyExists(_)) => {
                    debug!(collection = %seed.name, "Seed collection already exists")
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub async fn get_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", name)))
    }

    pub async fn get_collections(&self) -> Vec<CollectionInfo> {
        let collections: Vec<_> = self.collections.read().await.values().cloned().collect();
        let mut infos = Vec::with_capacity(collections.len());
        for collection in collections {
            infos.push(collection.info().await);
        }
        infos
    }

    /// Rename a collection; linked imports follow
    pub async fn rename_collection(&self, name: &str, new_name: &str) -> Result<()> {
        if new_name.trim().is_empty() {
            return Err(Error::ValidationFailure(
                "collection name must not be empty".to_string(),
            ));
        }

        let mut collections = self.collections.write().await;
        if collections.contains_key(new_name) {
            return Err(Error::AlreadyExists(format!("collection '{}'", new_name)));
        }
        let collection = collections
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", name)))?;

        collection.rename(new_name).await;
        collections.insert(new_name.to_string(), Arc::clone(&collection));
        drop(collections);

        for import in self.imports.read().await.values() {
            import.rename_link(name, new_name).await;
        }

        self.repository
            .delete(Table::Collections, &Record::new(name, collection.kind()), RecordMatch::Name)
            .await?;
        self.repository
            .insert(Table::Collections, &collection_record(&collection).await?)
            .await?;

        self.persist_imports_of(new_name).await?;
        info!(collection = name, new_name, "Collection renamed");
        Ok(())
    }

    /// Patch a collection's configuration and persist it
    pub async fn update_collection(&self, name: &str, patch: &Value) -> Result<CollectionConfig> {
        let collection = self.get_collection(name).await?;
        let config = collection.update_config(patch).await?;

        self.repository
            .delete(Table::Collections, &Record::new(name, collection.kind()), RecordMatch::Name)
            .await?;
        self.repository
            .insert(Table::Collections, &collection_record(&collection).await?)
            .await?;
        Ok(config)
    }

    /// Delete a collection and unlink it from every import
    ///
    /// Imports left without collections are deleted too.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let collection = self
            .collections
            .write()
            .await
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("collection '{}'", name)))?;

        let imports: Vec<_> = self.imports.read().await.values().cloned().collect();
        for import in imports {
            if import.unlink(name).await {
                self.settle_import(&import).await?;
            }
        }

        self.repository
            .delete(Table::Collections, &Record::new(name, collection.kind()), RecordMatch::Name)
            .await?;
        info!(collection = name, "Collection deleted");
        Ok(())
    }

    // ========================================================================
    // Imports
    // ========================================================================

    /// Create an import of `kind` feeding `collections`
    ///
    /// Each collection's overrides for `kind` are shallow-merged into
    /// `params` first. An equal existing import is reused.
    pub async fn add_import(
        &self,
        kind: &str,
        params: &Value,
        collections: &[String],
    ) -> Result<Arc<Import>> {
        if collections.is_empty() {
            return Err(Error::ValidationFailure(
                "an import needs at least one collection".to_string(),
            ));
        }

        let mut linked = Vec::with_capacity(collections.len());
        let mut params = params.clone();
        for name in collections {
            let collection = self.get_collection(name).await?;
            if let Some(overrides) = collection.config().await.import_overrides(kind) {
                params = merge_params(&params, overrides);
            }
            linked.push(collection);
        }

        let source = self.registry.build_import(kind, &params)?;

        let existing = self
            .imports
            .read()
            .await
            .values()
            .find(|import| import.kind() == kind && import.source().eq_source(source.as_ref()))
            .cloned();

        if let Some(import) = existing {
            for collection in linked {
                import.link(collection).await;
            }
            self.persist_import(&import, true).await?;
            info!(import = import.id(), kind, "Import merged into existing one");
            return Ok(import);
        }

        let import = Arc::new(Import::new(source));
        for collection in linked {
            import.link(collection).await;
        }
        self.persist_import(&import, false).await?;

        self.imports
            .write()
            .await
            .insert(import.id().to_string(), Arc::clone(&import));
        info!(import = import.id(), kind, "Import created");
        Ok(import)
    }

    pub async fn get_import(&self, id: &str) -> Result<Arc<Import>> {
        self.imports
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("import {}", id)))
    }

    /// Imports grouped by kind
    pub async fn get_imports(&self) -> BTreeMap<String, Vec<ImportInfo>> {
        let imports: Vec<_> = self.imports.read().await.values().cloned().collect();
        let mut grouped: BTreeMap<String, Vec<ImportInfo>> = BTreeMap::new();
        for import in imports {
            grouped
                .entry(import.kind().to_string())
                .or_default()
                .push(import.info().await);
        }
        grouped
    }

    /// Unlink collections from imports
    ///
    /// With no collection given, the selected imports are unlinked from all
    /// of theirs. Returns the ids of the imports deleted as a result.
    pub async fn delete_imports(&self, ids: &[String], collections: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() && collections.is_empty() {
            return Err(Error::ValidationFailure(
                "select imports by id or by collection".to_string(),
            ));
        }

        let targets = self.select_imports(ids, collections).await?;
        let mut deleted = Vec::new();
        for import in targets {
            let names = if collections.is_empty() {
                import.collections().await
            } else {
                collections.to_vec()
            };
            for name in &names {
                import.unlink(name).await;
            }
            if self.settle_import(&import).await? {
                deleted.push(import.id().to_string());
            }
        }
        Ok(deleted)
    }

    /// Start matching imports; returns their ids
    pub async fn start_imports(&self, ids: &[String], collections: &[String]) -> Result<Vec<String>> {
        let mut started = Vec::new();
        for import in self.select_imports(ids, collections).await? {
            import.start().await?;
            started.push(import.id().to_string());
        }
        Ok(started)
    }

    /// Stop matching imports; returns the ids actually stopped
    ///
    /// When several imports match, one failing to stop does not keep the
    /// others running. A single matching import reports its own failure.
    pub async fn stop_imports(&self, ids: &[String], collections: &[String]) -> Result<Vec<String>> {
        let targets = self.select_imports(ids, collections).await?;
        if let [import] = targets.as_slice() {
            import.stop().await?;
            return Ok(vec![import.id().to_string()]);
        }

        let mut stopped = Vec::new();
        for import in targets {
            match import.stop().await {
                Ok(()) => stopped.push(import.id().to_string()),
                Err(e) => debug!(import = import.id(), error = %e, "Import not stopped"),
            }
        }
        Ok(stopped)
    }

    /// Wait for draining tasks to finish
    ///
    /// With no id given, imports that were never started are skipped.
    pub async fn wait_imports(&self, ids: &[String]) -> Result<BTreeMap<String, IngestReport>> {
        let mut reports = BTreeMap::new();
        for import in self.select_imports(ids, &[]).await? {
            match import.wait().await {
                Ok(report) => {
                    reports.insert(import.id().to_string(), report);
                }
                Err(e) if ids.is_empty() && e.is_invalid_state() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    /// Data refused by collections of one import
    pub async fn import_failures(&self, id: &str) -> Result<Vec<IngestFailure>> {
        Ok(self.get_import(id).await?.failures())
    }

    /// Imports matching the id filter and linked to any filtered collection
    async fn select_imports(&self, ids: &[String], collections: &[String]) -> Result<Vec<Arc<Import>>> {
        for name in collections {
            self.get_collection(name).await?;
        }

        let imports = self.imports.read().await;
        let candidates: Vec<Arc<Import>> = if ids.is_empty() {
            imports.values().cloned().collect()
        } else {
            ids.iter()
                .map(|id| {
                    imports
                        .get(id)
                        .cloned()
                        .ok_or_else(|| Error::NotFound(format!("import {}", id)))
                })
                .collect::<Result<_>>()?
        };
        drop(imports);

        if collections.is_empty() {
            return Ok(candidates);
        }

        let mut selected = Vec::new();
        for import in candidates {
            let mut linked = false;
            for name in collections {
                if import.is_linked(name).await {
                    linked = true;
                    break;
                }
            }
            if linked {
                selected.push(import);
            }
        }
        Ok(selected)
    }

    /// Delete an import left without collections, persist it otherwise
    ///
    /// Returns true when the import was deleted.
    async fn settle_import(&self, import: &Arc<Import>) -> Result<bool> {
        if import.link_count().await > 0 {
            self.persist_import(import, true).await?;
            return Ok(false);
        }

        match import.stop().await {
            Ok(()) => {}
            Err(e) if e.is_invalid_state() => {}
            Err(e) => warn!(import = import.id(), error = %e, "Stopping orphan import failed"),
        }
        self.imports.write().await.remove(import.id());
        self.repository
            .delete(Table::Imports, &Record::new(import.id(), import.kind()), RecordMatch::Name)
            .await?;
        info!(import = import.id(), "Import without collections deleted");
        Ok(true)
    }

    async fn persist_import(&self, import: &Import, replace: bool) -> Result<()> {
        let record = Record::new(import.id(), import.kind())
            .with_config(json!({ "collections": import.collections().await }))
            .with_params(import.source().params());

        if replace {
            match self
                .repository
                .delete(Table::Imports, &record, RecordMatch::Name)
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        self.repository.insert(Table::Imports, &record).await?;
        Ok(())
    }

    async fn persist_imports_of(&self, collection: &str) -> Result<()> {
        let imports: Vec<_> = self.imports.read().await.values().cloned().collect();
        for import in imports {
            if import.is_linked(collection).await {
                self.persist_import(&import, true).await?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Restore
    // ========================================================================

    /// Rebuild collections and imports from the repository
    ///
    /// Imports are restored stopped.
    pub async fn restore(&self) -> Result<()> {
        for record in self.repository.list(Table::Collections).await? {
            let collection = self
                .build_collection(&record.name, &record.kind, Some(&record.config))
                .await?;
            self.collections
                .write()
                .await
                .insert(record.name.clone(), collection);
        }

        for record in self.repository.list(Table::Imports).await? {
            let source = self.registry.build_import(&record.kind, &record.params)?;
            let import = Arc::new(Import::with_id(record.name.clone(), source));

            let names: Vec<String> = serde_json::from_value(
                record.config.get("collections").cloned().unwrap_or(json!([])),
            )?;
            for name in names {
                match self.get_collection(&name).await {
                    Ok(collection) => import.link(collection).await,
                    Err(_) => warn!(import = %record.name, collection = %name, "Linked collection is gone"),
                }
            }
            self.imports
                .write()
                .await
                .insert(record.name.clone(), Arc::clone(&import));
            if import.link_count().await == 0 {
                self.settle_import(&import).await?;
            }
        }

        info!(
            collections = self.collections.read().await.len(),
            imports = self.imports.read().await.len(),
            "Restored from repository"
        );
        Ok(())
    }
}

async fn collection_record(collection: &Collection) -> Result<Record> {
    Ok(Record::new(collection.name().await, collection.kind())
        .with_config(serde_json::to_value(collection.config().await)?))
}
