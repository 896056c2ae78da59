//! Collection and import type registry
//!
//! Built once at startup and handed to the orchestrator.

use crate::collection::{CollectionEngine, GenericEngine, MoviesEngine};
use crate::imports::{ImportSource, ListSource};
use classify_common::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a source engine from JSON parameters
pub type ImportFactory = Arc<dyn Fn(&Value) -> Result<Arc<dyn ImportSource>> + Send + Sync>;

/// Known collection kinds and import kinds
#[derive(Default)]
pub struct TypeRegistry {
    collections: BTreeMap<String, Arc<dyn CollectionEngine>>,
    imports: BTreeMap<String, ImportFactory>,
}

impl TypeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in kinds (`simple`, `movies`, `list`)
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        // Kinds are distinct, registration cannot collide
        let _ = registry.register_collection(Arc::new(GenericEngine));
        let _ = registry.register_collection(Arc::new(MoviesEngine));
        let _ = registry.register_import(ListSource::KIND, |params| {
            Ok(Arc::new(ListSource::from_params(params)?) as Arc<dyn ImportSource>)
        });
        registry
    }

    pub fn register_collection(&mut self, engine: Arc<dyn CollectionEngine>) -> Result<()> {
        let kind = engine.kind().to_string();
        if self.collections.contains_key(&kind) {
            return Err(Error::AlreadyExists(format!("collection kind '{}'", kind)));
        }
        self.collections.insert(kind, engine);
        Ok(())
    }

    pub fn register_import<F>(&mut self, kind: &str, factory: F) -> Result<()>
    where
        F: Fn(&Value) -> Result<Arc<dyn ImportSource>> + Send + Sync + 'static,
    {
        if self.imports.contains_key(kind) {
            return Err(Error::AlreadyExists(format!("import kind '{}'", kind)));
        }
        self.imports.insert(kind.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn collection_engine(&self, kind: &str) -> Result<Arc<dyn CollectionEngine>> {
        self.collections
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("collection kind '{}'", kind)))
    }

    /// Build a source engine of `kind`
    pub fn build_import(&self, kind: &str, params: &Value) -> Result<Arc<dyn ImportSource>> {
        let factory = self
            .imports
            .get(kind)
            .ok_or_else(|| Error::NotFound(format!("import kind '{}'", kind)))?;
        factory(params)
    }

    pub fn collection_kinds(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    pub fn import_kinds(&self) -> Vec<String> {
        self.imports.keys().cloned().collect()
    }
}
