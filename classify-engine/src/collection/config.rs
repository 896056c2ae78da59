//! Per-collection configuration
//!
//! The configuration surface is JSON: collections are created with an
//! optional config value and patched later with partial values.

use crate::data::{DataConfigs, DataKind};
use crate::item::NameCleaner;
use classify_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Runtime configuration of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionConfig {
    /// Buffer capacity (at least 1)
    pub buffer_size: usize,

    /// Stage new items for confirmation; `false` commits them directly
    pub buffered: bool,

    /// Tokens removed from names before searching (case-insensitive)
    pub banned: Vec<String>,

    /// Characters splitting a name into tokens
    pub separators: String,

    /// Run an enrichment pass after every input
    pub auto_enrich: bool,

    /// Per-provider deadline for enrichment passes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_deadline_ms: Option<u64>,

    /// Parameter overrides per import kind, merged into import params
    pub imports: BTreeMap<String, Value>,

    /// Configuration blobs per data kind, applied to incoming data
    pub data: DataConfigs,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 2,
            buffered: true,
            banned: Vec::new(),
            separators: " ._-".to_string(),
            auto_enrich: true,
            provider_deadline_ms: None,
            imports: BTreeMap::new(),
            data: DataConfigs::new(),
        }
    }
}

impl CollectionConfig {
    /// Check invariants
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(Error::ValidationFailure(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        if self.provider_deadline_ms == Some(0) {
            return Err(Error::ValidationFailure(
                "provider_deadline_ms must be positive".to_string(),
            ));
        }
        for (kind, overrides) in &self.imports {
            if !overrides.is_object() {
                return Err(Error::ValidationFailure(format!(
                    "overrides for import kind '{}' must be an object",
                    kind
                )));
            }
        }
        Ok(())
    }

    /// Return a copy with `patch` merged in
    ///
    /// Objects merge key by key, `null` removes a key, anything else
    /// replaces. The result is validated.
    pub fn merged(&self, patch: &Value) -> Result<CollectionConfig> {
        if patch.is_null() {
            return Ok(self.clone());
        }
        if !patch.is_object() {
            return Err(Error::ValidationFailure(
                "collection config must be an object".to_string(),
            ));
        }

        let mut value = serde_json::to_value(self)?;
        merge_json(&mut value, patch);

        let config: CollectionConfig = serde_json::from_value(value)
            .map_err(|e| Error::ValidationFailure(format!("invalid collection config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Name cleaner built from banned words and separators
    pub fn cleaner(&self) -> NameCleaner {
        NameCleaner::new(&self.banned, &self.separators)
    }

    pub fn provider_deadline(&self) -> Option<Duration> {
        self.provider_deadline_ms.map(Duration::from_millis)
    }

    /// Parameter overrides for one import kind
    pub fn import_overrides(&self, kind: &str) -> Option<&Value> {
        self.imports.get(kind)
    }

    /// Own blob for one data kind
    pub fn data_config(&self, kind: DataKind) -> Option<&Value> {
        self.data.get(&kind)
    }
}

/// Recursive JSON merge (objects merge, `null` deletes, scalars replace)
pub fn merge_json(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                if value.is_null() {
                    base.remove(key);
                } else {
                    merge_json(base.entry(key.clone()).or_insert(Value::Null), value);
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Shallow merge of import parameters (top-level keys of `overrides` win)
pub fn merge_params(params: &Value, overrides: &Value) -> Value {
    match (params, overrides) {
        (Value::Object(params), Value::Object(overrides)) => {
            let mut merged = params.clone();
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (params, Value::Null) => params.clone(),
        (_, overrides) => overrides.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        let config = CollectionConfig::default();
        assert_eq!(config.buffer_size, 2);
        assert!(config.buffered);
        assert!(config.auto_enrich);
        config.validate().unwrap();
    }

    #[test]
    fn test_merge_partial_patch() {
        let base = CollectionConfig::default();
        let config = base
            .merged(&json!({
                "buffer_size": 5,
                "banned": ["720p"],
                "data": { "file": { "extensions": ["mkv"] } }
            }))
            .unwrap();

        assert_eq!(config.buffer_size, 5);
        assert_eq!(config.banned, vec!["720p"]);
        assert_eq!(
            config.data_config(DataKind::File),
            Some(&json!({ "extensions": ["mkv"] }))
        );
        assert_eq!(config.separators, base.separators);
    }

    #[test]
    fn test_merge_nested_and_null_removal() {
        let base = CollectionConfig::default()
            .merged(&json!({ "imports": { "list": { "kind": "file", "items": [] } } }))
            .unwrap();

        let patched = base
            .merged(&json!({ "imports": { "list": { "items": null } } }))
            .unwrap();
        assert_eq!(patched.imports["list"], json!({ "kind": "file" }));
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let base = CollectionConfig::default();

        for patch in [
            json!({ "buffer_size": 0 }),
            json!({ "buffer_size": "big" }),
            json!({ "unknown_key": true }),
            json!({ "imports": { "list": 3 } }),
            json!({ "data": { "video": {} } }),
            json!("not an object"),
        ] {
            let err = base.merged(&patch).unwrap_err();
            assert!(
                matches!(err, Error::ValidationFailure(_)),
                "patch {} gave {:?}",
                patch,
                err
            );
        }
    }

    #[test]
    fn test_merge_params_is_shallow() {
        let params = json!({ "kind": "simple", "items": ["a"] });
        let merged = merge_params(&params, &json!({ "items": ["b", "c"] }));
        assert_eq!(merged, json!({ "kind": "simple", "items": ["b", "c"] }));

        assert_eq!(merge_params(&params, &Value::Null), params);
    }
}
