//! Items under classification
//!
//! An item gathers every raw input sharing one fingerprint, the cleaned
//! name used as search query, and the records returned by providers.

use crate::data::Datum;
use crate::identity::Fingerprint;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Opaque provider-specific record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    /// Provider-side identifier
    pub id: String,
    /// Display name (title, subject...)
    pub name: String,
    /// Type tag ("movie", "person"...)
    pub kind: String,
    /// Remaining provider payload
    #[serde(default)]
    pub data: Value,
}

impl ProviderRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Name normalization rules of a collection
#[derive(Debug, Clone, Default)]
pub struct NameCleaner {
    banned: HashSet<String>,
    separators: Vec<char>,
}

impl NameCleaner {
    /// Build from a banned-word list and a separator set
    ///
    /// Banned words match case-insensitively. Every character of
    /// `separators` splits tokens.
    pub fn new<I, S>(banned: I, separators: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            banned: banned
                .into_iter()
                .map(|word| word.as_ref().to_lowercase())
                .collect(),
            separators: separators.chars().collect(),
        }
    }

    /// Tokenize, drop banned tokens and rejoin with single spaces
    pub fn clean(&self, name: &str) -> String {
        name.split(|c: char| self.separators.contains(&c) || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .filter(|token| !self.banned.contains(&token.to_lowercase()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Unit being classified
#[derive(Debug, Clone)]
pub struct Item {
    /// Fingerprint of the (kind, name) pair
    pub id: Fingerprint,
    /// Every datum received for this fingerprint, in arrival order
    pub raw_inputs: Vec<Datum>,
    /// Normalized name used as the provider query
    pub cleaned_name: String,
    /// Provider name -> records in that provider's yield order
    pub enrichment_results: BTreeMap<String, Vec<ProviderRecord>>,
    /// Confirmed or selected match
    pub selected_match: Option<ProviderRecord>,
    /// Kind-specific payloads attached for export (dependencies)
    pub linked: Vec<Datum>,
}

impl Item {
    pub fn new(id: Fingerprint) -> Self {
        Self {
            id,
            raw_inputs: Vec::new(),
            cleaned_name: String::new(),
            enrichment_results: BTreeMap::new(),
            selected_match: None,
            linked: Vec::new(),
        }
    }

    /// Append a raw input and recompute the cleaned name
    pub fn add_raw_input(&mut self, datum: Datum, cleaner: &NameCleaner) {
        self.cleaned_name = cleaner.clean(datum.name());
        self.raw_inputs.push(datum);
    }

    /// Attach a kind-specific payload; no effect on matching
    pub fn link_raw_datum(&mut self, datum: Datum) {
        self.linked.push(datum);
    }

    /// Append one provider record
    pub fn add_enrichment_result(&mut self, provider: &str, record: ProviderRecord) {
        self.enrichment_results
            .entry(provider.to_string())
            .or_default()
            .push(record);
    }

    /// Merge a completed enrichment pass
    ///
    /// Every provider of the pass gets a key, even when it yielded nothing.
    pub fn merge_enrichment(&mut self, results: BTreeMap<String, Vec<ProviderRecord>>) {
        for (provider, records) in results {
            self.enrichment_results
                .entry(provider)
                .or_default()
                .extend(records);
        }
    }

    /// Name of the first raw input
    pub fn name(&self) -> &str {
        self.raw_inputs.first().map(|d| d.name()).unwrap_or_default()
    }

    /// Query string sent to providers
    pub fn query(&self) -> &str {
        if self.cleaned_name.is_empty() {
            self.name()
        } else {
            &self.cleaned_name
        }
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw_inputs: Vec<Value> = self.raw_inputs.iter().map(|d| d.describe()).collect();
        let linked: Vec<Value> = self.linked.iter().map(|d| d.describe()).collect();

        let mut state = serializer.serialize_struct("Item", 6)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("raw_inputs", &raw_inputs)?;
        state.serialize_field("cleaned_name", &self.cleaned_name)?;
        state.serialize_field("enrichment_results", &self.enrichment_results)?;
        state.serialize_field("selected_match", &self.selected_match)?;
        state.serialize_field("linked", &linked)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataKind, FileDatum, SimpleDatum};
    use std::sync::Arc;

    fn movie_cleaner() -> NameCleaner {
        NameCleaner::new(["720p", "x264", "BluRay"], ".-_[]()")
    }

    #[test]
    fn test_clean_strips_banned_case_insensitive() {
        let cleaner = movie_cleaner();
        assert_eq!(
            cleaner.clean("The.Matrix.1999.720P.bluray-X264"),
            "The Matrix 1999"
        );
    }

    #[test]
    fn test_clean_normalizes_delimiters() {
        let cleaner = movie_cleaner();
        assert_eq!(cleaner.clean("__Alien__(1979)  [x264]"), "Alien 1979");
        assert_eq!(cleaner.clean(""), "");
    }

    #[test]
    fn test_add_raw_input_recomputes_cleaned_name() {
        let cleaner = movie_cleaner();
        let file = FileDatum::from_path("/m/Heat.1995.720p.mkv");
        let id = Fingerprint::new(DataKind::File, &file.name);

        let mut item = Item::new(id);
        item.add_raw_input(Arc::new(file.clone()), &cleaner);
        item.add_raw_input(Arc::new(file), &cleaner);

        assert_eq!(item.raw_inputs.len(), 2);
        assert_eq!(item.cleaned_name, "Heat 1995");
        assert_eq!(item.query(), "Heat 1995");
    }

    #[test]
    fn test_query_falls_back_to_name() {
        let cleaner = NameCleaner::new(["x264"], ".");
        let mut item = Item::new(Fingerprint::from(1));
        item.add_raw_input(Arc::new(SimpleDatum::new("x264")), &cleaner);
        assert_eq!(item.cleaned_name, "");
        assert_eq!(item.query(), "x264");
    }

    #[test]
    fn test_merge_enrichment_keeps_empty_providers() {
        let mut item = Item::new(Fingerprint::from(7));
        let mut results = BTreeMap::new();
        results.insert(
            "A".to_string(),
            vec![ProviderRecord::new("a1", "one", "movie")],
        );
        results.insert("B".to_string(), Vec::new());

        item.merge_enrichment(results);
        assert_eq!(item.enrichment_results["A"].len(), 1);
        assert!(item.enrichment_results["B"].is_empty());

        item.add_enrichment_result("A", ProviderRecord::new("a2", "two", "movie"));
        let ids: Vec<_> = item.enrichment_results["A"]
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn test_item_serializes_raw_inputs_as_descriptions() {
        let mut item = Item::new(Fingerprint::from(0xabc));
        item.add_raw_input(Arc::new(SimpleDatum::new("hello")), &NameCleaner::default());

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["id"], "0000000000000abc");
        assert_eq!(json["raw_inputs"][0]["name"], "hello");
        assert_eq!(json["raw_inputs"][0]["kind"], "simple");
        assert_eq!(json["cleaned_name"], "hello");
        assert!(json["selected_match"].is_null());
    }
}
