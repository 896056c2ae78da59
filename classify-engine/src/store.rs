//! Authoritative store of committed items

use crate::identity::Fingerprint;
use crate::item::Item;
use classify_common::{Error, Result};
use std::collections::HashMap;

/// Unbounded keyed store; commit is an upsert, last writer wins
#[derive(Debug, Default)]
pub struct ItemStore {
    items: HashMap<Fingerprint, Item>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit an item
    ///
    /// Rejects items whose id doesn't match the key or that carry no raw input.
    pub fn add(&mut self, id: Fingerprint, item: Item) -> Result<()> {
        if item.id != id {
            return Err(Error::ValidationFailure(format!(
                "item {} committed under key {}",
                item.id, id
            )));
        }
        if item.raw_inputs.is_empty() {
            return Err(Error::ValidationFailure(format!(
                "item {} has no raw input",
                id
            )));
        }
        self.items.insert(id, item);
        Ok(())
    }

    pub fn get(&self, id: &Fingerprint) -> Result<&Item> {
        self.items
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("item {}", id)))
    }

    pub fn get_mut(&mut self, id: &Fingerprint) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    pub fn contains(&self, id: &Fingerprint) -> bool {
        self.items.contains_key(id)
    }

    /// Apply an in-place change to a committed item
    pub fn modify<F>(&mut self, id: &Fingerprint, change: F) -> Result<&Item>
    where
        F: FnOnce(&mut Item),
    {
        let item = self
            .items
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("item {}", id)))?;
        change(item);
        Ok(item)
    }

    pub fn remove(&mut self, id: &Fingerprint) -> Result<Item> {
        self.items
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("item {}", id)))
    }

    /// Snapshot of committed items (unordered)
    pub fn get_current_list(&self) -> Vec<Item> {
        self.items.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataKind, SimpleDatum};
    use crate::item::{NameCleaner, ProviderRecord};
    use std::sync::Arc;

    fn item(name: &str) -> Item {
        let mut item = Item::new(Fingerprint::new(DataKind::Simple, name));
        item.add_raw_input(Arc::new(SimpleDatum::new(name)), &NameCleaner::default());
        item
    }

    #[test]
    fn test_add_is_upsert() {
        let mut store = ItemStore::new();
        let first = item("alien");
        let id = first.id;
        store.add(id, first).unwrap();

        let mut second = item("alien");
        second.selected_match = Some(ProviderRecord::new("42", "Alien", "movie"));
        store.add(id, second).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get(&id).unwrap().selected_match.is_some());
    }

    #[test]
    fn test_add_rejects_invalid_items() {
        let mut store = ItemStore::new();

        let empty = Item::new(Fingerprint::from(1));
        assert!(matches!(
            store.add(Fingerprint::from(1), empty),
            Err(Error::ValidationFailure(_))
        ));

        let mismatched = item("heat");
        assert!(store.add(Fingerprint::from(2), mismatched).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_and_remove_unknown_are_not_found() {
        let mut store = ItemStore::new();
        let id = Fingerprint::from(9);
        assert!(store.get(&id).unwrap_err().is_not_found());
        assert!(store.remove(&id).unwrap_err().is_not_found());
        assert!(store.modify(&id, |_| {}).unwrap_err().is_not_found());
    }

    #[test]
    fn test_modify_in_place() {
        let mut store = ItemStore::new();
        let alien = item("alien");
        let id = alien.id;
        store.add(id, alien).unwrap();

        let updated = store
            .modify(&id, |i| {
                i.add_enrichment_result("tmdb", ProviderRecord::new("1", "Alien", "movie"))
            })
            .unwrap();
        assert_eq!(updated.enrichment_results["tmdb"].len(), 1);

        store.remove(&id).unwrap();
        assert!(store.get_current_list().is_empty());
    }
}
