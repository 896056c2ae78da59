//! Events published by collections

use crate::identity::Fingerprint;
use crate::item::Item;
use chrono::{DateTime, Utc};
use classify_common::EventStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Area of the collection a transition happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// Staging buffer
    Buffer,
    /// Committed item store
    Items,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Buffer => "buffer",
            EventSource::Items => "items",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state transition of one item
///
/// Published exactly once, in order within the owning collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionEvent {
    /// Owning collection name
    pub collection: String,
    pub source: EventSource,
    pub status: EventStatus,
    pub id: Fingerprint,
    /// Item snapshot at publish time
    pub item: Item,
    pub timestamp: DateTime<Utc>,
}

impl CollectionEvent {
    /// `source/status` tag, e.g. `items/add`
    pub fn tag(&self) -> String {
        format!("{}/{}", self.source, self.status)
    }

    pub fn is(&self, source: EventSource, status: EventStatus) -> bool {
        self.source == source && self.status == status
    }
}
