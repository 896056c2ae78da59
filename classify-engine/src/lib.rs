//! # Classify Engine
//!
//! Collection engine of the classify service: raw data from imports is
//! staged, enriched through metadata providers, confirmed, and committed
//! to per-domain collections. Every transition is published on the event
//! bus.
//!
//! # Modules
//! - `identity`: fingerprints of (kind, name) pairs
//! - `data`: raw data kinds and their capabilities
//! - `item`, `buffer`, `store`: items and where they live
//! - `enrichment`: concurrent provider searches
//! - `collection`: the per-item state machine
//! - `imports`: sources and their draining tasks
//! - `registry`, `repository`, `classify`: orchestration
//! - `api`: HTTP passthrough (event stream, health)

pub mod api;
pub mod buffer;
pub mod classify;
pub mod collection;
pub mod data;
pub mod enrichment;
pub mod identity;
pub mod imports;
pub mod item;
pub mod registry;
pub mod repository;
pub mod store;

pub use crate::classify::Classify;
pub use crate::collection::{Collection, CollectionConfig, CollectionEvent, EventSource};
pub use crate::data::{DataKind, Datum, RawDatum};
pub use crate::enrichment::{MatchSelector, Provider, ProviderError};
pub use crate::identity::Fingerprint;
pub use crate::imports::{Import, ImportSource};
pub use crate::item::{Item, ProviderRecord};
pub use crate::registry::TypeRegistry;
pub use crate::repository::{MemoryRepository, Repository, SqliteRepository};
pub use api::AppState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
