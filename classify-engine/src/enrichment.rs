//! Enrichment coordinator
//!
//! One enrichment pass sends an item's query to every registered provider
//! concurrently and waits for all of them before returning.
//!
//! # Failure isolation
//! A provider that fails (search error, stream error, panic) contributes
//! an empty record list. Siblings are never aborted.
//!
//! # Deadline
//! An optional per-provider deadline bounds each task. Records yielded
//! before the deadline are kept.

use crate::item::{Item, ProviderRecord};
use async_trait::async_trait;
use futures::future::join_all;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Provider failure; collapses to an empty result
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Remote call failed
    #[error("Request failed: {0}")]
    Request(String),

    /// Remote answered with something unusable
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider not reachable or not configured
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Lazy, finite sequence of records from one provider
pub type RecordStream = BoxStream<'static, Result<ProviderRecord, ProviderError>>;

/// External metadata search engine
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique provider name (key of the enrichment results)
    fn name(&self) -> &str;

    /// Start a search; records are pulled lazily from the returned stream
    async fn search(&self, query: &str) -> Result<RecordStream, ProviderError>;
}

/// Best-match hook run after each enrichment pass
///
/// Returning `Some` sets the item's selected match.
pub trait MatchSelector: Send + Sync {
    fn select(&self, item: &Item) -> Option<ProviderRecord>;
}

/// Selector that never picks anything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSelection;

impl MatchSelector for NoSelection {
    fn select(&self, _item: &Item) -> Option<ProviderRecord> {
        None
    }
}

/// Records of one pass, keyed by provider name
pub type EnrichmentResults = BTreeMap<String, Vec<ProviderRecord>>;

/// Two-phase dispatch/join over all providers
#[derive(Debug, Clone, Default)]
pub struct EnrichmentCoordinator {
    deadline: Option<Duration>,
}

impl EnrichmentCoordinator {
    /// Coordinator without deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every provider task by `deadline`
    pub fn with_deadline(deadline: Option<Duration>) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Run one pass
    ///
    /// Every provider gets a key in the result, even when it yielded
    /// nothing or failed. Each provider's records keep their yield order.
    pub async fn run(&self, query: &str, providers: &[Arc<dyn Provider>]) -> EnrichmentResults {
        let names: Vec<String> = providers.iter().map(|p| p.name().to_string()).collect();

        // Dispatch: one task per provider
        let handles = providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let query = query.to_string();
            let deadline = self.deadline;
            tokio::spawn(async move { collect_records(provider, query, deadline).await })
        });

        // Join: wait for every task to settle
        let settled = join_all(handles).await;

        let mut results = EnrichmentResults::new();
        for (name, outcome) in names.into_iter().zip(settled) {
            let records = match outcome {
                Ok(records) => records,
                Err(e) => {
                    warn!(provider = %name, error = %e, "Provider task aborted");
                    Vec::new()
                }
            };
            results.entry(name).or_default().extend(records);
        }
        results
    }
}

async fn collect_records(
    provider: Arc<dyn Provider>,
    query: String,
    deadline: Option<Duration>,
) -> Vec<ProviderRecord> {
    let name = provider.name().to_string();
    let mut records = Vec::new();

    let pull = async {
        let mut stream = provider.search(&query).await?;
        while let Some(next) = stream.next().await {
            records.push(next?);
        }
        Ok::<(), ProviderError>(())
    };

    let outcome = match deadline {
        Some(limit) => {
            let timed = tokio::time::timeout(limit, pull).await;
            match timed {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(provider = %name, query = %query, ?limit, "Provider deadline reached");
                    Ok(())
                }
            }
        }
        None => pull.await,
    };

    match outcome {
        Ok(()) => {
            debug!(provider = %name, query = %query, records = records.len(), "Provider search complete");
            records
        }
        Err(e) => {
            warn!(provider = %name, query = %query, error = %e, "Provider search failed");
            Vec::new()
        }
    }
}
