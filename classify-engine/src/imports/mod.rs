//! Import orchestration
//!
//! An import wraps a source engine producing raw data and routes every
//! datum to the collections linked to it.
//!
//! # Draining task
//! `start` spawns one task per import. The task pulls data from the source
//! stream and fans each datum out to every linked collection concurrently.
//! A failed `on_input` is recorded and logged; it never stops the stream.
//!
//! # Cancellation
//! `stop` cancels the task between data: a datum already being fanned out
//! completes first.

pub mod list;

pub use list::ListSource;

use crate::collection::Collection;
use crate::data::{DataConfigs, Datum};
use chrono::{DateTime, Utc};
use classify_common::{Error, Result};
use futures::future::join_all;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lazy sequence of data produced by a source
pub type DatumStream = BoxStream<'static, Datum>;

/// Source engine of an import
pub trait ImportSource: Send + Sync + fmt::Debug {
    /// Registered import kind
    fn kind(&self) -> &str;

    /// Begin producing data; fails with `InvalidState` if already running
    fn start(&self) -> Result<DatumStream>;

    /// Stop producing data; fails with `InvalidState` if already stopped
    fn stop(&self) -> Result<()>;

    /// Structural equality with another source of the same kind
    fn eq_source(&self, other: &dyn ImportSource) -> bool;

    /// Parameters the source was built from (persisted as JSON)
    fn params(&self) -> Value;

    /// Per-data-kind configuration this source contributes to collections
    fn data_configs(&self) -> DataConfigs {
        DataConfigs::new()
    }

    fn as_any(&self) -> &dyn Any;
}

/// One datum a collection refused
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub collection: String,
    pub datum: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one draining run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Data pulled from the source
    pub received: usize,
    /// (datum, collection) pairs accepted
    pub ingested: usize,
    /// (datum, collection) pairs refused
    pub failed: usize,
    /// Run ended by `stop` rather than by source exhaustion
    pub cancelled: bool,
}

/// Listing view of an import
#[derive(Debug, Clone, Serialize)]
pub struct ImportInfo {
    pub id: String,
    pub kind: String,
    pub params: Value,
    pub collections: Vec<String>,
    pub running: bool,
    pub failures: usize,
}

struct DrainTask {
    cancel: CancellationToken,
    handle: JoinHandle<IngestReport>,
}

type Links = Arc<RwLock<BTreeMap<String, Arc<Collection>>>>;

/// A source plus the collections it feeds
pub struct Import {
    id: String,
    source: Arc<dyn ImportSource>,
    links: Links,
    failures: Arc<std::sync::Mutex<Vec<IngestFailure>>>,
    task: Mutex<Option<DrainTask>>,
}

impl Import {
    pub fn new(source: Arc<dyn ImportSource>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), source)
    }

    pub fn with_id(id: impl Into<String>, source: Arc<dyn ImportSource>) -> Self {
        Self {
            id: id.into(),
            source,
            links: Arc::new(RwLock::new(BTreeMap::new())),
            failures: Arc::new(std::sync::Mutex::new(Vec::new())),
            task: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &str {
        self.source.kind()
    }

    pub fn source(&self) -> &Arc<dyn ImportSource> {
        &self.source
    }

    // ========================================================================
    // Links
    // ========================================================================

    /// Link a collection; the collection learns about the import too
    pub async fn link(&self, collection: Arc<Collection>) {
        let name = collection.name().await;
        collection.add_import(&self.id, Arc::clone(&self.source)).await;
        self.links.write().await.insert(name, collection);
    }

    /// Unlink a collection by name; returns false if it wasn't linked
    pub async fn unlink(&self, name: &str) -> bool {
        let removed = self.links.write().await.remove(name);
        match removed {
            Some(collection) => {
                if let Err(e) = collection.delete_import(&self.id).await {
                    debug!(import = %self.id, collection = name, error = %e, "Collection already unlinked");
                }
                true
            }
            None => false,
        }
    }

    pub(crate) async fn rename_link(&self, old: &str, new: &str) {
        let mut links = self.links.write().await;
        if let Some(collection) = links.remove(old) {
            links.insert(new.to_string(), collection);
        }
    }

    pub async fn is_linked(&self, name: &str) -> bool {
        self.links.read().await.contains_key(name)
    }

    /// Linked collection names
    pub async fn collections(&self) -> Vec<String> {
        self.links.read().await.keys().cloned().collect()
    }

    pub async fn link_count(&self) -> usize {
        self.links.read().await.len()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the source and spawn the draining task
    pub async fn start(&self) -> Result<()> {
        let mut task = self.task.lock().await;
        let stream = self.source.start()?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drain(
            self.id.clone(),
            stream,
            Arc::clone(&self.links),
            Arc::clone(&self.failures),
            cancel.clone(),
        ));
        *task = Some(DrainTask { cancel, handle });

        info!(import = %self.id, kind = self.kind(), "Import started");
        Ok(())
    }

    /// Stop the source and cancel the draining task
    pub async fn stop(&self) -> Result<()> {
        self.source.stop()?;
        if let Some(task) = self.task.lock().await.as_ref() {
            task.cancel.cancel();
        }
        info!(import = %self.id, kind = self.kind(), "Import stopped");
        Ok(())
    }

    /// True while a draining task is alive
    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Wait for the current draining task to end
    pub async fn wait(&self) -> Result<IngestReport> {
        let task = self.task.lock().await.take();
        let Some(task) = task else {
            return Err(Error::InvalidState(format!(
                "import {} is not started",
                self.id
            )));
        };
        task.handle
            .await
            .map_err(|e| Error::Internal(format!("import {} task failed: {}", self.id, e)))
    }

    /// Data refused by collections so far
    pub fn failures(&self) -> Vec<IngestFailure> {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn info(&self) -> ImportInfo {
        ImportInfo {
            id: self.id.clone(),
            kind: self.kind().to_string(),
            params: self.source.params(),
            collections: self.collections().await,
            running: self.is_running().await,
            failures: self.failures().len(),
        }
    }
}

impl fmt::Debug for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Import")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

async fn drain(
    import: String,
    mut stream: DatumStream,
    links: Links,
    failures: Arc<std::sync::Mutex<Vec<IngestFailure>>>,
    cancel: CancellationToken,
) -> IngestReport {
    let mut report = IngestReport::default();

    loop {
        let datum = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                break;
            }
            next = stream.next() => match next {
                Some(datum) => datum,
                None => break,
            },
        };
        report.received += 1;

        // Fan-out runs outside the select: the in-flight datum always completes
        let collections: Vec<Arc<Collection>> = links.read().await.values().cloned().collect();
        let outcomes = join_all(collections.iter().map(|collection| {
            let datum = Arc::clone(&datum);
            async move {
                let outcome = collection.on_input(datum).await;
                (collection.name().await, outcome)
            }
        }))
        .await;

        for (collection, outcome) in outcomes {
            match outcome {
                Ok(_) => report.ingested += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        import = %import,
                        collection = %collection,
                        datum = datum.name(),
                        error = %e,
                        "Datum refused by collection"
                    );
                    failures
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push(IngestFailure {
                            collection,
                            datum: datum.name().to_string(),
                            error: e.to_string(),
                            timestamp: Utc::now(),
                        });
                }
            }
        }
    }

    info!(
        import = %import,
        received = report.received,
        ingested = report.ingested,
        failed = report.failed,
        cancelled = report.cancelled,
        "Import draining finished"
    );
    report
}
