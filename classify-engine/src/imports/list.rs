//! Built-in `list` import: a fixed list of names

use super::{DatumStream, ImportSource};
use crate::data::{DataConfigs, DataKind, Datum, FileDatum, SimpleDatum};
use classify_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Parameters of a `list` import
///
/// ```json
/// { "kind": "file", "items": ["/movies/Alien.1979.mkv"], "data": { "file": { "extensions": ["mkv"] } } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListParams {
    /// Data kind produced: `simple` (names) or `file` (paths)
    #[serde(default = "default_kind")]
    pub kind: DataKind,

    pub items: Vec<String>,

    /// Data configuration contributed to linked collections
    #[serde(default, skip_serializing_if = "DataConfigs::is_empty")]
    pub data: DataConfigs,
}

fn default_kind() -> DataKind {
    DataKind::Simple
}

/// Source emitting each listed name once per run
#[derive(Debug)]
pub struct ListSource {
    params: ListParams,
    running: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
}

impl ListSource {
    pub const KIND: &'static str = "list";

    pub fn new(params: ListParams) -> Result<Self> {
        if !matches!(params.kind, DataKind::Simple | DataKind::File) {
            return Err(Error::ValidationFailure(format!(
                "list import cannot produce '{}' data",
                params.kind
            )));
        }
        Ok(Self {
            params,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// Build from JSON parameters
    pub fn from_params(params: &Value) -> Result<Self> {
        let params: ListParams = serde_json::from_value(params.clone())
            .map_err(|e| Error::ValidationFailure(format!("invalid list params: {}", e)))?;
        Self::new(params)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn datum(kind: DataKind, entry: &str) -> Datum {
        match kind {
            DataKind::File => Arc::new(FileDatum::from_path(entry)),
            _ => Arc::new(SimpleDatum::new(entry)),
        }
    }
}

impl ImportSource for ListSource {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn start(&self) -> Result<DatumStream> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::InvalidState("already started".to_string()));
        }

        let token = CancellationToken::new();
        *self
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token.clone();

        let kind = self.params.kind;
        let entries = self.params.items.clone();
        let running = Arc::clone(&self.running);

        Ok(Box::pin(async_stream::stream! {
            for entry in entries {
                if token.is_cancelled() {
                    break;
                }
                yield ListSource::datum(kind, &entry);
            }
            running.store(false, Ordering::SeqCst);
            debug!("List source exhausted");
        }))
    }

    fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(Error::InvalidState("already stopped".to_string()));
        }
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cancel();
        Ok(())
    }

    fn eq_source(&self, other: &dyn ImportSource) -> bool {
        other
            .as_any()
            .downcast_ref::<ListSource>()
            .is_some_and(|other| other.params == self.params)
    }

    fn params(&self) -> Value {
        serde_json::to_value(&self.params).unwrap_or(Value::Null)
    }

    fn data_configs(&self) -> DataConfigs {
        self.params.data.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_emits_every_item_then_stops_running() {
        let source =
            ListSource::from_params(&json!({ "kind": "file", "items": ["/a/x.mkv", "/a/y.avi"] }))
                .unwrap();

        let data: Vec<Datum> = source.start().unwrap().collect().await;
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].kind(), DataKind::File);
        assert_eq!(data[1].name(), "y");
        assert!(!source.is_running());
    }

    #[tokio::test]
    async fn test_double_start_and_double_stop() {
        let source = ListSource::from_params(&json!({ "items": ["a"] })).unwrap();

        let _stream = source.start().unwrap();
        assert!(source.start().err().unwrap().is_invalid_state());

        source.stop().unwrap();
        assert!(source.stop().unwrap_err().is_invalid_state());
    }

    #[tokio::test]
    async fn test_stop_ends_stream() {
        let source = ListSource::from_params(&json!({ "items": ["a", "b", "c"] })).unwrap();
        let mut stream = source.start().unwrap();

        assert_eq!(stream.next().await.unwrap().name(), "a");
        source.stop().unwrap();
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_structural_equality() {
        let a = ListSource::from_params(&json!({ "items": ["x", "y"] })).unwrap();
        let b = ListSource::from_params(&json!({ "kind": "simple", "items": ["x", "y"] })).unwrap();
        let c = ListSource::from_params(&json!({ "items": ["y", "x"] })).unwrap();
        let d = ListSource::from_params(&json!({ "kind": "file", "items": ["x", "y"] })).unwrap();

        let e = ListSource::from_params(
            &json!({ "items": ["x", "y"], "data": { "file": { "extensions": ["mkv"] } } }),
        )
        .unwrap();

        assert!(a.eq_source(&b));
        assert!(!a.eq_source(&c));
        assert!(!a.eq_source(&d));
        assert!(!a.eq_source(&e));
    }

    #[test]
    fn test_invalid_params() {
        assert!(ListSource::from_params(&json!({ "kind": "email", "items": [] })).is_err());
        assert!(ListSource::from_params(&json!({ "entries": [] })).is_err());
    }

    #[test]
    fn test_params_round_trip_through_json() {
        let params = json!({ "kind": "file", "items": ["/m/a.mkv"], "data": { "file": { "extensions": ["mkv"] } } });
        let source = ListSource::from_params(&params).unwrap();
        assert_eq!(source.params(), params);
        assert_eq!(source.data_configs().len(), 1);
    }
}
