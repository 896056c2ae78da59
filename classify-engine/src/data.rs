//! Raw data produced by imports
//!
//! A raw datum is the unit an import hands to its collections. Every datum
//! has a name and a kind; some expose extra capabilities:
//! - **dependencies**: child data that must be configured before the parent
//!   (an email and its attachments)
//! - **configuration**: a per-collection blob applied before the datum is
//!   staged (accepted file extensions, attachment size limits)
//!
//! Capabilities are resolved once at the collection boundary through the
//! `dependencies()` / `configurable()` accessors, never by introspection.

use classify_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Shared handle on a raw datum
///
/// The same datum is fanned out to every collection linked to an import.
pub type Datum = Arc<dyn RawDatum>;

/// Kind reference of a raw datum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Simple,
    File,
    Movie,
    Email,
    Attachment,
}

impl DataKind {
    /// Stable string reference (used in fingerprints and config keys)
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::Simple => "simple",
            DataKind::File => "file",
            DataKind::Movie => "movie",
            DataKind::Email => "email",
            DataKind::Attachment => "attachment",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(DataKind::Simple),
            "file" => Ok(DataKind::File),
            "movie" => Ok(DataKind::Movie),
            "email" => Ok(DataKind::Email),
            "attachment" => Ok(DataKind::Attachment),
            other => Err(Error::NotFound(format!("data kind '{}'", other))),
        }
    }
}

/// Per-data-kind configuration blobs
pub type DataConfigs = BTreeMap<DataKind, Value>;

/// A unit of input to classify
pub trait RawDatum: Send + Sync + fmt::Debug {
    /// Name used for fingerprinting and name cleaning
    fn name(&self) -> &str;

    /// Kind reference
    fn kind(&self) -> DataKind;

    /// Ordered child data, if this datum has any
    fn dependencies(&self) -> Option<&[Datum]> {
        None
    }

    /// Configuration capability, if this datum accepts a config blob
    fn configurable(&self) -> Option<&dyn Configurable> {
        None
    }

    /// Kind-specific payload kept on the item for later export
    fn describe(&self) -> Value {
        json!({ "kind": self.kind(), "name": self.name() })
    }
}

/// Configuration step applied to a datum before it reaches a collection
pub trait Configurable {
    /// Apply (and validate against) a collection's blob for this data kind
    ///
    /// `blob` is `Value::Null` when the collection has no blob for the kind.
    fn apply_config(&self, blob: &Value) -> Result<()>;
}

// ============================================================================
// Built-in data types
// ============================================================================

/// Plain named datum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleDatum {
    pub name: String,
}

impl SimpleDatum {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl RawDatum for SimpleDatum {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DataKind {
        DataKind::Simple
    }
}

/// File found by a source
///
/// Config blob: `{ "extensions": ["mkv", "avi"] }` restricts the accepted
/// extensions (case-insensitive). No blob or an empty list accepts all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDatum {
    /// File name without extension
    pub name: String,
    /// File name with extension
    pub full_name: String,
    /// Lower-case extension without the dot
    pub extension: String,
    /// Parent directory
    pub path: String,
    /// Extra header information found by the source
    #[serde(default)]
    pub infos: BTreeMap<String, String>,
}

impl FileDatum {
    /// Build from a file path
    pub fn from_path(full_path: impl AsRef<Path>) -> Self {
        let full_path = full_path.as_ref();
        let full_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let name = full_path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| full_name.clone());
        let extension = full_path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let path = full_path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            name,
            full_name,
            extension,
            path,
            infos: BTreeMap::new(),
        }
    }
}

impl RawDatum for FileDatum {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DataKind {
        DataKind::File
    }

    fn configurable(&self) -> Option<&dyn Configurable> {
        Some(self)
    }

    fn describe(&self) -> Value {
        json!({
            "kind": DataKind::File,
            "name": self.name,
            "full_name": self.full_name,
            "extension": self.extension,
            "path": self.path,
            "infos": self.infos,
        })
    }
}

impl Configurable for FileDatum {
    fn apply_config(&self, blob: &Value) -> Result<()> {
        let Some(allowed) = blob_field(blob, "extensions", DataKind::File)? else {
            return Ok(());
        };
        let allowed = allowed.as_array().ok_or_else(|| {
            Error::ValidationFailure("file config 'extensions' must be a list".to_string())
        })?;
        if allowed.is_empty() {
            return Ok(());
        }

        let accepted = allowed
            .iter()
            .filter_map(Value::as_str)
            .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(&self.extension));

        if accepted {
            Ok(())
        } else {
            Err(Error::ValidationFailure(format!(
                "file '{}' has unaccepted extension '{}'",
                self.full_name, self.extension
            )))
        }
    }
}

/// Email attachment
///
/// Config blob: `{ "max_size": 1048576 }` rejects larger attachments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentDatum {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

impl RawDatum for AttachmentDatum {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DataKind {
        DataKind::Attachment
    }

    fn configurable(&self) -> Option<&dyn Configurable> {
        Some(self)
    }

    fn describe(&self) -> Value {
        json!({
            "kind": DataKind::Attachment,
            "name": self.name,
            "mime_type": self.mime_type,
            "size": self.size,
        })
    }
}

impl Configurable for AttachmentDatum {
    fn apply_config(&self, blob: &Value) -> Result<()> {
        let Some(max) = blob_field(blob, "max_size", DataKind::Attachment)? else {
            return Ok(());
        };
        let max = max.as_u64().ok_or_else(|| {
            Error::ValidationFailure("attachment config 'max_size' must be a number".to_string())
        })?;

        if self.size > max {
            return Err(Error::ValidationFailure(format!(
                "attachment '{}' is {} bytes, limit is {}",
                self.name, self.size, max
            )));
        }
        Ok(())
    }
}

/// Email message; its attachments are dependencies
#[derive(Debug, Clone)]
pub struct EmailDatum {
    pub subject: String,
    pub from: String,
    pub attachments: Vec<Datum>,
}

impl EmailDatum {
    pub fn new(subject: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            from: from.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: AttachmentDatum) -> Self {
        self.attachments.push(Arc::new(attachment));
        self
    }
}

impl RawDatum for EmailDatum {
    fn name(&self) -> &str {
        &self.subject
    }

    fn kind(&self) -> DataKind {
        DataKind::Email
    }

    fn dependencies(&self) -> Option<&[Datum]> {
        if self.attachments.is_empty() {
            None
        } else {
            Some(self.attachments.as_slice())
        }
    }

    fn describe(&self) -> Value {
        json!({
            "kind": DataKind::Email,
            "subject": self.subject,
            "from": self.from,
            "attachments": self.attachments.iter().map(|a| a.name()).collect::<Vec<_>>(),
        })
    }
}

/// Look up one field of an object blob; `Null` means "no config"
fn blob_field<'a>(blob: &'a Value, field: &str, kind: DataKind) -> Result<Option<&'a Value>> {
    match blob {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(map.get(field).filter(|v| !v.is_null())),
        _ => Err(Error::ValidationFailure(format!(
            "{} config must be an object",
            kind
        ))),
    }
}
