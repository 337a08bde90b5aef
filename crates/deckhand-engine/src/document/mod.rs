//! The document data model.
//!
//! A document is the atomic unit the engine operates on: a `schema` tag, a
//! `metadata` section classifying and naming it, and an arbitrary YAML
//! `data` payload. Unknown top-level keys are rejected, matching the
//! ingestion contract bit-for-bit.
//!
//! Control documents (`LayeringPolicy`, `DataSchema`, `ValidationPolicy`)
//! share the envelope but are partitioned into their own variants before
//! rendering starts; see [`control`].

mod control;
mod id;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

pub use control::{
    ControlDocument, DataSchemaDoc, LayeringPolicyDoc, ValidationPolicyDoc, partition,
};
pub use id::{DocumentId, DocumentKey, SchemaId};

use crate::error::RenderError;
use crate::path::DataPath;

/// The meta-schema classifying a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaSchema {
    /// A normal document (`metadata/Document/v1`).
    #[serde(rename = "metadata/Document/v1")]
    Document,
    /// A control document (`metadata/Control/v1`).
    #[serde(rename = "metadata/Control/v1")]
    Control,
}

/// Where a document's payload is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePolicy {
    /// The payload is stored in the clear.
    #[default]
    Cleartext,
    /// The payload is a reference token into the secret store.
    Encrypted,
}

/// One ordered merge action applied when layering atop a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerAction {
    /// How the child's data is combined at `path`.
    pub method: ActionMethod,
    /// Where the action applies.
    pub path: DataPath,
}

/// The method of a [`LayerAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMethod {
    /// Recursively merge the child's data at the path.
    Merge,
    /// Overwrite the parent-derived value with the child's value.
    Replace,
    /// Remove the key or index at the path.
    Delete,
}

/// The `metadata.layeringDefinition` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayeringDefinition {
    /// The layer this document lives in; must appear in `layerOrder`.
    pub layer: String,

    /// Abstract documents participate in layering but are never emitted.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,

    /// Label key/values a parent must carry, all of them.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parent_selector: BTreeMap<String, String>,

    /// Ordered actions applied atop the parent's layered data.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<LayerAction>,
}

/// One `metadata.substitutions[]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    /// Where the value comes from.
    pub src: SubstitutionSource,
    /// Where the value lands.
    pub dest: SubstitutionDest,
}

/// The source half of a substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionSource {
    /// The source document's schema tag.
    pub schema: SchemaId,
    /// The source document's name.
    pub name: String,
    /// The path into the source's rendered data; `.` is the whole payload.
    pub path: DataPath,
}

/// The destination half of a substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionDest {
    /// The path injected into.
    pub path: DataPath,
    /// Optional regex; its first match in the destination string is
    /// replaced by the source value's string form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// The `metadata` section of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// The meta-schema classifying this document.
    pub schema: MetaSchema,

    /// The document's name, unique per `(schema, name)` within a revision.
    pub name: String,

    /// Storage policy for the payload.
    #[serde(default, rename = "storagePolicy")]
    pub storage_policy: StoragePolicy,

    /// Labels consulted by other documents' `parentSelector`s.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Layering participation, if any.
    #[serde(
        default,
        rename = "layeringDefinition",
        skip_serializing_if = "Option::is_none"
    )]
    pub layering: Option<LayeringDefinition>,

    /// Marks this document as replacing its same-named parent.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replacement: bool,

    /// Ordered cross-document substitutions applied to this document.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,
}

/// The `status` section stamped at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    /// The bucket of record.
    pub bucket: String,
}

/// A stored document: the atomic unit of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    /// The three-part schema tag.
    pub schema: SchemaId,

    /// The metadata section.
    pub metadata: Metadata,

    /// The payload; for encrypted documents, a secret reference token.
    #[serde(default)]
    pub data: Value,

    /// Ingestion-assigned status, immutable within a revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
}

impl Document {
    /// The `(schema, name)` identity.
    #[must_use]
    pub fn id(&self) -> DocumentId {
        DocumentId::new(self.schema.clone(), self.metadata.name.clone())
    }

    /// The engine-internal `(schema, name, layer)` key.
    #[must_use]
    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            id: self.id(),
            layer: self.layer().map(str::to_string),
        }
    }

    /// The declared layer, if the document participates in layering.
    #[must_use]
    pub fn layer(&self) -> Option<&str> {
        self.metadata.layering.as_ref().map(|def| def.layer.as_str())
    }

    /// True for documents that layer but are never emitted.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.metadata
            .layering
            .as_ref()
            .is_some_and(|def| def.is_abstract)
    }

    /// True for control documents (`metadata/Control/v1`).
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.metadata.schema == MetaSchema::Control
    }

    /// True when the payload is a secret reference.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.metadata.storage_policy == StoragePolicy::Encrypted
    }

    /// The bucket of record, if stamped.
    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.status.as_ref().map(|status| status.bucket.as_str())
    }

    /// Parses a single document from a YAML value.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidDocumentFormat`] if the envelope does
    /// not conform.
    pub fn from_value(value: Value) -> Result<Self, RenderError> {
        serde_yaml::from_value(value).map_err(|err| RenderError::InvalidDocumentFormat {
            detail: err.to_string(),
        })
    }
}

/// Parses a multi-document YAML stream (`---`-separated) into documents.
///
/// # Errors
///
/// Returns [`RenderError::InvalidDocumentFormat`] on the first document
/// that fails envelope validation.
pub fn parse_document_stream(source: &str) -> Result<Vec<Document>, RenderError> {
    use serde::Deserialize as _;

    let mut documents = Vec::new();
    for deserializer in serde_yaml::Deserializer::from_str(source) {
        let value = Value::deserialize(deserializer).map_err(|err| {
            RenderError::InvalidDocumentFormat {
                detail: err.to_string(),
            }
        })?;
        if value.is_null() {
            // Empty trailing stream chunks are tolerated.
            continue;
        }
        documents.push(Document::from_value(value)?);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = r"
schema: armada/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: ucp
  labels:
    site: seaworthy
  layeringDefinition:
    layer: site
    parentSelector:
      scope: global
    actions:
      - method: merge
        path: .
data:
  debug: false
";

    #[test]
    fn parses_a_normal_document() {
        let doc: Document = serde_yaml::from_str(CHART).unwrap();
        assert_eq!(doc.schema.to_string(), "armada/Chart/v1");
        assert_eq!(doc.metadata.name, "ucp");
        assert_eq!(doc.layer(), Some("site"));
        assert!(!doc.is_abstract());
        assert!(!doc.is_control());
        assert!(!doc.is_encrypted());
        let layering = doc.metadata.layering.as_ref().unwrap();
        assert_eq!(layering.actions[0].method, ActionMethod::Merge);
        assert!(layering.actions[0].path.is_root());
    }

    #[test]
    fn rejects_unknown_top_level_keys() {
        let raw = "schema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: x\nbogus: 1\ndata: {}\n";
        assert!(matches!(
            Document::from_value(serde_yaml::from_str(raw).unwrap()),
            Err(RenderError::InvalidDocumentFormat { .. })
        ));
    }

    #[test]
    fn rejects_unknown_meta_schema() {
        let raw = "schema: a/B/v1\nmetadata:\n  schema: metadata/Bogus/v1\n  name: x\ndata: {}\n";
        assert!(Document::from_value(serde_yaml::from_str(raw).unwrap()).is_err());
    }

    #[test]
    fn storage_policy_defaults_to_cleartext() {
        let doc: Document = serde_yaml::from_str(CHART).unwrap();
        assert_eq!(doc.metadata.storage_policy, StoragePolicy::Cleartext);
    }

    #[test]
    fn parses_substitutions_with_patterns() {
        let raw = r"
schema: armada/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: chart
  substitutions:
    - src:
        schema: deckhand/Passphrase/v1
        name: example-password
        path: .
      dest:
        path: .chart.values.url
        pattern: INSERT_[A-Z]+_HERE
data: {}
";
        let doc: Document = serde_yaml::from_str(raw).unwrap();
        let sub = &doc.metadata.substitutions[0];
        assert_eq!(sub.src.name, "example-password");
        assert!(sub.src.path.is_root());
        assert_eq!(sub.dest.pattern.as_deref(), Some("INSERT_[A-Z]+_HERE"));
    }

    #[test]
    fn stream_parsing_splits_on_document_markers() {
        let stream = format!("{CHART}---\nschema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: other\ndata: 1\n");
        let docs = parse_document_stream(&stream).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].metadata.name, "other");
    }

    #[test]
    fn round_trips_through_yaml() {
        let doc: Document = serde_yaml::from_str(CHART).unwrap();
        let emitted = serde_yaml::to_string(&doc).unwrap();
        let reparsed: Document = serde_yaml::from_str(&emitted).unwrap();
        assert_eq!(doc, reparsed);
    }
}
