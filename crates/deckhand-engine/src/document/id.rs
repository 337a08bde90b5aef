//! Document identity: schema tags and lookup keys.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RenderError;

/// A three-part schema tag: `namespace/Kind/version`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId {
    /// The namespace, e.g. `deckhand` or `armada`.
    pub namespace: String,
    /// The kind, e.g. `Certificate`.
    pub kind: String,
    /// The version, e.g. `v1`.
    pub version: String,
}

impl SchemaId {
    /// Builds a schema tag from its parts.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        kind: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            version: version.into(),
        }
    }
}

impl FromStr for SchemaId {
    type Err = RenderError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || RenderError::InvalidDocumentFormat {
            detail: format!("schema tag {raw:?} is not of the form namespace/Kind/version"),
        };

        let mut parts = raw.split('/');
        let (Some(namespace), Some(kind), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };
        if namespace.is_empty() || kind.is_empty() || !version.starts_with('v') {
            return Err(invalid());
        }

        Ok(Self::new(namespace, kind, version))
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.version)
    }
}

impl Serialize for SchemaId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// The `(schema, name)` identity documents are addressed by.
///
/// Unique within a revision except for replacement pairs, which
/// intentionally share it across two layers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DocumentId {
    /// The document's schema tag.
    pub schema: SchemaId,
    /// The document's `metadata.name`.
    pub name: String,
}

impl DocumentId {
    /// Builds an identity from a schema tag and name.
    #[must_use]
    pub fn new(schema: SchemaId, name: impl Into<String>) -> Self {
        Self {
            schema,
            name: name.into(),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.schema, self.name)
    }
}

/// The engine-internal key a stored document is tracked by.
///
/// Adds the layer to [`DocumentId`] so both halves of a replacement pair
/// remain addressable while suppression re-routes `(schema, name)` lookups.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentKey {
    /// The `(schema, name)` identity.
    pub id: DocumentId,
    /// The declared layer, if the document participates in layering.
    pub layer: Option<String>,
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.layer {
            Some(layer) => write!(f, "{} ({layer})", self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_part_tags() {
        let id: SchemaId = "deckhand/Certificate/v1".parse().unwrap();
        assert_eq!(id.namespace, "deckhand");
        assert_eq!(id.kind, "Certificate");
        assert_eq!(id.version, "v1");
        assert_eq!(id.to_string(), "deckhand/Certificate/v1");
    }

    #[test]
    fn accepts_dotted_versions() {
        assert!("deckhand/Certificate/v1.0".parse::<SchemaId>().is_ok());
    }

    #[test]
    fn rejects_malformed_tags() {
        for raw in ["", "a/b", "a/b/c/d", "a//v1", "a/b/1"] {
            assert!(raw.parse::<SchemaId>().is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn document_ids_order_by_schema_then_name() {
        let a = DocumentId::new("a/A/v1".parse().unwrap(), "z");
        let b = DocumentId::new("b/B/v1".parse().unwrap(), "a");
        assert!(a < b);
    }
}
