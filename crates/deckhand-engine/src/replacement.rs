//! Replacement resolution.
//!
//! A replacement document supplants its parent: same `(schema, name)`,
//! different layer, `metadata.replacement: true`. The replaced parent is
//! suppressed from output, but `(schema, name)` lookups by substitution
//! sources and later layering transparently resolve to the replacement.
//! Suppression is identifier re-routing, not graph surgery: the plan maps
//! replaced keys to their replacements and lookups go through it.

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::{Document, DocumentId, DocumentKey};
use crate::error::RenderError;

/// The resolved replacement relation for a revision.
#[derive(Debug, Default)]
pub struct ReplacementPlan {
    /// Replaced parent key → replacement child key.
    redirects: BTreeMap<DocumentKey, DocumentKey>,
}

impl ReplacementPlan {
    /// Validates every replacement document and builds the plan.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidReplacement`] when a replacement has no
    ///   parent or the parent's identity differs.
    /// - [`RenderError::SingletonReplacement`] when the parent is itself a
    ///   replacement (chains never exceed length one).
    pub fn resolve(
        documents: &BTreeMap<DocumentKey, Document>,
        parents: &BTreeMap<DocumentKey, DocumentKey>,
    ) -> Result<Self, RenderError> {
        let mut redirects = BTreeMap::new();

        for (key, document) in documents {
            if !document.metadata.replacement {
                continue;
            }

            let Some(parent_key) = parents.get(key) else {
                return Err(RenderError::InvalidReplacement {
                    detail: format!("replacement {key} has no parent"),
                });
            };
            if parent_key.id != key.id {
                return Err(RenderError::InvalidReplacement {
                    detail: format!(
                        "replacement {key} does not share its parent's identity ({})",
                        parent_key.id
                    ),
                });
            }
            let parent = &documents[parent_key];
            if parent.metadata.replacement {
                return Err(RenderError::SingletonReplacement {
                    parent: parent_key.to_string(),
                });
            }

            debug!(replaced = %parent_key, replacement = %key, "planned replacement");
            redirects.insert(parent_key.clone(), key.clone());
        }

        Ok(Self { redirects })
    }

    /// True when `key` is a replaced parent (suppressed from output).
    #[must_use]
    pub fn is_replaced(&self, key: &DocumentKey) -> bool {
        self.redirects.contains_key(key)
    }

    /// Resolves a key through the replacement relation.
    #[must_use]
    pub fn effective<'a>(&'a self, key: &'a DocumentKey) -> &'a DocumentKey {
        self.redirects.get(key).unwrap_or(key)
    }

    /// Builds the `(schema, name)` source index, routed through this plan.
    ///
    /// Identity groups of size one map to their sole document; a replaced
    /// pair maps to the replacement child. Larger groups were already
    /// rejected by uniqueness validation.
    #[must_use]
    pub fn source_index(
        &self,
        documents: &BTreeMap<DocumentKey, Document>,
    ) -> BTreeMap<DocumentId, DocumentKey> {
        let mut index = BTreeMap::new();
        for key in documents.keys() {
            if self.is_replaced(key) {
                continue;
            }
            index.insert(key.id.clone(), key.clone());
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, layer: &str, replacement: bool) -> Document {
        let source = format!(
            "schema: armada/Chart/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: {name}\n  \
             labels:\n    name: {name}\n{}  layeringDefinition:\n    layer: {layer}\n    \
             parentSelector:\n      name: {name}\ndata: {{}}\n",
            if replacement { "  replacement: true\n" } else { "" }
        );
        serde_yaml::from_str(&source).unwrap()
    }

    fn keyed(docs: Vec<Document>) -> BTreeMap<DocumentKey, Document> {
        docs.into_iter().map(|d| (d.key(), d)).collect()
    }

    fn linked(
        documents: &BTreeMap<DocumentKey, Document>,
        child: &str,
        parent: &str,
    ) -> BTreeMap<DocumentKey, DocumentKey> {
        let find = |layer: &str| {
            documents
                .keys()
                .find(|key| key.layer.as_deref() == Some(layer))
                .unwrap()
                .clone()
        };
        [(find(child), find(parent))].into_iter().collect()
    }

    #[test]
    fn replacement_pairs_are_redirected() {
        let documents = keyed(vec![doc("ucp", "global", false), doc("ucp", "site", true)]);
        let parents = linked(&documents, "site", "global");
        let plan = ReplacementPlan::resolve(&documents, &parents).unwrap();

        let parent_key = documents
            .keys()
            .find(|key| key.layer.as_deref() == Some("global"))
            .unwrap();
        let child_key = documents
            .keys()
            .find(|key| key.layer.as_deref() == Some("site"))
            .unwrap();

        assert!(plan.is_replaced(parent_key));
        assert_eq!(plan.effective(parent_key), child_key);
        assert_eq!(plan.effective(child_key), child_key);

        let index = plan.source_index(&documents);
        assert_eq!(index.get(&parent_key.id), Some(child_key));
    }

    #[test]
    fn replacement_without_parent_is_invalid() {
        let documents = keyed(vec![doc("ucp", "site", true)]);
        assert!(matches!(
            ReplacementPlan::resolve(&documents, &BTreeMap::new()),
            Err(RenderError::InvalidReplacement { .. })
        ));
    }

    #[test]
    fn replacement_of_a_differently_named_parent_is_invalid() {
        let documents = keyed(vec![doc("other", "global", false), doc("ucp", "site", true)]);
        let parents = linked(&documents, "site", "global");
        assert!(matches!(
            ReplacementPlan::resolve(&documents, &parents),
            Err(RenderError::InvalidReplacement { .. })
        ));
    }

    #[test]
    fn replacement_chains_are_rejected() {
        let documents = keyed(vec![
            doc("ucp", "global", false),
            doc("ucp", "region", true),
            doc("ucp", "site", true),
        ]);
        let mut parents = linked(&documents, "region", "global");
        parents.extend(linked(&documents, "site", "region"));
        assert!(matches!(
            ReplacementPlan::resolve(&documents, &parents),
            Err(RenderError::SingletonReplacement { .. })
        ));
    }

    #[test]
    fn non_replaced_documents_index_to_themselves() {
        let documents = keyed(vec![doc("solo", "global", false)]);
        let plan = ReplacementPlan::resolve(&documents, &BTreeMap::new()).unwrap();
        let index = plan.source_index(&documents);
        let key = documents.keys().next().unwrap();
        assert_eq!(index.get(&key.id), Some(key));
    }
}
