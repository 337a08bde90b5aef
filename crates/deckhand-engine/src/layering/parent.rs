//! Parent selection.
//!
//! For each document with a non-empty `parentSelector`, the candidate set
//! is every document in the immediately preceding layer whose labels carry
//! every selector key/value. Exactly one candidate must remain; zero or
//! several is a per-document failure. Documents without a selector, and
//! documents at the top layer, are roots.

use std::collections::BTreeMap;

use tracing::debug;

use super::LayerOrder;
use crate::document::{Document, DocumentKey};
use crate::error::RenderError;

/// The parent relation plus the documents that failed selection.
pub type ParentSelection = (
    BTreeMap<DocumentKey, DocumentKey>,
    Vec<(DocumentKey, RenderError)>,
);

/// Selects at most one parent for every layered document.
///
/// `documents` must be keyed deterministically; candidates are examined in
/// key order so ties and errors are stable. Failures are per-document:
/// the affected document is reported and the rest of the forest stands.
#[must_use]
pub fn select_parents(
    documents: &BTreeMap<DocumentKey, Document>,
    order: &LayerOrder,
) -> ParentSelection {
    let mut parents = BTreeMap::new();
    let mut failures = Vec::new();

    for (key, document) in documents {
        let Some(layering) = document.metadata.layering.as_ref() else {
            continue;
        };
        if layering.parent_selector.is_empty() || order.is_top(&layering.layer) {
            // Roots: no parent resolution, selector ignored at the top.
            continue;
        }
        let Some(parent_layer) = order.parent_layer_of(&layering.layer) else {
            // Unknown layers are reported by policy validation.
            continue;
        };

        let candidates: Vec<&DocumentKey> = documents
            .iter()
            .filter(|(_, candidate)| {
                candidate.layer() == Some(parent_layer)
                    && selector_matches(&layering.parent_selector, &candidate.metadata.labels)
            })
            .map(|(candidate_key, _)| candidate_key)
            .collect();

        match candidates.as_slice() {
            [] => {
                debug!(document = %key, parent_layer, "no parent candidate matched");
                failures.push((
                    key.clone(),
                    RenderError::MissingParent {
                        parent_layer: parent_layer.to_string(),
                    },
                ));
            },
            [parent] => {
                parents.insert(key.clone(), (*parent).clone());
            },
            many => {
                failures.push((
                    key.clone(),
                    RenderError::IndeterminateDocumentParent { count: many.len() },
                ));
            },
        }
    }

    (parents, failures)
}

/// True when every selector key/value appears in `labels`.
fn selector_matches(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ControlDocument;
    use crate::document::LayeringPolicyDoc;

    fn order() -> LayerOrder {
        LayerOrder::resolve(
            &[ControlDocument::LayeringPolicy(LayeringPolicyDoc {
                name: "layering-policy".to_string(),
                layer_order: vec!["global".into(), "region".into(), "site".into()],
            })],
            &[],
        )
        .unwrap()
    }

    fn doc(name: &str, layer: &str, labels: &[(&str, &str)], selector: &[(&str, &str)]) -> Document {
        let mut source = format!(
            "schema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: {name}\n"
        );
        if !labels.is_empty() {
            source.push_str("  labels:\n");
            for (key, value) in labels {
                source.push_str(&format!("    {key}: {value}\n"));
            }
        }
        source.push_str(&format!("  layeringDefinition:\n    layer: {layer}\n"));
        if !selector.is_empty() {
            source.push_str("    parentSelector:\n");
            for (key, value) in selector {
                source.push_str(&format!("      {key}: {value}\n"));
            }
        }
        source.push_str("data: {}\n");
        serde_yaml::from_str(&source).unwrap()
    }

    fn keyed(docs: Vec<Document>) -> BTreeMap<DocumentKey, Document> {
        docs.into_iter().map(|d| (d.key(), d)).collect()
    }

    #[test]
    fn selects_the_unique_matching_parent() {
        let parent = doc("base", "global", &[("scope", "wide")], &[]);
        let child = doc("leaf", "region", &[], &[("scope", "wide")]);
        let child_key = child.key();
        let parent_key = parent.key();
        let (parents, failures) = select_parents(&keyed(vec![parent, child]), &order());
        assert!(failures.is_empty());
        assert_eq!(parents.get(&child_key), Some(&parent_key));
    }

    #[test]
    fn selector_is_a_subset_match() {
        let parent = doc("base", "global", &[("scope", "wide"), ("extra", "x")], &[]);
        let child = doc("leaf", "region", &[], &[("scope", "wide")]);
        let (parents, failures) = select_parents(&keyed(vec![parent, child]), &order());
        assert!(failures.is_empty());
        assert_eq!(parents.len(), 1);
    }

    #[test]
    fn zero_candidates_fails_the_document() {
        let child = doc("leaf", "region", &[], &[("scope", "wide")]);
        let child_key = child.key();
        let (parents, failures) = select_parents(&keyed(vec![child]), &order());
        assert!(parents.is_empty());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, child_key);
        assert!(matches!(failures[0].1, RenderError::MissingParent { .. }));
    }

    #[test]
    fn several_candidates_are_indeterminate() {
        let one = doc("one", "global", &[("scope", "wide")], &[]);
        let two = doc("two", "global", &[("scope", "wide")], &[]);
        let child = doc("leaf", "region", &[], &[("scope", "wide")]);
        let (_, failures) = select_parents(&keyed(vec![one, two, child]), &order());
        assert!(matches!(
            failures[0].1,
            RenderError::IndeterminateDocumentParent { count: 2 }
        ));
    }

    #[test]
    fn top_layer_ignores_the_selector() {
        let top = doc("top", "global", &[], &[("anything", "goes")]);
        let (parents, failures) = select_parents(&keyed(vec![top]), &order());
        assert!(parents.is_empty());
        assert!(failures.is_empty());
    }

    #[test]
    fn parent_must_be_in_the_adjacent_layer() {
        let far = doc("far", "global", &[("scope", "wide")], &[]);
        let child = doc("leaf", "site", &[], &[("scope", "wide")]);
        let (_, failures) = select_parents(&keyed(vec![far, child]), &order());
        assert!(matches!(failures[0].1, RenderError::MissingParent { .. }));
    }
}
