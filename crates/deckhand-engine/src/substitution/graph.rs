//! Substitution dependency scheduling.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::document::{Document, DocumentId, DocumentKey};
use crate::error::RenderError;

/// Orders documents so substitution sources precede their dependents.
///
/// `source_index` routes `(schema, name)` references to stored documents
/// (replacement-aware: a replaced parent's identity resolves to its
/// replacement). References to absent documents produce no edge here; they
/// fail at application time instead, so one bad reference does not abort
/// the whole revision.
///
/// The order is deterministic: ready documents are drained smallest key
/// first.
///
/// # Errors
///
/// Returns [`RenderError::SubstitutionCycle`] when the references cycle.
pub fn substitution_order(
    documents: &BTreeMap<DocumentKey, Document>,
    source_index: &BTreeMap<DocumentId, DocumentKey>,
) -> Result<Vec<DocumentKey>, RenderError> {
    let mut dependents: BTreeMap<&DocumentKey, Vec<&DocumentKey>> = BTreeMap::new();
    let mut in_degree: BTreeMap<&DocumentKey, usize> = BTreeMap::new();

    for key in documents.keys() {
        in_degree.insert(key, 0);
    }

    for (key, document) in documents {
        let mut sources = BTreeSet::new();
        for substitution in &document.metadata.substitutions {
            let id = DocumentId::new(
                substitution.src.schema.clone(),
                substitution.src.name.clone(),
            );
            let Some(source_key) = source_index.get(&id) else {
                continue;
            };
            if source_key == key || !documents.contains_key(source_key) {
                // Self-edges surface as application failures, not cycles.
                continue;
            }
            sources.insert(source_key);
        }
        for source_key in sources {
            dependents.entry(source_key).or_default().push(key);
            *in_degree.get_mut(key).expect("all keys seeded") += 1;
        }
    }

    let mut ready: BTreeSet<&DocumentKey> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(key, _)| *key)
        .collect();
    let mut order = Vec::with_capacity(documents.len());

    while let Some(key) = ready.pop_first() {
        order.push(key.clone());
        for dependent in dependents.get(key).into_iter().flatten() {
            let degree = in_degree.get_mut(*dependent).expect("all keys seeded");
            *degree -= 1;
            if *degree == 0 {
                ready.insert(*dependent);
            }
        }
    }

    if order.len() < documents.len() {
        let through = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(key, _)| (*key).clone())
            .next()
            .expect("unordered document remains");
        debug!(%through, "substitution references form a cycle");
        return Err(RenderError::SubstitutionCycle {
            through: through.to_string(),
        });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, sources: &[&str]) -> Document {
        let mut source = format!(
            "schema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: {name}\n"
        );
        if !sources.is_empty() {
            source.push_str("  substitutions:\n");
            for src in sources {
                source.push_str(&format!(
                    "    - src:\n        schema: a/B/v1\n        name: {src}\n        path: .\n      \
                     dest:\n        path: .x\n"
                ));
            }
        }
        source.push_str("data: {}\n");
        serde_yaml::from_str(&source).unwrap()
    }

    fn setup(docs: Vec<Document>) -> (BTreeMap<DocumentKey, Document>, BTreeMap<DocumentId, DocumentKey>) {
        let documents: BTreeMap<_, _> = docs.into_iter().map(|d| (d.key(), d)).collect();
        let index = documents
            .keys()
            .map(|key| (key.id.clone(), key.clone()))
            .collect();
        (documents, index)
    }

    #[test]
    fn sources_come_before_dependents() {
        let (documents, index) = setup(vec![doc("zz-source", &[]), doc("aa-dest", &["zz-source"])]);
        let order = substitution_order(&documents, &index).unwrap();
        let names: Vec<_> = order.iter().map(|key| key.id.name.as_str()).collect();
        assert_eq!(names, ["zz-source", "aa-dest"]);
    }

    #[test]
    fn independent_documents_order_by_key() {
        let (documents, index) = setup(vec![doc("b", &[]), doc("a", &[])]);
        let order = substitution_order(&documents, &index).unwrap();
        let names: Vec<_> = order.iter().map(|key| key.id.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn chains_resolve_transitively() {
        let (documents, index) =
            setup(vec![doc("c", &["b"]), doc("b", &["a"]), doc("a", &[])]);
        let order = substitution_order(&documents, &index).unwrap();
        let names: Vec<_> = order.iter().map(|key| key.id.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn cycles_are_fatal() {
        let (documents, index) = setup(vec![doc("d1", &["d2"]), doc("d2", &["d1"])]);
        assert!(matches!(
            substitution_order(&documents, &index),
            Err(RenderError::SubstitutionCycle { .. })
        ));
    }

    #[test]
    fn missing_sources_do_not_block_ordering() {
        let (documents, index) = setup(vec![doc("lonely", &["ghost"])]);
        let order = substitution_order(&documents, &index).unwrap();
        assert_eq!(order.len(), 1);
    }
}
