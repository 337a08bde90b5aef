//! Revisions and buckets.
//!
//! A revision is an immutable, monotonically numbered snapshot of every
//! document across every bucket; revision 0 is the distinguished empty
//! revision. Documents are never mutated in place: a bucket-scoped put
//! produces a new revision holding the complete post-state of that bucket
//! merged with the unchanged state of the others, and deletion is absence
//! from the new revision.

mod diff;

use std::collections::BTreeMap;

use crate::document::{Document, DocumentStatus};
use crate::error::EngineError;
pub use diff::{BucketStatus, diff};

/// One immutable revision snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Revision {
    /// The revision number; 0 is the empty revision.
    pub id: u64,
    /// Every document in the snapshot, across all buckets.
    pub documents: Vec<Document>,
}

impl Revision {
    /// The distinguished empty revision 0.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a revision from an id and its documents.
    #[must_use]
    pub fn new(id: u64, documents: Vec<Document>) -> Self {
        Self { id, documents }
    }

    /// Produces the next revision from a bucket-scoped put.
    ///
    /// `documents` is the complete post-state of `bucket` (each document is
    /// stamped with the bucket of record), while every other bucket's
    /// documents carry over unchanged. Omitting a previously present
    /// document deletes it.
    #[must_use]
    pub fn with_bucket(&self, id: u64, bucket: &str, documents: Vec<Document>) -> Self {
        let mut next: Vec<Document> = self
            .documents
            .iter()
            .filter(|doc| doc.bucket() != Some(bucket))
            .cloned()
            .collect();

        for mut document in documents {
            document.status = Some(DocumentStatus {
                bucket: bucket.to_string(),
            });
            next.push(document);
        }

        Self {
            id,
            documents: next,
        }
    }

    /// Documents grouped by bucket of record, each group key-sorted.
    ///
    /// Documents never stamped with a bucket are not listed.
    #[must_use]
    pub fn buckets(&self) -> BTreeMap<&str, Vec<&Document>> {
        let mut buckets: BTreeMap<&str, Vec<&Document>> = BTreeMap::new();
        for document in &self.documents {
            if let Some(bucket) = document.bucket() {
                buckets.entry(bucket).or_default().push(document);
            }
        }
        for group in buckets.values_mut() {
            group.sort_by_key(|doc| doc.key());
        }
        buckets
    }
}

/// The revision-store collaborator interface.
pub trait RevisionSource {
    /// Returns the immutable snapshot of one revision's documents.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RevisionNotFound`] for unknown revisions.
    fn revision_documents(&self, revision: u64) -> Result<Vec<Document>, EngineError>;
}

/// An in-memory revision store, for tests and embedded edges.
#[derive(Debug, Default)]
pub struct InMemoryRevisions {
    revisions: BTreeMap<u64, Revision>,
}

impl InMemoryRevisions {
    /// An empty store; revision 0 is always resolvable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a revision, replacing any previous snapshot with its id.
    pub fn insert(&mut self, revision: Revision) {
        self.revisions.insert(revision.id, revision);
    }

    /// The highest stored revision, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Revision> {
        self.revisions.values().next_back()
    }
}

impl RevisionSource for InMemoryRevisions {
    fn revision_documents(&self, revision: u64) -> Result<Vec<Document>, EngineError> {
        if revision == 0 {
            return Ok(Vec::new());
        }
        self.revisions
            .get(&revision)
            .map(|rev| rev.documents.clone())
            .ok_or(EngineError::RevisionNotFound { revision })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str) -> Document {
        serde_yaml::from_str(&format!(
            "schema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: {name}\ndata: {{}}\n"
        ))
        .unwrap()
    }

    #[test]
    fn bucket_put_stamps_and_merges() {
        let rev1 = Revision::empty().with_bucket(1, "mop", vec![doc("a")]);
        let rev2 = rev1.with_bucket(2, "ucp", vec![doc("b")]);

        assert_eq!(rev2.documents.len(), 2);
        let buckets = rev2.buckets();
        assert_eq!(buckets["mop"].len(), 1);
        assert_eq!(buckets["ucp"][0].metadata.name, "b");
    }

    #[test]
    fn bucket_put_replaces_the_whole_bucket() {
        let rev1 = Revision::empty().with_bucket(1, "mop", vec![doc("a"), doc("b")]);
        let rev2 = rev1.with_bucket(2, "mop", vec![doc("b")]);
        assert_eq!(rev2.documents.len(), 1);
        assert_eq!(rev2.documents[0].metadata.name, "b");
    }

    #[test]
    fn source_resolves_revision_zero_as_empty() {
        let store = InMemoryRevisions::new();
        assert!(store.revision_documents(0).unwrap().is_empty());
        assert!(matches!(
            store.revision_documents(7),
            Err(EngineError::RevisionNotFound { revision: 7 })
        ));
    }
}
