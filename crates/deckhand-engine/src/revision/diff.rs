//! Bucket-status diffing between revisions.

use std::collections::BTreeMap;

use serde::Serialize;

use super::Revision;

/// How a bucket changed between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketStatus {
    /// The bucket exists only in the newer revision.
    Created,
    /// The bucket exists only in the older revision.
    Deleted,
    /// The bucket exists in both with different contents.
    Modified,
    /// The bucket exists in both with identical contents.
    Unmodified,
}

/// Diffs two revisions bucket by bucket.
///
/// Bucket contents compare structurally: the key-sorted document lists
/// must be identical for a bucket to count as unmodified. Diffing the
/// empty revision against itself yields an empty map; diffing it against
/// any populated revision marks every bucket created.
#[must_use]
pub fn diff(older: &Revision, newer: &Revision) -> BTreeMap<String, BucketStatus> {
    let old_buckets = older.buckets();
    let new_buckets = newer.buckets();
    let mut statuses = BTreeMap::new();

    for (bucket, old_documents) in &old_buckets {
        let status = match new_buckets.get(bucket) {
            None => BucketStatus::Deleted,
            Some(new_documents) if new_documents == old_documents => BucketStatus::Unmodified,
            Some(_) => BucketStatus::Modified,
        };
        statuses.insert((*bucket).to_string(), status);
    }

    for bucket in new_buckets.keys() {
        if !old_buckets.contains_key(bucket) {
            statuses.insert((*bucket).to_string(), BucketStatus::Created);
        }
    }

    statuses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn doc(name: &str, value: i64) -> Document {
        serde_yaml::from_str(&format!(
            "schema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: {name}\ndata: {value}\n"
        ))
        .unwrap()
    }

    fn revision(id: u64, buckets: &[(&str, Vec<Document>)]) -> Revision {
        buckets
            .iter()
            .fold(Revision::empty(), |rev, (bucket, documents)| {
                rev.with_bucket(id, bucket, documents.clone())
            })
    }

    #[test]
    fn classifies_created_deleted_modified_unmodified() {
        let older = revision(
            1,
            &[
                ("a", vec![doc("x", 1)]),
                ("b", vec![doc("y", 1)]),
                ("c", vec![doc("z", 1)]),
            ],
        );
        let newer = revision(
            2,
            &[
                ("a", vec![doc("x", 1)]),
                ("c", vec![doc("z", 2)]),
                ("d", vec![doc("w", 1)]),
            ],
        );

        let statuses = diff(&older, &newer);
        assert_eq!(statuses["a"], BucketStatus::Unmodified);
        assert_eq!(statuses["b"], BucketStatus::Deleted);
        assert_eq!(statuses["c"], BucketStatus::Modified);
        assert_eq!(statuses["d"], BucketStatus::Created);
    }

    #[test]
    fn empty_against_populated_is_all_created() {
        let newer = revision(1, &[("a", vec![doc("x", 1)])]);
        let statuses = diff(&Revision::empty(), &newer);
        assert_eq!(statuses["a"], BucketStatus::Created);
        assert_eq!(statuses.len(), 1);
    }

    #[test]
    fn a_revision_against_itself_is_all_unmodified() {
        let rev = revision(1, &[("a", vec![doc("x", 1)]), ("b", vec![doc("y", 2)])]);
        let statuses = diff(&rev, &rev);
        assert!(statuses
            .values()
            .all(|status| *status == BucketStatus::Unmodified));
        assert_eq!(statuses.len(), 2);
    }

    #[test]
    fn empty_against_empty_is_empty() {
        assert!(diff(&Revision::empty(), &Revision::empty()).is_empty());
    }
}
