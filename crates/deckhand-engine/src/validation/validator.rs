//! Pre-render structural and policy validation.

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::{ControlDocument, Document, DocumentId};
use crate::error::RenderError;
use crate::layering::LayerOrder;
use crate::schema::{self, SchemaRegistry};

/// Reserved name prefixes a `DataSchema` may not register under.
const RESERVED_PREFIXES: &[&str] = &["deckhand/", "metadata/"];

/// Runs every per-revision validation that does not need the forest.
///
/// Returned errors carry their own severities; the caller records them and
/// decides whether the revision proceeds. Checks that need parent
/// resolution (replacement candidates) are raised later by the layering
/// stages and joined into the same report.
#[must_use]
pub fn validate_documents(
    documents: &[Document],
    controls: &[ControlDocument],
    registry: &SchemaRegistry,
    order: &LayerOrder,
) -> Vec<(Option<DocumentId>, RenderError)> {
    let mut errors = Vec::new();

    check_identity_uniqueness(documents, &mut errors);

    for document in documents {
        check_layer_membership(document, order, &mut errors);
        check_encrypted_payload(document, &mut errors);
        check_replacement_shape(document, &mut errors);
        check_registered_schema(document, registry, &mut errors);
    }

    for control in controls {
        check_control(control, &mut errors);
    }

    debug!(count = errors.len(), "validation pass complete");
    errors
}

/// `(schema, name)` must be unique, except for a replacement pair: exactly
/// two documents, exactly one flagged `replacement`, in different layers.
fn check_identity_uniqueness(
    documents: &[Document],
    errors: &mut Vec<(Option<DocumentId>, RenderError)>,
) {
    let mut groups: BTreeMap<DocumentId, Vec<&Document>> = BTreeMap::new();
    for document in documents {
        groups.entry(document.id()).or_default().push(document);
    }

    for (id, group) in groups {
        let valid = match group.as_slice() {
            [_] => true,
            [a, b] => {
                let replacements = usize::from(a.metadata.replacement)
                    + usize::from(b.metadata.replacement);
                replacements == 1 && a.layer() != b.layer()
            },
            _ => false,
        };
        if !valid {
            errors.push((
                Some(id.clone()),
                RenderError::DuplicateDocument {
                    schema: id.schema.to_string(),
                    name: id.name,
                },
            ));
        }
    }
}

fn check_layer_membership(
    document: &Document,
    order: &LayerOrder,
    errors: &mut Vec<(Option<DocumentId>, RenderError)>,
) {
    if let Some(layer) = document.layer() {
        if !order.contains(layer) {
            errors.push((
                Some(document.id()),
                RenderError::UnknownLayer {
                    layer: layer.to_string(),
                },
            ));
        }
    }
}

/// Encrypted payloads must be reference tokens, i.e. strings.
fn check_encrypted_payload(
    document: &Document,
    errors: &mut Vec<(Option<DocumentId>, RenderError)>,
) {
    if document.is_encrypted() && !document.data.is_string() {
        errors.push((
            Some(document.id()),
            RenderError::InvalidDocumentFormat {
                detail: format!(
                    "encrypted document {} must carry a secret reference string",
                    document.id()
                ),
            },
        ));
    }
}

/// A replacement document needs a layering definition with a selector, or
/// it can never resolve the parent it is supposed to replace.
fn check_replacement_shape(
    document: &Document,
    errors: &mut Vec<(Option<DocumentId>, RenderError)>,
) {
    if !document.metadata.replacement {
        return;
    }
    let has_selector = document
        .metadata
        .layering
        .as_ref()
        .is_some_and(|layering| !layering.parent_selector.is_empty());
    if !has_selector {
        errors.push((
            Some(document.id()),
            RenderError::InvalidReplacement {
                detail: format!("replacement {} declares no parentSelector", document.id()),
            },
        ));
    }
}

/// Checks document data against its registered schema, if one exists.
///
/// Abstract documents are skipped (they are consumed, not emitted), and
/// encrypted payloads are checked only after dereferencing. A concrete
/// document with no registration gets a non-fatal warning.
fn check_registered_schema(
    document: &Document,
    registry: &SchemaRegistry,
    errors: &mut Vec<(Option<DocumentId>, RenderError)>,
) {
    if document.is_control() || document.is_abstract() || document.is_encrypted() {
        return;
    }

    let Some(registered) = registry.lookup(&document.schema) else {
        errors.push((
            Some(document.id()),
            RenderError::UnregisteredSchema {
                schema: document.schema.to_string(),
            },
        ));
        return;
    };

    for violation in schema::check(&registered.definition, &document.data) {
        errors.push((
            Some(document.id()),
            RenderError::SchemaValidation {
                schema: document.schema.to_string(),
                detail: format!("{}: {}", violation.path, violation.message),
            },
        ));
    }
}

fn check_control(
    control: &ControlDocument,
    errors: &mut Vec<(Option<DocumentId>, RenderError)>,
) {
    match control {
        ControlDocument::DataSchema(data_schema) => {
            if RESERVED_PREFIXES
                .iter()
                .any(|prefix| data_schema.name.starts_with(prefix))
            {
                errors.push((
                    None,
                    RenderError::ReservedSchemaName {
                        name: data_schema.name.clone(),
                    },
                ));
            }
        },
        ControlDocument::ValidationPolicy(policy) => {
            if policy.validations.is_empty() {
                errors.push((
                    None,
                    RenderError::EmptyValidationPolicy {
                        name: policy.name.clone(),
                    },
                ));
            }
        },
        ControlDocument::LayeringPolicy(_) => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::partition;

    fn run(source: &str) -> Vec<(Option<DocumentId>, RenderError)> {
        let documents = crate::document::parse_document_stream(source).unwrap();
        let (normal, controls) = partition(&documents).unwrap();
        let registry = SchemaRegistry::from_controls(&controls).unwrap();
        let order = LayerOrder::resolve(&controls, &normal).unwrap();
        validate_documents(&documents, &controls, &registry, &order)
    }

    const POLICY: &str = "
schema: deckhand/LayeringPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: layering-policy
data:
  layerOrder: [global, site]
";

    #[test]
    fn a_clean_revision_validates_without_errors() {
        let errors = run(&format!(
            "{POLICY}---
schema: deckhand/Passphrase/v1
metadata:
  schema: metadata/Document/v1
  name: pw
data: s3cret
"
        ));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn duplicate_identities_are_reported() {
        let errors = run(
            "
schema: a/B/v1
metadata:
  schema: metadata/Document/v1
  name: twin
data: {}
---
schema: a/B/v1
metadata:
  schema: metadata/Document/v1
  name: twin
data: {}
",
        );
        assert!(matches!(errors[0].1, RenderError::DuplicateDocument { .. }));
    }

    #[test]
    fn replacement_pairs_are_not_duplicates() {
        let errors = run(&format!(
            "{POLICY}---
schema: a/B/v1
metadata:
  schema: metadata/Document/v1
  name: twin
  labels:
    name: twin
  layeringDefinition:
    layer: global
data: {{}}
---
schema: a/B/v1
metadata:
  schema: metadata/Document/v1
  name: twin
  replacement: true
  layeringDefinition:
    layer: site
    parentSelector:
      name: twin
data: {{}}
"
        ));
        assert!(
            !errors
                .iter()
                .any(|(_, err)| matches!(err, RenderError::DuplicateDocument { .. })),
            "{errors:?}"
        );
    }

    #[test]
    fn unknown_layers_are_reported() {
        let errors = run(&format!(
            "{POLICY}---
schema: a/B/v1
metadata:
  schema: metadata/Document/v1
  name: stray
  layeringDefinition:
    layer: nowhere
data: {{}}
"
        ));
        assert!(errors
            .iter()
            .any(|(_, err)| matches!(err, RenderError::UnknownLayer { .. })));
    }

    #[test]
    fn reserved_data_schema_names_are_rejected() {
        let errors = run(
            "
schema: deckhand/DataSchema/v1
metadata:
  schema: metadata/Control/v1
  name: deckhand/Intruder/v1
data:
  type: object
",
        );
        assert!(matches!(errors[0].1, RenderError::ReservedSchemaName { .. }));
    }

    #[test]
    fn schema_violations_are_advisory_errors() {
        let errors = run(
            "
schema: deckhand/DataSchema/v1
metadata:
  schema: metadata/Control/v1
  name: armada/Chart/v1
data:
  type: object
  required: [debug]
---
schema: armada/Chart/v1
metadata:
  schema: metadata/Document/v1
  name: chart
data: {}
",
        );
        assert!(matches!(errors[0].1, RenderError::SchemaValidation { .. }));
    }

    #[test]
    fn unregistered_concrete_schemas_warn() {
        let errors = run(
            "
schema: promenade/Node/v1
metadata:
  schema: metadata/Document/v1
  name: node
data: {}
",
        );
        assert!(matches!(errors[0].1, RenderError::UnregisteredSchema { .. }));
    }

    #[test]
    fn encrypted_documents_need_string_references() {
        let errors = run(
            "
schema: deckhand/Passphrase/v1
metadata:
  schema: metadata/Document/v1
  name: pw
  storagePolicy: encrypted
data:
  not: a-reference
",
        );
        assert!(matches!(
            errors[0].1,
            RenderError::InvalidDocumentFormat { .. }
        ));
    }

    #[test]
    fn replacement_without_selector_is_invalid() {
        let errors = run(&format!(
            "{POLICY}---
schema: a/B/v1
metadata:
  schema: metadata/Document/v1
  name: floater
  replacement: true
  layeringDefinition:
    layer: site
data: {{}}
"
        ));
        assert!(errors
            .iter()
            .any(|(_, err)| matches!(err, RenderError::InvalidReplacement { .. })));
    }

    #[test]
    fn empty_validation_policies_are_advisory() {
        let errors = run(
            "
schema: deckhand/ValidationPolicy/v1
metadata:
  schema: metadata/Control/v1
  name: empty
data:
  validations: []
",
        );
        assert!(matches!(
            errors[0].1,
            RenderError::EmptyValidationPolicy { .. }
        ));
    }
}
