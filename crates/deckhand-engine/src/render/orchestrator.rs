//! Pipeline sequencing.

use std::collections::{BTreeMap, BTreeSet};

use serde_yaml::Value;
use tracing::{debug, info};

use super::{CancelToken, DocumentState, Rendered};
use crate::document::{
    self, ControlDocument, Document, DocumentId, DocumentKey, SubstitutionSource,
};
use crate::error::{EngineError, RenderError, RenderStage};
use crate::layering::{self, LayerOrder};
use crate::path;
use crate::replacement::ReplacementPlan;
use crate::schema::SchemaRegistry;
use crate::secrets::{SecretCache, SecretError, SecretResolver};
use crate::substitution;
use crate::validation::{ValidationReport, validate_documents};

/// Runs the validation stages only and returns the report.
///
/// This is the `validate` operation the HTTP edge exposes: structural and
/// schema checks, policy conformance, and the internal validation entries,
/// without layering or substitution.
#[must_use]
pub fn validate_revision(documents: &[Document]) -> ValidationReport {
    let mut report = ValidationReport::new();
    if let Some((_, controls, registry, order)) = prepare(documents, &mut report) {
        for (id, error) in validate_documents(documents, &controls, &registry, &order) {
            report.record(id, RenderStage::Validation, &error);
        }
    }
    report.seal_internal_entries();
    report
}

/// Renders one revision snapshot into its concrete document set.
///
/// Fatal-revision errors produce an empty document set with the report;
/// fatal-document errors fail the document and its descendants while the
/// rest render. The call is deterministic and idempotent: re-rendering its
/// own output changes nothing.
///
/// # Errors
///
/// Returns [`EngineError::Cancelled`] at a cancellation checkpoint and
/// [`EngineError::SecretTransient`] when the secret store fails
/// transiently; both mean no report was produced and the render may be
/// retried as a whole.
pub fn render_revision(
    documents: &[Document],
    secrets: &dyn SecretResolver,
    cancel: &CancelToken,
) -> Result<Rendered, EngineError> {
    let mut report = ValidationReport::new();
    let mut states: BTreeMap<DocumentKey, DocumentState> = BTreeMap::new();

    // (1)-(2) partition, registry, layering policy, validation.
    let Some((normal, controls, registry, order)) = prepare(documents, &mut report) else {
        report.seal_internal_entries();
        return Ok(aborted(report, states));
    };
    for document in &normal {
        states.insert(document.key(), DocumentState::Ingested);
    }

    for (id, error) in validate_documents(documents, &controls, &registry, &order) {
        report.record(id, RenderStage::Validation, &error);
    }
    if report.has_fatal_revision() {
        report.seal_internal_entries();
        return Ok(aborted(report, states));
    }
    for state in states.values_mut() {
        *state = DocumentState::Validated;
    }

    cancel.check()?;

    let keyed: BTreeMap<DocumentKey, Document> =
        normal.into_iter().map(|doc| (doc.key(), doc)).collect();

    // (4) parent selection; failures are per-document.
    let (parents, selection_failures) = layering::select_parents(&keyed, &order);
    let mut failed: BTreeSet<DocumentKey> = BTreeSet::new();
    for (key, error) in selection_failures {
        report.record(Some(key.id.clone()), RenderStage::Layering, &error);
        states.insert(key.clone(), DocumentState::Failed);
        failed.insert(key);
    }

    let plan = match ReplacementPlan::resolve(&keyed, &parents) {
        Ok(plan) => plan,
        Err(error) => {
            report.record(None, RenderStage::Replacement, &error);
            report.seal_internal_entries();
            return Ok(aborted(report, states));
        },
    };

    // Policy conformance is fully known once parents and replacements
    // resolved; later substitution failures do not feed the entry.
    report.seal_internal_entries();

    cancel.check()?;

    // (5) layering, root-first.
    let layered = layering::layer_documents(&keyed, &parents, &order, &failed);
    for (key, error) in &layered.failures {
        report.record(Some(key.id.clone()), RenderStage::Layering, error);
        states.insert(key.clone(), DocumentState::Failed);
        failed.insert(key.clone());
    }
    for key in &layered.poisoned {
        states.insert(key.clone(), DocumentState::Failed);
        failed.insert(key.clone());
    }
    let mut rendered_data = layered.intermediate;
    for key in rendered_data.keys() {
        states.insert(key.clone(), DocumentState::Layered);
    }

    // (6)-(7) substitution in topological order, dereferencing secrets
    // lazily on first use.
    let source_index = plan.source_index(&keyed);
    let topo = match substitution::substitution_order(&keyed, &source_index) {
        Ok(topo) => topo,
        Err(error) => {
            report.record(None, RenderStage::Substitution, &error);
            return Ok(aborted(report, states));
        },
    };

    let mut cache = SecretCache::new(secrets);
    let mut dereferenced: BTreeSet<DocumentKey> = BTreeSet::new();

    for key in &topo {
        cancel.check()?;
        let Some(document) = keyed.get(key) else {
            continue;
        };
        if failed.contains(key) || !rendered_data.contains_key(key) {
            continue;
        }
        if document.metadata.substitutions.is_empty() {
            states.insert(key.clone(), DocumentState::Substituted);
            continue;
        }

        let Some(mut data) = rendered_data.remove(key) else {
            continue;
        };
        let mut abort: Option<EngineError> = None;

        let outcome = substitution::apply_substitutions(
            &document.metadata.substitutions,
            &mut data,
            |src| {
                fetch_source(
                    src,
                    &keyed,
                    &source_index,
                    &mut rendered_data,
                    &mut dereferenced,
                    &mut cache,
                    cancel,
                    &mut abort,
                )
            },
        );

        if let Some(engine_error) = abort {
            return Err(engine_error);
        }
        match outcome {
            Ok(()) => {
                rendered_data.insert(key.clone(), data);
                states.insert(key.clone(), DocumentState::Substituted);
            },
            Err(error) => {
                let stage = if matches!(error, RenderError::SecretNotFound { .. }) {
                    RenderStage::Secrets
                } else {
                    RenderStage::Substitution
                };
                report.record(Some(key.id.clone()), stage, &error);
                states.insert(key.clone(), DocumentState::Failed);
                failed.insert(key.clone());
            },
        }
    }

    // (6 cont.) encrypted documents that will be emitted still need their
    // cleartext; suppressed documents are never fetched.
    let emission_keys: Vec<DocumentKey> = rendered_data.keys().cloned().collect();
    for key in emission_keys {
        let Some(document) = keyed.get(&key) else {
            continue;
        };
        if !document.is_encrypted() || dereferenced.contains(&key) {
            continue;
        }
        if document.is_abstract() || plan.is_replaced(&key) || failed.contains(&key) {
            continue;
        }
        cancel.check()?;
        match materialise(&key, &mut rendered_data, &mut cache) {
            Ok(()) => {
                dereferenced.insert(key);
            },
            Err(SecretFetch::Fatal(error)) => {
                report.record(Some(key.id.clone()), RenderStage::Secrets, &error);
                states.insert(key.clone(), DocumentState::Failed);
                failed.insert(key.clone());
                rendered_data.remove(&key);
            },
            Err(SecretFetch::Abort(engine_error)) => return Err(engine_error),
        }
    }

    // (8)-(10) replacement suppression, abstract filtering, assembly.
    let mut output = Vec::new();
    for (key, data) in &rendered_data {
        if failed.contains(key) {
            continue;
        }
        let Some(document) = keyed.get(key) else {
            continue;
        };
        if document.is_abstract() || plan.is_replaced(key) {
            debug!(document = %key, "suppressed from output");
            states.insert(key.clone(), DocumentState::Suppressed);
            continue;
        }
        states.insert(key.clone(), DocumentState::Finalized);
        let mut rendered = document.clone();
        rendered.data = data.clone();
        output.push(rendered);
    }

    // Control documents pass through so the output is self-contained.
    for document in documents {
        if document.is_control() {
            output.push(document.clone());
        }
    }
    output.sort_by_key(Document::id);

    info!(
        documents = output.len(),
        errors = report.errors().len(),
        secrets = cache.fetched_count(),
        "render complete"
    );

    Ok(Rendered {
        documents: output,
        report,
        states,
    })
}

type Prepared = (
    Vec<Document>,
    Vec<ControlDocument>,
    SchemaRegistry,
    LayerOrder,
);

fn prepare(documents: &[Document], report: &mut ValidationReport) -> Option<Prepared> {
    let (normal, controls) = match document::partition(documents) {
        Ok(parts) => parts,
        Err(error) => {
            report.record(None, RenderStage::Validation, &error);
            return None;
        },
    };
    let registry = match SchemaRegistry::from_controls(&controls) {
        Ok(registry) => registry,
        Err(error) => {
            report.record(None, RenderStage::Validation, &error);
            return None;
        },
    };
    let order = match LayerOrder::resolve(&controls, &normal) {
        Ok(order) => order,
        Err(error) => {
            report.record(None, RenderStage::Layering, &error);
            return None;
        },
    };

    report.set_policies(
        controls
            .iter()
            .filter_map(|control| match control {
                ControlDocument::ValidationPolicy(policy) => Some(policy.clone()),
                _ => None,
            })
            .collect(),
    );

    Some((normal, controls, registry, order))
}

fn aborted(report: ValidationReport, mut states: BTreeMap<DocumentKey, DocumentState>) -> Rendered {
    for state in states.values_mut() {
        *state = DocumentState::Failed;
    }
    Rendered {
        documents: Vec::new(),
        report,
        states,
    }
}

/// Resolves one substitution source to its extracted value.
///
/// Routed through the replacement-aware index; encrypted sources are
/// dereferenced on first use. Engine-level aborts (cancellation, transient
/// store failures) are smuggled out through `abort`; the placeholder
/// error returned alongside is never recorded.
#[allow(clippy::too_many_arguments)]
fn fetch_source(
    src: &SubstitutionSource,
    keyed: &BTreeMap<DocumentKey, Document>,
    source_index: &BTreeMap<DocumentId, DocumentKey>,
    rendered_data: &mut BTreeMap<DocumentKey, Value>,
    dereferenced: &mut BTreeSet<DocumentKey>,
    cache: &mut SecretCache<'_>,
    cancel: &CancelToken,
    abort: &mut Option<EngineError>,
) -> Result<Value, RenderError> {
    let id = DocumentId::new(src.schema.clone(), src.name.clone());
    let Some(source_key) = source_index.get(&id) else {
        return Err(RenderError::SubstitutionFailure {
            detail: format!("source document {id} does not exist"),
        });
    };
    if !rendered_data.contains_key(source_key) {
        return Err(RenderError::SubstitutionFailure {
            detail: format!("source document {id} was not rendered"),
        });
    }

    let source_is_encrypted = keyed
        .get(source_key)
        .is_some_and(Document::is_encrypted);
    if source_is_encrypted && !dereferenced.contains(source_key) {
        if let Err(engine_error) = cancel.check() {
            *abort = Some(engine_error);
            return Err(aborting_placeholder());
        }
        match materialise(source_key, rendered_data, cache) {
            Ok(()) => {
                dereferenced.insert(source_key.clone());
            },
            Err(SecretFetch::Fatal(error)) => return Err(error),
            Err(SecretFetch::Abort(engine_error)) => {
                *abort = Some(engine_error);
                return Err(aborting_placeholder());
            },
        }
    }

    let Some(source_data) = rendered_data.get(source_key) else {
        return Err(RenderError::SubstitutionFailure {
            detail: format!("source document {id} was not rendered"),
        });
    };
    path::extract(source_data, &src.path)
        .cloned()
        .ok_or_else(|| RenderError::SubstitutionFailure {
            detail: format!("no value at {} in source {id}", src.path),
        })
}

fn aborting_placeholder() -> RenderError {
    RenderError::SubstitutionFailure {
        detail: "render aborted".to_string(),
    }
}

enum SecretFetch {
    Fatal(RenderError),
    Abort(EngineError),
}

/// Swaps a document's reference token for its cleartext, via the cache.
fn materialise(
    key: &DocumentKey,
    rendered_data: &mut BTreeMap<DocumentKey, Value>,
    cache: &mut SecretCache<'_>,
) -> Result<(), SecretFetch> {
    let Some(data) = rendered_data.get_mut(key) else {
        return Ok(());
    };
    let reference = match data.as_str() {
        Some(reference) => reference.to_string(),
        None => {
            return Err(SecretFetch::Fatal(RenderError::SubstitutionFailure {
                detail: format!("encrypted document {key} does not carry a reference string"),
            }));
        },
    };

    match cache.dereference(&reference) {
        Ok(cleartext) => {
            *data = Value::String(cleartext);
            Ok(())
        },
        Err(SecretError::NotFound { reference }) => {
            Err(SecretFetch::Fatal(RenderError::SecretNotFound { reference }))
        },
        Err(SecretError::Transient { reference, message }) => {
            Err(SecretFetch::Abort(EngineError::SecretTransient {
                reference,
                message,
            }))
        },
    }
}
