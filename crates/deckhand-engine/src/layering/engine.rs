//! The layering engine: root-first action application.

use std::collections::{BTreeMap, BTreeSet};

use serde_yaml::Value;
use tracing::{debug, trace};

use super::LayerOrder;
use crate::document::{ActionMethod, Document, DocumentKey, LayerAction};
use crate::error::{ActionSide, RenderError};
use crate::path;

/// The outcome of layering a revision's forest.
#[derive(Debug, Default)]
pub struct Layered {
    /// Per-document intermediate data, for every successfully layered
    /// document (abstract documents included).
    pub intermediate: BTreeMap<DocumentKey, Value>,
    /// Documents whose own actions failed.
    pub failures: Vec<(DocumentKey, RenderError)>,
    /// Documents skipped because an ancestor failed.
    pub poisoned: Vec<DocumentKey>,
}

/// Applies a document's ordered actions atop its parent's layered data.
///
/// The result starts as a deep copy of `parent_data`; each action pulls
/// from the child's own `data` at the action path. A `merge` with no child
/// value at the path is a no-op; `replace` and `delete` require the key on
/// the named side.
///
/// # Errors
///
/// Returns [`RenderError::MissingDocumentKey`] when an action addresses a
/// key absent from the required side.
pub fn apply_actions(
    parent_data: &Value,
    child_data: &Value,
    actions: &[LayerAction],
) -> Result<Value, RenderError> {
    let mut rendered = parent_data.clone();

    for action in actions {
        trace!(method = ?action.method, path = %action.path, "applying layering action");
        apply_action(&mut rendered, child_data, action)?;
    }

    Ok(rendered)
}

fn apply_action(
    rendered: &mut Value,
    child_data: &Value,
    action: &LayerAction,
) -> Result<(), RenderError> {
    let parent_missing = || RenderError::MissingDocumentKey {
        path: action.path.to_string(),
        side: ActionSide::Parent,
    };

    match action.method {
        ActionMethod::Merge => {
            let Some(overlay) = path::extract(child_data, &action.path) else {
                // Nothing on the child side; the parent value stands.
                return Ok(());
            };
            let merged = match path::extract(rendered, &action.path) {
                Some(existing) => {
                    let mut merged = existing.clone();
                    path::deep_merge(&mut merged, overlay);
                    merged
                },
                None => overlay.clone(),
            };
            path::inject(rendered, &action.path, merged).map_err(|_| parent_missing())
        },
        ActionMethod::Replace => {
            let value = path::extract(child_data, &action.path).ok_or(
                RenderError::MissingDocumentKey {
                    path: action.path.to_string(),
                    side: ActionSide::Child,
                },
            )?;
            if path::extract(rendered, &action.path).is_none() {
                return Err(parent_missing());
            }
            path::inject(rendered, &action.path, value.clone()).map_err(|_| parent_missing())
        },
        ActionMethod::Delete => {
            path::delete_at(rendered, &action.path).map_err(|_| parent_missing())
        },
    }
}

/// Layers the whole forest root-first.
///
/// Layers are processed in policy order and documents in key order within
/// each layer, so the walk is deterministic. Documents named in `excluded`
/// (already failed upstream) produce no intermediate data; their
/// descendants are reported as poisoned rather than failed again.
#[must_use]
pub fn layer_documents(
    documents: &BTreeMap<DocumentKey, Document>,
    parents: &BTreeMap<DocumentKey, DocumentKey>,
    order: &LayerOrder,
    excluded: &BTreeSet<DocumentKey>,
) -> Layered {
    let mut result = Layered::default();

    // Unlayered documents and layered documents grouped by layer index,
    // most abstract first.
    let mut waves: Vec<Vec<&DocumentKey>> = vec![Vec::new(); order.layers().len() + 1];
    for (key, document) in documents {
        let wave = document
            .layer()
            .and_then(|layer| order.index_of(layer))
            .map_or(0, |position| position + 1);
        waves[wave].push(key);
    }

    for key in waves.into_iter().flatten() {
        if excluded.contains(key) {
            continue;
        }
        let document = &documents[key];

        let Some(parent_key) = parents.get(key) else {
            // Roots carry their own data forward.
            result
                .intermediate
                .insert(key.clone(), document.data.clone());
            continue;
        };

        let Some(parent_data) = result.intermediate.get(parent_key) else {
            debug!(document = %key, parent = %parent_key, "ancestor failed; skipping");
            result.poisoned.push(key.clone());
            continue;
        };

        let actions = document
            .metadata
            .layering
            .as_ref()
            .map_or(&[][..], |layering| &layering.actions);

        match apply_actions(parent_data, &document.data, actions) {
            Ok(rendered) => {
                result.intermediate.insert(key.clone(), rendered);
            },
            Err(err) => {
                result.failures.push((key.clone(), err));
            },
        }
    }

    result
}
