//! Control-document partitioning.
//!
//! Control documents steer rendering rather than feeding it: the layering
//! policy, schema registrations, and validation policies. They are parsed
//! into a tagged variant once at orchestrator entry so the rest of the
//! engine never re-inspects raw control payloads.

use serde::Deserialize;
use tracing::debug;

use super::{Document, SchemaId};
use crate::error::RenderError;

/// A parsed control document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlDocument {
    /// Defines the total ordering of layers.
    LayeringPolicy(LayeringPolicyDoc),
    /// Registers a JSON schema for a target document schema.
    DataSchema(DataSchemaDoc),
    /// Names the validations a healthy revision must pass.
    ValidationPolicy(ValidationPolicyDoc),
}

/// The single `LayeringPolicy` of a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeringPolicyDoc {
    /// The control document's name.
    pub name: String,
    /// Layer names from most abstract to most concrete.
    pub layer_order: Vec<String>,
}

/// A `DataSchema` registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSchemaDoc {
    /// The registration's own name; also the target schema tag.
    pub name: String,
    /// The schema tag this registration validates.
    pub target: SchemaId,
    /// The JSON-schema definition.
    pub definition: serde_json::Value,
}

/// A `ValidationPolicy` naming expected validations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicyDoc {
    /// The control document's name.
    pub name: String,
    /// The validation names whose latest entries must all be `success`.
    pub validations: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayeringPolicyData {
    layer_order: Vec<String>,
}

#[derive(Deserialize)]
struct ValidationPolicyData {
    #[serde(default)]
    validations: Vec<ValidationRef>,
}

#[derive(Deserialize)]
struct ValidationRef {
    name: String,
}

/// Splits a revision snapshot into normal documents and parsed controls.
///
/// The snapshot itself is left intact; control documents are emitted in
/// rendered output untouched, so the orchestrator needs both views.
///
/// # Errors
///
/// Returns [`RenderError::InvalidDocumentFormat`] for a control document of
/// unknown kind or with a malformed payload.
pub fn partition(
    documents: &[Document],
) -> Result<(Vec<Document>, Vec<ControlDocument>), RenderError> {
    let mut normal = Vec::new();
    let mut controls = Vec::new();

    for document in documents {
        if !document.is_control() {
            normal.push(document.clone());
            continue;
        }
        controls.push(parse_control(document)?);
    }

    debug!(
        normal = normal.len(),
        controls = controls.len(),
        "partitioned revision snapshot"
    );
    Ok((normal, controls))
}

fn parse_control(document: &Document) -> Result<ControlDocument, RenderError> {
    let name = document.metadata.name.clone();
    let bad_payload = |err: serde_yaml::Error| RenderError::InvalidDocumentFormat {
        detail: format!("control document {} has malformed data: {err}", document.id()),
    };

    match (document.schema.namespace.as_str(), document.schema.kind.as_str()) {
        ("deckhand", "LayeringPolicy") => {
            let data: LayeringPolicyData =
                serde_yaml::from_value(document.data.clone()).map_err(bad_payload)?;
            Ok(ControlDocument::LayeringPolicy(LayeringPolicyDoc {
                name,
                layer_order: data.layer_order,
            }))
        },
        ("deckhand", "DataSchema") => {
            let target: SchemaId = name.parse()?;
            let definition = serde_json::to_value(&document.data).map_err(|err| {
                RenderError::InvalidDocumentFormat {
                    detail: format!("DataSchema {name} is not expressible as JSON: {err}"),
                }
            })?;
            Ok(ControlDocument::DataSchema(DataSchemaDoc {
                name,
                target,
                definition,
            }))
        },
        ("deckhand", "ValidationPolicy") => {
            let data: ValidationPolicyData =
                serde_yaml::from_value(document.data.clone()).map_err(bad_payload)?;
            Ok(ControlDocument::ValidationPolicy(ValidationPolicyDoc {
                name,
                validations: data.validations.into_iter().map(|v| v.name).collect(),
            }))
        },
        _ => Err(RenderError::InvalidDocumentFormat {
            detail: format!("unknown control document kind {}", document.schema),
        }),
    }
}
