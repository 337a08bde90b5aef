//! The schema registry.

use std::collections::BTreeMap;

use tracing::debug;

use super::builtin;
use crate::document::{ControlDocument, SchemaId};
use crate::error::RenderError;

/// A registered `data` schema for one target schema triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSchema {
    /// The schema tag this registration validates.
    pub target: SchemaId,
    /// The JSON-schema definition.
    pub definition: serde_json::Value,
    /// True for the built-in secret-kind registrations.
    pub builtin: bool,
}

/// Lookup from full `schema` triple to registered definition.
///
/// Built from the revision's `DataSchema` control documents plus the
/// built-in registrations. Registering the same target twice within a
/// revision is a fatal error. The built-ins all live under the reserved
/// `deckhand/` prefix, which policy validation forbids user registrations
/// from touching, so seeding them after user schemas never collides.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<SchemaId, RegisteredSchema>,
}

impl SchemaRegistry {
    /// Builds the registry from the revision's control documents.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::DuplicateDataSchema`] when two `DataSchema`
    /// documents register the same target.
    pub fn from_controls(controls: &[ControlDocument]) -> Result<Self, RenderError> {
        let mut schemas = BTreeMap::new();

        for control in controls {
            let ControlDocument::DataSchema(data_schema) = control else {
                continue;
            };
            let target = normalize(&data_schema.target);
            let registered = RegisteredSchema {
                target: target.clone(),
                definition: data_schema.definition.clone(),
                builtin: false,
            };
            if schemas.insert(target.clone(), registered).is_some() {
                return Err(RenderError::DuplicateDataSchema {
                    target: target.to_string(),
                });
            }
        }

        for (target, definition) in builtin::registrations() {
            let target = normalize(&target);
            schemas.entry(target.clone()).or_insert(RegisteredSchema {
                target,
                definition,
                builtin: true,
            });
        }

        debug!(registered = schemas.len(), "built schema registry");
        Ok(Self { schemas })
    }

    /// Looks up the registration for a full schema triple.
    ///
    /// `v1` and `v1.0` are the same version for lookup purposes.
    #[must_use]
    pub fn lookup(&self, schema: &SchemaId) -> Option<&RegisteredSchema> {
        self.schemas.get(&normalize(schema))
    }

    /// The number of registrations, built-ins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// True when no schemas are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Collapses the `v1.0` spelling onto `v1` so both address one registration.
fn normalize(schema: &SchemaId) -> SchemaId {
    let version = schema
        .version
        .strip_suffix(".0")
        .unwrap_or(&schema.version);
    SchemaId::new(schema.namespace.clone(), schema.kind.clone(), version)
}
