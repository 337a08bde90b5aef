//! Engine error taxonomy.
//!
//! Rendering distinguishes three severities: **fatal-revision** errors abort
//! the render and return the report only, **fatal-document** errors fail one
//! document and its descendants while the rest continue, and **advisory**
//! errors land in the report without affecting output. The severity is a
//! property of the error kind, not of where it was raised, so the
//! classification lives here next to the kinds themselves.

use serde::Serialize;
use thiserror::Error;

/// How an error affects the render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// The whole render aborts; only the report is returned.
    FatalRevision,
    /// The offending document and its descendants are failed.
    FatalDocument,
    /// Recorded in the report; output is unaffected.
    Advisory,
}

/// The pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderStage {
    /// Envelope, schema, and policy validation.
    Validation,
    /// Layering policy resolution, parent selection, action application.
    Layering,
    /// Substitution graph construction and injection.
    Substitution,
    /// Replacement pair validation and suppression.
    Replacement,
    /// Secret dereferencing.
    Secrets,
}

/// Which side of a layering action a key was missing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSide {
    /// The parent-derived data being layered onto.
    Parent,
    /// The child document's own data.
    Child,
}

impl ActionSide {
    /// Lowercase label used in messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
        }
    }
}

impl std::fmt::Display for ActionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised while rendering a revision.
///
/// Every variant carries enough context to build a report entry; the wire
/// code (via [`RenderError::code`]) matches the names the HTTP edge maps to
/// status codes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RenderError {
    /// A document failed envelope (meta-schema) validation.
    #[error("document failed envelope validation: {detail}")]
    InvalidDocumentFormat {
        /// What was malformed.
        detail: String,
    },

    /// Two documents share a `(schema, name)` identity without forming a
    /// replacement pair.
    #[error("duplicate document {name} for schema {schema}")]
    DuplicateDocument {
        /// The shared schema tag.
        schema: String,
        /// The shared metadata name.
        name: String,
    },

    /// More than one `DataSchema` registers the same target schema.
    #[error("DataSchema registered more than once for {target}")]
    DuplicateDataSchema {
        /// The doubly-registered target schema tag.
        target: String,
    },

    /// A `DataSchema` name uses a reserved prefix.
    #[error("DataSchema name {name:?} uses a reserved prefix")]
    ReservedSchemaName {
        /// The offending name.
        name: String,
    },

    /// A concrete document's schema has no registration.
    #[error("no schema registered for {schema}")]
    UnregisteredSchema {
        /// The unregistered schema tag.
        schema: String,
    },

    /// Document data failed validation against its registered schema.
    #[error("data failed validation against {schema}: {detail}")]
    SchemaValidation {
        /// The registered schema tag.
        schema: String,
        /// The first violation, with its data path.
        detail: String,
    },

    /// Documents declare layers but no `LayeringPolicy` exists.
    #[error("no LayeringPolicy in revision while documents declare layers")]
    LayeringPolicyNotFound,

    /// More than one `LayeringPolicy` exists in the revision.
    #[error("found {count} LayeringPolicy documents; at most one is allowed")]
    MultipleLayeringPolicies {
        /// How many were found.
        count: usize,
    },

    /// A document references a layer missing from `layerOrder`.
    #[error("layer {layer:?} is not in the layering policy's layerOrder")]
    UnknownLayer {
        /// The unknown layer name.
        layer: String,
    },

    /// No parent matched a non-root document's selector.
    #[error("no parent in layer {parent_layer:?} matches the parentSelector")]
    MissingParent {
        /// The layer that was searched.
        parent_layer: String,
    },

    /// More than one parent matched the selector.
    #[error("{count} candidate parents match the parentSelector")]
    IndeterminateDocumentParent {
        /// How many candidates matched.
        count: usize,
    },

    /// A layering action addressed a key absent from parent or child.
    #[error("missing document key at {path} on the {side} side")]
    MissingDocumentKey {
        /// The action path that failed to resolve.
        path: String,
        /// Which document lacked the key.
        side: ActionSide,
    },

    /// A substitution could not be resolved or applied.
    #[error("substitution failed: {detail}")]
    SubstitutionFailure {
        /// Why the substitution failed.
        detail: String,
    },

    /// A substitution pattern did not match the destination string.
    #[error("pattern {pattern:?} not found in destination value at {path}")]
    MissingDocumentPattern {
        /// The regex that found no match.
        pattern: String,
        /// The destination path that was searched.
        path: String,
    },

    /// Substitution references form a cycle.
    #[error("substitution references form a cycle through {through}")]
    SubstitutionCycle {
        /// One document on the cycle.
        through: String,
    },

    /// A replacement document violates the replacement rules.
    #[error("invalid replacement: {detail}")]
    InvalidReplacement {
        /// Which rule was violated.
        detail: String,
    },

    /// A replacement's parent is itself a replacement.
    #[error("replacement parent {parent} is itself a replacement")]
    SingletonReplacement {
        /// The offending parent document.
        parent: String,
    },

    /// A secret reference was not found in the secret store.
    #[error("secret reference {reference:?} not found")]
    SecretNotFound {
        /// The unresolvable reference token.
        reference: String,
    },

    /// A `ValidationPolicy` names no validations.
    #[error("validation policy {name:?} names no validations")]
    EmptyValidationPolicy {
        /// The policy document's name.
        name: String,
    },
}

impl RenderError {
    /// The severity class of this error kind.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::InvalidDocumentFormat { .. }
            | Self::DuplicateDocument { .. }
            | Self::DuplicateDataSchema { .. }
            | Self::ReservedSchemaName { .. }
            | Self::LayeringPolicyNotFound
            | Self::MultipleLayeringPolicies { .. }
            | Self::UnknownLayer { .. }
            | Self::SubstitutionCycle { .. }
            | Self::InvalidReplacement { .. }
            | Self::SingletonReplacement { .. } => Severity::FatalRevision,

            Self::MissingParent { .. }
            | Self::IndeterminateDocumentParent { .. }
            | Self::MissingDocumentKey { .. }
            | Self::SubstitutionFailure { .. }
            | Self::MissingDocumentPattern { .. }
            | Self::SecretNotFound { .. } => Severity::FatalDocument,

            Self::UnregisteredSchema { .. }
            | Self::SchemaValidation { .. }
            | Self::EmptyValidationPolicy { .. } => Severity::Advisory,
        }
    }

    /// The wire code the HTTP edge maps to a status.
    ///
    /// Secret lookups keep the original service's code so consumers see the
    /// name they already handle.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidDocumentFormat { .. }
            | Self::DuplicateDocument { .. }
            | Self::DuplicateDataSchema { .. }
            | Self::ReservedSchemaName { .. } => "InvalidDocumentFormat",
            Self::UnregisteredSchema { .. } => "UnregisteredSchema",
            Self::SchemaValidation { .. } => "SchemaValidation",
            Self::LayeringPolicyNotFound | Self::MultipleLayeringPolicies { .. } => {
                "LayeringPolicyNotFound"
            },
            Self::UnknownLayer { .. } | Self::MissingParent { .. } => "MissingParent",
            Self::IndeterminateDocumentParent { .. } => "IndeterminateDocumentParent",
            Self::MissingDocumentKey { .. } => "MissingDocumentKey",
            Self::SubstitutionFailure { .. } => "SubstitutionFailure",
            Self::MissingDocumentPattern { .. } => "MissingDocumentPattern",
            Self::SubstitutionCycle { .. } => "SubstitutionCycle",
            Self::InvalidReplacement { .. } => "InvalidReplacement",
            Self::SingletonReplacement { .. } => "SingletonReplacement",
            Self::SecretNotFound { .. } => "BarbicanException",
            Self::EmptyValidationPolicy { .. } => "EmptyValidationPolicy",
        }
    }
}

/// Errors surfaced by the top-level engine API rather than the report.
///
/// These are the failure modes where no meaningful report exists: the
/// revision itself could not be loaded, the secret store failed transiently
/// (the edge may retry the whole render), or the caller cancelled.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The requested revision does not exist.
    #[error("revision {revision} was not found")]
    RevisionNotFound {
        /// The missing revision id.
        revision: u64,
    },

    /// The secret store failed transiently; the render may be retried.
    #[error("transient secret store failure for {reference:?}: {message}")]
    SecretTransient {
        /// The reference being fetched when the failure occurred.
        reference: String,
        /// The underlying failure description.
        message: String,
    },

    /// The render was cancelled cooperatively.
    #[error("render cancelled")]
    Cancelled,
}
