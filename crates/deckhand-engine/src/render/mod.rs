//! The rendering orchestrator.
//!
//! `render` is a pure function of the revision snapshot and the secret
//! resolver: validation, layering policy resolution, parent selection,
//! layering, secret dereferencing, topological substitution, replacement
//! suppression, and abstract filtering, in that order. Fatal-revision
//! errors abort and return the report only; fatal-document errors fail one
//! document and its descendants while the rest continue.
//!
//! Every iteration that could look nondeterministic is keyed by
//! `(schema, name, layer)` so the output is byte-stable: rendering the
//! same revision twice yields identical documents and identical reports.
//!
//! During a render each document moves through
//! `Ingested → Validated → Layered → Substituted → Finalized`, with the
//! terminal states `Suppressed` (replaced parents, abstract documents) and
//! `Failed` (any fatal stage, ancestors included).

mod cancel;
mod orchestrator;

use std::collections::BTreeMap;

use serde::Serialize;

pub use cancel::CancelToken;
pub use orchestrator::{render_revision, validate_revision};

use crate::document::{Document, DocumentKey};
use crate::validation::ValidationReport;

/// Where a document ended up during a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// Present in the snapshot; not yet validated.
    Ingested,
    /// Passed structural validation.
    Validated,
    /// Layered atop its parent.
    Layered,
    /// All substitutions applied.
    Substituted,
    /// Emitted in the rendered output.
    Finalized,
    /// Valid, but withheld from output (abstract, or a replaced parent).
    Suppressed,
    /// A fatal stage failed this document or one of its ancestors.
    Failed,
}

/// The outcome of rendering one revision.
#[derive(Debug)]
pub struct Rendered {
    /// The concrete rendered documents, sorted by `(schema, name)`.
    /// Empty when a fatal-revision error aborted the render.
    pub documents: Vec<Document>,
    /// The aggregated validation report.
    pub report: ValidationReport,
    /// The terminal state of every non-control document.
    pub states: BTreeMap<DocumentKey, DocumentState>,
}
