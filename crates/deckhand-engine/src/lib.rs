//! # deckhand-engine
//!
//! Deterministic rendering engine for a document-centric configuration
//! store. A revision's declarative YAML documents are validated against
//! registered schemas, layered along a policy-defined hierarchy,
//! cross-wired through substitutions, and collapsed through replacements
//! into the concrete document set a downstream consumer applies.
//!
//! The engine is a pure function of its inputs: the same revision snapshot
//! and secret store contents always render to the same bytes, and
//! re-rendering the output changes nothing. The HTTP edge, the durable
//! revision store, and the secret store live elsewhere; they appear here
//! only as the [`revision::RevisionSource`] and [`secrets::SecretResolver`]
//! collaborator traits.
//!
//! ## Example
//!
//! ```rust
//! use deckhand_engine::document::parse_document_stream;
//! use deckhand_engine::render::{CancelToken, render_revision};
//! use deckhand_engine::secrets::StaticSecrets;
//!
//! let documents = parse_document_stream(
//!     r"
//! schema: deckhand/LayeringPolicy/v1
//! metadata:
//!   schema: metadata/Control/v1
//!   name: layering-policy
//! data:
//!   layerOrder: [global, site]
//! ---
//! schema: armada/Chart/v1
//! metadata:
//!   schema: metadata/Document/v1
//!   name: ucp
//!   layeringDefinition:
//!     layer: global
//! data:
//!   debug: false
//! ",
//! )
//! .unwrap();
//!
//! let secrets = StaticSecrets::default();
//! let rendered = render_revision(&documents, &secrets, &CancelToken::new()).unwrap();
//! assert_eq!(rendered.documents.len(), 2);
//! ```

#![warn(missing_docs)]

pub mod document;
mod engine;
pub mod error;
pub mod layering;
pub mod path;
pub mod render;
pub mod replacement;
pub mod revision;
pub mod schema;
pub mod secrets;
pub mod substitution;
pub mod validation;

pub use engine::Engine;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Engine;
    pub use crate::document::{Document, DocumentId, SchemaId, parse_document_stream};
    pub use crate::error::{EngineError, RenderError, Severity};
    pub use crate::render::{CancelToken, DocumentState, Rendered};
    pub use crate::revision::{BucketStatus, Revision, RevisionSource, diff};
    pub use crate::secrets::{SecretResolver, StaticSecrets};
    pub use crate::validation::{ValidationReport, ValidationStatus};
}
