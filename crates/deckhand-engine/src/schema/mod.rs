//! Schema registration and data validation.
//!
//! The registry answers "what JSON schema applies to document D?" by
//! indexing user-provided `DataSchema` control documents over a small set
//! of built-in registrations for the secret document kinds. The envelope
//! meta-schemas are enforced structurally at parse time (see
//! [`crate::document`]), so the registry only ever matches a document's
//! full `schema` triple against registered `data` schemas.

mod builtin;
mod checker;
mod registry;

pub use checker::{SchemaViolation, check};
pub use registry::{RegisteredSchema, SchemaRegistry};
