//! Document validation and the validation report.
//!
//! The validator runs the structural and policy checks every revision goes
//! through before layering; the report aggregates its findings, the
//! per-stage errors raised later in the pipeline, and the
//! `ValidationPolicy` roll-up the HTTP edge serves as revision health.

mod report;
mod validator;

pub use report::{
    EntryOrigin, ErrorEntry, POLICY_VALIDATION, SCHEMA_VALIDATION, SCHEMA_VALIDATION_ALIAS,
    ValidationEntry, ValidationReport, ValidationStatus,
};
pub use validator::validate_documents;
