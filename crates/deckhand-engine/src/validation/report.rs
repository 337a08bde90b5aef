//! The validation report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::document::{DocumentId, ValidationPolicyDoc};
use crate::error::{RenderError, RenderStage, Severity};

/// Name of the internal schema validation.
pub const SCHEMA_VALIDATION: &str = "deckhand-schema-validation";

/// Historical alias for [`SCHEMA_VALIDATION`], still honoured when external
/// entries are joined.
pub const SCHEMA_VALIDATION_ALIAS: &str = "deckhand-document-schema-validation";

/// Name of the internal policy-conformance validation.
pub const POLICY_VALIDATION: &str = "deckhand-policy-validation";

/// One structured error in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    /// The document the error is about, if any.
    pub document: Option<DocumentId>,
    /// The pipeline stage that raised it.
    pub stage: RenderStage,
    /// How the error affected the render.
    pub severity: Severity,
    /// The wire code the edge maps to a status.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
    /// The data path involved, when one exists.
    pub path: Option<String>,
}

impl ErrorEntry {
    /// Builds an entry from a raised error.
    #[must_use]
    pub fn new(document: Option<DocumentId>, stage: RenderStage, error: &RenderError) -> Self {
        let path = match error {
            RenderError::MissingDocumentKey { path, .. }
            | RenderError::MissingDocumentPattern { path, .. } => Some(path.clone()),
            _ => None,
        };
        Self {
            document,
            stage,
            severity: error.severity(),
            code: error.code(),
            message: error.to_string(),
            path,
        }
    }
}

/// Outcome of one named validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// The validation passed.
    Success,
    /// The validation failed.
    Failure,
    /// The validation's result is stale.
    Expired,
}

/// Who produced a validation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    /// Computed by this engine during the render.
    Internal,
    /// Posted by an external service.
    External,
}

/// One validation result, internal or externally posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationEntry {
    /// The validation's name.
    pub name: String,
    /// Its outcome.
    pub status: ValidationStatus,
    /// When it was recorded. Internal entries carry no timestamp; they are
    /// current for the render that produced them and outrank any external
    /// entry of the same name.
    pub recorded_at: Option<DateTime<Utc>>,
    /// Who produced it.
    pub origin: EntryOrigin,
}

impl ValidationEntry {
    /// An internal entry, current for this render.
    #[must_use]
    pub fn internal(name: &str, status: ValidationStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            recorded_at: None,
            origin: EntryOrigin::Internal,
        }
    }

    /// An externally posted entry.
    #[must_use]
    pub fn external(name: impl Into<String>, status: ValidationStatus, at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            status,
            recorded_at: Some(at),
            origin: EntryOrigin::External,
        }
    }
}

/// The aggregated validation report for one revision.
#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    errors: Vec<ErrorEntry>,
    entries: Vec<ValidationEntry>,
    #[serde(skip)]
    policies: Vec<ValidationPolicyDoc>,
}

impl ValidationReport {
    /// An empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a raised error.
    pub fn record(
        &mut self,
        document: Option<DocumentId>,
        stage: RenderStage,
        error: &RenderError,
    ) {
        self.errors.push(ErrorEntry::new(document, stage, error));
    }

    /// The recorded errors, in the order they were raised.
    #[must_use]
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// The validation entries recorded so far.
    #[must_use]
    pub fn entries(&self) -> &[ValidationEntry] {
        &self.entries
    }

    /// True when any recorded error aborts the whole revision.
    #[must_use]
    pub fn has_fatal_revision(&self) -> bool {
        self.errors
            .iter()
            .any(|entry| entry.severity == Severity::FatalRevision)
    }

    /// Captures the revision's validation policies for the roll-up.
    pub fn set_policies(&mut self, policies: Vec<ValidationPolicyDoc>) {
        self.policies = policies;
    }

    /// Adds an externally posted validation entry.
    pub fn add_external(&mut self, entry: ValidationEntry) {
        self.entries.push(entry);
    }

    /// Computes and stores the internal validation entries from the errors
    /// recorded so far. Called once, at the end of the validation stages.
    pub fn seal_internal_entries(&mut self) {
        let schema_failed = self.errors.iter().any(|entry| {
            matches!(entry.code, "InvalidDocumentFormat" | "SchemaValidation")
        });
        let policy_failed = self.errors.iter().any(|entry| {
            !matches!(
                entry.code,
                "InvalidDocumentFormat" | "SchemaValidation" | "UnregisteredSchema"
            ) && entry.severity != Severity::Advisory
        });

        let to_status = |failed: bool| {
            if failed {
                ValidationStatus::Failure
            } else {
                ValidationStatus::Success
            }
        };
        self.entries
            .push(ValidationEntry::internal(SCHEMA_VALIDATION, to_status(schema_failed)));
        self.entries
            .push(ValidationEntry::internal(POLICY_VALIDATION, to_status(policy_failed)));
    }

    /// The latest status recorded for a validation name, alias-aware.
    #[must_use]
    pub fn latest_status(&self, name: &str) -> Option<ValidationStatus> {
        let wanted = canonical(name);
        let mut best: Option<&ValidationEntry> = None;
        for entry in &self.entries {
            if canonical(&entry.name) != wanted {
                continue;
            }
            best = match best {
                // Internal entries (no timestamp) are current by definition.
                Some(current) if newer(current, entry) => Some(current),
                _ => Some(entry),
            };
        }
        best.map(|entry| entry.status)
    }

    /// Rolls up one validation policy: success iff every named validation's
    /// latest entry is a success; missing or expired entries fail.
    #[must_use]
    pub fn policy_status(&self, policy: &ValidationPolicyDoc) -> ValidationStatus {
        let all_pass = policy.validations.iter().all(|name| {
            self.latest_status(name) == Some(ValidationStatus::Success)
        });
        if all_pass {
            ValidationStatus::Success
        } else {
            ValidationStatus::Failure
        }
    }

    /// The revision's overall health.
    ///
    /// With validation policies present, every policy must roll up to
    /// success; without any, the internal entries decide.
    #[must_use]
    pub fn status(&self) -> ValidationStatus {
        if self.policies.is_empty() {
            let all_pass = self
                .entries
                .iter()
                .all(|entry| entry.status == ValidationStatus::Success);
            return if all_pass {
                ValidationStatus::Success
            } else {
                ValidationStatus::Failure
            };
        }

        let all_pass = self
            .policies
            .iter()
            .all(|policy| self.policy_status(policy) == ValidationStatus::Success);
        if all_pass {
            ValidationStatus::Success
        } else {
            ValidationStatus::Failure
        }
    }
}

fn canonical(name: &str) -> &str {
    if name == SCHEMA_VALIDATION_ALIAS {
        SCHEMA_VALIDATION
    } else {
        name
    }
}

/// True when `current` should outrank `candidate`.
fn newer(current: &ValidationEntry, candidate: &ValidationEntry) -> bool {
    match (current.recorded_at, candidate.recorded_at) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => a > b,
    }
}
