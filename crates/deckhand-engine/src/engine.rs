//! The engine facade offered to the HTTP edge.

use tracing::debug;

use crate::render::{CancelToken, Rendered, render_revision, validate_revision};
use crate::revision::RevisionSource;
use crate::secrets::SecretResolver;
use crate::validation::ValidationReport;
use crate::error::EngineError;

/// The rendering engine, bound to its two collaborators.
///
/// Holds no state of its own: every render is a pure function of the
/// revision snapshot and the secret store, and independent renders may run
/// concurrently on separate engines or via shared references.
#[derive(Debug)]
pub struct Engine<S, R> {
    revisions: S,
    secrets: R,
}

impl<S: RevisionSource, R: SecretResolver> Engine<S, R> {
    /// Binds an engine to a revision source and a secret resolver.
    pub fn new(revisions: S, secrets: R) -> Self {
        Self { revisions, secrets }
    }

    /// Renders a revision into its concrete document set and report.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RevisionNotFound`] for unknown revisions and
    /// propagates cancellation and transient secret failures.
    pub fn render(&self, revision: u64) -> Result<Rendered, EngineError> {
        self.render_with(revision, &CancelToken::new())
    }

    /// Renders with a caller-held cancellation token.
    ///
    /// # Errors
    ///
    /// As [`Engine::render`], plus [`EngineError::Cancelled`] once the
    /// token fires.
    pub fn render_with(
        &self,
        revision: u64,
        cancel: &CancelToken,
    ) -> Result<Rendered, EngineError> {
        debug!(revision, "rendering revision");
        let documents = self.revisions.revision_documents(revision)?;
        render_revision(&documents, &self.secrets, cancel)
    }

    /// Runs the validation stages only.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::RevisionNotFound`] for unknown revisions.
    pub fn validate(&self, revision: u64) -> Result<ValidationReport, EngineError> {
        debug!(revision, "validating revision");
        let documents = self.revisions.revision_documents(revision)?;
        Ok(validate_revision(&documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::{InMemoryRevisions, Revision};
    use crate::secrets::StaticSecrets;

    #[test]
    fn unknown_revisions_error() {
        let engine = Engine::new(InMemoryRevisions::new(), StaticSecrets::default());
        assert!(matches!(
            engine.render(42),
            Err(EngineError::RevisionNotFound { revision: 42 })
        ));
    }

    #[test]
    fn the_empty_revision_renders_empty() {
        let engine = Engine::new(InMemoryRevisions::new(), StaticSecrets::default());
        let rendered = engine.render(0).unwrap();
        assert!(rendered.documents.is_empty());
        assert!(rendered.report.errors().is_empty());
    }

    #[test]
    fn a_cancelled_token_stops_the_render() {
        let mut revisions = InMemoryRevisions::new();
        let document = serde_yaml::from_str(
            "schema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: x\ndata: {}\n",
        )
        .unwrap();
        revisions.insert(Revision::new(1, vec![document]));
        let engine = Engine::new(revisions, StaticSecrets::default());

        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            engine.render_with(1, &cancel),
            Err(EngineError::Cancelled)
        ));
    }
}
