//! Built-in schema registrations for the secret document kinds.
//!
//! These document kinds carry opaque string payloads and are usable
//! without a user-supplied `DataSchema`.

use serde_json::{Value, json};

use crate::document::SchemaId;

/// The document kinds with built-in registrations.
pub const SECRET_KINDS: &[&str] = &["Certificate", "CertificateKey", "Passphrase"];

/// Returns the built-in registrations as `(target, definition)` pairs.
#[must_use]
pub fn registrations() -> Vec<(SchemaId, Value)> {
    SECRET_KINDS
        .iter()
        .map(|kind| {
            (
                SchemaId::new("deckhand", *kind, "v1"),
                json!({ "type": "string" }),
            )
        })
        .collect()
}
