//! Secret dereferencing.
//!
//! Documents with `storagePolicy: encrypted` carry a reference token in
//! place of `data`. The resolver is the only external collaborator the
//! engine talks to; failures are classified as not-found (fatal for the
//! dependent document) or transient (the edge may retry the whole render).
//! The engine itself never retries.
//!
//! A [`SecretCache`] lives for exactly one render: one fetch per unique
//! token, results held in memory, dropped when the render returns.

use std::collections::BTreeMap;
use std::collections::HashMap;

use secrecy::ExposeSecret;
pub use secrecy::SecretString;
use thiserror::Error;
use tracing::debug;

/// Failure classes of a secret fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SecretError {
    /// The reference does not exist in the secret store.
    #[error("secret reference {reference:?} not found")]
    NotFound {
        /// The unresolvable reference token.
        reference: String,
    },

    /// The store failed transiently; a later fetch may succeed.
    #[error("transient secret store failure for {reference:?}: {message}")]
    Transient {
        /// The reference being fetched.
        reference: String,
        /// The underlying failure description.
        message: String,
    },
}

/// The secret-store collaborator interface.
pub trait SecretResolver {
    /// Fetches the payload behind a reference token.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::NotFound`] for unknown references and
    /// [`SecretError::Transient`] for retryable store failures.
    fn fetch(&self, reference: &str) -> Result<SecretString, SecretError>;
}

/// A fixed set of secrets, for tests and embedded edges.
#[derive(Debug, Default)]
pub struct StaticSecrets {
    secrets: BTreeMap<String, String>,
}

impl StaticSecrets {
    /// Builds a resolver over `(reference, payload)` pairs.
    #[must_use]
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            secrets: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl SecretResolver for StaticSecrets {
    fn fetch(&self, reference: &str) -> Result<SecretString, SecretError> {
        self.secrets
            .get(reference)
            .map(|payload| SecretString::from(payload.clone()))
            .ok_or_else(|| SecretError::NotFound {
                reference: reference.to_string(),
            })
    }
}

/// Per-render read-through cache over a [`SecretResolver`].
pub struct SecretCache<'a> {
    resolver: &'a dyn SecretResolver,
    fetched: HashMap<String, String>,
}

impl<'a> SecretCache<'a> {
    /// Creates an empty cache over `resolver`.
    #[must_use]
    pub fn new(resolver: &'a dyn SecretResolver) -> Self {
        Self {
            resolver,
            fetched: HashMap::new(),
        }
    }

    /// Dereferences a token, fetching at most once per unique token.
    ///
    /// # Errors
    ///
    /// Propagates the resolver's [`SecretError`]. Failures are not cached;
    /// a transient failure aborts the render before a second fetch could
    /// happen.
    pub fn dereference(&mut self, reference: &str) -> Result<String, SecretError> {
        if let Some(payload) = self.fetched.get(reference) {
            return Ok(payload.clone());
        }
        debug!(reference, "dereferencing secret");
        let payload = self.resolver.fetch(reference)?;
        let cleartext = payload.expose_secret().to_string();
        self.fetched.insert(reference.to_string(), cleartext.clone());
        Ok(cleartext)
    }

    /// How many unique tokens have been fetched.
    #[must_use]
    pub fn fetched_count(&self) -> usize {
        self.fetched.len()
    }
}
