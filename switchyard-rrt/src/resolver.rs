//! Collaborators the rewrite engine consults
//!
//! Mapping lookups and the default domain may require I/O, so those traits
//! are async. Whether a domain is served locally is expected to be answered
//! from memory.

use std::fmt;

use async_trait::async_trait;
use switchyard_common::Domain;

use crate::{
    error::Result,
    mapping::{MappingKind, MappingKinds, MappingSource, Mappings},
};

/// An operator-configured rejection of an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMapping {
    message: String,
}

impl ErrorMapping {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ErrorMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of resolving one address
///
/// Infrastructure failures are reported separately as `Err`, so a caller
/// handling `MappingError` can never swallow one by accident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteResult {
    Success(Mappings),
    MappingError(ErrorMapping),
}

impl RewriteResult {
    #[must_use]
    pub fn empty() -> Self {
        Self::Success(Mappings::new())
    }
}

/// Access to the recipient rewrite table
#[async_trait]
pub trait MappingResolver: Send + Sync {
    /// Resolve the mappings of the requested kinds that apply to `source`
    ///
    /// Implementations may follow chains of mappings; the returned targets
    /// are final. A target may still lack a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store could not be consulted.
    async fn resolve(&self, source: &MappingSource, kinds: MappingKinds) -> Result<RewriteResult>;

    /// The mappings stored for exactly `source`, without resolution
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store could not be consulted.
    async fn stored_mappings(&self, source: &MappingSource) -> Result<Mappings>;

    /// The forward rules stored for `source`
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store could not be consulted.
    async fn resolve_forwards(&self, source: &MappingSource) -> Result<Mappings> {
        Ok(self
            .stored_mappings(source)
            .await?
            .select_kind(MappingKind::Forward))
    }
}

#[async_trait]
pub trait DefaultDomainProvider: Send + Sync {
    /// The domain appended to mapping targets that do not name one
    ///
    /// # Errors
    ///
    /// Returns an error if no default domain is configured or the domain
    /// list could not be consulted.
    async fn default_domain(&self) -> Result<Domain>;
}

pub trait LocalityOracle: Send + Sync {
    /// Whether mail for `domain` is delivered by this server
    fn is_local(&self, domain: &Domain) -> bool;
}
