//! Error types for the switchyard-rrt crate.
//!
//! Operator-configured rejections are not errors: they are reported as
//! [`RewriteResult::MappingError`](crate::resolver::RewriteResult) so they
//! cannot be confused with the infrastructure failures below.

use switchyard_common::MailName;
use thiserror::Error;

/// Failure of a collaborator the rewrite engine depends on.
#[derive(Debug, Error)]
pub enum RrtError {
    /// The mapping store could not be read.
    #[error("Mapping store error: {0}")]
    Store(String),

    /// No default domain is configured, so a target without a domain
    /// cannot be completed.
    #[error("No default domain configured")]
    NoDefaultDomain,

    /// The domain list could not be read.
    #[error("Domain list error: {0}")]
    DomainList(String),

    /// A stored mapping could not be interpreted.
    #[error("Invalid mapping '{mapping}': {reason}")]
    InvalidMapping { mapping: String, reason: String },

    /// A regex mapping's pattern does not compile.
    #[error("Invalid regex mapping '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A lookup did not complete in time.
    #[error("Mapping lookup timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Failure to hand a mail back to the pipeline.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport rejected mail {mail}: {reason}")]
    Rejected { mail: MailName, reason: String },

    #[error("Transport is closed")]
    Closed,
}

/// Failure of a whole processing pass.
///
/// A [`Rewrite`](Self::Rewrite) failure while resolving recipients leaves
/// the mail unmodified, as every lookup happens before any change is made.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Recipient rewriting failed: {0}")]
    Rewrite(#[from] RrtError),

    #[error("Injecting mail failed: {0}")]
    Transport(#[from] TransportError),
}

impl ProcessingError {
    /// Returns `true` if a collaborator failed, as opposed to the transport
    /// refusing a mail.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Rewrite(_))
    }
}

pub type Result<T> = std::result::Result<T, RrtError>;

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use super::*;

    #[test]
    fn test_processing_error_classification() {
        let err = ProcessingError::from(RrtError::NoDefaultDomain);
        assert!(err.is_infrastructure());
        assert_eq!(
            err.to_string(),
            "Recipient rewriting failed: No default domain configured"
        );

        let err = ProcessingError::from(TransportError::Closed);
        assert!(!err.is_infrastructure());
    }

    #[test]
    fn test_regex_error_source_chain() {
        let source = regex::Regex::new("(unclosed").err();
        assert!(source.is_some());

        if let Some(source) = source {
            let err = RrtError::InvalidRegex {
                pattern: "(unclosed".to_string(),
                source,
            };
            assert!(err.source().is_some());
            assert!(err.to_string().starts_with("Invalid regex mapping '(unclosed'"));
        }
    }
}
