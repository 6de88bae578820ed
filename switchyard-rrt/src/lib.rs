//! Recipient rewriting and forwarding for mail in transit
//!
//! This crate provides:
//! - Typed mappings and the sources they apply to
//! - Recursive resolution of those mappings against a rewrite table
//! - Splitting rewritten recipients into local and remote sets
//! - Forwarding with loop prevention recorded on the mail itself

pub mod backends;
pub mod config;
mod decision;
mod dsn;
mod error;
pub mod forward;
pub mod loop_prevention;
pub mod mapping;
mod partition;
mod processor;
pub mod resolver;
mod transport;

// Re-export configuration
pub use config::{DomainListConfig, ProcessorConfig, TableConfig};
// Re-export decision types
pub use decision::{AggregateOutcome, Decision, RewriteOutcome};
pub use dsn::rewrite_dsn;
// Re-export error types
pub use error::{ProcessingError, Result, RrtError, TransportError};
// Re-export core types
pub use loop_prevention::RecordedRecipients;
pub use mapping::{Mapping, MappingKind, MappingKinds, MappingSource, Mappings};
pub use partition::{Partition, partition};
pub use processor::RecipientRewriteProcessor;
pub use resolver::{
    DefaultDomainProvider, ErrorMapping, LocalityOracle, MappingResolver, RewriteResult,
};
pub use transport::Transport;
