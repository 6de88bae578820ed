//! Error types for the switchyard-common crate.

use thiserror::Error;

/// Errors raised while parsing a mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Empty address")]
    Empty,

    #[error("Local-part exceeds 64 octets")]
    LocalPartTooLong,

    #[error("Domain exceeds 255 octets")]
    DomainTooLong,

    #[error("Missing closing angle bracket '>'")]
    MissingCloseBracket,

    #[error("Missing '@' separator")]
    MissingAtSign,

    #[error("Invalid local-part: {0}")]
    InvalidLocalPart(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid address literal: {0}")]
    InvalidAddressLiteral(String),

    #[error("Unclosed quoted string")]
    UnclosedQuotedString,

    #[error("Invalid quoted string: {0}")]
    InvalidQuotedString(String),
}

/// Errors raised while inspecting a message's content.
#[derive(Debug, Error)]
pub enum MailError {
    /// The header block could not be parsed.
    #[error("Malformed message headers: {0}")]
    Headers(#[from] mailparse::MailParseError),

    /// Reading the raw message failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailError {
    /// Returns `true` if the message itself is at fault, rather than the
    /// environment it was read from.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Headers(_))
    }
}
