use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{Domain, address_parser, error::AddressError};

/// A validated `local-part@domain` mailbox
///
/// The local part is kept verbatim (it is case-sensitive per RFC 5321)
/// while the domain is lower-cased, so two addresses are equal exactly when
/// their normalised string forms are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    local_part: Arc<str>,
    domain: Domain,
}

impl Address {
    /// Parse `local@domain` or `<local@domain>`
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] if the input is not an RFC 5321 mailbox.
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let (local_part, domain) = address_parser::parse_mailbox(input)?;

        Ok(Self {
            local_part: Arc::from(local_part),
            domain: Domain::new(domain),
        })
    }

    /// Build an address from a local part and a domain
    ///
    /// # Errors
    ///
    /// Returns an [`AddressError`] if the combination is not a valid mailbox.
    pub fn from_parts(local_part: &str, domain: &Domain) -> Result<Self, AddressError> {
        Self::parse(&format!("{local_part}@{domain}"))
    }

    #[must_use]
    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    #[must_use]
    pub const fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The same local part at another domain
    #[must_use]
    pub fn with_domain(&self, domain: Domain) -> Self {
        Self {
            local_part: Arc::clone(&self.local_part),
            domain,
        }
    }

    /// Whether the local part is a quoted string
    #[must_use]
    pub fn is_quoted(&self) -> bool {
        self.local_part.starts_with('"')
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}
