//! Domain newtype
//!
//! Domains compare case-insensitively in mail routing, so the wrapped value
//! is always stored lower-cased. Cloning is cheap, which matters because
//! the same domain is copied into every address, mapping key and partition
//! group that refers to it.

use std::{
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// A lower-cased domain name
///
/// # Examples
///
/// ```
/// use switchyard_common::Domain;
///
/// let domain = Domain::new("Example.COM");
/// assert_eq!(domain.as_str(), "example.com");
///
/// let domain: Domain = "mail.example.com".into();
/// assert_eq!(domain.as_str(), "mail.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "Arc<str>")]
#[repr(transparent)]
pub struct Domain(Arc<str>);

impl Domain {
    #[must_use]
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(Arc::from(s.as_ref().to_ascii_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> Arc<str> {
        self.0
    }

    /// Whether this is an address literal such as `[192.0.2.1]`
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.0.starts_with('[')
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Domain {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Domain {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Domain> for Arc<str> {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_domain_is_lowercased() {
        let domain = Domain::new("MiXeD.Example.ORG");
        assert_eq!(domain.as_str(), "mixed.example.org");
        assert_eq!(domain, Domain::new("mixed.example.org"));
    }

    #[test]
    fn test_domain_hash_ignores_case() {
        let mut set = HashSet::new();
        set.insert(Domain::new("example.com"));
        set.insert(Domain::new("EXAMPLE.com"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_domain_deref_and_display() {
        let domain = Domain::from("test.com");
        assert_eq!(domain.len(), 8);
        assert!(domain.ends_with(".com"));
        assert_eq!(format!("{domain}"), "test.com");
    }

    #[test]
    fn test_domain_literal() {
        assert!(Domain::new("[192.0.2.1]").is_literal());
        assert!(!Domain::new("example.com").is_literal());
    }

    #[test]
    fn test_domain_serde_normalises() {
        let domain: Domain = ron::from_str("\"Example.Net\"").unwrap();
        assert_eq!(domain.as_str(), "example.net");
        assert_eq!(ron::to_string(&domain).unwrap(), "\"example.net\"");
    }
}
