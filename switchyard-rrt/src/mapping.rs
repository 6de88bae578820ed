//! Rewrite rules and the keys they are stored under
//!
//! A [`Mapping`] is one rule's right-hand side, written as a prefixed
//! string such as `alias:bob@example.com` or `domain:example.org`. A bare
//! string without a recognised prefix is an alias. [`Mappings`] is the
//! ordered, duplicate-free set of rules stored for one [`MappingSource`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use switchyard_common::{Address, Domain};

use crate::error::RrtError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MappingKind {
    /// `regex:<pattern>:<replacement>`, applied to the whole address
    Regex,
    /// `domainAlias:<domain>`, the source domain is another name for this one
    DomainAlias,
    /// `domain:<domain>`, rewrite the domain and keep the local part
    Domain,
    /// `error:<message>`, reject the address
    Error,
    /// `forward:<address>`
    Forward,
    /// `group:<address>`, one member of a group
    Group,
    /// `alias:<address>`
    Alias,
}

impl MappingKind {
    pub const ALL: [Self; 7] = [
        Self::Regex,
        Self::DomainAlias,
        Self::Domain,
        Self::Error,
        Self::Forward,
        Self::Group,
        Self::Alias,
    ];

    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Regex => "regex:",
            Self::DomainAlias => "domainAlias:",
            Self::Domain => "domain:",
            Self::Error => "error:",
            Self::Forward => "forward:",
            Self::Group => "group:",
            Self::Alias => "alias:",
        }
    }

    /// Whether a rule that resolves back to its own source keeps that
    /// source as a recipient
    #[must_use]
    pub const fn keeps_identity(self) -> bool {
        matches!(self, Self::Alias | Self::Group | Self::Forward)
    }

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches(':'))
    }
}

/// A set of [`MappingKind`]s
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MappingKinds(u8);

impl MappingKinds {
    #[must_use]
    pub const fn none() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn all() -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < MappingKind::ALL.len() {
            bits |= MappingKind::ALL[i].bit();
            i += 1;
        }
        Self(bits)
    }

    #[must_use]
    pub const fn only(kind: MappingKind) -> Self {
        Self(kind.bit())
    }

    #[must_use]
    pub const fn with(self, kind: MappingKind) -> Self {
        Self(self.0 | kind.bit())
    }

    #[must_use]
    pub const fn without(self, kind: MappingKind) -> Self {
        Self(self.0 & !kind.bit())
    }

    #[must_use]
    pub const fn contains(self, kind: MappingKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = MappingKind> {
        MappingKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl fmt::Debug for MappingKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<MappingKind> for MappingKinds {
    fn from_iter<T: IntoIterator<Item = MappingKind>>(iter: T) -> Self {
        iter.into_iter().fold(Self::none(), Self::with)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mapping {
    kind: MappingKind,
    target: String,
}

impl Mapping {
    /// # Errors
    ///
    /// Returns [`RrtError::InvalidMapping`] if the target is empty, or is a
    /// regex rule without a `:` between pattern and replacement.
    pub fn new(kind: MappingKind, target: impl Into<String>) -> Result<Self, RrtError> {
        let target = target.into();
        let invalid = |reason: &str| RrtError::InvalidMapping {
            mapping: format!("{}{target}", kind.prefix()),
            reason: reason.to_string(),
        };

        if target.is_empty() && kind != MappingKind::Error {
            return Err(invalid("empty target"));
        }
        if kind == MappingKind::Regex && split_regex(&target).is_none() {
            return Err(invalid("expected <pattern>:<replacement>"));
        }

        Ok(Self { kind, target })
    }

    /// A mapping to a full address, which needs no validation
    #[must_use]
    pub fn for_address(kind: MappingKind, address: &Address) -> Self {
        Self {
            kind,
            target: address.to_string(),
        }
    }

    #[inline]
    pub const fn kind(&self) -> MappingKind {
        self.kind
    }

    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The address this mapping points at
    ///
    /// `None` for error mappings, and for targets that are not addresses,
    /// such as the domain of a `domain:` rule.
    #[must_use]
    pub fn as_address(&self) -> Option<Address> {
        if self.kind == MappingKind::Error {
            return None;
        }
        Address::parse(&self.target).ok()
    }

    /// Whether [`Mapping::append_domain_if_none`] would change this mapping
    ///
    /// Only alias, group and forward targets name a user directly, and so
    /// may leave the domain implied.
    #[must_use]
    pub fn needs_domain(&self) -> bool {
        matches!(
            self.kind,
            MappingKind::Alias | MappingKind::Group | MappingKind::Forward
        ) && !self.target.contains('@')
    }

    /// Complete a target that has no domain with `domain`
    #[must_use]
    pub fn append_domain_if_none(self, domain: &Domain) -> Self {
        if self.needs_domain() {
            Self {
                kind: self.kind,
                target: format!("{}@{domain}", self.target),
            }
        } else {
            self
        }
    }

    /// Pattern and replacement of a stored regex rule
    #[must_use]
    pub fn regex_parts(&self) -> Option<(&str, &str)> {
        if self.kind == MappingKind::Regex {
            split_regex(&self.target)
        } else {
            None
        }
    }
}

/// The separator is the first `:` after the first character of the
/// pattern, so a pattern may itself start with a colon.
fn split_regex(target: &str) -> Option<(&str, &str)> {
    let first = target.chars().next()?;
    let offset = first.len_utf8();
    let colon = target[offset..].find(':')? + offset;
    Some((&target[..colon], &target[colon + 1..]))
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.target)
    }
}

impl FromStr for Mapping {
    type Err = RrtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        MappingKind::ALL
            .into_iter()
            .find_map(|kind| s.strip_prefix(kind.prefix()).map(|target| (kind, target)))
            .map_or_else(
                || Self::new(MappingKind::Alias, s),
                |(kind, target)| Self::new(kind, target),
            )
    }
}

impl TryFrom<String> for Mapping {
    type Error = RrtError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mapping> for String {
    fn from(mapping: Mapping) -> Self {
        mapping.to_string()
    }
}

/// Ordered set of mappings; an empty set means the address is left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Mapping>", into = "Vec<Mapping>")]
pub struct Mappings(Vec<Mapping>);

impl Mappings {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a mapping, returning `false` if it was already present
    pub fn insert(&mut self, mapping: Mapping) -> bool {
        if self.0.contains(&mapping) {
            return false;
        }
        self.0.push(mapping);
        true
    }

    /// Remove a mapping, returning `false` if it was not present
    pub fn remove(&mut self, mapping: &Mapping) -> bool {
        let before = self.0.len();
        self.0.retain(|m| m != mapping);
        self.0.len() != before
    }

    /// The mappings whose kind is in `kinds`, in their original order
    #[must_use]
    pub fn select(&self, kinds: MappingKinds) -> Self {
        self.0
            .iter()
            .filter(|mapping| kinds.contains(mapping.kind))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn select_kind(&self, kind: MappingKind) -> Self {
        self.select(MappingKinds::only(kind))
    }

    /// The first error mapping, if any
    #[must_use]
    pub fn error(&self) -> Option<&Mapping> {
        self.0.iter().find(|mapping| mapping.kind == MappingKind::Error)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mapping> {
        self.0.iter()
    }
}

impl FromIterator<Mapping> for Mappings {
    fn from_iter<T: IntoIterator<Item = Mapping>>(iter: T) -> Self {
        let mut mappings = Self::new();
        for mapping in iter {
            mappings.insert(mapping);
        }
        mappings
    }
}

impl Extend<Mapping> for Mappings {
    fn extend<T: IntoIterator<Item = Mapping>>(&mut self, iter: T) {
        for mapping in iter {
            self.insert(mapping);
        }
    }
}

impl IntoIterator for Mappings {
    type Item = Mapping;
    type IntoIter = std::vec::IntoIter<Mapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Mappings {
    type Item = &'a Mapping;
    type IntoIter = std::slice::Iter<'a, Mapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Mapping>> for Mappings {
    fn from(mappings: Vec<Mapping>) -> Self {
        mappings.into_iter().collect()
    }
}

impl From<Mappings> for Vec<Mapping> {
    fn from(mappings: Mappings) -> Self {
        mappings.0
    }
}

/// Left-hand side of a rule: one user, or every user of a domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MappingSource {
    User { local_part: String, domain: Domain },
    Domain(Domain),
}

impl MappingSource {
    /// The key rules for `address` are stored under
    ///
    /// Quoted local parts cannot name a user, so yield `None`.
    #[must_use]
    pub fn from_address(address: &Address) -> Option<Self> {
        if address.is_quoted() {
            return None;
        }

        Some(Self::User {
            local_part: address.local_part().to_string(),
            domain: address.domain().clone(),
        })
    }

    #[must_use]
    pub const fn domain(&self) -> &Domain {
        match self {
            Self::User { domain, .. } | Self::Domain(domain) => domain,
        }
    }

    /// The local part, for a user source
    #[must_use]
    pub fn local_part(&self) -> Option<&str> {
        match self {
            Self::User { local_part, .. } => Some(local_part),
            Self::Domain(_) => None,
        }
    }

    /// The wildcard source covering this user's whole domain
    #[must_use]
    pub fn domain_wildcard(&self) -> Option<Self> {
        match self {
            Self::User { domain, .. } => Some(Self::Domain(domain.clone())),
            Self::Domain(_) => None,
        }
    }
}

impl fmt::Display for MappingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { local_part, domain } => write!(f, "{local_part}@{domain}"),
            Self::Domain(domain) => write!(f, "*@{domain}"),
        }
    }
}

impl FromStr for MappingSource {
    type Err = RrtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| RrtError::InvalidMapping {
            mapping: s.to_string(),
            reason,
        };

        if let Some(domain) = s.trim().strip_prefix("*@") {
            return Address::from_parts("wildcard", &Domain::new(domain))
                .map(|address| Self::Domain(address.domain().clone()))
                .map_err(|e| invalid(e.to_string()));
        }

        let address = Address::parse(s).map_err(|e| invalid(e.to_string()))?;
        Self::from_address(&address).ok_or_else(|| invalid("quoted local part".to_string()))
    }
}

impl TryFrom<String> for MappingSource {
    type Error = RrtError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MappingSource> for String {
    fn from(source: MappingSource) -> Self {
        source.to_string()
    }
}
