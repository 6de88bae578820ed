use std::sync::{Arc, PoisonError, RwLock};

use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use regex::Regex;
use switchyard_common::{Address, Domain};
use tracing::{debug, warn};

use crate::{
    error::{Result, RrtError},
    mapping::{Mapping, MappingKind, MappingKinds, MappingSource, Mappings},
    resolver::{DefaultDomainProvider, ErrorMapping, LocalityOracle, MappingResolver, RewriteResult},
};

/// Default number of mappings a resolution may follow before giving up
pub const DEFAULT_MAPPING_LIMIT: usize = 10;

const TOO_MANY_MAPPINGS: &str = "554 Too many mappings to process";

/// In-memory recipient rewrite table
///
/// Rules are stored per [`MappingSource`]. Lookups for a user fall back to
/// the rules of the user's whole domain when the user has none of their
/// own. Resolution follows chains of rules until it reaches addresses with
/// no rules, an address that maps onto itself, or `mapping_limit` steps.
///
/// # Concurrency
/// Uses an `RwLock` for interior mutability; resolution holds the read lock
/// for its whole duration so it sees one consistent table.
#[derive(Debug, Clone)]
pub struct MemoryRewriteTable {
    mappings: Arc<RwLock<AHashMap<MappingSource, Mappings>>>,
    recursive: bool,
    mapping_limit: usize,
    default_domain: Option<Domain>,
}

impl Default for MemoryRewriteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRewriteTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mappings: Arc::new(RwLock::new(AHashMap::new())),
            recursive: true,
            mapping_limit: DEFAULT_MAPPING_LIMIT,
            default_domain: None,
        }
    }

    /// Whether resolution follows chains of rules
    #[must_use]
    pub const fn with_recursion(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub const fn with_mapping_limit(mut self, limit: usize) -> Self {
        self.mapping_limit = limit;
        self
    }

    /// Domain used to complete targets while following chains
    ///
    /// Without one, a target lacking a domain ends its chain and is
    /// returned as stored.
    #[must_use]
    pub fn with_default_domain(mut self, domain: Option<Domain>) -> Self {
        self.default_domain = domain;
        self
    }

    pub fn add_mapping(&self, source: MappingSource, mapping: Mapping) {
        debug!(%source, %mapping, "Adding mapping");
        self.mappings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(source)
            .or_default()
            .insert(mapping);
    }

    /// Returns `false` if the mapping was not stored
    pub fn remove_mapping(&self, source: &MappingSource, mapping: &Mapping) -> bool {
        let mut table = self.mappings.write().unwrap_or_else(PoisonError::into_inner);

        let Some(mappings) = table.get_mut(source) else {
            return false;
        };

        let removed = mappings.remove(mapping);
        if mappings.is_empty() {
            table.remove(source);
        }
        removed
    }

    /// Every stored rule
    #[must_use]
    pub fn all_mappings(&self) -> Vec<(MappingSource, Mappings)> {
        let mut all: Vec<_> = self
            .mappings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(source, mappings)| (source.clone(), mappings.clone()))
            .collect();
        all.sort_by(|(a, _), (b, _)| a.cmp(b));
        all
    }

    fn stored(table: &AHashMap<MappingSource, Mappings>, source: &MappingSource) -> Mappings {
        table.get(source).cloned().unwrap_or_default()
    }

    /// Rules for `address`, or for its domain if it has none
    fn map_address(table: &AHashMap<MappingSource, Mappings>, address: &Address) -> Mappings {
        let Some(source) = MappingSource::from_address(address) else {
            return Mappings::new();
        };

        let user = Self::stored(table, &source);
        if !user.is_empty() {
            return user;
        }

        source
            .domain_wildcard()
            .map(|wildcard| Self::stored(table, &wildcard))
            .unwrap_or_default()
    }

    fn resolve_address(
        &self,
        table: &AHashMap<MappingSource, Mappings>,
        address: &Address,
        kinds: MappingKinds,
        remaining: usize,
    ) -> Result<RewriteResult> {
        if remaining == 0 {
            warn!(%address, limit = self.mapping_limit, "Mapping limit reached");
            return Ok(RewriteResult::MappingError(ErrorMapping::new(TOO_MANY_MAPPINGS)));
        }

        let stored = Self::map_address(table, address);
        if let Some(error) = stored.error() {
            return Ok(RewriteResult::MappingError(ErrorMapping::new(error.target())));
        }

        let mut resolved = Mappings::new();

        for mapping in stored.select(kinds) {
            // Rules that compute an address resolve to a plain alias of it
            let kind = if mapping.kind().keeps_identity() {
                mapping.kind()
            } else {
                MappingKind::Alias
            };

            if mapping.needs_domain() && self.default_domain.is_none() {
                resolved.insert(mapping);
                continue;
            }

            let Some(rewritten) = self.rewrite(&mapping, address)? else {
                continue;
            };

            if !self.recursive {
                resolved.insert(Mapping::for_address(kind, &rewritten));
                continue;
            }

            if rewritten == *address {
                if mapping.kind().keeps_identity() {
                    resolved.insert(Mapping::for_address(kind, &rewritten));
                }
                continue;
            }

            match self.resolve_address(table, &rewritten, kinds, remaining - 1)? {
                RewriteResult::MappingError(error) => {
                    return Ok(RewriteResult::MappingError(error));
                }
                RewriteResult::Success(children) if children.is_empty() => {
                    resolved.insert(Mapping::for_address(kind, &rewritten));
                }
                RewriteResult::Success(children) => resolved.extend(children),
            }
        }

        Ok(RewriteResult::Success(resolved))
    }

    /// The address `mapping` sends mail for `address` to
    fn rewrite(&self, mapping: &Mapping, address: &Address) -> Result<Option<Address>> {
        let rewritten = match mapping.kind() {
            MappingKind::Alias | MappingKind::Group | MappingKind::Forward => {
                let mapping = match &self.default_domain {
                    Some(domain) => mapping.clone().append_domain_if_none(domain),
                    None => mapping.clone(),
                };
                mapping.as_address()
            }
            MappingKind::Domain | MappingKind::DomainAlias => {
                Address::from_parts(address.local_part(), &Domain::new(mapping.target())).ok()
            }
            MappingKind::Regex => self.apply_regex(mapping, address)?,
            MappingKind::Error => None,
        };

        if rewritten.is_none() {
            debug!(%mapping, %address, "Mapping does not produce an address");
        }

        Ok(rewritten)
    }

    fn apply_regex(&self, mapping: &Mapping, address: &Address) -> Result<Option<Address>> {
        let Some((pattern, replacement)) = mapping.regex_parts() else {
            return Ok(None);
        };

        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            RrtError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        let subject = address.to_string();
        let Some(captures) = regex.captures(&subject) else {
            return Ok(None);
        };

        let mut expanded = String::new();
        captures.expand(replacement, &mut expanded);

        if !expanded.contains('@')
            && let Some(domain) = &self.default_domain
        {
            expanded = format!("{expanded}@{domain}");
        }

        Ok(Address::parse(&expanded).ok())
    }
}

#[async_trait]
impl MappingResolver for MemoryRewriteTable {
    async fn resolve(&self, source: &MappingSource, kinds: MappingKinds) -> Result<RewriteResult> {
        let table = self.mappings.read().unwrap_or_else(PoisonError::into_inner);

        match source {
            MappingSource::User { local_part, domain } => {
                let address = Address::from_parts(local_part, domain).map_err(|e| {
                    RrtError::InvalidMapping {
                        mapping: source.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                self.resolve_address(&table, &address, kinds, self.mapping_limit)
            }
            MappingSource::Domain(_) => {
                let stored = Self::stored(&table, source);
                Ok(stored.error().map_or_else(
                    || RewriteResult::Success(stored.select(kinds)),
                    |error| RewriteResult::MappingError(ErrorMapping::new(error.target())),
                ))
            }
        }
    }

    async fn stored_mappings(&self, source: &MappingSource) -> Result<Mappings> {
        let table = self.mappings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::stored(&table, source))
    }
}

/// In-memory list of the domains this server delivers for
#[derive(Debug, Clone, Default)]
pub struct MemoryDomainList {
    domains: AHashSet<Domain>,
    default_domain: Option<Domain>,
}

impl MemoryDomainList {
    #[must_use]
    pub fn new(domains: impl IntoIterator<Item = Domain>, default_domain: Option<Domain>) -> Self {
        let mut domains: AHashSet<Domain> = domains.into_iter().collect();
        domains.extend(default_domain.clone());

        Self {
            domains,
            default_domain,
        }
    }

    pub fn add_domain(&mut self, domain: Domain) {
        self.domains.insert(domain);
    }

    #[must_use]
    pub const fn configured_default(&self) -> Option<&Domain> {
        self.default_domain.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl LocalityOracle for MemoryDomainList {
    fn is_local(&self, domain: &Domain) -> bool {
        self.domains.contains(domain)
    }
}

#[async_trait]
impl DefaultDomainProvider for MemoryDomainList {
    async fn default_domain(&self) -> Result<Domain> {
        self.default_domain.clone().ok_or(RrtError::NoDefaultDomain)
    }
}
