use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use switchyard_common::{Domain, ProcessingState};

use crate::{
    backends::{DEFAULT_MAPPING_LIMIT, MemoryDomainList, MemoryRewriteTable},
    mapping::{MappingSource, Mappings},
};

const fn default_rewrite_sender_upon_forward() -> bool {
    false
}

const fn default_forward_auto_submitted_emails() -> bool {
    false
}

const fn default_error_processor() -> ProcessingState {
    ProcessingState::ERROR
}

/// Options for [`RecipientRewriteProcessor`](crate::RecipientRewriteProcessor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Handle forward rules separately, sending copies as if from the
    /// forwarding address and tracking them for loops
    ///
    /// When `false` forward rules are resolved like aliases.
    ///
    /// Default: `false`
    #[serde(default = "default_rewrite_sender_upon_forward")]
    pub rewrite_sender_upon_forward: bool,

    /// Forward automatic replies too
    ///
    /// Default: `false`
    #[serde(default = "default_forward_auto_submitted_emails")]
    pub forward_auto_submitted_emails: bool,

    /// State rejected recipients and forward loops are sent to
    ///
    /// Default: `"error"`
    #[serde(default = "default_error_processor")]
    pub error_processor: ProcessingState,

    /// Upper bound on each mapping lookup (in seconds)
    ///
    /// A lookup that takes longer fails the whole pass.
    ///
    /// Default: None (wait indefinitely)
    #[serde(default)]
    pub lookup_timeout_secs: Option<u64>,
}

impl ProcessorConfig {
    #[must_use]
    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            rewrite_sender_upon_forward: default_rewrite_sender_upon_forward(),
            forward_auto_submitted_emails: default_forward_auto_submitted_emails(),
            error_processor: default_error_processor(),
            lookup_timeout_secs: None,
        }
    }
}

const fn default_recursive() -> bool {
    true
}

const fn default_mapping_limit() -> usize {
    DEFAULT_MAPPING_LIMIT
}

/// Contents and behaviour of an in-memory rewrite table
///
/// # Examples
///
/// ```ron
/// (
///     recursive: true,
///     mapping_limit: 10,
///     mappings: {
///         "postmaster@example.com": ["alias:admin@example.com"],
///         "*@old.example.com": ["domain:example.com"],
///         "team@example.com": ["group:alice", "group:bob@example.org"],
///     },
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Follow chains of mappings
    ///
    /// Default: `true`
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// How many mappings a chain may follow before the address is rejected
    ///
    /// Default: 10
    #[serde(default = "default_mapping_limit")]
    pub mapping_limit: usize,

    #[serde(default)]
    pub mappings: BTreeMap<MappingSource, Mappings>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            recursive: default_recursive(),
            mapping_limit: default_mapping_limit(),
            mappings: BTreeMap::new(),
        }
    }
}

impl TableConfig {
    /// Build the table, completing targets without a domain with
    /// `default_domain` while following chains
    #[must_use]
    pub fn into_table(self, default_domain: Option<Domain>) -> MemoryRewriteTable {
        let table = MemoryRewriteTable::new()
            .with_recursion(self.recursive)
            .with_mapping_limit(self.mapping_limit)
            .with_default_domain(default_domain);

        for (source, mappings) in self.mappings {
            for mapping in mappings {
                table.add_mapping(source.clone(), mapping);
            }
        }

        table
    }
}

/// The domains this server delivers for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainListConfig {
    /// Domain completing addresses that omit one; always local
    #[serde(default)]
    pub default_domain: Option<Domain>,

    #[serde(default)]
    pub local_domains: Vec<Domain>,
}

impl DomainListConfig {
    #[must_use]
    pub fn into_domain_list(self) -> MemoryDomainList {
        MemoryDomainList::new(self.local_domains, self.default_domain)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config: ProcessorConfig = ron::from_str("()").unwrap();
        assert_eq!(config, ProcessorConfig::default());
        assert!(!config.rewrite_sender_upon_forward);
        assert!(!config.forward_auto_submitted_emails);
        assert_eq!(config.error_processor, ProcessingState::ERROR);
        assert_eq!(config.lookup_timeout(), None);
    }

    #[test]
    fn test_overrides() {
        let config: ProcessorConfig = ron::from_str(
            r#"(
                rewrite_sender_upon_forward: true,
                error_processor: "bounces",
                lookup_timeout_secs: Some(5),
            )"#,
        )
        .unwrap();

        assert!(config.rewrite_sender_upon_forward);
        assert_eq!(config.error_processor, ProcessingState::new("bounces"));
        assert_eq!(config.lookup_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_table_config() {
        let config: TableConfig = ron::from_str(
            r#"(
                mappings: {
                    "postmaster@example.com": ["alias:admin@example.com", "admin2@example.com"],
                    "*@old.example.com": ["domain:example.com"],
                },
            )"#,
        )
        .unwrap();

        assert!(config.recursive);
        assert_eq!(config.mapping_limit, DEFAULT_MAPPING_LIMIT);

        let table = config.into_table(None);
        let all = table.all_mappings();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().map(|(_, m)| m.len()).sum::<usize>(), 3);
    }

    #[test]
    fn test_invalid_mapping_is_rejected_at_load() {
        let result = ron::from_str::<TableConfig>(
            r#"(mappings: { "a@example.com": ["regex:missing-separator"] })"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_domain_list_config() {
        use crate::resolver::LocalityOracle;

        let config: DomainListConfig = ron::from_str(
            r#"(default_domain: Some("Example.com"), local_domains: ["example.org"])"#,
        )
        .unwrap();
        let list = config.into_domain_list();

        assert!(list.is_local(&Domain::new("example.com")));
        assert!(list.is_local(&Domain::new("example.org")));
        assert_eq!(list.len(), 2);
    }
}
