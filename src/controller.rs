use std::{path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use switchyard_common::{
    Address, Mail, MailName, ProcessingState,
    audit::{AuditConfig, AuditTrail},
    internal,
};
use switchyard_rrt::{
    DomainListConfig, ProcessingError, ProcessorConfig, RecipientRewriteProcessor,
    RecordedRecipients, TableConfig,
    backends::{Injected, RecordingTransport},
};

/// Top level configuration
///
/// # Examples
///
/// ```ron
/// Switchyard (
///     processor: (rewrite_sender_upon_forward: true),
///     domains: (default_domain: Some("example.com"), local_domains: ["example.org"]),
///     table: (
///         mappings: {
///             "postmaster@example.com": ["alias:admin"],
///         },
///     ),
/// )
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Switchyard {
    #[serde(default)]
    processor: ProcessorConfig,
    #[serde(alias = "rrt", default)]
    table: TableConfig,
    #[serde(alias = "domain_list", default)]
    domains: DomainListConfig,
    #[serde(default)]
    audit: AuditConfig,
}

impl Switchyard {
    /// Load the configuration from a RON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// configuration.
    pub async fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        ron::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
    }

    /// Build the processor this configuration describes
    ///
    /// Mail the processor sends on is kept, and reported alongside the mail
    /// it was derived from.
    #[must_use]
    pub fn into_engine(self) -> Engine {
        let domains = Arc::new(self.domains.into_domain_list());
        let table = self.table.into_table(domains.configured_default().cloned());
        let transport = RecordingTransport::new();

        internal!(
            level = DEBUG,
            mappings = table.all_mappings().len(),
            local_domains = domains.len(),
            "Rewrite table loaded"
        );

        let processor = RecipientRewriteProcessor::new(
            Arc::new(table),
            domains.clone(),
            domains,
            Arc::new(transport.clone()),
            self.processor,
        )
        .with_audit(AuditTrail::new(self.audit));

        Engine {
            processor,
            transport,
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    processor: RecipientRewriteProcessor,
    transport: RecordingTransport,
}

impl Engine {
    /// Process `mail`, reporting what became of it and of every copy sent on
    ///
    /// # Errors
    ///
    /// Returns an error if the pass failed, see
    /// [`RecipientRewriteProcessor::process_mail`].
    pub async fn process(&mut self, mut mail: Mail) -> Result<Report, ProcessingError> {
        let result = self.processor.process_mail(&mut mail).await;
        let injected = self.transport.take();
        result?;

        Ok(Report {
            mail: MailSummary::new(&mail, mail.state().clone()),
            injected: injected.iter().map(MailSummary::from).collect(),
        })
    }
}

/// A mail as it leaves the processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailSummary {
    pub name: MailName,
    pub state: ProcessingState,
    pub sender: Option<Address>,
    pub recipients: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forwarded_by: Vec<Address>,
}

impl MailSummary {
    fn new(mail: &Mail, state: ProcessingState) -> Self {
        Self {
            name: mail.name(),
            state,
            sender: mail.sender().cloned(),
            recipients: mail.recipients().to_vec(),
            forwarded_by: RecordedRecipients::from_mail(mail).recipients().to_vec(),
        }
    }
}

impl From<&Injected> for MailSummary {
    fn from(injected: &Injected) -> Self {
        Self::new(&injected.mail, injected.effective_state().clone())
    }
}

/// Outcome of processing one mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub mail: MailSummary,
    pub injected: Vec<MailSummary>,
}
