//! Recipient rewriting for one mail at a time
//!
//! A pass over a mail runs in two phases. First every recipient is looked
//! up and a [`Decision`] made for it, without touching the mail or the
//! transport, so a failing lookup leaves no trace. Then the decisions are
//! carried out: remote targets leave in their own copies, rejected
//! recipients bounce in one copy sent to the error state, the mail's
//! recipients and DSN parameters are replaced, and finally forwarding rules
//! are applied.

use std::{future::Future, sync::Arc};

use switchyard_common::{Address, Domain, Mail, ProcessingState, audit::AuditTrail, rewrite};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{
    config::ProcessorConfig,
    decision::{AggregateOutcome, Decision, RewriteOutcome},
    dsn::rewrite_dsn,
    error::{ProcessingError, Result, RrtError},
    forward::{self, ForwardDecision},
    loop_prevention::RecordedRecipients,
    mapping::{MappingKind, MappingKinds, MappingSource, Mappings},
    partition::{Partition, partition},
    resolver::{DefaultDomainProvider, LocalityOracle, MappingResolver, RewriteResult},
    transport::Transport,
};

/// State shared by the lookups of a single pass
///
/// The default domain is only fetched if some target needs it, and then at
/// most once.
struct Pass<'a> {
    provider: &'a dyn DefaultDomainProvider,
    default_domain: OnceCell<Domain>,
}

impl<'a> Pass<'a> {
    fn new(provider: &'a dyn DefaultDomainProvider) -> Self {
        Self {
            provider,
            default_domain: OnceCell::new(),
        }
    }

    /// The addresses `mappings` point at, completed with the default domain
    async fn addresses(&self, mappings: Mappings) -> Result<Vec<Address>> {
        let mut addresses = Vec::with_capacity(mappings.len());

        for mapping in mappings {
            let mapping = if mapping.needs_domain() {
                let domain = self
                    .default_domain
                    .get_or_try_init(|| self.provider.default_domain())
                    .await?;
                mapping.append_domain_if_none(domain)
            } else {
                mapping
            };

            match mapping.as_address() {
                Some(address) if !addresses.contains(&address) => addresses.push(address),
                Some(_) => {}
                None => debug!(%mapping, "Mapping target is not an address, skipping"),
            }
        }

        Ok(addresses)
    }
}

pub struct RecipientRewriteProcessor {
    resolver: Arc<dyn MappingResolver>,
    default_domain: Arc<dyn DefaultDomainProvider>,
    locality: Arc<dyn LocalityOracle>,
    transport: Arc<dyn Transport>,
    config: ProcessorConfig,
    audit: AuditTrail,
    kinds: MappingKinds,
}

impl std::fmt::Debug for RecipientRewriteProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientRewriteProcessor")
            .field("config", &self.config)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

impl RecipientRewriteProcessor {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn MappingResolver>,
        default_domain: Arc<dyn DefaultDomainProvider>,
        locality: Arc<dyn LocalityOracle>,
        transport: Arc<dyn Transport>,
        config: ProcessorConfig,
    ) -> Self {
        let kinds = if config.rewrite_sender_upon_forward {
            MappingKinds::all().without(MappingKind::Forward)
        } else {
            MappingKinds::all()
        };

        Self {
            resolver,
            default_domain,
            locality,
            transport,
            config,
            audit: AuditTrail::default(),
            kinds,
        }
    }

    #[must_use]
    pub fn with_audit(mut self, audit: AuditTrail) -> Self {
        self.audit = audit;
        self
    }

    /// The mapping kinds resolved while rewriting recipients
    #[must_use]
    pub const fn kinds(&self) -> MappingKinds {
        self.kinds
    }

    /// Rewrite the recipients of `mail`, then apply forwarding rules
    ///
    /// # Errors
    ///
    /// Returns an error if a lookup fails while rewriting recipients, in
    /// which case `mail` is left untouched and nothing has been injected, or
    /// if the transport refuses a redirected or bounced copy. A failed
    /// forwarding lookup is reported after the recipients of `mail` have
    /// been replaced and its redirected and bounced copies injected.
    #[tracing::instrument(level = "debug", skip_all, fields(mail = %mail.name()))]
    pub async fn process_mail(&self, mail: &mut Mail) -> std::result::Result<(), ProcessingError> {
        let pass = Pass::new(self.default_domain.as_ref());
        let before = mail.recipients().to_vec();

        let mut decisions = Vec::with_capacity(before.len());
        for recipient in &before {
            decisions.push(self.decide(recipient, &pass).await?);
        }

        let outcome: AggregateOutcome = decisions.iter().collect();

        self.redirect_remote(mail, &decisions).await?;
        self.bounce(mail, &outcome.recipients_with_error).await?;

        if outcome.new_recipients.is_empty() {
            debug!(mail = %mail.name(), "No recipients left, ghosting mail");
            mail.set_state(ProcessingState::GHOST);
        }
        mail.set_recipients(outcome.new_recipients);

        if let Some(dsn) = mail.dsn().cloned() {
            mail.set_dsn(Some(rewrite_dsn(dsn, &decisions)));
        }

        self.audit.recipients_rewritten(
            &mail.name().to_string(),
            mail.message_id().as_deref(),
            mail.sender(),
            &before,
            mail.recipients(),
        );

        self.forwards(mail, &pass).await
    }

    /// Apply forwarding rules to the current recipients of `mail`
    ///
    /// Does nothing unless `rewrite_sender_upon_forward` is set, or for
    /// automatic replies unless `forward_auto_submitted_emails` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if looking up forwarding rules fails. Copies the
    /// transport refuses are logged and otherwise ignored.
    #[tracing::instrument(level = "debug", skip_all, fields(mail = %mail.name()))]
    pub async fn process_forwards(&self, mail: &mut Mail) -> std::result::Result<(), ProcessingError> {
        let pass = Pass::new(self.default_domain.as_ref());
        self.forwards(mail, &pass).await
    }

    async fn lookup<T>(&self, lookup: impl Future<Output = Result<T>> + Send) -> Result<T> {
        match self.config.lookup_timeout() {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .map_err(|_| RrtError::Timeout(limit))?,
            None => lookup.await,
        }
    }

    async fn decide(&self, recipient: &Address, pass: &Pass<'_>) -> Result<Decision> {
        let Some(source) = MappingSource::from_address(recipient) else {
            debug!(%recipient, "Address cannot be a mapping source, leaving it as is");
            return Ok(Decision::pass_through(recipient.clone()));
        };

        match self.lookup(self.resolver.resolve(&source, self.kinds)).await? {
            RewriteResult::MappingError(error) => {
                warn!(%recipient, %error, "Could not rewrite recipient");
                Ok(Decision::error(recipient.clone()))
            }
            RewriteResult::Success(mappings) if mappings.is_empty() => {
                Ok(Decision::pass_through(recipient.clone()))
            }
            RewriteResult::Success(mappings) => {
                let targets = pass.addresses(mappings).await?;
                let Partition { local, remote } = partition(targets, self.locality.as_ref());

                Ok(Decision {
                    original: recipient.clone(),
                    outcome: RewriteOutcome::Success(local),
                    remote,
                })
            }
        }
    }

    async fn redirect_remote(
        &self,
        mail: &Mail,
        decisions: &[Decision],
    ) -> std::result::Result<(), ProcessingError> {
        for decision in decisions.iter().filter(|d| !d.remote.is_empty()) {
            let mut copy = mail.duplicate();
            copy.set_recipients(decision.remote.clone());
            let copy_name = copy.name();

            self.transport.inject(copy, None).await?;

            rewrite!(
                level = INFO,
                mail = %mail.name(),
                copy = %copy_name,
                recipient = %decision.original,
                remote = ?decision.remote,
                "Mail redirected to remote recipients"
            );
        }

        Ok(())
    }

    async fn bounce(
        &self,
        mail: &Mail,
        recipients: &[Address],
    ) -> std::result::Result<(), ProcessingError> {
        if recipients.is_empty() {
            return Ok(());
        }

        let state = self.config.error_processor.clone();
        let mut copy = mail.duplicate();
        copy.set_recipients(recipients.to_vec());
        copy.set_state(state.clone());
        let copy_name = copy.name();

        self.transport.inject(copy, Some(state.clone())).await?;

        rewrite!(
            level = INFO,
            mail = %mail.name(),
            copy = %copy_name,
            recipients = ?recipients,
            %state,
            "Rejected recipients sent to error state"
        );

        Ok(())
    }

    async fn forwards(&self, mail: &mut Mail, pass: &Pass<'_>) -> std::result::Result<(), ProcessingError> {
        if !self.config.rewrite_sender_upon_forward {
            return Ok(());
        }
        if !self.config.forward_auto_submitted_emails && forward::is_auto_submitted(mail) {
            debug!(mail = %mail.name(), "Not forwarding automatic reply");
            return Ok(());
        }

        let ledger = RecordedRecipients::from_mail(mail);
        let recipients = mail.recipients().to_vec();

        let mut decisions = Vec::new();
        for recipient in &recipients {
            let Some(source) = MappingSource::from_address(recipient) else {
                continue;
            };

            let forwards = self.lookup(self.resolver.resolve_forwards(&source)).await?;
            if forwards.is_empty() {
                continue;
            }

            let forwarded = pass.addresses(forwards).await?;
            decisions.extend(forward::decide(recipient, &forwarded, &ledger));
        }

        self.apply(mail, &ledger, decisions).await;

        Ok(())
    }

    /// Carry out forward decisions in order
    ///
    /// Removals are collected and applied as a single replacement of the
    /// recipient list once every copy has been sent.
    async fn apply(&self, mail: &mut Mail, ledger: &RecordedRecipients, decisions: Vec<ForwardDecision>) {
        let mut removed: Vec<Address> = Vec::new();

        for decision in decisions {
            match decision {
                ForwardDecision::SendCopy { from, to } => {
                    let mut copy = mail.duplicate();
                    copy.set_sender(Some(from.clone()));
                    copy.set_recipients(to.clone());
                    ledger.clone().merge(from.clone()).record_on(&mut copy);
                    let copy_name = copy.name();

                    match self.transport.inject(copy, None).await {
                        Ok(()) => self.audit.mail_forwarded(
                            &copy_name.to_string(),
                            mail.message_id().as_deref(),
                            &from,
                            &to,
                        ),
                        Err(err) => {
                            warn!(mail = %mail.name(), forwarded_by = %from, %err, "Unable to send forwarded copy");
                        }
                    }
                }
                ForwardDecision::RemoveRecipient(recipient) => removed.push(recipient),
                ForwardDecision::RecordLoop(recipient) => {
                    let state = self.config.error_processor.clone();
                    let mut copy = mail.duplicate();
                    copy.set_recipients(vec![recipient.clone()]);
                    copy.set_state(state.clone());

                    warn!(mail = %mail.name(), %recipient, "Forward loop detected, sending to error state");

                    if let Err(err) = self.transport.inject(copy, Some(state)).await {
                        warn!(mail = %mail.name(), %recipient, %err, "Unable to record forward loop");
                    }
                }
            }
        }

        if !removed.is_empty() {
            let remaining = mail
                .recipients()
                .iter()
                .filter(|recipient| !removed.contains(recipient))
                .cloned()
                .collect();
            mail.set_recipients(remaining);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use super::*;
    use crate::mapping::Mapping;

    struct CountingDomains {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DefaultDomainProvider for CountingDomains {
        async fn default_domain(&self) -> Result<Domain> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Domain::new("default.org"))
        }
    }

    #[tokio::test]
    async fn test_default_domain_fetched_once_per_pass() {
        let provider = CountingDomains {
            calls: AtomicUsize::new(0),
        };
        let pass = Pass::new(&provider);

        let mappings: Mappings = ["alias:a", "alias:b", "alias:c@x.org"]
            .iter()
            .map(|m| m.parse::<Mapping>().unwrap())
            .collect();

        let first = pass.addresses(mappings.clone()).await.unwrap();
        let second = pass.addresses(mappings).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                Address::parse("a@default.org").unwrap(),
                Address::parse("b@default.org").unwrap(),
                Address::parse("c@x.org").unwrap(),
            ]
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_domain_not_fetched_when_unneeded() {
        let provider = CountingDomains {
            calls: AtomicUsize::new(0),
        };
        let pass = Pass::new(&provider);

        let mappings: Mappings = std::iter::once("alias:c@x.org".parse::<Mapping>().unwrap()).collect();
        pass.addresses(mappings).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_forward_kind_excluded_only_when_forwards_handled_separately() {
        use crate::backends::{MemoryDomainList, MemoryRewriteTable, RecordingTransport};

        let build = |rewrite_sender_upon_forward| {
            RecipientRewriteProcessor::new(
                Arc::new(MemoryRewriteTable::new()),
                Arc::new(MemoryDomainList::default()),
                Arc::new(MemoryDomainList::default()),
                Arc::new(RecordingTransport::new()),
                ProcessorConfig {
                    rewrite_sender_upon_forward,
                    ..ProcessorConfig::default()
                },
            )
        };

        assert!(build(false).kinds().contains(MappingKind::Forward));
        assert!(!build(true).kinds().contains(MappingKind::Forward));
    }
}
