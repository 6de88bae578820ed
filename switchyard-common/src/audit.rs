//! Audit logging for recipient rewriting
//!
//! Every pass over a mail records how its recipients changed, and every
//! forwarded copy is recorded with who forwarded it to whom. Events are
//! emitted through `tracing` at `INFO` with an `event` field naming them,
//! so they can be filtered out of the regular log stream.
//!
//! ## Audit Events
//!
//! - `RecipientsRewritten`: recipients of a mail before and after rewriting
//! - `MailForwarded`: a copy of a mail was sent on behalf of a forwarding rule
//!
//! ## PII Redaction
//!
//! Local parts of addresses can be redacted, keeping the domain, based on
//! the [`AuditConfig`].

use serde::{Deserialize, Serialize};

use crate::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Redact sender addresses from audit logs
    #[serde(default)]
    pub redact_sender: bool,

    /// Redact recipient addresses from audit logs
    #[serde(default)]
    pub redact_recipients: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redact_sender: false,
            redact_recipients: false,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Redact the local part of an email address if redaction is enabled
#[must_use]
pub fn redact_email(email: &str, redact: bool) -> String {
    if !redact {
        return email.to_string();
    }

    email
        .rsplit_once('@')
        .map_or_else(|| "[REDACTED]".to_string(), |(_, domain)| {
            format!("[REDACTED]@{domain}")
        })
}

/// Redact multiple email addresses
#[must_use]
pub fn redact_addresses(addresses: &[Address], redact: bool) -> Vec<String> {
    addresses
        .iter()
        .map(|address| redact_email(&address.to_string(), redact))
        .collect()
}

/// Emits audit events according to an [`AuditConfig`]
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    config: AuditConfig,
}

impl AuditTrail {
    #[must_use]
    pub const fn new(config: AuditConfig) -> Self {
        Self { config }
    }

    fn sender(&self, sender: Option<&Address>) -> String {
        sender.map_or_else(
            || "<>".to_string(),
            |sender| redact_email(&sender.to_string(), self.config.redact_sender),
        )
    }

    /// Log recipients rewritten event
    ///
    /// # Fields
    /// - `mail`: Name of the mail
    /// - `message_id`: `Message-ID` header, empty if absent
    /// - `sender`: Envelope sender (redacted if configured)
    /// - `before`: Recipients before rewriting (redacted if configured)
    /// - `after`: Recipients after rewriting (redacted if configured)
    pub fn recipients_rewritten(
        &self,
        mail: &str,
        message_id: Option<&str>,
        sender: Option<&Address>,
        before: &[Address],
        after: &[Address],
    ) {
        if !self.config.enabled {
            return;
        }

        let before = redact_addresses(before, self.config.redact_recipients);
        let after = redact_addresses(after, self.config.redact_recipients);

        tracing::event!(
            tracing::Level::INFO,
            event = "RecipientsRewritten",
            mail = %mail,
            message_id = %message_id.unwrap_or_default(),
            sender = %self.sender(sender),
            before = ?before,
            after = ?after,
            "Audit: Recipients rewritten"
        );
    }

    /// Log mail forwarded event
    ///
    /// # Fields
    /// - `mail`: Name of the forwarded copy
    /// - `message_id`: `Message-ID` header, empty if absent
    /// - `forwarded_by`: Address whose forwarding rule applied
    /// - `recipients`: Addresses the copy was sent to
    pub fn mail_forwarded(
        &self,
        mail: &str,
        message_id: Option<&str>,
        forwarded_by: &Address,
        recipients: &[Address],
    ) {
        if !self.config.enabled {
            return;
        }

        let recipients = redact_addresses(recipients, self.config.redact_recipients);

        tracing::event!(
            tracing::Level::INFO,
            event = "MailForwarded",
            mail = %mail,
            message_id = %message_id.unwrap_or_default(),
            forwarded_by = %redact_email(&forwarded_by.to_string(), self.config.redact_recipients),
            recipients = ?recipients,
            "Audit: Mail forwarded"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_redact_email() {
        assert_eq!(
            redact_email("user@example.com", true),
            "[REDACTED]@example.com"
        );
        assert_eq!(redact_email("user@example.com", false), "user@example.com");
        assert_eq!(redact_email("invalid", true), "[REDACTED]");
    }

    #[test]
    fn test_redact_addresses() {
        let addresses = vec![
            Address::parse("user1@example.com").unwrap(),
            Address::parse("user2@example.org").unwrap(),
        ];

        assert_eq!(
            redact_addresses(&addresses, true),
            vec!["[REDACTED]@example.com", "[REDACTED]@example.org"]
        );
        assert_eq!(
            redact_addresses(&addresses, false),
            vec!["user1@example.com", "user2@example.org"]
        );
    }

    #[test]
    fn test_null_sender_is_rendered() {
        let trail = AuditTrail::new(AuditConfig {
            redact_sender: true,
            ..AuditConfig::default()
        });
        assert_eq!(trail.sender(None), "<>");
        assert_eq!(
            trail.sender(Some(&Address::parse("a@b.example").unwrap())),
            "[REDACTED]@b.example"
        );
    }

    #[test]
    fn test_config_defaults_from_ron() {
        let config: AuditConfig = ron::from_str("(redact_recipients: true)").unwrap();
        assert!(config.enabled);
        assert!(!config.redact_sender);
        assert!(config.redact_recipients);
    }

    #[test]
    fn test_disabled_trail_is_silent() {
        let trail = AuditTrail::new(AuditConfig {
            enabled: false,
            ..AuditConfig::default()
        });
        let address = Address::parse("a@b.example").unwrap();

        trail.recipients_rewritten("mail", None, None, &[], &[address.clone()]);
        trail.mail_forwarded("mail", Some("<id@x>"), &address, &[]);
    }
}
