//! Forward decisions
//!
//! A forwarding rule sends a copy of the mail on, as if the forwarding
//! address had sent it, and removes that address from the original unless
//! it also forwards to itself. A rule whose every target has already been
//! visited by this mail's lineage would lose the mail silently; instead the
//! mail is sent to the error state for that address.

use switchyard_common::{Address, Mail};
use tracing::warn;

use crate::loop_prevention::RecordedRecipients;

/// Header whose `auto-replied` values mark mail that is never forwarded
pub const AUTO_SUBMITTED_HEADER: &str = "Auto-Submitted";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Send a copy from `from` to `to`
    SendCopy { from: Address, to: Vec<Address> },
    /// Drop the address from the live mail
    RemoveRecipient(Address),
    /// Send a copy addressed to the address into the error state
    RecordLoop(Address),
}

/// Decide what to do with `recipient`, whose forward rules point at
/// `forwarded`, given the addresses this mail has already been forwarded by
///
/// Decisions come out in the order they must be applied.
#[must_use]
pub fn decide(
    recipient: &Address,
    forwarded: &[Address],
    ledger: &RecordedRecipients,
) -> Vec<ForwardDecision> {
    if ledger.contains(recipient) {
        return Vec::new();
    }

    let new_recipients = ledger.non_recorded(forwarded);
    let forward_to: Vec<Address> = new_recipients
        .iter()
        .filter(|address| *address != recipient)
        .cloned()
        .collect();
    let local_copy = new_recipients.contains(recipient);

    let mut decisions = Vec::with_capacity(3);

    if !forward_to.is_empty() {
        decisions.push(ForwardDecision::SendCopy {
            from: recipient.clone(),
            to: forward_to.clone(),
        });
    }

    if !local_copy {
        decisions.push(ForwardDecision::RemoveRecipient(recipient.clone()));
    }

    if !forwarded.is_empty() && forward_to.is_empty() && !local_copy {
        decisions.push(ForwardDecision::RecordLoop(recipient.clone()));
    }

    decisions
}

/// Whether `mail` is an automatic reply
///
/// A mail whose headers cannot be parsed is treated as not automatic.
#[must_use]
pub fn is_auto_submitted(mail: &Mail) -> bool {
    match mail.header_values(AUTO_SUBMITTED_HEADER) {
        Ok(values) => values
            .iter()
            .any(|value| value.trim_start().starts_with("auto-replied")),
        Err(err) => {
            warn!(mail = %mail.name(), %err, "Unable to read Auto-Submitted header");
            false
        }
    }
}
