//! Forward loop detection
//!
//! Every copy sent on behalf of a forwarding rule records the forwarding
//! address on the copy itself. When the copy comes back through the
//! pipeline, addresses already recorded are neither forwarded again nor
//! forwarded to, which bounds the number of hops any lineage can take by
//! the number of distinct forwarding addresses.

use switchyard_common::{Address, Mail};
use tracing::warn;

/// Attribute holding the recorded addresses as a RON list of strings
pub const RECORDED_RECIPIENTS_ATTRIBUTE: &str = "switchyard.loop-prevention.recorded-recipients";

/// Ordered set of addresses a mail's lineage has already been forwarded by
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedRecipients {
    recipients: Vec<Address>,
}

impl RecordedRecipients {
    #[must_use]
    pub fn new(recipients: impl IntoIterator<Item = Address>) -> Self {
        recipients
            .into_iter()
            .fold(Self::default(), |ledger, address| ledger.merge(address))
    }

    /// Read the ledger carried by `mail`
    ///
    /// Empty if there is none, or if the attribute cannot be decoded.
    #[must_use]
    pub fn from_mail(mail: &Mail) -> Self {
        let Some(value) = mail.attribute(RECORDED_RECIPIENTS_ATTRIBUTE) else {
            return Self::default();
        };

        match ron::from_str::<Vec<Address>>(value) {
            Ok(recipients) => Self::new(recipients),
            Err(err) => {
                warn!(mail = %mail.name(), %err, "Ignoring undecodable recorded recipients");
                Self::default()
            }
        }
    }

    /// The ledger with `address` added
    #[must_use]
    pub fn merge(mut self, address: Address) -> Self {
        if !self.recipients.contains(&address) {
            self.recipients.push(address);
        }
        self
    }

    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.recipients.contains(address)
    }

    /// The candidates not yet recorded, without duplicates, in order
    #[must_use]
    pub fn non_recorded<'a>(&self, candidates: impl IntoIterator<Item = &'a Address>) -> Vec<Address> {
        let mut result: Vec<Address> = Vec::new();
        for candidate in candidates {
            if !self.contains(candidate) && !result.contains(candidate) {
                result.push(candidate.clone());
            }
        }
        result
    }

    /// Store the ledger on `mail`, replacing any it already carried
    pub fn record_on(&self, mail: &mut Mail) {
        match ron::to_string(&self.recipients) {
            Ok(value) => mail.set_attribute(RECORDED_RECIPIENTS_ATTRIBUTE, value),
            Err(err) => warn!(mail = %mail.name(), %err, "Failed to encode recorded recipients"),
        }
    }

    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}
