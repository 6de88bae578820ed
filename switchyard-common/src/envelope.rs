use serde::{Deserialize, Serialize};

use crate::Address;

/// SMTP envelope of a message: who it is from, and who it is for
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    sender: Option<Address>,
    #[serde(default)]
    recipients: Vec<Address>,
}

impl Envelope {
    #[must_use]
    pub const fn new(sender: Option<Address>, recipients: Vec<Address>) -> Self {
        Self { sender, recipients }
    }

    /// Returns a reference to the sender for this message, `None` for the
    /// null reverse-path
    #[inline]
    pub const fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    /// Returns a mutable reference to the sender for this message
    #[inline]
    pub const fn sender_mut(&mut self) -> &mut Option<Address> {
        &mut self.sender
    }

    /// Returns the recipients for this message
    #[inline]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Returns a mutable reference to the recipients for this message
    #[inline]
    pub const fn recipients_mut(&mut self) -> &mut Vec<Address> {
        &mut self.recipients
    }
}
