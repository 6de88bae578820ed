//! Delivery status notification parameters (RFC 3461)
//!
//! These are the `ENVID`/`RET` MAIL parameters and the per-recipient
//! `NOTIFY`/`ORCPT` RCPT parameters a client supplied, carried alongside
//! the message so that later stages know which notifications were asked for.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::Address;

/// `RET=` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ret {
    Full,
    Headers,
}

/// One value of the `NOTIFY=` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Notify {
    Never,
    Success,
    Failure,
    Delay,
}

/// Per-recipient notification options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientDsnParameters {
    #[serde(default)]
    pub notify: Option<BTreeSet<Notify>>,
    /// Original recipient, as `addr-type;address`
    #[serde(default)]
    pub orcpt: Option<String>,
}

/// Message-wide notification options together with the per-recipient ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsnParameters {
    #[serde(default)]
    pub envid: Option<String>,
    #[serde(default)]
    pub ret: Option<Ret>,
    #[serde(default)]
    rcpt: BTreeMap<Address, RecipientDsnParameters>,
}

impl DsnParameters {
    #[must_use]
    pub const fn new(envid: Option<String>, ret: Option<Ret>) -> Self {
        Self {
            envid,
            ret,
            rcpt: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn recipient(&self, address: &Address) -> Option<&RecipientDsnParameters> {
        self.rcpt.get(address)
    }

    pub fn set_recipient(&mut self, address: Address, parameters: RecipientDsnParameters) {
        self.rcpt.insert(address, parameters);
    }

    pub fn remove_recipient(&mut self, address: &Address) -> Option<RecipientDsnParameters> {
        self.rcpt.remove(address)
    }

    pub fn recipients(&self) -> impl Iterator<Item = (&Address, &RecipientDsnParameters)> {
        self.rcpt.iter()
    }

    #[must_use]
    pub fn recipient_count(&self) -> usize {
        self.rcpt.len()
    }
}
