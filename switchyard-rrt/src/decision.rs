//! Per-recipient rewrite decisions and their aggregate

use switchyard_common::Address;

/// What became of one original recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Deliver locally to these addresses instead
    Success(Vec<Address>),
    /// The recipient was rejected by an error mapping
    Error(Address),
}

impl RewriteOutcome {
    /// Addresses that replace the original recipient, none for an error
    #[must_use]
    pub fn new_recipients(&self) -> &[Address] {
        match self {
            Self::Success(addresses) => addresses,
            Self::Error(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub original: Address,
    pub outcome: RewriteOutcome,
    /// Remote targets, which leave in a separate copy of the mail
    pub remote: Vec<Address>,
}

impl Decision {
    #[must_use]
    pub fn pass_through(original: Address) -> Self {
        Self {
            outcome: RewriteOutcome::Success(vec![original.clone()]),
            original,
            remote: Vec::new(),
        }
    }

    #[must_use]
    pub fn error(original: Address) -> Self {
        Self {
            outcome: RewriteOutcome::Error(original.clone()),
            original,
            remote: Vec::new(),
        }
    }
}

/// Union of every recipient's outcome
///
/// Both lists are duplicate-free and keep first-seen order, so merging is
/// associative and, taken as sets, commutative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateOutcome {
    pub new_recipients: Vec<Address>,
    pub recipients_with_error: Vec<Address>,
}

impl AggregateOutcome {
    pub fn add(&mut self, outcome: &RewriteOutcome) {
        match outcome {
            RewriteOutcome::Success(addresses) => {
                extend_unique(&mut self.new_recipients, addresses.iter().cloned());
            }
            RewriteOutcome::Error(address) => {
                extend_unique(&mut self.recipients_with_error, [address.clone()]);
            }
        }
    }

    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        extend_unique(&mut self.new_recipients, other.new_recipients);
        extend_unique(&mut self.recipients_with_error, other.recipients_with_error);
        self
    }
}

impl<'a> FromIterator<&'a Decision> for AggregateOutcome {
    fn from_iter<T: IntoIterator<Item = &'a Decision>>(iter: T) -> Self {
        let mut aggregate = Self::default();
        for decision in iter {
            aggregate.add(&decision.outcome);
        }
        aggregate
    }
}

fn extend_unique(into: &mut Vec<Address>, addresses: impl IntoIterator<Item = Address>) {
    for address in addresses {
        if !into.contains(&address) {
            into.push(address);
        }
    }
}
