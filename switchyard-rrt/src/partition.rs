//! Splitting resolved targets into locally and remotely delivered ones

use switchyard_common::{Address, Domain};

use crate::resolver::LocalityOracle;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub local: Vec<Address>,
    pub remote: Vec<Address>,
}

/// Group `targets` by domain, ask `oracle` once per domain, and flatten
/// each side back into a list
///
/// Domains keep the order in which they first appear, and addresses keep
/// their order within a domain.
pub fn partition<O>(targets: impl IntoIterator<Item = Address>, oracle: &O) -> Partition
where
    O: LocalityOracle + ?Sized,
{
    let mut groups: Vec<(Domain, Vec<Address>)> = Vec::new();

    for address in targets {
        match groups
            .iter_mut()
            .find(|(domain, _)| domain == address.domain())
        {
            Some((_, members)) => members.push(address),
            None => groups.push((address.domain().clone(), vec![address])),
        }
    }

    let mut partition = Partition::default();
    for (domain, members) in groups {
        if oracle.is_local(&domain) {
            partition.local.extend(members);
        } else {
            partition.remote.extend(members);
        }
    }

    partition
}
