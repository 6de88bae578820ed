//! Carrying DSN parameters over to rewritten recipients

use switchyard_common::dsn::{DsnParameters, RecipientDsnParameters};

use crate::decision::Decision;

/// Move each original recipient's DSN entry onto its replacements
///
/// Entries are taken from the parameters as they were before any
/// rewriting, so a recipient rewritten onto another original recipient
/// never picks up an entry that has already moved. Rejected recipients have
/// no replacements, so their entry is simply dropped. Recipients without an
/// entry are skipped.
///
/// When several entries land on the same address, an address that kept
/// itself keeps its own entry; otherwise the first recipient rewritten onto
/// it lends its entry.
#[must_use]
pub fn rewrite_dsn(mut parameters: DsnParameters, decisions: &[Decision]) -> DsnParameters {
    let moved: Vec<(&Decision, RecipientDsnParameters)> = decisions
        .iter()
        .filter_map(|decision| {
            parameters
                .remove_recipient(&decision.original)
                .map(|entry| (decision, entry))
        })
        .collect();

    for (decision, entry) in &moved {
        if decision.outcome.new_recipients().contains(&decision.original) {
            parameters.set_recipient(decision.original.clone(), entry.clone());
        }
    }

    for (decision, entry) in &moved {
        for address in decision.outcome.new_recipients() {
            if parameters.recipient(address).is_none() {
                parameters.set_recipient(address.clone(), entry.clone());
            }
        }
    }

    parameters
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;
    use switchyard_common::{
        Address,
        dsn::{Notify, Ret},
    };

    use super::*;
    use crate::decision::RewriteOutcome;

    fn address(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn entry(notify: Notify) -> RecipientDsnParameters {
        RecipientDsnParameters {
            notify: Some(BTreeSet::from([notify])),
            orcpt: None,
        }
    }

    fn success(original: &str, new: &[&str]) -> Decision {
        Decision {
            original: address(original),
            outcome: RewriteOutcome::Success(new.iter().map(|a| address(a)).collect()),
            remote: Vec::new(),
        }
    }

    #[test]
    fn test_entry_fans_out() {
        let mut dsn = DsnParameters::new(Some("id".to_string()), Some(Ret::Full));
        dsn.set_recipient(address("group@x.org"), entry(Notify::Failure));
        dsn.set_recipient(address("other@x.org"), entry(Notify::Success));

        let rewritten = rewrite_dsn(dsn, &[success("group@x.org", &["a@x.org", "b@x.org"])]);

        assert_eq!(rewritten.recipient_count(), 3);
        assert_eq!(rewritten.recipient(&address("group@x.org")), None);
        assert_eq!(
            rewritten.recipient(&address("a@x.org")),
            Some(&entry(Notify::Failure))
        );
        assert_eq!(
            rewritten.recipient(&address("b@x.org")),
            Some(&entry(Notify::Failure))
        );
        assert_eq!(
            rewritten.recipient(&address("other@x.org")),
            Some(&entry(Notify::Success))
        );
        assert_eq!(rewritten.envid.as_deref(), Some("id"));
        assert_eq!(rewritten.ret, Some(Ret::Full));
    }

    #[test]
    fn test_error_drops_entry() {
        let mut dsn = DsnParameters::default();
        dsn.set_recipient(address("gone@x.org"), entry(Notify::Failure));

        let rewritten = rewrite_dsn(dsn, &[Decision::error(address("gone@x.org"))]);
        assert_eq!(rewritten.recipient_count(), 0);
    }

    #[test]
    fn test_missing_entry_is_noop() {
        let mut dsn = DsnParameters::default();
        dsn.set_recipient(address("kept@x.org"), entry(Notify::Delay));

        let rewritten = rewrite_dsn(dsn.clone(), &[success("alias@x.org", &["bob@x.org"])]);
        assert_eq!(rewritten, dsn);
    }

    #[test]
    fn test_pass_through_keeps_entry() {
        let mut dsn = DsnParameters::default();
        dsn.set_recipient(address("same@x.org"), entry(Notify::Never));

        let rewritten = rewrite_dsn(dsn.clone(), &[Decision::pass_through(address("same@x.org"))]);
        assert_eq!(rewritten, dsn);
    }

    #[test]
    fn test_chained_rewrite_moves_each_entry_once() {
        let mut dsn = DsnParameters::default();
        dsn.set_recipient(address("a@x.org"), entry(Notify::Failure));
        dsn.set_recipient(address("b@x.org"), entry(Notify::Success));

        let rewritten = rewrite_dsn(
            dsn,
            &[
                success("a@x.org", &["b@x.org"]),
                success("b@x.org", &["c@x.org"]),
            ],
        );

        assert_eq!(rewritten.recipient_count(), 2);
        assert_eq!(rewritten.recipient(&address("a@x.org")), None);
        assert_eq!(
            rewritten.recipient(&address("b@x.org")),
            Some(&entry(Notify::Failure))
        );
        assert_eq!(
            rewritten.recipient(&address("c@x.org")),
            Some(&entry(Notify::Success))
        );
    }

    #[test]
    fn test_recipient_keeping_itself_keeps_its_entry() {
        let mut dsn = DsnParameters::default();
        dsn.set_recipient(address("a@x.org"), entry(Notify::Failure));
        dsn.set_recipient(address("b@x.org"), entry(Notify::Success));

        let rewritten = rewrite_dsn(
            dsn,
            &[
                success("a@x.org", &["b@x.org"]),
                Decision::pass_through(address("b@x.org")),
            ],
        );

        assert_eq!(rewritten.recipient_count(), 1);
        assert_eq!(
            rewritten.recipient(&address("b@x.org")),
            Some(&entry(Notify::Success))
        );
    }

    #[test]
    fn test_first_recipient_wins_shared_target() {
        let mut dsn = DsnParameters::default();
        dsn.set_recipient(address("a@x.org"), entry(Notify::Failure));
        dsn.set_recipient(address("b@x.org"), entry(Notify::Delay));

        let rewritten = rewrite_dsn(
            dsn,
            &[
                success("a@x.org", &["shared@x.org"]),
                success("b@x.org", &["shared@x.org", "own@x.org"]),
            ],
        );

        assert_eq!(rewritten.recipient_count(), 2);
        assert_eq!(
            rewritten.recipient(&address("shared@x.org")),
            Some(&entry(Notify::Failure))
        );
        assert_eq!(
            rewritten.recipient(&address("own@x.org")),
            Some(&entry(Notify::Delay))
        );
    }
}
