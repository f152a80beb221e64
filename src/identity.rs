//! Identity reconciliation.
//!
//! Maps internal peer records to the external identities of one source.
//! This is a filter, not a validation gate: peers lacking the relevant
//! mapping are partitioned out, never rejected, and the excluded subset
//! is returned so the caller can report the gap instead of silently
//! shrinking its input.

use crate::models::{PeerIdentity, Source};

/// A peer together with its resolved external identity for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    /// Internal id of the peer.
    pub internal_id: String,
    /// Display name for reports.
    pub display_name: String,
    /// GitHub login or Jira account id, depending on the source.
    pub external_id: String,
}

/// Outcome of reconciling a roster against one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentitySplit {
    /// Peers with a mapping for the source, in roster order.
    pub included: Vec<ResolvedIdentity>,
    /// Display names of peers without a mapping, in roster order.
    pub excluded: Vec<String>,
}

impl IdentitySplit {
    /// The external identifiers of the included peers, in roster order.
    pub fn external_ids(&self) -> Vec<String> {
        self.included.iter().map(|r| r.external_id.clone()).collect()
    }

    /// True when no peer is mapped for the source. Downstream fetch must
    /// short-circuit in this case: an empty OR-clause or author array can
    /// be misread by the external API as "no filter".
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }
}

/// Partitions a roster into peers mapped for `source` and peers without
/// a mapping. Roster order is preserved on both sides.
pub fn reconcile(peers: &[PeerIdentity], source: Source) -> IdentitySplit {
    let mut split = IdentitySplit::default();

    for peer in peers {
        match peer.identity_for(source) {
            Some(external_id) => split.included.push(ResolvedIdentity {
                internal_id: peer.internal_id.clone(),
                display_name: peer.display_name.clone(),
                external_id: external_id.to_string(),
            }),
            None => split.excluded.push(peer.display_name.clone()),
        }
    }

    split
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str, github: Option<&str>, jira: Option<&str>) -> PeerIdentity {
        PeerIdentity {
            internal_id: id.to_string(),
            display_name: format!("Peer {}", id),
            github_login: github.map(String::from),
            jira_account_id: jira.map(String::from),
        }
    }

    #[test]
    fn test_reconcile_partitions_by_source() {
        let peers = vec![
            peer("1", Some("alice"), Some("acc-1")),
            peer("2", Some("bob"), None),
            peer("3", None, Some("acc-3")),
        ];

        let github = reconcile(&peers, Source::Github);
        assert_eq!(github.external_ids(), vec!["alice", "bob"]);
        assert_eq!(github.excluded, vec!["Peer 3"]);

        let jira = reconcile(&peers, Source::Jira);
        assert_eq!(jira.external_ids(), vec!["acc-1", "acc-3"]);
        assert_eq!(jira.excluded, vec!["Peer 2"]);
    }

    #[test]
    fn test_reconcile_preserves_roster_order() {
        let peers = vec![
            peer("z", Some("zoe"), None),
            peer("a", Some("amy"), None),
        ];

        let split = reconcile(&peers, Source::Github);
        assert_eq!(split.external_ids(), vec!["zoe", "amy"]);
    }

    #[test]
    fn test_reconcile_all_unmapped_is_empty() {
        let peers = vec![peer("1", None, None), peer("2", None, None)];

        let split = reconcile(&peers, Source::Github);
        assert!(split.is_empty());
        assert_eq!(split.excluded.len(), 2);
    }

    #[test]
    fn test_reconcile_empty_roster() {
        let split = reconcile(&[], Source::Jira);
        assert!(split.is_empty());
        assert!(split.excluded.is_empty());
    }
}
