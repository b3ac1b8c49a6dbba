//! Full-mesh bookkeeping.
//!
//! A mesh over N agents consists of one connection per unordered pair of
//! agents, N·(N−1)/2 in total. This module generates those pairs, checks an
//! observed connection count against the expected one, and works out which
//! recorded connections must go when agents leave the mesh.
//!
//! Nothing here talks to the API; the mesh resource feeds it data it fetched.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Agent identifier.
pub type NodeId = i64;

/// An unordered pair of agents. `Pair::new(a, b) == Pair::new(b, a)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    low: NodeId,
    high: NodeId,
}

impl Pair {
    /// Build a pair; endpoint order does not matter.
    pub fn new(a: NodeId, b: NodeId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// The smaller endpoint.
    pub fn low(&self) -> NodeId {
        self.low
    }

    /// The larger endpoint.
    pub fn high(&self) -> NodeId {
        self.high
    }

    /// Whether `node` is either endpoint.
    pub fn contains(&self, node: NodeId) -> bool {
        self.low == node || self.high == node
    }
}

/// Every unordered pair of distinct nodes, in input order.
///
/// Duplicate ids are collapsed first, so a node is never paired with itself
/// and the result has exactly `expected_connections(distinct)` entries.
pub fn pairs(nodes: &[NodeId]) -> Vec<Pair> {
    let mut seen = BTreeSet::new();
    let distinct: Vec<NodeId> = nodes.iter().copied().filter(|n| seen.insert(*n)).collect();

    let mut out = Vec::with_capacity(expected_connections(distinct.len()));
    for (i, a) in distinct.iter().enumerate() {
        for b in &distinct[i + 1..] {
            out.push(Pair::new(*a, *b));
        }
    }
    out
}

/// Number of connections in a full mesh of `nodes` agents.
pub fn expected_connections(nodes: usize) -> usize {
    nodes * nodes.saturating_sub(1) / 2
}

/// Whether `observed` connections is exactly a full mesh of `nodes` agents.
///
/// Any other count means the mesh was changed outside of the provider.
pub fn is_consistent(nodes: usize, observed: usize) -> bool {
    observed == expected_connections(nodes)
}

/// Nodes present in `previous` but not in `desired`.
pub fn removed_nodes(previous: &[NodeId], desired: &[NodeId]) -> BTreeSet<NodeId> {
    let desired: BTreeSet<NodeId> = desired.iter().copied().collect();
    previous
        .iter()
        .copied()
        .filter(|n| !desired.contains(n))
        .collect()
}

/// A subnet exposed on a mesh connection, as kept in resource state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshService {
    /// Subnet identifier.
    pub id: i64,
    /// Name of the service the subnet belongs to.
    pub name: String,
    /// Subnet address.
    pub ip: String,
    /// Service type tag.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Whether the subnet is enabled on this connection.
    pub enabled: bool,
    /// Agent running the service.
    pub agent_id: i64,
}

/// One connection of a mesh, as kept in resource state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// First endpoint as reported by the API.
    pub agent_1_id: NodeId,
    /// Second endpoint as reported by the API.
    pub agent_2_id: NodeId,
    /// Connection group backing this connection.
    pub connection_group_id: i64,
    /// Subnets exposed on the connection.
    #[serde(default)]
    pub services: Vec<MeshService>,
}

impl ConnectionRecord {
    /// The endpoints of this connection.
    pub fn pair(&self) -> Pair {
        Pair::new(self.agent_1_id, self.agent_2_id)
    }
}

/// Connection groups that must be deleted when the mesh shrinks from
/// `previous` to `desired`.
///
/// Only connections touching a removed node are returned. Connections between
/// surviving nodes are left alone. Each group id appears once.
pub fn stale_connection_groups(
    previous: &[NodeId],
    desired: &[NodeId],
    records: &[ConnectionRecord],
) -> Vec<i64> {
    let removed = removed_nodes(previous, desired);
    if removed.is_empty() {
        return Vec::new();
    }

    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|r| {
            let pair = r.pair();
            removed.iter().any(|n| pair.contains(*n))
        })
        .map(|r| r.connection_group_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(a: NodeId, b: NodeId, group: i64) -> ConnectionRecord {
        ConnectionRecord {
            agent_1_id: a,
            agent_2_id: b,
            connection_group_id: group,
            services: vec![],
        }
    }

    #[test]
    fn test_pair_is_unordered() {
        assert_eq!(Pair::new(1, 2), Pair::new(2, 1));
        assert_eq!(Pair::new(9, 3).low(), 3);
        assert_eq!(Pair::new(9, 3).high(), 9);
        assert!(Pair::new(4, 5).contains(5));
        assert!(!Pair::new(4, 5).contains(6));
    }

    #[test]
    fn test_pairs_counts() {
        assert!(pairs(&[]).is_empty());
        assert!(pairs(&[1]).is_empty());
        assert_eq!(pairs(&[1, 2, 3]).len(), 3);
        assert_eq!(pairs(&[1, 2, 3, 4]).len(), 6);
        assert_eq!(pairs(&[1, 2, 3, 4, 5]).len(), expected_connections(5));
    }

    #[test]
    fn test_pairs_unique_and_symmetric() {
        let generated = pairs(&[10, 20, 30]);
        assert_eq!(
            generated,
            vec![Pair::new(10, 20), Pair::new(10, 30), Pair::new(20, 30)]
        );

        let reversed = pairs(&[30, 20, 10]);
        let a: BTreeSet<_> = generated.into_iter().collect();
        let b: BTreeSet<_> = reversed.into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_pairs_collapse_duplicates() {
        let generated = pairs(&[1, 2, 2, 1, 3]);
        assert_eq!(generated.len(), 3);
        assert!(generated.iter().all(|p| p.low() != p.high()));
    }

    #[test]
    fn test_expected_count_check() {
        assert!(is_consistent(3, 3));
        assert!(!is_consistent(3, 2));
        assert!(!is_consistent(3, 4));
        assert!(is_consistent(0, 0));
        assert!(is_consistent(1, 0));
        assert!(is_consistent(4, 6));
    }

    #[test]
    fn test_removed_nodes() {
        let removed = removed_nodes(&[1, 2, 3], &[1, 3, 4]);
        assert_eq!(removed.into_iter().collect::<Vec<_>>(), vec![2]);
        assert!(removed_nodes(&[1, 2], &[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_stale_groups_only_touch_removed_node() {
        let records = vec![record(1, 2, 100), record(1, 3, 101), record(2, 3, 102)];

        let stale = stale_connection_groups(&[1, 2, 3], &[1, 3], &records);
        assert_eq!(stale, vec![100, 102]);
        assert!(!stale.contains(&101));
    }

    #[test]
    fn test_stale_groups_match_either_endpoint() {
        let records = vec![record(2, 1, 100), record(3, 2, 102), record(3, 1, 101)];
        let stale = stale_connection_groups(&[1, 2, 3], &[3, 1], &records);
        assert_eq!(stale, vec![100, 102]);
    }

    #[test]
    fn test_stale_groups_nothing_removed() {
        let records = vec![record(1, 2, 100)];
        assert!(stale_connection_groups(&[1, 2], &[1, 2, 3], &records).is_empty());
    }

    #[test]
    fn test_stale_groups_deduplicated() {
        let records = vec![record(1, 2, 100), record(2, 1, 100)];
        assert_eq!(stale_connection_groups(&[1, 2], &[1], &records), vec![100]);
    }

    #[test]
    fn test_connection_record_state_shape() {
        let json = serde_json::json!({
            "agent_1_id": 1,
            "agent_2_id": 2,
            "connection_group_id": 9,
            "services": [{"id": 5, "name": "web", "ip": "10.0.0.0/24", "type": "http", "enabled": true, "agent_id": 1}]
        });
        let record: ConnectionRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(record.services[0].service_type, "http");
        assert_eq!(serde_json::to_value(&record).unwrap(), json);
    }
}
