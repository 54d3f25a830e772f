//! A cluster's full mutable topology and its observed lifecycle state.

use serde::{Deserialize, Serialize};

use crate::role::NodeRole;
use crate::shard::ShardTopology;
use crate::tier;

/// The control plane's reported lifecycle state for a cluster. Only `Idle`
/// clusters are ever evaluated or mutated by the autoscaler — every other
/// state is a skip, to avoid racing an in-flight operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterState {
    Idle,
    Updating,
    Repairing,
    Deleting,
    Creating,
    Unknown(String),
}

impl ClusterState {
    pub fn parse(state_name: &str) -> Self {
        match state_name {
            "IDLE" => ClusterState::Idle,
            "UPDATING" => ClusterState::Updating,
            "REPAIRING" => ClusterState::Repairing,
            "DELETING" => ClusterState::Deleting,
            "CREATING" => ClusterState::Creating,
            other => ClusterState::Unknown(other.to_string()),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ClusterState::Idle)
    }
}

/// One cluster's full mutable topology, materialized fresh from a cluster
/// description on each monitoring tick and discarded after the decision is
/// made — the daemon never holds on to a `ClusterTopology` across ticks.
///
/// Invariant: all shards share `provider_name`/`region_name` — the cluster
/// is single-region for scaling purposes (only the first region config of
/// each shard is read; see [`crate::wire::parse_topology`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub cluster_name: String,
    pub provider_name: String,
    pub region_name: String,
    pub shards: Vec<ShardTopology>,
}

impl ClusterTopology {
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Projects a scale intent into a new topology without mutating `self`.
    ///
    /// For each shard in `scope`, moves `node_type`'s `instance_size` one
    /// step in `direction` along the tier ladder if the role is present on
    /// that shard; node counts, role presence, shard count, provider, and
    /// region are always preserved.
    pub fn project(
        &self,
        direction: tier::Direction,
        node_type: NodeRole,
        scope: crate::shard::ShardScope,
    ) -> ClusterTopology {
        let mut target = self.clone();
        for (i, shard) in target.shards.iter_mut().enumerate() {
            let in_scope = match scope {
                crate::shard::ShardScope::AllShards => true,
                crate::shard::ShardScope::ShardIndex(idx) => idx == i,
            };
            if !in_scope {
                continue;
            }
            if let Some(spec) = shard.role_mut(node_type) {
                spec.instance_size = tier::step(&spec.instance_size, direction);
            }
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleSpec;
    use crate::shard::ShardScope;

    fn sample() -> ClusterTopology {
        ClusterTopology {
            cluster_name: "sample".into(),
            provider_name: "AWS".into(),
            region_name: "US_EAST_1".into(),
            shards: vec![
                ShardTopology {
                    shard_id: "shard-0".into(),
                    electable: Some(RoleSpec { instance_size: "M30".into(), node_count: 3 }),
                    analytics: None,
                    read_only: None,
                },
                ShardTopology {
                    shard_id: "shard-1".into(),
                    electable: Some(RoleSpec { instance_size: "M30".into(), node_count: 3 }),
                    analytics: None,
                    read_only: None,
                },
            ],
        }
    }

    #[test]
    fn project_preserves_shard_count() {
        let t = sample();
        let projected = t.project(tier::Direction::Up, NodeRole::Electable, ShardScope::AllShards);
        assert_eq!(projected.shard_count(), t.shard_count());
    }

    #[test]
    fn project_all_shards_moves_every_electable() {
        let t = sample();
        let projected = t.project(tier::Direction::Up, NodeRole::Electable, ShardScope::AllShards);
        for shard in &projected.shards {
            assert_eq!(shard.electable.as_ref().unwrap().instance_size, "M40");
        }
    }

    #[test]
    fn project_single_shard_leaves_others_unchanged() {
        let t = sample();
        let projected = t.project(tier::Direction::Up, NodeRole::Electable, ShardScope::ShardIndex(0));
        assert_eq!(projected.shards[0].electable.as_ref().unwrap().instance_size, "M40");
        assert_eq!(projected.shards[1].electable.as_ref().unwrap().instance_size, "M30");
    }

    #[test]
    fn project_preserves_node_counts() {
        let t = sample();
        let projected = t.project(tier::Direction::Up, NodeRole::Electable, ShardScope::AllShards);
        for (orig, proj) in t.shards.iter().zip(projected.shards.iter()) {
            assert_eq!(
                orig.electable.as_ref().unwrap().node_count,
                proj.electable.as_ref().unwrap().node_count
            );
        }
    }

    #[test]
    fn up_then_down_is_idempotent_away_from_boundary() {
        let t = sample();
        let up = t.project(tier::Direction::Up, NodeRole::Electable, ShardScope::AllShards);
        let back = up.project(tier::Direction::Down, NodeRole::Electable, ShardScope::AllShards);
        assert_eq!(back, t);
    }

    #[test]
    fn project_on_absent_role_is_a_no_op() {
        let t = sample();
        let projected = t.project(tier::Direction::Up, NodeRole::Analytics, ShardScope::AllShards);
        assert_eq!(projected, t);
    }
}
