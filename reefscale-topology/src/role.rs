//! Node roles within a shard and the per-role instance spec.

use serde::{Deserialize, Serialize};

/// A node role within a shard. ELECTABLE participates in elections;
/// ANALYTICS and READ_ONLY never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRole {
    Electable,
    Analytics,
    ReadOnly,
}

impl NodeRole {
    pub fn all() -> [NodeRole; 3] {
        [NodeRole::Electable, NodeRole::Analytics, NodeRole::ReadOnly]
    }
}

/// The instance size and node count backing one role on one shard.
///
/// `node_count` may be 0 for ANALYTICS/READ_ONLY, meaning the role is
/// present in the wire payload but logically absent. ELECTABLE must have
/// `node_count >= 1` whenever the role itself is present (callers enforce
/// this when constructing a [`crate::ShardTopology`] from parsed input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub instance_size: String,
    pub node_count: u32,
}
