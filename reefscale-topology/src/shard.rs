//! A single shard's node composition and the scope a rule can target it with.

use serde::{Deserialize, Serialize};

use crate::role::{NodeRole, RoleSpec};

/// One shard's node composition: up to three optional role specs, keyed by
/// [`NodeRole`]. Positional identity (`shard_id`, e.g. `"shard-0"`) is the
/// shard's address within the cluster — shards are never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardTopology {
    pub shard_id: String,
    pub electable: Option<RoleSpec>,
    pub analytics: Option<RoleSpec>,
    pub read_only: Option<RoleSpec>,
}

impl ShardTopology {
    pub fn role(&self, role: NodeRole) -> Option<&RoleSpec> {
        match role {
            NodeRole::Electable => self.electable.as_ref(),
            NodeRole::Analytics => self.analytics.as_ref(),
            NodeRole::ReadOnly => self.read_only.as_ref(),
        }
    }

    pub fn role_mut(&mut self, role: NodeRole) -> &mut Option<RoleSpec> {
        match role {
            NodeRole::Electable => &mut self.electable,
            NodeRole::Analytics => &mut self.analytics,
            NodeRole::ReadOnly => &mut self.read_only,
        }
    }
}

/// Which shards a rule or scaling action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardScope {
    AllShards,
    ShardIndex(usize),
}
