//! Combines a rule-triggered intent with cluster-wide policy to produce a
//! concrete target topology, or `None` when the change is a no-op.

use thiserror::Error;
use tracing::warn;

use reefscale_rules::ScalingRule;
use reefscale_topology::{is_on_ladder, ClusterTopology, NodeRole, ShardScope};

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("projected shard count {projected} differs from current {current}")]
    ShardCountMismatch { current: usize, projected: usize },

    #[error("shard {shard_id} has an off-ladder tier on either side of the change")]
    OffLadderTier { shard_id: String },
}

/// One role's tier change on one shard, used for dry-run logging and
/// commit-intent descriptions (e.g. `shard-0 electable M20->M30`).
#[derive(Debug, Clone, PartialEq)]
pub struct RoleChange {
    pub shard_id: String,
    pub role: NodeRole,
    pub from: String,
    pub to: String,
}

/// A concrete, validated scaling plan ready to commit.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub target: ClusterTopology,
    pub role_changes: Vec<RoleChange>,
    /// Set when the rule asked for a single shard but
    /// `allow_per_shard_scaling` was false, forcing the scope wide.
    pub widened_to_all_shards: bool,
}

/// Resolves the effective shard scope for a rule under cluster-wide policy.
///
/// Returns `(effective_scope, widened)` — `widened` is true exactly when
/// the rule's own scope was narrowed to a single shard but
/// `allow_per_shard_scaling` forbids that, so the scope was widened back to
/// `AllShards` (a policy override, not an error).
pub fn resolve_scope(rule_scope: ShardScope, scale_all_shards_in_unison: bool, allow_per_shard_scaling: bool) -> (ShardScope, bool) {
    let wants_all = matches!(rule_scope, ShardScope::AllShards) || scale_all_shards_in_unison;
    if wants_all {
        return (ShardScope::AllShards, false);
    }
    if allow_per_shard_scaling {
        (rule_scope, false)
    } else {
        (ShardScope::AllShards, true)
    }
}

/// Plans a scaling action for `current` under `rule`, or returns `Ok(None)`
/// if the resulting topology is identical to `current` (every targeted
/// role was already at a ladder boundary).
pub fn plan(
    current: &ClusterTopology,
    rule: &ScalingRule,
    scale_all_shards_in_unison: bool,
    allow_per_shard_scaling: bool,
) -> Result<Option<PlannedChange>, PlannerError> {
    let (effective_scope, widened) = resolve_scope(rule.shard_scope, scale_all_shards_in_unison, allow_per_shard_scaling);
    if widened {
        warn!(rule = %rule.name, "per-shard scaling disabled; widening scope to ALL_SHARDS");
    }

    let target = current.project(rule.direction.into(), rule.node_type, effective_scope);

    if current.shard_count() != target.shard_count() {
        return Err(PlannerError::ShardCountMismatch { current: current.shard_count(), projected: target.shard_count() });
    }

    let mut role_changes = Vec::new();
    for (current_shard, target_shard) in current.shards.iter().zip(target.shards.iter()) {
        for role in NodeRole::all() {
            let (Some(c), Some(t)) = (current_shard.role(role), target_shard.role(role)) else { continue };
            if c.instance_size == t.instance_size {
                continue;
            }
            if !is_on_ladder(&c.instance_size) || !is_on_ladder(&t.instance_size) {
                return Err(PlannerError::OffLadderTier { shard_id: current_shard.shard_id.clone() });
            }
            role_changes.push(RoleChange {
                shard_id: current_shard.shard_id.clone(),
                role,
                from: c.instance_size.clone(),
                to: t.instance_size.clone(),
            });
        }
    }

    if role_changes.is_empty() {
        return Ok(None);
    }

    Ok(Some(PlannedChange { target, role_changes, widened_to_all_shards: widened }))
}
