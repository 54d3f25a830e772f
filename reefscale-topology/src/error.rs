use thiserror::Error;

/// Errors raised while parsing a control-plane cluster description into a
/// [`crate::ClusterTopology`]. These never cross the HTTP boundary — a
/// caller that hits one logs and skips the cluster for this tick.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("cluster description has no replicationSpecs")]
    NoShards,

    #[error("shard {shard_id} has no region configs")]
    NoRegionConfig { shard_id: String },

    #[error("electable role present with node_count 0 on shard {shard_id}")]
    ElectableWithNoNodes { shard_id: String },
}
