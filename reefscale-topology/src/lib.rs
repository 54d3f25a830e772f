//! Cluster → shard → per-role topology model and tier-ladder operations.
//!
//! This crate has no knowledge of HTTP, metrics, or scheduling — it is pure
//! data and pure functions over that data, parsed at the boundary from
//! control-plane JSON and projected into a mutation payload at the other
//! boundary.

mod cluster;
mod error;
mod role;
mod shard;
mod tier;
mod wire;

pub use cluster::{ClusterState, ClusterTopology};
pub use error::TopologyError;
pub use role::{NodeRole, RoleSpec};
pub use shard::{ShardScope, ShardTopology};
pub use tier::{is_on_ladder, step, Direction, TIER_LADDER};
pub use wire::{
    parse_topology, to_patch_payload, ClusterDescriptionDto, ConnectionStringsDto, RegionConfigDto, ReplicationSpecDto, RoleSpecDto,
};
