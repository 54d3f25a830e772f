//! Parsing a control-plane cluster description into a [`ClusterTopology`],
//! and projecting one back out as a PATCH mutation payload.
//!
//! The wire shapes here are deliberately thin `serde` DTOs — per the
//! re-architecture note on heterogeneous JSON-as-dynamic-bag payloads, the
//! rest of the crate never touches `serde_json::Value` directly once a
//! [`ClusterTopology`] exists.

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterTopology;
use crate::error::TopologyError;
use crate::shard::ShardTopology;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescriptionDto {
    pub name: String,
    pub state_name: String,
    #[serde(default)]
    pub replication_specs: Vec<ReplicationSpecDto>,
    #[serde(default)]
    pub connection_strings: Option<ConnectionStringsDto>,
}

/// Just the field the scheduler needs to derive a cluster's member
/// hostnames; the control plane exposes several other connection string
/// variants (`private`, `privateSrv`, ...) that the autoscaler never reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStringsDto {
    pub standard: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicationSpecDto {
    #[serde(default)]
    pub region_configs: Vec<RegionConfigDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionConfigDto {
    pub provider_name: String,
    pub region_name: String,
    #[serde(default)]
    pub priority: u32,
    pub electable_specs: Option<RoleSpecDto>,
    pub analytics_specs: Option<RoleSpecDto>,
    pub read_only_specs: Option<RoleSpecDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpecDto {
    pub instance_size: String,
    pub node_count: u32,
}

/// Parses a cluster description into a [`ClusterTopology`].
///
/// Tolerant to role omission: a shard's `electableSpecs`/`analyticsSpecs`/
/// `readOnlySpecs` absent, or present with `nodeCount` 0 for a non-electable
/// role, both mean "role absent on this shard". Only the first region
/// config of each shard's replication spec is read (clusters are
/// single-region for scaling purposes).
pub fn parse_topology(dto: &ClusterDescriptionDto) -> Result<ClusterTopology, TopologyError> {
    if dto.replication_specs.is_empty() {
        return Err(TopologyError::NoShards);
    }

    let mut shards = Vec::with_capacity(dto.replication_specs.len());
    let mut provider_name = String::new();
    let mut region_name = String::new();

    for (i, spec) in dto.replication_specs.iter().enumerate() {
        let shard_id = format!("shard-{i}");
        let region = spec
            .region_configs
            .first()
            .ok_or_else(|| TopologyError::NoRegionConfig { shard_id: shard_id.clone() })?;

        if i == 0 {
            provider_name = region.provider_name.clone();
            region_name = region.region_name.clone();
        }

        let electable = region
            .electable_specs
            .as_ref()
            .filter(|s| s.node_count > 0)
            .map(to_role_spec);
        if electable.is_none() && matches!(&region.electable_specs, Some(s) if s.node_count == 0) {
            return Err(TopologyError::ElectableWithNoNodes { shard_id });
        }

        shards.push(ShardTopology {
            shard_id: format!("shard-{i}"),
            electable,
            analytics: region
                .analytics_specs
                .as_ref()
                .filter(|s| s.node_count > 0)
                .map(to_role_spec),
            read_only: region
                .read_only_specs
                .as_ref()
                .filter(|s| s.node_count > 0)
                .map(to_role_spec),
        });
    }

    Ok(ClusterTopology { cluster_name: dto.name.clone(), provider_name, region_name, shards })
}

fn to_role_spec(dto: &RoleSpecDto) -> crate::role::RoleSpec {
    crate::role::RoleSpec { instance_size: dto.instance_size.clone(), node_count: dto.node_count }
}

/// Builds the PATCH mutation payload for `topology`: a full replacement of
/// `replicationSpecs`, one region config per shard, `priority = 7`,
/// `clusterType = SHARDED` when there is more than one shard else
/// `REPLICASET`, and provider/region uppercased.
///
/// Roles absent on a shard are still emitted with `nodeCount = 0`; the
/// control plane ignores `instanceSize` when `nodeCount` is 0, so the
/// electable tier is used as a harmless placeholder.
pub fn to_patch_payload(topology: &ClusterTopology) -> serde_json::Value {
    let cluster_type = if topology.shard_count() > 1 { "SHARDED" } else { "REPLICASET" };
    let placeholder_size = topology
        .shards
        .first()
        .and_then(|s| s.electable.as_ref())
        .map(|s| s.instance_size.clone())
        .unwrap_or_else(|| "M10".to_string());

    let replication_specs: Vec<serde_json::Value> = topology
        .shards
        .iter()
        .map(|shard| {
            let emit = |spec: &Option<crate::role::RoleSpec>| -> serde_json::Value {
                match spec {
                    Some(s) => serde_json::json!({
                        "instanceSize": s.instance_size,
                        "nodeCount": s.node_count,
                    }),
                    None => serde_json::json!({
                        "instanceSize": placeholder_size,
                        "nodeCount": 0,
                    }),
                }
            };

            serde_json::json!({
                "regionConfigs": [{
                    "providerName": topology.provider_name.to_uppercase(),
                    "regionName": topology.region_name.to_uppercase(),
                    "priority": 7,
                    "electableSpecs": emit(&shard.electable),
                    "analyticsSpecs": emit(&shard.analytics),
                    "readOnlySpecs": emit(&shard.read_only),
                }]
            })
        })
        .collect();

    serde_json::json!({
        "clusterType": cluster_type,
        "replicationSpecs": replication_specs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_shard_dto() -> ClusterDescriptionDto {
        serde_json::from_value(serde_json::json!({
            "name": "my-cluster",
            "stateName": "IDLE",
            "replicationSpecs": [
                {
                    "regionConfigs": [{
                        "providerName": "aws",
                        "regionName": "us_east_1",
                        "priority": 7,
                        "electableSpecs": {"instanceSize": "M30", "nodeCount": 3},
                        "analyticsSpecs": {"instanceSize": "M30", "nodeCount": 0},
                        "readOnlySpecs": null
                    }]
                },
                {
                    "regionConfigs": [{
                        "providerName": "aws",
                        "regionName": "us_east_1",
                        "priority": 7,
                        "electableSpecs": {"instanceSize": "M30", "nodeCount": 3},
                        "analyticsSpecs": null,
                        "readOnlySpecs": null
                    }]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn parses_tolerant_to_missing_roles() {
        let topo = parse_topology(&two_shard_dto()).unwrap();
        assert_eq!(topo.shards.len(), 2);
        assert!(topo.shards[0].analytics.is_none());
        assert!(topo.shards[0].read_only.is_none());
        assert_eq!(topo.shards[0].electable.as_ref().unwrap().node_count, 3);
    }

    #[test]
    fn no_shards_is_an_error() {
        let dto = ClusterDescriptionDto { name: "x".into(), state_name: "IDLE".into(), replication_specs: vec![], connection_strings: None };
        assert!(matches!(parse_topology(&dto), Err(TopologyError::NoShards)));
    }

    #[test]
    fn round_trip_payload_is_semantically_equivalent() {
        let topo = parse_topology(&two_shard_dto()).unwrap();
        let payload = to_patch_payload(&topo);
        let specs = payload["replicationSpecs"].as_array().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0]["regionConfigs"][0]["electableSpecs"]["nodeCount"], 3);
        assert_eq!(specs[0]["regionConfigs"][0]["electableSpecs"]["instanceSize"], "M30");
        assert_eq!(payload["clusterType"], "SHARDED");
    }

    #[test]
    fn single_shard_cluster_type_is_replicaset() {
        let mut dto = two_shard_dto();
        dto.replication_specs.truncate(1);
        let topo = parse_topology(&dto).unwrap();
        let payload = to_patch_payload(&topo);
        assert_eq!(payload["clusterType"], "REPLICASET");
    }
}
