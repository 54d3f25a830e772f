//! Flat `key=value` properties file loader for the autoscaler.
//!
//! A missing file is treated as a misconfiguration rather than falling
//! back to defaults — there is no safe default for API credentials.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use reefscale_rules::{Comparator, ScaleDirection, ScalingRule};
use reefscale_topology::{NodeRole, ShardScope};

const SYSTEM_NORMALIZED_CPU_USER: &str = "SYSTEM_NORMALIZED_CPU_USER";
const SYSTEM_MEMORY_PERCENT_USED: &str = "SYSTEM_MEMORY_PERCENT_USED";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("missing required key {0}")]
    MissingKey(String),

    #[error("invalid value for key {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Parsed autoscaler configuration, assembled from the properties file's
/// recognized keys. Immutable after construction.
#[derive(Debug, Clone)]
pub struct AutoscalerConfig {
    pub api_public_key: String,
    pub api_private_key: String,
    pub base_url: String,
    pub project_names: Vec<String>,
    pub monitoring_interval: Duration,
    pub dry_run: bool,
    pub scale_all_shards_in_unison: bool,
    pub allow_per_shard_scaling: bool,
    pub scale_cooldown: Duration,
    pub rules: Vec<ScalingRule>,
}

impl AutoscalerConfig {
    /// Reads the properties file at `path`. Unrecognized keys are logged
    /// and ignored (forward compatibility); `apiPublicKey`/`apiPrivateKey`
    /// missing is a misconfiguration.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let content = tokio::fs::read_to_string(path_ref)
            .await
            .map_err(|source| ConfigError::Io { path: path_ref.display().to_string(), source })?;

        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut raw = HashMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) => {
                    raw.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => warn!(line, "ignoring malformed properties line"),
            }
        }

        let recognized_keys = [
            "apiPublicKey",
            "apiPrivateKey",
            "baseUrl",
            "includeProjectNames",
            "monitoringInterval",
            "dryRun",
            "cpuScaleUpThreshold",
            "cpuScaleUpDuration",
            "cpuScaleDownThreshold",
            "cpuScaleDownDuration",
            "enableCpuScaleUp",
            "enableCpuScaleDown",
            "memoryScaleUpThreshold",
            "memoryScaleUpDuration",
            "enableMemoryScaleUp",
            "scaleCooldown",
            "scaleAllShardsInUnison",
            "allowPerShardScaling",
            "defaultNodeType",
        ];
        for key in raw.keys() {
            if !recognized_keys.contains(&key.as_str()) {
                warn!(key, "ignoring unrecognized properties key");
            }
        }

        let api_public_key = required(&raw, "apiPublicKey")?;
        let api_private_key = required(&raw, "apiPrivateKey")?;
        let base_url = raw.get("baseUrl").cloned().unwrap_or_else(|| "https://cloud.mongodb.com".to_string());

        let project_names = raw
            .get("includeProjectNames")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let monitoring_interval = Duration::from_secs(parse_or("monitoringInterval", &raw, 300)?);
        let dry_run = parse_bool_or("dryRun", &raw, false)?;
        let scale_all_shards_in_unison = parse_bool_or("scaleAllShardsInUnison", &raw, true)?;
        let allow_per_shard_scaling = parse_bool_or("allowPerShardScaling", &raw, false)?;
        let scale_cooldown = chrono::Duration::minutes(parse_or("scaleCooldown", &raw, 30i64)?);

        let default_node_type = match raw.get("defaultNodeType").map(String::as_str).unwrap_or("ELECTABLE") {
            "ELECTABLE" => NodeRole::Electable,
            "ANALYTICS" => NodeRole::Analytics,
            "READ_ONLY" => NodeRole::ReadOnly,
            other => return Err(ConfigError::InvalidValue { key: "defaultNodeType".into(), value: other.to_string() }),
        };

        let mut rules = Vec::new();

        if parse_bool_or("enableCpuScaleUp", &raw, false)? {
            rules.push(ScalingRule {
                name: "cpuScaleUp".into(),
                metric_name: SYSTEM_NORMALIZED_CPU_USER.into(),
                condition: Comparator::Gt,
                threshold: parse_or("cpuScaleUpThreshold", &raw, 90.0)?,
                duration: chrono::Duration::minutes(parse_or("cpuScaleUpDuration", &raw, 5i64)?),
                direction: ScaleDirection::Up,
                node_type: default_node_type,
                cooldown: scale_cooldown,
                shard_scope: ShardScope::AllShards,
            });
        }

        if parse_bool_or("enableCpuScaleDown", &raw, false)? {
            rules.push(ScalingRule {
                name: "cpuScaleDown".into(),
                metric_name: SYSTEM_NORMALIZED_CPU_USER.into(),
                condition: Comparator::Lt,
                threshold: parse_or("cpuScaleDownThreshold", &raw, 20.0)?,
                duration: chrono::Duration::minutes(parse_or("cpuScaleDownDuration", &raw, 30i64)?),
                direction: ScaleDirection::Down,
                node_type: default_node_type,
                cooldown: scale_cooldown,
                shard_scope: ShardScope::AllShards,
            });
        }

        if parse_bool_or("enableMemoryScaleUp", &raw, false)? {
            rules.push(ScalingRule {
                name: "memoryScaleUp".into(),
                metric_name: SYSTEM_MEMORY_PERCENT_USED.into(),
                condition: Comparator::Gt,
                threshold: parse_or("memoryScaleUpThreshold", &raw, 90.0)?,
                duration: chrono::Duration::minutes(parse_or("memoryScaleUpDuration", &raw, 5i64)?),
                direction: ScaleDirection::Up,
                node_type: default_node_type,
                cooldown: scale_cooldown,
                shard_scope: ShardScope::AllShards,
            });
        }

        Ok(Self {
            api_public_key,
            api_private_key,
            base_url,
            project_names,
            monitoring_interval,
            dry_run,
            scale_all_shards_in_unison,
            allow_per_shard_scaling,
            scale_cooldown,
            rules,
        })
    }
}

fn required(raw: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    raw.get(key).cloned().filter(|v| !v.is_empty()).ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: &HashMap<String, String>, default: T) -> Result<T, ConfigError> {
    match raw.get(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: value.clone() }),
        None => Ok(default),
    }
}

fn parse_bool_or(key: &str, raw: &HashMap<String, String>, default: bool) -> Result<bool, ConfigError> {
    match raw.get(key) {
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.clone() }),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
apiPublicKey=pub-key\n\
apiPrivateKey=priv-key\n\
includeProjectNames=proj-a, proj-b\n\
monitoringInterval=60\n\
dryRun=true\n\
enableCpuScaleUp=true\n\
cpuScaleUpThreshold=85.0\n\
cpuScaleUpDuration=5\n\
scaleCooldown=15\n\
scaleAllShardsInUnison=false\n\
allowPerShardScaling=true\n\
defaultNodeType=ANALYTICS\n\
unknownKey=ignored\n\
";

    #[test]
    fn parses_a_well_formed_properties_file() {
        let config = AutoscalerConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.api_public_key, "pub-key");
        assert_eq!(config.project_names, vec!["proj-a", "proj-b"]);
        assert_eq!(config.monitoring_interval, Duration::from_secs(60));
        assert!(config.dry_run);
        assert!(!config.scale_all_shards_in_unison);
        assert!(config.allow_per_shard_scaling);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].node_type, NodeRole::Analytics);
    }

    #[test]
    fn missing_required_key_is_a_misconfiguration() {
        let err = AutoscalerConfig::parse("apiPublicKey=pub\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(key) if key == "apiPrivateKey"));
    }

    #[test]
    fn invalid_boolean_is_rejected() {
        let content = "apiPublicKey=p\napiPrivateKey=s\ndryRun=maybe\n";
        let err = AutoscalerConfig::parse(content).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "dryRun"));
    }

    #[test]
    fn no_enabled_rules_yields_an_empty_rule_set() {
        let content = "apiPublicKey=p\napiPrivateKey=s\n";
        let config = AutoscalerConfig::parse(content).unwrap();
        assert!(config.rules.is_empty());
    }
}
