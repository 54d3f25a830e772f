//! Bounded, time-ordered telemetry buffer per cluster.
//!
//! One [`MetricStore`] is shared process-wide. Per spec: a single writer per
//! `(cluster_key, metric_name)` bucket is assumed, so appends never lock
//! across clusters — `DashMap`'s internal sharding gives that for free.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// `projectName/clusterName` — the identity used for metric buckets and
/// last-action records throughout the autoscaler.
pub type ClusterKey = String;

/// A single telemetry sample: `(hostname, timestamp, value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDataPoint {
    pub hostname: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Per-cluster, per-metric, bounded-by-age time series store.
#[derive(Debug, Default)]
pub struct MetricStore {
    // clusterKey -> metricName -> points, appended in observation order.
    data: DashMap<ClusterKey, DashMap<String, Vec<MetricDataPoint>>>,
}

/// Metric name prefixes whose raw readings arrive as fractions in `[0, 1]`
/// and must be converted to percent on ingest.
const FRACTIONAL_METRIC_PREFIXES: &[&str] = &["SYSTEM_NORMALIZED_CPU"];

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a point, converting normalized-CPU fractions to percent.
    /// Memory-used and other metrics are stored exactly as given.
    pub fn ingest(&self, cluster_key: &ClusterKey, metric_name: &str, hostname: &str, timestamp: DateTime<Utc>, raw_value: f64) {
        let value = if FRACTIONAL_METRIC_PREFIXES.iter().any(|p| metric_name.starts_with(p)) && raw_value <= 1.0 {
            raw_value * 100.0
        } else {
            raw_value
        };
        self.append(cluster_key, metric_name, MetricDataPoint { hostname: hostname.to_string(), timestamp, value });
    }

    /// Appends an already-converted point. Single-writer-per-cluster
    /// contract assumed: no cross-append locking within one cluster's
    /// entry.
    pub fn append(&self, cluster_key: &ClusterKey, metric_name: &str, point: MetricDataPoint) {
        let cluster_entry = self.data.entry(cluster_key.clone()).or_default();
        cluster_entry.entry(metric_name.to_string()).or_default().push(point);
    }

    /// Returns a snapshot of the points currently stored for
    /// `(cluster_key, metric_name)`, in append order. Callers must not rely
    /// on this reflecting later appends — it is a point-in-time copy.
    pub fn recent(&self, cluster_key: &ClusterKey, metric_name: &str) -> Vec<MetricDataPoint> {
        self.data
            .get(cluster_key)
            .and_then(|c| c.get(metric_name).map(|v| v.clone()))
            .unwrap_or_default()
    }

    /// Removes every point older than `cutoff`, across all clusters and
    /// metrics. Bounds memory to `O(clusters * metrics * pointsPerWindow)`.
    pub fn evict_older_than(&self, cutoff: DateTime<Utc>) {
        for cluster_entry in self.data.iter() {
            for mut metric_entry in cluster_entry.value().iter_mut() {
                metric_entry.value_mut().retain(|p| p.timestamp >= cutoff);
            }
        }
    }

    /// Number of distinct cluster keys currently tracked. Used for the
    /// scheduler's status record (`clustersMonitored`).
    pub fn cluster_count(&self) -> usize {
        self.data.len()
    }
}
