//! Per-cluster last-scale-action bookkeeping, used for cooldown checks and
//! the status record's recent-actions list.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use reefscale_metrics::ClusterKey;

/// One committed (or dry-run-logged) scaling action.
#[derive(Debug, Clone)]
pub struct ScaleAction {
    pub cluster_key: ClusterKey,
    pub rule_name: String,
    pub at_time: DateTime<Utc>,
}

/// One entry per cluster — overwritten by newer actions. Readers observe
/// last-writer-wins.
#[derive(Debug, Default)]
pub struct LastActionMap {
    entries: DashMap<ClusterKey, ScaleAction>,
}

impl LastActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, action: ScaleAction) {
        self.entries.insert(action.cluster_key.clone(), action);
    }

    pub fn last(&self, cluster_key: &ClusterKey) -> Option<ScaleAction> {
        self.entries.get(cluster_key).map(|entry| entry.clone())
    }

    /// True when `cooldown` has not yet elapsed since the last action on
    /// `cluster_key`.
    pub fn in_cooldown(&self, cluster_key: &ClusterKey, cooldown: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.last(cluster_key) {
            Some(action) => now - action.at_time < cooldown,
            None => false,
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<ScaleAction> {
        let mut actions: Vec<ScaleAction> = self.entries.iter().map(|entry| entry.value().clone()).collect();
        actions.sort_by_key(|a| std::cmp::Reverse(a.at_time));
        actions.truncate(limit);
        actions
    }
}
