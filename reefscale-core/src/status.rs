//! The user-visible observability snapshot the scheduler refreshes after
//! every tick. Not wire-serialized; read by the operator CLI's `status`
//! stub and anything else embedding the scheduler.

use chrono::{DateTime, Utc};

use crate::last_action::ScaleAction;

#[derive(Debug, Clone)]
pub struct ScalerStatus {
    pub running: bool,
    pub clusters_monitored: u64,
    pub recent_scale_actions: Vec<ScaleAction>,
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for ScalerStatus {
    fn default() -> Self {
        Self { running: false, clusters_monitored: 0, recent_scale_actions: Vec::new(), last_update: None }
    }
}
