//! Rule definitions and the pure rule-evaluation function.
//!
//! No I/O, no side effects — `evaluate` is a function of a metrics
//! snapshot, a rule, and "now", kept free of async machinery.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use reefscale_metrics::{ClusterKey, MetricStore};
use reefscale_topology::{NodeRole, ShardScope};

/// A comparison operator over two `f64`s. NaN never compares true under any
/// comparator — see [`Comparator::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Comparator {
    pub fn evaluate(self, a: f64, b: f64) -> bool {
        if a.is_nan() || b.is_nan() {
            return false;
        }
        match self {
            Comparator::Gt => a > b,
            Comparator::Lt => a < b,
            Comparator::Gte => a >= b,
            Comparator::Lte => a <= b,
        }
    }

    /// The opposite-direction comparator of the same strictness: `Gt`/`Lt`
    /// and `Gte`/`Lte` are inverse pairs. `evaluate` and
    /// `inverse().evaluate` agree everywhere except at `a == b`, where both
    /// strict comparators return `false` — an equality boundary exception
    /// worth calling out explicitly.
    pub fn inverse(self) -> Comparator {
        match self {
            Comparator::Gt => Comparator::Lt,
            Comparator::Lt => Comparator::Gt,
            Comparator::Gte => Comparator::Lte,
            Comparator::Lte => Comparator::Gte,
        }
    }
}

/// Direction a triggered rule scales in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScaleDirection {
    Up,
    Down,
}

impl From<ScaleDirection> for reefscale_topology::Direction {
    fn from(d: ScaleDirection) -> Self {
        match d {
            ScaleDirection::Up => reefscale_topology::Direction::Up,
            ScaleDirection::Down => reefscale_topology::Direction::Down,
        }
    }
}

/// An immutable scaling rule, as configured by the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingRule {
    pub name: String,
    pub metric_name: String,
    pub condition: Comparator,
    pub threshold: f64,
    pub duration: Duration,
    pub direction: ScaleDirection,
    pub node_type: NodeRole,
    pub cooldown: Duration,
    pub shard_scope: ShardScope,
}

/// The result of evaluating one rule against the metric store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Trigger,
    NoTrigger,
}

/// Evaluates `rule` against `metrics` as of `now`.
///
/// Non-sustained semantics: triggers if **any** point with
/// `timestamp > now - rule.duration` satisfies `rule.condition`. This is
/// weaker than "sustained for the whole window" despite the `duration`
/// field name suggesting otherwise — see DESIGN.md for why this behavior
/// is preserved rather than the stricter reading.
pub fn evaluate(metrics: &MetricStore, cluster_key: &ClusterKey, rule: &ScalingRule, now: DateTime<Utc>) -> Verdict {
    let window_start = now - rule.duration;
    let points = metrics.recent(cluster_key, &rule.metric_name);
    if points.is_empty() {
        return Verdict::NoTrigger;
    }

    let triggered = points
        .iter()
        .any(|p| p.timestamp > window_start && rule.condition.evaluate(p.value, rule.threshold));

    if triggered {
        Verdict::Trigger
    } else {
        Verdict::NoTrigger
    }
}
