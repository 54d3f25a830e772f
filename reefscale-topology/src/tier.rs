//! The fixed instance-size ladder and movement along it.

/// Ordered instance-size names, smallest to largest. Process-global constant
/// table — there is exactly one ladder, shared by every cluster and shard.
pub const TIER_LADDER: &[&str] = &[
    "M0", "M2", "M5", "M10", "M20", "M30", "M40", "M50", "M60", "M80", "M140",
    "M200", "M300", "M400", "M700",
];

/// Direction of a tier move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// Moves `current` one step in `direction` along [`TIER_LADDER`].
///
/// Off-ladder values and boundary overshoots clamp to `current` — this is a
/// no-op, not an error, per the topology invariant that tier changes are
/// idempotent at ladder boundaries.
pub fn step(current: &str, direction: Direction) -> String {
    let Some(idx) = TIER_LADDER.iter().position(|t| *t == current) else {
        return current.to_string();
    };
    let next_idx = match direction {
        Direction::Up => idx + 1,
        Direction::Down if idx == 0 => idx,
        Direction::Down => idx - 1,
    };
    TIER_LADDER
        .get(next_idx)
        .copied()
        .unwrap_or(current)
        .to_string()
}

/// True if `tier` is a recognized member of the ladder.
pub fn is_on_ladder(tier: &str) -> bool {
    TIER_LADDER.iter().any(|t| *t == tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_up_one_tier() {
        assert_eq!(step("M30", Direction::Up), "M40");
    }

    #[test]
    fn steps_down_one_tier() {
        assert_eq!(step("M30", Direction::Down), "M20");
    }

    #[test]
    fn clamps_at_top() {
        assert_eq!(step("M700", Direction::Up), "M700");
    }

    #[test]
    fn clamps_at_bottom() {
        assert_eq!(step("M0", Direction::Down), "M0");
    }

    #[test]
    fn off_ladder_value_is_a_no_op() {
        assert_eq!(step("M999", Direction::Up), "M999");
    }

    #[test]
    fn recognizes_ladder_membership() {
        assert!(is_on_ladder("M200"));
        assert!(!is_on_ladder("M999"));
    }
}
