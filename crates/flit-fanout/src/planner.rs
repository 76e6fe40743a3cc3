//! Fan-Out Planner (spec §4.5). A pure function over an enum rather than
//! dynamic dispatch (spec §9 redesign flag): the strategy is fully
//! determined by follower count, no trait object needed.

use flit_core::config::thresholds::{MEDIUM_FOLLOWER_THRESHOLD, SMALL_FOLLOWER_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Push,
    Hybrid,
    Pull,
}

pub fn plan(follower_count_hint: i64) -> Strategy {
    if follower_count_hint < SMALL_FOLLOWER_THRESHOLD {
        Strategy::Push
    } else if follower_count_hint < MEDIUM_FOLLOWER_THRESHOLD {
        Strategy::Hybrid
    } else {
        Strategy::Pull
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_by_threshold() {
        assert_eq!(plan(0), Strategy::Push);
        assert_eq!(plan(SMALL_FOLLOWER_THRESHOLD - 1), Strategy::Push);
        assert_eq!(plan(SMALL_FOLLOWER_THRESHOLD), Strategy::Hybrid);
        assert_eq!(plan(MEDIUM_FOLLOWER_THRESHOLD - 1), Strategy::Hybrid);
        assert_eq!(plan(MEDIUM_FOLLOWER_THRESHOLD), Strategy::Pull);
        assert_eq!(plan(50_000_000), Strategy::Pull);
    }
}
