//! Fixed queue names (spec §6.3). Kept as `&'static str` constants rather
//! than an enum because the wire format and the SQL `queue_name` column
//! both carry the raw string.

pub const FANOUT_HIGH: &str = "fanout.high";
pub const FANOUT_NORMAL: &str = "fanout.normal";
pub const SEARCH_INDEX: &str = "search.index";
pub const NOTIFY_PUSH: &str = "notify.push";
pub const NOTIFY_REALTIME: &str = "notify.realtime";
pub const TIMELINE_UPDATES: &str = "timeline.updates";
pub const PRESENCE_UPDATES: &str = "presence.updates";
pub const DIRECT_MESSAGES_NEW: &str = "direct_messages.new";
pub const MEDIA_PROCESS: &str = "media.process";

pub const ALL: &[&str] = &[
    FANOUT_HIGH,
    FANOUT_NORMAL,
    SEARCH_INDEX,
    NOTIFY_PUSH,
    NOTIFY_REALTIME,
    TIMELINE_UPDATES,
    PRESENCE_UPDATES,
    DIRECT_MESSAGES_NEW,
    MEDIA_PROCESS,
];

/// Picks the fan-out queue name for a given follower-count hint, binding
/// a high-priority worker to large audiences before normal ones (spec
/// §4.3: "priority is expressed by binding a worker to a high-priority
/// queue name before lower ones").
pub fn fanout_queue_for(follower_count_hint: i64) -> &'static str {
    if follower_count_hint >= flit_core::config::thresholds::MEDIUM_FOLLOWER_THRESHOLD {
        FANOUT_HIGH
    } else {
        FANOUT_NORMAL
    }
}
