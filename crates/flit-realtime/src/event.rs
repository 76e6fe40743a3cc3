//! Live stream event shapes (spec §6.2). Grounded on
//! `notification-service/src/websocket/messages.rs`'s tagged-enum
//! message model, re-cast as Server-Sent Events instead of WebSocket
//! frames.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewTweet,
    Like,
    Retweet,
    Follow,
    Notification,
    UserStatus,
    System,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NewTweet => "new_tweet",
            EventKind::Like => "like",
            EventKind::Retweet => "retweet",
            EventKind::Follow => "follow",
            EventKind::Notification => "notification",
            EventKind::UserStatus => "user_status",
            EventKind::System => "system",
        }
    }
}

/// A single outbound SSE message: the `event:` line plus a JSON `data:`
/// payload. `render` is the only place that knows the wire framing, so a
/// future binary-framed transport only has to replace this one method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    pub kind: EventKind,
    pub data: serde_json::Value,
}

impl LiveEvent {
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self { kind, data }
    }

    pub fn ping() -> Self {
        Self::new(EventKind::System, serde_json::json!({"type": "ping"}))
    }

    pub fn welcome(session_id: uuid::Uuid) -> Self {
        Self::new(
            EventKind::System,
            serde_json::json!({"type": "welcome", "session_id": session_id}),
        )
    }

    pub fn render(&self) -> String {
        format!(
            "event: {}\ndata: {}\n\n",
            self.kind.as_str(),
            self.data
        )
    }
}

/// Wire shape published on the cross-instance broadcast channel
/// (`realtime.global`, spec §4.9). `target` is `None` for a global
/// broadcast and `Some(user_id)` for a unicast relayed from another
/// instance's EB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub target: Option<uuid::Uuid>,
    pub event: LiveEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sse_frame() {
        let event = LiveEvent::new(EventKind::Like, serde_json::json!({"post_id": "abc"}));
        let rendered = event.render();
        assert!(rendered.starts_with("event: like\n"));
        assert!(rendered.ends_with("\n\n"));
        assert!(rendered.contains("\"post_id\":\"abc\""));
    }

    #[test]
    fn ping_is_system_kind() {
        assert_eq!(LiveEvent::ping().kind, EventKind::System);
    }
}
