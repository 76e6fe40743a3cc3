//! Turns a session's event channel into a self-keeping-alive stream of
//! [`LiveEvent`]s, merging in a `system {type:"ping"}` frame every
//! `SESSION_KEEPALIVE_SECS` (spec §6.2). `flit-api` maps the resulting
//! stream into the HTTP transport's byte-stream type; this module stays
//! transport-agnostic so it doesn't pull in `actix-web`.

use flit_core::config::thresholds::SESSION_KEEPALIVE_SECS;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};
use tokio_stream::{Stream, StreamExt};

use crate::event::LiveEvent;

/// Wraps a session's receiver with a periodic keep-alive, so the caller
/// only has to drain one stream to get both live events and pings.
pub fn live_event_stream(rx: mpsc::Receiver<LiveEvent>) -> impl Stream<Item = LiveEvent> {
    let events = ReceiverStream::new(rx);
    let period = Duration::from_secs(SESSION_KEEPALIVE_SECS);
    let keepalive = IntervalStream::new(tokio::time::interval_at(tokio::time::Instant::now() + period, period))
        .map(|_| LiveEvent::ping());
    events.merge(keepalive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn forwards_events_from_the_channel() {
        let (tx, rx) = mpsc::channel(4);
        let mut stream = Box::pin(live_event_stream(rx));

        tx.send(LiveEvent::new(EventKind::Like, serde_json::json!({}))).await.unwrap();
        let first = stream.next().await.unwrap();
        assert_eq!(first.kind, EventKind::Like);
    }
}
