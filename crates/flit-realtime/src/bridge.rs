//! Event Bridge (spec §4.9): translates durable NOTIFY work items and
//! cross-instance bus events into live per-client SSE delivery. Grounded
//! on `notification-service/src/websocket/`'s consume-then-route shape,
//! adapted so routing always goes through the Cross-Instance Bus: a
//! NOTIFY item is claimed by exactly one instance (Postgres `SKIP
//! LOCKED`), but the author's live session may be attached to any
//! instance, so the claiming instance never delivers directly — it
//! persists the notification, then republishes onto `realtime.global`,
//! which every instance (including itself) is subscribed to.

use flit_core::domain::{build_notification, NotificationKind, WorkPayload};
use flit_core::error::{FlitError, Result};
use flit_db::NotificationRepository;
use flit_queue::Queue;
use tracing::warn;

use crate::event::{BusEnvelope, EventKind, LiveEvent};
use crate::hub::SessionHub;

/// Cross-instance broadcast channel name (spec §4.9).
pub const GLOBAL_CHANNEL: &str = "realtime.global";

fn notification_kind_label(kind: NotificationKind) -> &'static str {
    kind.as_str()
}

/// Handler bound to the `notify.realtime` queue consumer
/// (`flit_queue::run_consumer`). Persists the notification and hands it
/// off to the bus for delivery; never touches the local session hub
/// directly.
pub async fn handle_notify_item(
    notifications: &NotificationRepository,
    bus: &flit_bus::BusPublisher,
    payload: WorkPayload,
) -> Result<()> {
    let WorkPayload::Notify { recipient, actor, kind, subject_post_id } = payload else {
        return Err(FlitError::Permanent("handle_notify_item received a non-Notify payload".into()));
    };

    let data = serde_json::json!({
        "kind": notification_kind_label(kind),
        "actor": actor,
        "subject_post_id": subject_post_id,
    });

    let Some(notification) = build_notification(recipient, actor, kind, subject_post_id, data.clone()) else {
        // recipient == actor; EngagementEngine already guards this, but
        // treat it as a successful no-op rather than a redelivery loop.
        return Ok(());
    };

    notifications.insert(&notification).await?;

    let envelope = BusEnvelope {
        target: Some(recipient),
        event: LiveEvent::new(EventKind::Notification, serde_json::json!({
            "id": notification.id,
            "kind": notification_kind_label(kind),
            "actor": actor,
            "subject_post_id": subject_post_id,
            "created_at": notification.created_at,
        })),
    };

    bus.publish(GLOBAL_CHANNEL, &envelope).await
}

/// Binds an EngagementEngine-facing `Queue` (expected to be the
/// `notify.realtime` queue) to [`handle_notify_item`], suitable for
/// passing straight to `flit_queue::run_consumer`.
pub fn notify_realtime_queue(outbox_repository: flit_db::OutboxRepository) -> Queue {
    Queue::new(outbox_repository, flit_queue::names::NOTIFY_REALTIME)
}

/// Runs forever, relaying decoded bus events onto the local session hub.
/// Each instance runs exactly one of these; it is how a NOTIFY item
/// claimed by a peer instance still reaches a session attached here.
pub async fn run_global_relay(hub: SessionHub, mut rx: tokio::sync::broadcast::Receiver<BusEnvelope>, drops: std::sync::Arc<flit_bus::DropCounter>) {
    loop {
        match flit_bus::recv_logged(&mut rx, GLOBAL_CHANNEL, &drops).await {
            Some(envelope) => match envelope.target {
                Some(user_id) => hub.send_to_user(user_id, envelope.event).await,
                None => hub.broadcast(envelope.event).await,
            },
            None => {
                warn!("realtime.global bus subscription closed, relay stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_name_matches_wire_contract() {
        assert_eq!(GLOBAL_CHANNEL, "realtime.global");
    }

    #[test]
    fn kind_label_round_trips_through_as_str() {
        assert_eq!(notification_kind_label(NotificationKind::Like), "like");
    }
}
