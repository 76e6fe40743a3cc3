//! Cross-Instance Bus (spec §4.4): named channels, fire-and-forget
//! publish, no persistence — used only for live events whose loss is
//! acceptable because the relational store or work queue already holds
//! the authoritative record. Grounded on
//! `libs/redis-utils::SharedConnectionManager` for the connection shape
//! and the pub/sub primitives `redis-utils` wraps.

use flit_core::error::{FlitError, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Default local fan-in buffer depth before the bounded broadcast channel
/// starts dropping the least-recent message (spec §7: "a bounded local
/// ingress buffer — overflow drops the least-recent global broadcast
/// with a log line").
pub const DEFAULT_BUFFER: usize = 1024;

#[derive(Clone)]
pub struct BusPublisher {
    conn: ConnectionManager,
}

impl BusPublisher {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn publish<T: Serialize>(&self, channel: &str, event: &T) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(FlitError::from)?;
        Ok(())
    }
}

/// Tracks how many locally-buffered events were dropped because a
/// subscriber's local receiver lagged behind the bounded channel.
#[derive(Default)]
pub struct DropCounter(AtomicU64);

impl DropCounter {
    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn bump(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

/// Subscribes to a single Redis channel and rebroadcasts decoded events
/// into a locally bounded `tokio::sync::broadcast` channel, so callers
/// never block on a slow network read and a slow local subscriber only
/// ever loses its own oldest unseen events, not other subscribers'.
pub struct BusSubscription<T> {
    sender: broadcast::Sender<T>,
    pub drops: Arc<DropCounter>,
}

impl<T: Clone + Send + 'static> BusSubscription<T> {
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

/// Receives the next event, transparently skipping past a lag gap and
/// logging how many events this particular subscriber missed. Returns
/// `None` once the publishing side has shut down.
pub async fn recv_logged<T: Clone + Send + 'static>(
    rx: &mut broadcast::Receiver<T>,
    channel: &str,
    drops: &DropCounter,
) -> Option<T> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                drops.bump(missed);
                warn!(channel, missed, "bus subscriber lagged, dropped oldest events");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Spawns the background task that reads raw pub/sub messages off
/// `channel` and republishes decoded events locally. Returns a handle
/// whose `subscribe()` method hands out broadcast receivers.
pub async fn subscribe_channel<T>(
    client: redis::Client,
    channel: String,
    buffer: usize,
) -> Result<BusSubscription<T>>
where
    T: DeserializeOwned + Clone + Send + 'static,
{
    // pub/sub requires a dedicated connection, not the multiplexed one
    // used for ordinary commands.
    let conn = client.get_async_connection().await.map_err(FlitError::from)?;
    let mut pubsub = conn.into_pubsub();
    pubsub.subscribe(&channel).await.map_err(FlitError::from)?;

    let (tx, _rx) = broadcast::channel(buffer.max(1));
    let drops = Arc::new(DropCounter::default());

    let sender = tx.clone();
    let channel_name = channel.clone();
    tokio::spawn(async move {
        use futures::StreamExt;
        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(err) => {
                    warn!(channel = %channel_name, error = %err, "bus payload decode failed");
                    continue;
                }
            };
            let event: T = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(err) => {
                    warn!(channel = %channel_name, error = %err, "bus event deserialize failed");
                    continue;
                }
            };
            // a send error here only means no subscribers are currently
            // connected; the event is simply lost, matching "subscribe
            // delivers to currently-connected subscribers only" (§4.4).
            // subscriber-side lag (overflow of the bounded buffer itself)
            // is reported by `recv_logged` on the receiving end instead.
            let _ = sender.send(event);
        }
    });

    Ok(BusSubscription { sender: tx, drops })
}
