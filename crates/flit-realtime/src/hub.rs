//! Live Session Hub (spec §4.9): process-local registry of open live
//! streams. Grounded on `notification-service/src/websocket/manager.rs`'s
//! `ConnectionManager`, generalized from per-user `Vec<Sender>` under one
//! lock to the spec's explicit two-map shape (session id -> session;
//! user id -> set of session ids) with registration/deregistration
//! serialized through a single exclusive hold and broadcast reads taking
//! a shared hold.

use flit_core::config::thresholds::{SESSION_IDLE_TIMEOUT_SECS, SESSION_SWEEP_INTERVAL_SECS};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::event::LiveEvent;

/// A session's output sink never drops a unicast message in-process; if
/// the send doesn't land within this window the session is treated as
/// stalled and deregistered (spec §5, "Backpressure").
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

struct Session {
    user_id: Uuid,
    sender: mpsc::Sender<LiveEvent>,
    last_seen_unix: Arc<AtomicI64>,
}

#[derive(Default)]
struct Maps {
    sessions: HashMap<Uuid, Session>,
    by_user: HashMap<Uuid, HashSet<Uuid>>,
}

/// Handle returned to a connecting client; `touch` should be called
/// whenever the client observes activity (a received event or its own
/// keep-alive) so the idle sweep doesn't reap a live connection.
pub struct SessionGuard {
    pub session_id: Uuid,
    last_seen_unix: Arc<AtomicI64>,
}

impl SessionGuard {
    pub fn touch(&self) {
        self.last_seen_unix.store(now_unix(), Ordering::Relaxed);
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Clone)]
pub struct SessionHub {
    maps: Arc<RwLock<Maps>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            maps: Arc::new(RwLock::new(Maps::default())),
        }
    }

    /// Registers a new live session for `user_id`, returning its sending
    /// end of the event channel and a guard the HTTP handler keeps alive
    /// for the lifetime of the stream.
    pub async fn register(&self, user_id: Uuid, buffer: usize) -> (mpsc::Receiver<LiveEvent>, SessionGuard) {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let last_seen_unix = Arc::new(AtomicI64::new(now_unix()));

        let mut maps = self.maps.write().await;
        maps.sessions.insert(
            session_id,
            Session {
                user_id,
                sender: tx,
                last_seen_unix: last_seen_unix.clone(),
            },
        );
        maps.by_user.entry(user_id).or_default().insert(session_id);
        drop(maps);

        debug!(session_id = %session_id, user_id = %user_id, "live session registered");
        (rx, SessionGuard { session_id, last_seen_unix })
    }

    pub async fn deregister(&self, session_id: Uuid) {
        let mut maps = self.maps.write().await;
        if let Some(session) = maps.sessions.remove(&session_id) {
            if let Some(set) = maps.by_user.get_mut(&session.user_id) {
                set.remove(&session_id);
                if set.is_empty() {
                    maps.by_user.remove(&session.user_id);
                }
            }
            debug!(session_id = %session_id, user_id = %session.user_id, "live session deregistered");
        }
    }

    /// Delivers `event` to every session owned by `user_id`. A session
    /// whose sink is closed or doesn't drain within `SEND_TIMEOUT` is
    /// deregistered as a side effect.
    pub async fn send_to_user(&self, user_id: Uuid, event: LiveEvent) {
        let targets: Vec<(Uuid, mpsc::Sender<LiveEvent>)> = {
            let maps = self.maps.read().await;
            match maps.by_user.get(&user_id) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| maps.sessions.get(id).map(|s| (*id, s.sender.clone())))
                    .collect(),
                None => return,
            }
        };

        for (session_id, sender) in targets {
            self.deliver_or_deregister(session_id, sender, event.clone()).await;
        }
    }

    /// Delivers `event` to every locally-registered session, regardless
    /// of owning user (the `realtime.global` broadcast path).
    pub async fn broadcast(&self, event: LiveEvent) {
        let targets: Vec<(Uuid, mpsc::Sender<LiveEvent>)> = {
            let maps = self.maps.read().await;
            maps.sessions
                .iter()
                .map(|(id, s)| (*id, s.sender.clone()))
                .collect()
        };

        for (session_id, sender) in targets {
            self.deliver_or_deregister(session_id, sender, event.clone()).await;
        }
    }

    async fn deliver_or_deregister(&self, session_id: Uuid, sender: mpsc::Sender<LiveEvent>, event: LiveEvent) {
        match tokio::time::timeout(SEND_TIMEOUT, sender.send(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => self.deregister(session_id).await,
            Err(_) => {
                warn!(session_id = %session_id, "live session output sink blocked past 5s, deregistering");
                self.deregister(session_id).await;
            }
        }
    }

    pub async fn session_count(&self) -> usize {
        self.maps.read().await.sessions.len()
    }

    pub async fn user_count(&self) -> usize {
        self.maps.read().await.by_user.len()
    }

    async fn idle_session_ids(&self, idle_after: Duration) -> Vec<Uuid> {
        let cutoff = now_unix() - idle_after.as_secs() as i64;
        let maps = self.maps.read().await;
        maps.sessions
            .iter()
            .filter(|(_, s)| s.last_seen_unix.load(Ordering::Relaxed) < cutoff)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Sweeps sessions idle for longer than `SESSION_IDLE_TIMEOUT_SECS`;
    /// meant to be driven by a periodic housekeeper.
    pub async fn sweep_idle(&self) -> usize {
        let idle = self
            .idle_session_ids(Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS))
            .await;
        for id in &idle {
            self.deregister(*id).await;
        }
        if !idle.is_empty() {
            info!(count = idle.len(), "swept idle live sessions");
        }
        idle.len()
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the idle-session sweep every `SESSION_SWEEP_INTERVAL_SECS` until
/// `shutdown` fires (spec §4.9, §5 housekeeper pool).
pub async fn run_sweeper(hub: SessionHub, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                hub.sweep_idle().await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[tokio::test]
    async fn register_and_unicast_delivers() {
        let hub = SessionHub::new();
        let user_id = Uuid::new_v4();
        let (mut rx, _guard) = hub.register(user_id, 8).await;

        hub.send_to_user(user_id, LiveEvent::new(EventKind::Like, serde_json::json!({}))).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, EventKind::Like);
    }

    #[tokio::test]
    async fn unicast_to_unknown_user_is_noop() {
        let hub = SessionHub::new();
        hub.send_to_user(Uuid::new_v4(), LiveEvent::ping()).await;
        assert_eq!(hub.session_count().await, 0);
    }

    #[tokio::test]
    async fn deregister_removes_from_both_maps() {
        let hub = SessionHub::new();
        let user_id = Uuid::new_v4();
        let (_rx, guard) = hub.register(user_id, 8).await;
        assert_eq!(hub.session_count().await, 1);
        assert_eq!(hub.user_count().await, 1);

        hub.deregister(guard.session_id).await;
        assert_eq!(hub.session_count().await, 0);
        assert_eq!(hub.user_count().await, 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_session() {
        let hub = SessionHub::new();
        let (mut rx1, _g1) = hub.register(Uuid::new_v4(), 8).await;
        let (mut rx2, _g2) = hub.register(Uuid::new_v4(), 8).await;

        hub.broadcast(LiveEvent::ping()).await;

        assert_eq!(rx1.recv().await.unwrap().kind, EventKind::System);
        assert_eq!(rx2.recv().await.unwrap().kind, EventKind::System);
    }

    #[tokio::test]
    async fn closed_receiver_is_deregistered_on_send() {
        let hub = SessionHub::new();
        let user_id = Uuid::new_v4();
        let (rx, _guard) = hub.register(user_id, 8).await;
        drop(rx);

        hub.send_to_user(user_id, LiveEvent::ping()).await;
        assert_eq!(hub.session_count().await, 0);
    }
}
