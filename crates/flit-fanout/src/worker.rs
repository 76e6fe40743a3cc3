//! Fan-Out Worker (spec §4.6): consumes FANOUT items, runs the planner,
//! writes into followers' home feeds in bounded-concurrency batches, and
//! emits follow-on INDEX/NOTIFY work. Grounded on the consume loop in
//! `flit_queue::run_consumer` (itself modeled on
//! `social-service/src/workers/outbox_worker.rs`) and on the
//! batch/concurrency shape of `content-service/src/jobs/feed_candidates.rs`.

use crate::planner::{self, Strategy};
use flit_core::config::thresholds::{
    ACTIVE_DAYS_WINDOW, FANOUT_BATCH_SIZE, HYBRID_PUSH_LIMIT, MAX_FEED_SIZE,
};
use flit_core::domain::{FeedKind, NotificationKind, WorkPayload};
use flit_core::error::{FlitError, Result};
use flit_db::FollowRepository;
use flit_queue::Queue;
use flit_feedstore::{CelebrityRegistry, FeedStore};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, warn};
use uuid::Uuid;

pub struct FanoutWorker {
    pub follows: FollowRepository,
    pub feed_store: FeedStore,
    pub celebrities: CelebrityRegistry,
    pub index_queue: Queue,
    pub notify_queue: Queue,
    pub concurrency: usize,
}

impl FanoutWorker {
    /// Handles a single FANOUT work item end to end. Returns a `Transient`
    /// error to request a Nack/retry when the whole backend is down;
    /// per-follower append failures are logged but non-fatal.
    pub async fn handle_fanout(
        &self,
        post_id: Uuid,
        author_id: Uuid,
        follower_count_hint: i64,
        score: f64,
        content_for_index: Option<String>,
    ) -> Result<()> {
        let strategy = planner::plan(follower_count_hint);

        let followers = match strategy {
            Strategy::Push => self.follows.all_followers(author_id, i64::MAX, 0).await?,
            Strategy::Hybrid => {
                self.celebrities.mark(author_id).await?;
                let mut active = self
                    .follows
                    .active_followers(author_id, ACTIVE_DAYS_WINDOW, HYBRID_PUSH_LIMIT as i64)
                    .await?;
                active.truncate(HYBRID_PUSH_LIMIT);
                active
            }
            Strategy::Pull => Vec::new(),
        };

        self.append_to_followers(&followers, post_id, score).await?;

        if let Some(content) = content_for_index {
            if let Err(err) = self
                .index_queue
                .publish(
                    WorkPayload::Index {
                        post_id,
                        content,
                        author_id,
                    },
                    flit_core::domain::Priority::Normal,
                )
                .await
            {
                warn!(post_id = %post_id, error = %err, "failed to enqueue search index follow-on");
            }
        }

        Ok(())
    }

    /// Handles a TOMBSTONE work item: removes a deleted post from every
    /// follower's home feed. Best-effort, same push/hybrid follower set as
    /// `handle_fanout` would have used (spec §9 open question 4) — a post
    /// fanned out under Pull never entered follower feeds, so there is
    /// nothing to remove there, but we still attempt the push/hybrid
    /// follower set unconditionally since the worker has no record of
    /// which strategy the original fan-out chose.
    pub async fn handle_tombstone(&self, post_id: Uuid, author_id: Uuid) -> Result<()> {
        let followers = self.follows.all_followers(author_id, i64::MAX, 0).await?;
        self.remove_from_followers(&followers, post_id).await
    }

    async fn remove_from_followers(&self, followers: &[Uuid], post_id: Uuid) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));

        for batch in followers.chunks(FANOUT_BATCH_SIZE) {
            let mut handles = Vec::with_capacity(batch.len());
            for &follower_id in batch {
                let permit = semaphore.clone().acquire_owned().await.map_err(|_| {
                    FlitError::Internal("fan-out semaphore closed".to_string())
                })?;
                let feed_store = self.feed_store.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let result = feed_store.remove(follower_id, FeedKind::Home, post_id).await;
                    (follower_id, result)
                }));
            }

            let mut backend_down = false;
            for handle in handles {
                match handle.await {
                    Ok((_follower_id, Ok(()))) => {}
                    Ok((follower_id, Err(err))) => {
                        warn!(follower_id = %follower_id, post_id = %post_id, error = %err, "tombstone removal failed");
                        if matches!(err, FlitError::Transient(_)) {
                            backend_down = true;
                        }
                    }
                    Err(join_err) => {
                        error!(error = %join_err, "tombstone removal task panicked");
                    }
                }
            }

            if backend_down {
                return Err(FlitError::Transient(
                    "feed store unreachable during tombstone fan-out".to_string(),
                ));
            }
        }

        Ok(())
    }

    async fn append_to_followers(&self, followers: &[Uuid], post_id: Uuid, score: f64) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));

        for batch in followers.chunks(FANOUT_BATCH_SIZE) {
            let mut handles = Vec::with_capacity(batch.len());
            for &follower_id in batch {
                let permit = semaphore.clone().acquire_owned().await.map_err(|_| {
                    FlitError::Internal("fan-out semaphore closed".to_string())
                })?;
                let feed_store = self.feed_store.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let result = feed_store
                        .append(follower_id, FeedKind::Home, post_id, score, MAX_FEED_SIZE)
                        .await;
                    (follower_id, result)
                }));
            }

            let mut backend_down = false;
            for handle in handles {
                match handle.await {
                    Ok((_follower_id, Ok(()))) => {}
                    Ok((follower_id, Err(err))) => {
                        warn!(follower_id = %follower_id, post_id = %post_id, error = %err, "fan-out append failed");
                        if matches!(err, FlitError::Transient(_)) {
                            backend_down = true;
                        }
                    }
                    Err(join_err) => {
                        error!(error = %join_err, "fan-out append task panicked");
                    }
                }
            }

            if backend_down {
                return Err(FlitError::Transient(
                    "feed store unreachable during fan-out".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Emits a NOTIFY follow-on for an engagement-type fan-out (spec
    /// §4.6: "Emits follow-on work items... NOTIFY for engagement-type
    /// fan-outs").
    pub async fn notify_engagement(
        &self,
        recipient: Uuid,
        actor: Uuid,
        kind: NotificationKind,
        subject_post_id: Option<Uuid>,
    ) -> Result<()> {
        if recipient == actor {
            return Ok(());
        }
        self.notify_queue
            .publish(
                WorkPayload::Notify {
                    recipient,
                    actor,
                    kind,
                    subject_post_id,
                },
                flit_core::domain::Priority::Normal,
            )
            .await?;
        Ok(())
    }
}
