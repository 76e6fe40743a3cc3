//! Engagement Engine (spec §4.8): post authoring, like/unlike,
//! retweet/unretweet, reply. Grounded on `social-service/src/services`'s
//! write-then-cache-then-enqueue ordering (relational commit first,
//! counter cache and notify/fan-out as best-effort follow-ons) and on
//! `social-service/src/repository/likes.rs`'s idempotent create/delete.

pub mod mentions;

use flit_core::config::thresholds::MAX_FEED_SIZE;
use flit_core::domain::{
    validate_content, CounterMetric, FeedKind, NotificationKind, Post, Priority, WorkPayload,
};
use flit_core::error::{FlitError, Result};
use flit_counters::CounterStore;
use flit_db::{EngagementRepository, FollowRepository, NotificationRepository, PostRepository, UserRepository};
use flit_feedstore::FeedStore;
use flit_queue::{names, Queue};
use flit_realtime::{BusEnvelope, EventKind, LiveEvent, GLOBAL_CHANNEL};
use tracing::warn;
use uuid::Uuid;

#[derive(Clone)]
pub struct EngagementEngine {
    posts: PostRepository,
    follows: FollowRepository,
    likes: EngagementRepository,
    retweets: EngagementRepository,
    users: UserRepository,
    notifications: NotificationRepository,
    counters: CounterStore,
    feed_store: FeedStore,
    fanout_high: Queue,
    fanout_normal: Queue,
    notify_queue: Queue,
    index_queue: Queue,
    bus: flit_bus::BusPublisher,
}

impl EngagementEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        posts: PostRepository,
        follows: FollowRepository,
        likes: EngagementRepository,
        retweets: EngagementRepository,
        users: UserRepository,
        notifications: NotificationRepository,
        counters: CounterStore,
        feed_store: FeedStore,
        fanout_high: Queue,
        fanout_normal: Queue,
        notify_queue: Queue,
        index_queue: Queue,
        bus: flit_bus::BusPublisher,
    ) -> Self {
        Self {
            posts,
            follows,
            likes,
            retweets,
            users,
            notifications,
            counters,
            feed_store,
            fanout_high,
            fanout_normal,
            notify_queue,
            index_queue,
            bus,
        }
    }

    /// Broadcasts a live event onto the Cross-Instance Bus (spec §6.2),
    /// mirroring `handle_notify_item`'s publish-then-forget shape. Best
    /// effort: a dropped live event never affects the authoritative write
    /// it describes.
    async fn publish_live(&self, kind: EventKind, data: serde_json::Value) {
        let envelope = BusEnvelope {
            target: None,
            event: LiveEvent::new(kind, data),
        };
        if let Err(err) = self.bus.publish(GLOBAL_CHANNEL, &envelope).await {
            warn!(kind = kind.as_str(), error = %err, "live event publish failed, best-effort drop");
        }
    }

    /// Writes a freshly authored post into its author's own feed
    /// synchronously, so it's visible there even if the fan-out enqueue
    /// later fails (spec §7: "author's own feed is populated
    /// synchronously").
    async fn append_own_feed(&self, author_id: Uuid, post: &Post) {
        if let Err(err) = self
            .feed_store
            .append(author_id, FeedKind::Own, post.id, post.score(), MAX_FEED_SIZE)
            .await
        {
            warn!(post_id = %post.id, error = %err, "own feed append failed");
        }
    }

    fn fanout_queue(&self, follower_count_hint: i64) -> &Queue {
        if names::fanout_queue_for(follower_count_hint) == names::FANOUT_HIGH {
            &self.fanout_high
        } else {
            &self.fanout_normal
        }
    }

    async fn enqueue_fanout(&self, post: &Post, author_id: Uuid) {
        let follower_count_hint = match self.follows.follower_count(author_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(author_id = %author_id, error = %err, "failed to read follower count for fan-out hint");
                0
            }
        };

        let payload = WorkPayload::Fanout {
            post_id: post.id,
            author_id,
            follower_count_hint,
            score: post.score(),
        };

        if let Err(err) = self
            .fanout_queue(follower_count_hint)
            .publish(payload, Priority::Normal)
            .await
        {
            warn!(post_id = %post.id, error = %err, "fan-out enqueue failed, best-effort drop");
        }

        if let Err(err) = self
            .index_queue
            .publish(
                WorkPayload::Index {
                    post_id: post.id,
                    content: post.content.clone(),
                    author_id,
                },
                Priority::Low,
            )
            .await
        {
            warn!(post_id = %post.id, error = %err, "search index enqueue failed, best-effort drop");
        }
    }

    async fn notify(&self, recipient: Uuid, actor: Uuid, kind: NotificationKind, subject_post_id: Option<Uuid>) {
        if recipient == actor {
            return;
        }
        let payload = WorkPayload::Notify {
            recipient,
            actor,
            kind,
            subject_post_id,
        };
        if let Err(err) = self.notify_queue.publish(payload, Priority::Normal).await {
            warn!(recipient = %recipient, kind = kind.as_str(), error = %err, "notify enqueue failed, best-effort drop");
        }
    }

    /// Creates an original post or a reply. Retweets go through
    /// [`Self::retweet`] instead, since they never carry author-supplied
    /// content.
    pub async fn create_post(
        &self,
        author_id: Uuid,
        content: &str,
        media_ids: Vec<String>,
        reply_to: Option<Uuid>,
    ) -> Result<Post> {
        validate_content(content, false)?;

        if let Some(parent_id) = reply_to {
            let parent = self
                .posts
                .find_by_id(parent_id)
                .await?
                .ok_or_else(|| FlitError::NotFound("reply target not found".to_string()))?;

            let post = self.posts.create(author_id, content, &media_ids, reply_to, None).await?;

            if let Err(err) = self.posts.increment_reply_count(parent_id).await {
                warn!(parent_id = %parent_id, error = %err, "reply counter increment failed, skipping");
            }

            self.append_own_feed(author_id, &post).await;
            self.notify(parent.author_id, author_id, NotificationKind::Reply, Some(post.id)).await;
            self.enqueue_fanout(&post, author_id).await;
            self.notify_mentions(&post, author_id).await;
            self.publish_live(
                EventKind::NewTweet,
                serde_json::json!({"post_id": post.id, "author_id": author_id, "reply_to": reply_to}),
            )
            .await;
            return Ok(post);
        }

        let post = self.posts.create(author_id, content, &media_ids, None, None).await?;
        self.append_own_feed(author_id, &post).await;
        self.enqueue_fanout(&post, author_id).await;
        self.notify_mentions(&post, author_id).await;
        self.publish_live(
            EventKind::NewTweet,
            serde_json::json!({"post_id": post.id, "author_id": author_id, "reply_to": Option::<Uuid>::None}),
        )
        .await;
        Ok(post)
    }

    async fn notify_mentions(&self, post: &Post, author_id: Uuid) {
        for handle in mentions::extract_mentions(&post.content) {
            match self.users.find_by_handle(&handle).await {
                Ok(Some(user_id)) => {
                    self.notify(user_id, author_id, NotificationKind::Mention, Some(post.id)).await;
                }
                Ok(None) => {}
                Err(err) => warn!(handle = %handle, error = %err, "mention handle lookup failed"),
            }
        }
    }

    pub async fn delete_post(&self, post_id: Uuid, caller_id: Uuid) -> Result<()> {
        let removed = self.posts.soft_delete(post_id, caller_id).await?;
        if !removed {
            return Err(FlitError::NotFound("post not found".to_string()));
        }

        if let Err(err) = self
            .fanout_normal
            .publish(
                WorkPayload::Tombstone {
                    post_id,
                    author_id: caller_id,
                },
                Priority::Low,
            )
            .await
        {
            warn!(post_id = %post_id, error = %err, "tombstone fan-out enqueue failed, best-effort drop");
        }
        Ok(())
    }

    /// Idempotent: a repeat like is a no-op success returning the
    /// unchanged count (spec §4.8, §8 scenario 4). Returns the post's
    /// current like count either way.
    pub async fn like(&self, user_id: Uuid, post_id: Uuid) -> Result<i64> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| FlitError::NotFound("post not found".to_string()))?;

        let (_, created) = self.likes.create(user_id, post_id).await?;
        if !created {
            return self.posts.authoritative_count(post_id, CounterMetric::Likes).await;
        }

        let count = self.posts.increment_like_count(post_id).await?;
        if let Err(err) = self.counters.incr(post_id, CounterMetric::Likes).await {
            warn!(post_id = %post_id, error = %err, "like counter cache update failed");
        }
        self.notify(post.author_id, user_id, NotificationKind::Like, Some(post_id)).await;
        self.publish_live(
            EventKind::Like,
            serde_json::json!({"post_id": post_id, "user_id": user_id, "like_count": count}),
        )
        .await;
        Ok(count)
    }

    /// Symmetric with [`Self::like`]; only decrements when a row was
    /// actually removed, returning the post's current like count either
    /// way.
    pub async fn unlike(&self, user_id: Uuid, post_id: Uuid) -> Result<i64> {
        let removed = self.likes.delete(user_id, post_id).await?;
        if !removed {
            return self.posts.authoritative_count(post_id, CounterMetric::Likes).await;
        }
        let count = self.posts.decrement_like_count(post_id).await?;
        if let Err(err) = self.counters.decr(post_id, CounterMetric::Likes).await {
            warn!(post_id = %post_id, error = %err, "like counter cache update failed");
        }
        Ok(count)
    }

    /// Creates the derived retweet post on first call; returns the
    /// existing derivative on repeat calls (idempotent).
    pub async fn retweet(&self, user_id: Uuid, post_id: Uuid) -> Result<Post> {
        let original = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| FlitError::NotFound("post not found".to_string()))?;

        let (_, created) = self.retweets.create(user_id, post_id).await?;
        if !created {
            return self
                .posts
                .find_retweet(user_id, post_id)
                .await?
                .ok_or_else(|| FlitError::Internal("retweet record exists without derived post".to_string()));
        }

        let derived = self.posts.create(user_id, "", &[], None, Some(post_id)).await?;
        let count = self.posts.increment_retweet_count(post_id).await?;
        if let Err(err) = self.counters.incr(post_id, CounterMetric::Retweets).await {
            warn!(post_id = %post_id, error = %err, "retweet counter cache update failed");
        }

        self.append_own_feed(user_id, &derived).await;
        self.notify(original.author_id, user_id, NotificationKind::Retweet, Some(post_id)).await;
        self.enqueue_fanout(&derived, user_id).await;
        self.publish_live(
            EventKind::Retweet,
            serde_json::json!({"post_id": post_id, "user_id": user_id, "retweet_count": count}),
        )
        .await;
        Ok(derived)
    }

    /// Returns the post's current retweet count either way, matching
    /// [`Self::unlike`]'s idempotent-count shape.
    pub async fn unretweet(&self, user_id: Uuid, post_id: Uuid) -> Result<i64> {
        let removed = self.retweets.delete(user_id, post_id).await?;
        if !removed {
            return self.posts.authoritative_count(post_id, CounterMetric::Retweets).await;
        }
        let count = self.posts.decrement_retweet_count(post_id).await?;
        if let Err(err) = self.counters.decr(post_id, CounterMetric::Retweets).await {
            warn!(post_id = %post_id, error = %err, "retweet counter cache update failed");
        }
        if let Some(derived) = self.posts.find_retweet(user_id, post_id).await? {
            self.posts.soft_delete(derived.id, user_id).await?;
        }
        Ok(count)
    }

    /// Follow with a notification to the followee; idempotent on repeat
    /// calls.
    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<()> {
        let created = self.follows.follow(follower_id, followee_id).await?;
        if created {
            self.notify(followee_id, follower_id, NotificationKind::Follow, None).await;
            self.publish_live(
                EventKind::Follow,
                serde_json::json!({"follower_id": follower_id, "followee_id": followee_id}),
            )
            .await;
        }
        Ok(())
    }

    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<()> {
        self.follows.unfollow(follower_id, followee_id).await?;
        Ok(())
    }

    pub async fn mark_notification_read(&self, notification_id: Uuid, recipient: Uuid) -> Result<bool> {
        self.notifications.mark_read(notification_id, recipient).await
    }
}
