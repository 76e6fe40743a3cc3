//! Feed Assembler (spec §4.7): serves home and own feeds with cursor
//! pagination, merging pushed entries with pull-time celebrity reads and
//! rebuilding a cold cache under a per-user lock. Grounded on
//! `content-service/src/services/feed_ranking.rs`'s `get_feed` /
//! `fallback_feed` chain, adapted from a ranking fallback into the
//! simpler push/pull merge this system's feed store already encodes.

pub mod cursor;

use flit_core::config::thresholds::{
    CELEBRITY_RECENT_PER_AUTHOR, CELEBRITY_THRESHOLD, DEFAULT_FEED_LIMIT,
    MAX_REBUILD_FOLLOWED_ACCOUNTS, MAX_FEED_LIMIT, MAX_FEED_SIZE, REBUILD_LOCK_TTL_SECS,
    REBUILD_OWN_FEED_SAMPLE,
};
use flit_core::domain::{FeedKind, Post};
use flit_core::error::Result;
use flit_db::{FollowRepository, PostRepository};
use flit_feedstore::{CelebrityRegistry, DistributedLock, FeedStore};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct FeedPage {
    pub tweets: Vec<Post>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Clone)]
pub struct FeedAssembler {
    feed_store: FeedStore,
    posts: PostRepository,
    follows: FollowRepository,
    celebrities: CelebrityRegistry,
    lock: DistributedLock,
}

impl FeedAssembler {
    pub fn new(
        feed_store: FeedStore,
        posts: PostRepository,
        follows: FollowRepository,
        celebrities: CelebrityRegistry,
        lock: DistributedLock,
    ) -> Self {
        Self {
            feed_store,
            posts,
            follows,
            celebrities,
            lock,
        }
    }

    fn normalize_limit(limit: i64) -> i64 {
        if limit <= 0 {
            DEFAULT_FEED_LIMIT
        } else {
            limit.min(MAX_FEED_LIMIT)
        }
    }

    pub async fn home_feed(&self, user_id: Uuid, limit: i64, cursor: Option<&str>) -> Result<FeedPage> {
        let limit = Self::normalize_limit(limit);
        let offset = match cursor {
            Some(c) => cursor::decode(c)?,
            None => 0,
        };

        if offset == 0 && !self.home_feed_populated(user_id).await? {
            self.rebuild_home_feed(user_id).await;
        }

        let mut entries = self
            .feed_store
            .range_with_scores(user_id, FeedKind::Home, offset as isize, (limit + 1) as isize)
            .await?;

        // "Celebrity" covers both accounts over the live follower-count
        // threshold and accounts a Hybrid fan-out already marked (spec
        // §4.5: "mark the author as celebrity so future reads also
        // pull") — the two sets overlap but neither subsumes the other.
        let followees = self.follows.followees(user_id, MAX_REBUILD_FOLLOWED_ACCOUNTS as i64).await?;
        for followee_id in followees {
            let over_threshold = self.follows.follower_count(followee_id).await? >= CELEBRITY_THRESHOLD;
            let marked = self.celebrities.is_celebrity(followee_id).await?;
            if !over_threshold && !marked {
                continue;
            }
            let recent = self
                .feed_store
                .range_with_scores(followee_id, FeedKind::Own, 0, CELEBRITY_RECENT_PER_AUTHOR as isize)
                .await?;
            entries.extend(recent);
        }

        self.finish_page(entries, offset, limit).await
    }

    pub async fn own_feed(&self, user_id: Uuid, limit: i64, cursor: Option<&str>) -> Result<FeedPage> {
        let limit = Self::normalize_limit(limit);
        let offset = match cursor {
            Some(c) => cursor::decode(c)?,
            None => 0,
        };

        let entries = self
            .feed_store
            .range_with_scores(user_id, FeedKind::Own, offset as isize, (limit + 1) as isize)
            .await?;

        if entries.is_empty() && offset == 0 {
            let posts = self.posts.find_by_author(user_id, limit + 1, 0).await?;
            let has_more = posts.len() as i64 > limit;
            let mut tweets = posts;
            tweets.truncate(limit as usize);
            let next_cursor = if has_more { Some(cursor::encode(offset + limit)) } else { None };
            return Ok(FeedPage { tweets, next_cursor, has_more });
        }

        self.finish_page(entries, offset, limit).await
    }

    async fn home_feed_populated(&self, user_id: Uuid) -> Result<bool> {
        let size = self.feed_store.size(user_id, FeedKind::Home).await?;
        Ok(size > 0)
    }

    /// Step 4 of the home-feed algorithm: enumerate followed accounts
    /// (bounded), pull each one's recent own-feed entries, and replace
    /// the cold cache — all under a distributed lock so concurrent
    /// readers for the same user don't all pay the rebuild cost (spec
    /// §7 thundering-herd control). Losers simply fall through and serve
    /// whatever is (or isn't yet) cached.
    async fn rebuild_home_feed(&self, user_id: Uuid) {
        let lock_key = format!("rebuild:home:{user_id}");
        let guard = match self.lock.acquire(&lock_key, REBUILD_LOCK_TTL_SECS).await {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                debug!(user_id = %user_id, "home feed rebuild lock contended, skipping");
                tokio::time::sleep(Duration::from_millis(50)).await;
                return;
            }
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to acquire rebuild lock");
                return;
            }
        };

        let result = self.do_rebuild(user_id).await;
        if let Err(err) = result {
            warn!(user_id = %user_id, error = %err, "home feed rebuild failed");
        }
        if let Err(err) = self.lock.release(guard).await {
            warn!(user_id = %user_id, error = %err, "failed to release rebuild lock");
        }
    }

    async fn do_rebuild(&self, user_id: Uuid) -> Result<()> {
        let followees = self.follows.followees(user_id, MAX_REBUILD_FOLLOWED_ACCOUNTS as i64).await?;
        let mut entries = Vec::new();
        for followee_id in followees {
            let recent = self
                .feed_store
                .range_with_scores(followee_id, FeedKind::Own, 0, REBUILD_OWN_FEED_SAMPLE as isize)
                .await?;
            entries.extend(recent);
        }
        self.feed_store.replace(user_id, FeedKind::Home, &entries, MAX_FEED_SIZE).await
    }

    async fn finish_page(&self, entries: Vec<(Uuid, f64)>, offset: i64, limit: i64) -> Result<FeedPage> {
        let mut by_id: HashMap<Uuid, f64> = HashMap::with_capacity(entries.len());
        for (id, score) in entries {
            by_id
                .entry(id)
                .and_modify(|existing| {
                    if score > *existing {
                        *existing = score;
                    }
                })
                .or_insert(score);
        }

        let mut deduped: Vec<(Uuid, f64)> = by_id.into_iter().collect();
        // descending by score; ties broken by ascending post id (spec §4.7).
        deduped.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let has_more = deduped.len() as i64 > limit;
        deduped.truncate(limit as usize);

        let ids: Vec<Uuid> = deduped.iter().map(|(id, _)| *id).collect();
        let posts = self.posts.find_batch(&ids).await?;
        let mut by_post_id: HashMap<Uuid, Post> = posts.into_iter().map(|p| (p.id, p)).collect();
        let tweets: Vec<Post> = ids.into_iter().filter_map(|id| by_post_id.remove(&id)).collect();

        let next_cursor = if has_more { Some(cursor::encode(offset + limit)) } else { None };

        Ok(FeedPage { tweets, next_cursor, has_more })
    }
}
