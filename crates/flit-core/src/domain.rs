//! Domain model shared across the timeline delivery pipeline (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FlitError, Result};

pub const MAX_CONTENT_CODEPOINTS: usize = 280;

/// Identity type for posts. Opaque, globally unique.
pub type PostId = Uuid;
pub type UserId = Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub content: String,
    pub media_ids: Vec<String>,
    pub reply_to: Option<PostId>,
    pub retweet_of: Option<PostId>,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub retweet_count: i64,
    pub reply_count: i64,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Post {
    /// Score is the post's creation timestamp as nanoseconds since the
    /// epoch, used as the feed-entry ordering key (spec §3, "Score").
    pub fn score(&self) -> f64 {
        score_from_timestamp(self.created_at)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

pub fn score_from_timestamp(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_nanos_opt().unwrap_or(0) as f64
}

/// Validates post content per spec §3/§8 boundary behaviors:
/// content length bounded by `MAX_CONTENT_CODEPOINTS`; empty content is
/// accepted only when the post is a retweet (retweet_of is set).
pub fn validate_content(content: &str, is_retweet: bool) -> Result<()> {
    let len = content.chars().count();
    if len > MAX_CONTENT_CODEPOINTS {
        return Err(FlitError::ValidationFailed(format!(
            "content exceeds {MAX_CONTENT_CODEPOINTS} code points (got {len})"
        )));
    }
    if len == 0 && !is_retweet {
        return Err(FlitError::ValidationFailed(
            "content must not be empty unless this is a retweet".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedKind {
    Home,
    Own,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Home => "home",
            FeedKind::Own => "own",
        }
    }
}

/// Logical tuple (owner user id, post id, score) of spec §3, "Feed entry".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub owner: UserId,
    pub post_id: PostId,
    pub score: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngagementKind {
    Like,
    Retweet,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Engagement {
    pub user_id: UserId,
    pub post_id: PostId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkItemKind {
    Fanout,
    Index,
    Notify,
    MediaProcess,
    Tombstone,
}

impl WorkItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkItemKind::Fanout => "FANOUT",
            WorkItemKind::Index => "INDEX",
            WorkItemKind::Notify => "NOTIFY",
            WorkItemKind::MediaProcess => "MEDIA_PROCESS",
            WorkItemKind::Tombstone => "TOMBSTONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Tagged variant over known work-item payloads (spec §9 redesign flag:
/// replace dynamic payload maps with a discriminated union).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkPayload {
    Fanout {
        post_id: PostId,
        author_id: UserId,
        follower_count_hint: i64,
        score: f64,
    },
    Index {
        post_id: PostId,
        content: String,
        author_id: UserId,
    },
    Notify {
        recipient: UserId,
        actor: UserId,
        kind: NotificationKind,
        subject_post_id: Option<PostId>,
    },
    MediaProcess {
        post_id: PostId,
        media_ids: Vec<String>,
    },
    Tombstone {
        post_id: PostId,
        author_id: UserId,
    },
}

impl WorkPayload {
    pub fn kind(&self) -> WorkItemKind {
        match self {
            WorkPayload::Fanout { .. } => WorkItemKind::Fanout,
            WorkPayload::Index { .. } => WorkItemKind::Index,
            WorkPayload::Notify { .. } => WorkItemKind::Notify,
            WorkPayload::MediaProcess { .. } => WorkItemKind::MediaProcess,
            WorkPayload::Tombstone { .. } => WorkItemKind::Tombstone,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub payload: WorkPayload,
    pub priority: Priority,
    pub enqueued_at: DateTime<Utc>,
    pub redelivery_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Like,
    Retweet,
    Follow,
    Mention,
    Reply,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: UserId,
    #[sqlx(try_from = "String")]
    pub kind: NotificationKindColumn,
    pub actor: UserId,
    pub subject_post_id: Option<PostId>,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// sqlx needs a concrete column type; wraps `NotificationKind` for FromRow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationKindColumn(pub NotificationKind);

impl TryFrom<String> for NotificationKindColumn {
    type Error = String;
    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        let kind = match value.as_str() {
            "like" => NotificationKind::Like,
            "retweet" => NotificationKind::Retweet,
            "follow" => NotificationKind::Follow,
            "mention" => NotificationKind::Mention,
            "reply" => NotificationKind::Reply,
            other => return Err(format!("unknown notification kind: {other}")),
        };
        Ok(NotificationKindColumn(kind))
    }
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Retweet => "retweet",
            NotificationKind::Follow => "follow",
            NotificationKind::Mention => "mention",
            NotificationKind::Reply => "reply",
        }
    }
}

/// Construct a notification, enforcing the spec §3 invariant that
/// self-actions never produce notifications. Returns `None` when
/// `recipient == actor`.
pub fn build_notification(
    recipient: UserId,
    actor: UserId,
    kind: NotificationKind,
    subject_post_id: Option<PostId>,
    data: serde_json::Value,
) -> Option<Notification> {
    if recipient == actor {
        return None;
    }
    Some(Notification {
        id: Uuid::new_v4(),
        recipient,
        kind: NotificationKindColumn(kind),
        actor,
        subject_post_id,
        data,
        read: false,
        created_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterMetric {
    Likes,
    Retweets,
    Replies,
}

impl CounterMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            CounterMetric::Likes => "likes",
            CounterMetric::Retweets => "retweets",
            CounterMetric::Replies => "replies",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_exactly_280_accepted() {
        let content: String = "a".repeat(280);
        assert!(validate_content(&content, false).is_ok());
    }

    #[test]
    fn content_281_rejected() {
        let content: String = "a".repeat(281);
        assert!(matches!(
            validate_content(&content, false),
            Err(FlitError::ValidationFailed(_))
        ));
    }

    #[test]
    fn empty_content_rejected_without_retweet() {
        assert!(validate_content("", false).is_err());
    }

    #[test]
    fn empty_content_accepted_for_retweet() {
        assert!(validate_content("", true).is_ok());
    }

    #[test]
    fn self_notification_suppressed() {
        let uid = Uuid::new_v4();
        let n = build_notification(uid, uid, NotificationKind::Like, None, serde_json::json!({}));
        assert!(n.is_none());
    }

    #[test]
    fn score_monotone_with_timestamp() {
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::nanoseconds(1);
        assert!(score_from_timestamp(t1) < score_from_timestamp(t2));
    }
}
