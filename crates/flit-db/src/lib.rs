pub mod engagements;
pub mod follows;
pub mod idempotency;
pub mod notifications;
pub mod outbox;
pub mod pool;
pub mod posts;
pub mod users;

pub use engagements::EngagementRepository;
pub use follows::FollowRepository;
pub use idempotency::IdempotencyRepository;
pub use notifications::NotificationRepository;
pub use outbox::{OutboxRepository, OutboxRow};
pub use pool::{create_pool, migrate, DbConfig};
pub use posts::PostRepository;
pub use users::UserRepository;

use sqlx::PgPool;

/// Bundles every repository over a single pool, the shape `flit-api`'s
/// `AppState` embeds directly.
#[derive(Clone)]
pub struct Repositories {
    pub posts: PostRepository,
    pub follows: FollowRepository,
    pub likes: EngagementRepository,
    pub retweets: EngagementRepository,
    pub notifications: NotificationRepository,
    pub outbox: OutboxRepository,
    pub users: UserRepository,
    pub idempotency: IdempotencyRepository,
}

impl Repositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            posts: PostRepository::new(pool.clone()),
            follows: FollowRepository::new(pool.clone()),
            likes: EngagementRepository::likes(pool.clone()),
            retweets: EngagementRepository::retweets(pool.clone()),
            notifications: NotificationRepository::new(pool.clone()),
            outbox: OutboxRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            idempotency: IdempotencyRepository::new(pool),
        }
    }
}
