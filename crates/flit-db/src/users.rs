//! Minimal user lookups needed outside of identity/auth concerns (handle
//! resolution for @mentions, last-active timestamping for the hybrid
//! fan-out active-follower window).

use flit_core::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_handle(&self, handle: &str) -> Result<Option<Uuid>> {
        let id: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE handle = $1")
            .bind(handle)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn touch_last_active(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_active_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
