//! Centralized environment configuration, following the `Config::from_env`
//! convention used across the reference architecture's services.

use std::fmt;

#[derive(Clone)]
pub struct Config {
    pub instance_id: String,
    pub addr: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_addr: String,
    pub redis_sentinel_addrs: Vec<String>,
    pub redis_master_name: Option<String>,
    pub redis_password: Option<String>,
    pub rabbitmq_url: Option<String>,
    pub elasticsearch_url: Option<String>,
    pub max_upload_size: usize,
    pub jwt_secret: String,
    pub tls_enabled: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("instance_id", &self.instance_id)
            .field("addr", &self.addr)
            .field("port", &self.port)
            .field("database_url", &"[REDACTED]")
            .field("db_max_connections", &self.db_max_connections)
            .field("redis_addr", &self.redis_addr)
            .field("redis_sentinel_addrs", &self.redis_sentinel_addrs)
            .field("redis_master_name", &self.redis_master_name)
            .field("redis_password", &self.redis_password.as_ref().map(|_| "[REDACTED]"))
            .field("rabbitmq_url", &self.rabbitmq_url.as_ref().map(|_| "[REDACTED]"))
            .field("elasticsearch_url", &self.elasticsearch_url)
            .field("max_upload_size", &self.max_upload_size)
            .field("jwt_secret", &"[REDACTED]")
            .field("tls_enabled", &self.tls_enabled)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Config {
            instance_id: std::env::var("INSTANCE_ID")
                .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string()),
            addr: std::env::var("ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/flit".to_string()),
            db_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            redis_addr: std::env::var("REDIS_ADDR")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            redis_sentinel_addrs: std::env::var("REDIS_SENTINEL_ADDRS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            redis_master_name: std::env::var("REDIS_MASTER_NAME").ok(),
            redis_password: std::env::var("REDIS_PASSWORD").ok(),
            rabbitmq_url: std::env::var("RABBITMQ_URL").ok(),
            elasticsearch_url: std::env::var("ELASTICSEARCH_URL").ok(),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8 * 1024 * 1024),
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            tls_enabled: std::env::var("TLS_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
        })
    }
}

/// Compile-time thresholds from spec §6.4 — not environment-configurable.
pub mod thresholds {
    pub const SMALL_FOLLOWER_THRESHOLD: i64 = 10_000;
    pub const MEDIUM_FOLLOWER_THRESHOLD: i64 = 1_000_000;
    pub const CELEBRITY_THRESHOLD: i64 = MEDIUM_FOLLOWER_THRESHOLD;
    pub const HYBRID_PUSH_LIMIT: usize = 5_000;
    pub const MAX_FEED_SIZE: usize = 800;
    pub const FANOUT_BATCH_SIZE: usize = 1_000;
    pub const ACTIVE_DAYS_WINDOW: i64 = 7;
    pub const CELEBRITY_RECENT_PER_AUTHOR: usize = 5;
    pub const MAX_REBUILD_FOLLOWED_ACCOUNTS: usize = 500;
    pub const REBUILD_OWN_FEED_SAMPLE: i64 = 10;
    pub const WORK_ITEM_MAX_REDELIVERIES: u32 = 5;
    pub const DEFAULT_FANOUT_CONCURRENCY: usize = 10;
    pub const DEFAULT_FEED_LIMIT: i64 = 20;
    pub const MAX_FEED_LIMIT: i64 = 100;
    pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 600;
    pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 300;
    pub const SESSION_KEEPALIVE_SECS: u64 = 30;
    pub const REBUILD_LOCK_TTL_SECS: u64 = 60;
    /// How long a claimed-but-unacked outbox row stays invisible to other
    /// claimers before it's considered abandoned and eligible for reclaim.
    pub const OUTBOX_CLAIM_LEASE_SECS: i64 = 60;
}
