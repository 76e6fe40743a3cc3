//! Health/readiness/liveness triad, grounded on `content-service`'s
//! `HealthState`/`readiness_summary` shape, trimmed to this system's two
//! backing stores (Postgres, Redis).

use actix_web::{web, HttpResponse};
use redis::aio::ConnectionManager;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct HealthState {
    pub db_pool: PgPool,
    pub redis: Mutex<ConnectionManager>,
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    checks: HashMap<String, ComponentCheck>,
}

impl HealthState {
    async fn check_postgres(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await.map(|_| ())
    }

    async fn check_redis(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.redis.lock().await;
        let pong: String = redis::cmd("PING").query_async(&mut *conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(redis::RedisError::from((redis::ErrorKind::ResponseError, "unexpected PING response")))
        }
    }
}

pub async fn health(_state: web::Data<HealthState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok", "service": "flit-api"}))
}

pub async fn ready(state: web::Data<HealthState>) -> HttpResponse {
    let mut checks = HashMap::new();
    let mut is_ready = true;

    let start = Instant::now();
    let pg_result = state.check_postgres().await;
    let postgres_check = ComponentCheck {
        status: if pg_result.is_ok() { ComponentStatus::Healthy } else { ComponentStatus::Unhealthy },
        message: pg_result.err().map(|e| e.to_string()).unwrap_or_else(|| "ok".to_string()),
        latency_ms: start.elapsed().as_millis() as u64,
    };
    is_ready &= matches!(postgres_check.status, ComponentStatus::Healthy);
    checks.insert("postgresql".to_string(), postgres_check);

    let start = Instant::now();
    let redis_result = state.check_redis().await;
    let redis_check = ComponentCheck {
        status: if redis_result.is_ok() { ComponentStatus::Healthy } else { ComponentStatus::Unhealthy },
        message: redis_result.err().map(|e| e.to_string()).unwrap_or_else(|| "ok".to_string()),
        latency_ms: start.elapsed().as_millis() as u64,
    };
    is_ready &= matches!(redis_check.status, ComponentStatus::Healthy);
    checks.insert("redis".to_string(), redis_check);

    let response = ReadinessResponse { ready: is_ready, checks };
    if is_ready {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

pub async fn live() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"alive": true}))
}
