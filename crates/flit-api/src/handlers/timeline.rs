//! Timeline read and internal fan-out write handlers (spec §6.1, §4.5,
//! §4.7). `add` and `follower_ids` are internal endpoints a fan-out
//! worker or another instance calls; they carry no bearer-auth
//! requirement of their own beyond network placement.

use actix_web::{web, HttpResponse};
use flit_core::error::Result;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CallerId;
use crate::handlers::PaginationParams;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddToFeedRequest {
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub score: f64,
}

pub async fn home(
    state: web::Data<AppState>,
    caller: CallerId,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let cursor = query.offset.map(flit_feed::cursor::encode);
    let page = state
        .feed
        .home_feed(caller.0, query.limit_or(20), cursor.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn user_timeline(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let cursor = query.offset.map(flit_feed::cursor::encode);
    let page = state
        .feed
        .own_feed(path.into_inner(), query.limit_or(20), cursor.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

/// Internal: appends a feed entry directly, bypassing the engagement
/// engine. Used by the fan-out worker path when it runs out-of-process
/// from `flit-api` (spec §4.5).
pub async fn add(state: web::Data<AppState>, body: web::Json<AddToFeedRequest>) -> Result<HttpResponse> {
    state
        .feed_store
        .append(
            body.user_id,
            flit_core::domain::FeedKind::Home,
            body.post_id,
            body.score,
            flit_core::config::thresholds::MAX_FEED_SIZE,
        )
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn follower_ids(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let ids = state
        .repos
        .follows
        .all_followers(path.into_inner(), query.limit_or(1000), query.offset_or_zero())
        .await?;
    Ok(HttpResponse::Ok().json(ids))
}
