//! Reconnect catch-up path against the persisted notification store
//! (spec §4.9). Not part of spec §6.1's literal route list, but needed
//! to make `NotificationRepository::list_for_user`/`mark_read` reachable.

use actix_web::{web, HttpResponse};
use flit_core::error::Result;
use uuid::Uuid;

use crate::auth::CallerId;
use crate::handlers::PaginationParams;
use crate::state::AppState;

pub async fn list(
    state: web::Data<AppState>,
    caller: CallerId,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let notifications = state
        .repos
        .notifications
        .list_for_user(caller.0, query.limit_or(20), query.offset_or_zero())
        .await?;
    Ok(HttpResponse::Ok().json(notifications))
}

pub async fn mark_read(
    state: web::Data<AppState>,
    caller: CallerId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    state.engagement.mark_notification_read(path.into_inner(), caller.0).await?;
    Ok(HttpResponse::NoContent().finish())
}
