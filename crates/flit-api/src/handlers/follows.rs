//! Follow graph mutation handlers. Not part of spec §6.1's literal route
//! list, but needed to make `EngagementEngine::follow`/`unfollow`
//! reachable from outside the engine's own unit tests.

use actix_web::{web, HttpResponse};
use flit_core::error::Result;
use uuid::Uuid;

use crate::auth::CallerId;
use crate::state::AppState;

pub async fn follow(state: web::Data<AppState>, caller: CallerId, path: web::Path<Uuid>) -> Result<HttpResponse> {
    state.engagement.follow(caller.0, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn unfollow(state: web::Data<AppState>, caller: CallerId, path: web::Path<Uuid>) -> Result<HttpResponse> {
    state.engagement.unfollow(caller.0, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
