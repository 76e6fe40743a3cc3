//! Post authoring and engagement handlers (spec §6.1). Grounded on
//! `content-service/src/handlers/posts.rs`'s `create_post`/`get_post`/
//! `get_user_posts`/`delete_post` shape.

use actix_web::{web, HttpResponse};
use flit_core::error::{FlitError, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CallerId;
use crate::handlers::PaginationParams;
use crate::state::AppState;

const MAX_BATCH_IDS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    #[serde(default)]
    pub media_ids: Vec<String>,
    #[serde(default)]
    pub reply_to: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<Uuid>,
}

pub async fn create_post(
    state: web::Data<AppState>,
    caller: CallerId,
    body: web::Json<CreatePostRequest>,
) -> Result<HttpResponse> {
    let post = state
        .engagement
        .create_post(caller.0, &body.content, body.media_ids.clone(), body.reply_to)
        .await?;
    Ok(HttpResponse::Created().json(post))
}

pub async fn get_post(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let post = state
        .repos
        .posts
        .find_by_id(path.into_inner())
        .await?
        .ok_or_else(|| FlitError::NotFound("post not found".to_string()))?;
    Ok(HttpResponse::Ok().json(post))
}

/// Checks ownership itself before delegating, since the repository's
/// `soft_delete` can't distinguish "not found" from "not the author" from
/// its single rows-affected boolean.
pub async fn delete_post(
    state: web::Data<AppState>,
    caller: CallerId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let post_id = path.into_inner();
    let post = state
        .repos
        .posts
        .find_by_id(post_id)
        .await?
        .ok_or_else(|| FlitError::NotFound("post not found".to_string()))?;

    if post.author_id != caller.0 {
        return Err(FlitError::Forbidden("not the author of this post".to_string()));
    }

    state.engagement.delete_post(post_id, caller.0).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"id": post_id, "deleted": true})))
}

pub async fn like(state: web::Data<AppState>, caller: CallerId, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let like_count = state.engagement.like(caller.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"like_count": like_count})))
}

pub async fn unlike(state: web::Data<AppState>, caller: CallerId, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let like_count = state.engagement.unlike(caller.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"like_count": like_count})))
}

pub async fn retweet(state: web::Data<AppState>, caller: CallerId, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let derived = state.engagement.retweet(caller.0, path.into_inner()).await?;
    Ok(HttpResponse::Created().json(derived))
}

pub async fn unretweet(state: web::Data<AppState>, caller: CallerId, path: web::Path<Uuid>) -> Result<HttpResponse> {
    let retweet_count = state.engagement.unretweet(caller.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"retweet_count": retweet_count})))
}

pub async fn replies(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let posts = state
        .repos
        .posts
        .find_replies(path.into_inner(), query.limit_or(20), query.offset_or_zero())
        .await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn batch(state: web::Data<AppState>, body: web::Json<BatchRequest>) -> Result<HttpResponse> {
    if body.ids.len() > MAX_BATCH_IDS {
        return Err(FlitError::ValidationFailed(format!(
            "batch request exceeds {MAX_BATCH_IDS} ids"
        )));
    }
    let posts = state.repos.posts.find_batch(&body.ids).await?;
    Ok(HttpResponse::Ok().json(posts))
}

pub async fn user_posts(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    let posts = state
        .repos
        .posts
        .find_by_author(path.into_inner(), query.limit_or(20), query.offset_or_zero())
        .await?;
    Ok(HttpResponse::Ok().json(posts))
}
