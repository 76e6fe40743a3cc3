//! Live event stream endpoint (spec §6.2). Grounded on
//! `notification-service`'s WebSocket handler, re-cast over SSE: the
//! session's receiver is wrapped into a byte stream, touching the guard
//! on every emitted frame so an actively-draining connection never gets
//! reaped by the idle sweeper.

use actix_web::{web, HttpResponse};
use bytes::Bytes;
use futures_util::StreamExt;

use crate::auth::CallerId;
use crate::state::AppState;

const SESSION_CHANNEL_BUFFER: usize = 64;

pub async fn stream(state: web::Data<AppState>, caller: CallerId) -> HttpResponse {
    let (rx, guard) = state.realtime.register(caller.0, SESSION_CHANNEL_BUFFER).await;
    let events = flit_realtime::live_event_stream(rx);

    let body = events.map(move |event| {
        guard.touch();
        Ok::<Bytes, actix_web::Error>(Bytes::from(event.render()))
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body)
}
