//! Server-Sent Events push channel
//!
//! Streams every acquisition job event to the client:
//! - `job:started` (data: target)
//! - `job:log` (data: output line; stderr lines prefixed `ERROR: `)
//! - `job:finished` (data: exit summary)
//! - `job:spawn_error` (data: launch failure)

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    homedeck_common::sse::create_event_sse_stream(&state.event_bus, "homedeck-server")
}
