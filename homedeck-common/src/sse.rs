//! Server-Sent Events (SSE) utilities
//!
//! The push channel of the console: every connected client gets its own
//! EventBus subscription for as long as the HTTP connection stays open.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info};

use crate::events::{DeckEvent, EventBus};

/// Interval between keep-alive comments on idle connections
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Convert a bus event into a named SSE event with a plain-text payload
pub fn to_sse_event(event: &DeckEvent) -> Event {
    Event::default()
        .event(event.event_type())
        .data(event.payload())
}

/// Create an SSE stream relaying every EventBus event to one client
///
/// The subscription is taken before this function returns, so no event
/// published after the client connected is missed. When the client goes
/// away axum drops the stream, which drops the subscription.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     homedeck_common::sse::create_event_sse_stream(&state.event_bus, "homedeck-server")
/// }
/// ```
pub fn create_event_sse_stream(
    event_bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut subscription = event_bus.subscribe();
    info!(
        subscribers = event_bus.subscriber_count(),
        "New SSE client connected to {} events", service_name
    );

    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            debug!(event_type = event.event_type(), job_id = %event.job_id(), "SSE: relaying event");
            yield Ok(to_sse_event(&event));
        }
        info!("SSE: {} event bus closed, ending stream", service_name);
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    )
}
