//! Server-Sent Events (SSE) utilities
//!
//! Re-emits an event bus subscription as server-push messages.

use crate::events::EventSubscription;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Turn a bus subscription into an SSE response body
///
/// Each event is sent as one `data:` message holding its JSON encoding.
/// Events that fail to serialize are skipped with a warning. The stream
/// ends when the client disconnects (axum drops the stream, which drops
/// the subscription) or when the bus is gone.
///
/// # Example
/// ```rust,ignore
/// async fn stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     classify_common::sse::event_stream(state.event_bus.subscribe(), "classify")
/// }
/// ```
pub fn event_stream<E>(
    subscription: EventSubscription<E>,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    E: Serialize + Send + 'static,
{
    info!("New SSE client connected to {} event stream", service_name);

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        let mut subscription = subscription;
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    debug!("SSE: forwarding event ({} bytes)", json.len());
                    yield Ok(Event::default().data(json));
                }
                Err(e) => {
                    warn!("SSE: failed to encode event: {}", e);
                }
            }
        }

        info!("SSE: {} event stream closed", service_name);
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
