//! SSE streaming endpoint for dashboard observers.
//!
//! GET /api/tracking/stream
//!
//! One long-lived push connection per observer:
//! 1. write a "connected" frame,
//! 2. replay the buffered backlog and subscribe to live events - both under
//!    one bus lock, so replay and live delivery never interleave,
//! 3. write a one-time "initial_state" frame with the current job list,
//! 4. emit a timestamped heartbeat comment on a fixed interval to defeat
//!    idle-connection timeouts in intermediary proxies.
//!
//! The transport's cancellation signal is the sole teardown authority: when
//! the client disconnects, axum drops the stream, which drops the
//! subscription guard and unregisters every handler. A keep-alive or data
//! write failure surfaces as the same drop.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::header,
    response::sse::{Event, Sse},
    response::IntoResponse,
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};
use tracing::debug;

use crate::kernel::tracking::BusRecord;
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

/// Cap on jobs included in the initial-state frame.
const INITIAL_STATE_LIMIT: usize = 100;

pub async fn stream_handler(
    Extension(state): Extension<AppState>,
    user: AuthUser,
) -> impl IntoResponse {
    let deps = &state.deps;
    debug!(user_id = %user.user_id, "tracking stream connected");

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<BusRecord>();

    // Snapshot-then-subscribe is atomic on the bus side; an event emitted
    // after the snapshot reaches the channel exactly once.
    let (replay, subscription) = deps.bus.subscribe_all(std::sync::Arc::new(move |record: &BusRecord| {
        // A closed channel means the connection is going away; the guard
        // cleans the registration up when the stream drops.
        let _ = tx.send(record.clone());
    }));

    let mut head: Vec<Event> = Vec::with_capacity(replay.len() + 2);
    head.push(
        Event::default().event("connected").data(
            json!({ "type": "connected", "timestamp": Utc::now() }).to_string(),
        ),
    );
    for record in &replay {
        head.push(record_event(record));
    }

    let jobs = deps.tracker.all_jobs();
    let jobs = &jobs[..jobs.len().min(INITIAL_STATE_LIMIT)];
    head.push(
        Event::default().event("initial_state").data(
            json!({
                "type": "initial_state",
                "timestamp": Utc::now(),
                "jobs": jobs,
            })
            .to_string(),
        ),
    );

    let head = stream::iter(head.into_iter().map(Ok::<_, Infallible>));

    let live = UnboundedReceiverStream::new(rx).map(move |record| {
        // The subscription guard lives exactly as long as this stream.
        let _held = &subscription;
        Ok::<_, Infallible>(record_event(&record))
    });

    let heartbeats =
        IntervalStream::new(tokio::time::interval(Duration::from_secs(deps.heartbeat_secs))).map(
            |_| {
                Ok::<_, Infallible>(
                    Event::default().comment(format!("heartbeat {}", Utc::now().to_rfc3339())),
                )
            },
        );

    let events: Box<dyn Stream<Item = Result<Event, Infallible>> + Send + Unpin> =
        Box::new(head.chain(stream::select(live, heartbeats)));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    )
}

fn record_event(record: &BusRecord) -> Event {
    Event::default()
        .event(record.event.kind().as_str())
        .data(record.to_frame().to_string())
}
