//! "Logging attempt completed" fan-out. One snapshot is built per successful
//! attempt and pushed to every open dashboard of that user.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{stream, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::insights::DashboardSnapshot;
use crate::state::AppState;

const CHANNEL_CAPACITY: usize = 64;

/// `snapshot` is `None` when the views could not be read back after the commit;
/// subscribers should refetch.
#[derive(Debug, Clone, Serialize)]
pub struct LogCompleted {
    pub user_id: Uuid,
    pub meal_id: Uuid,
    pub snapshot: Option<DashboardSnapshot>,
}

#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<Arc<LogCompleted>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Returns the number of subscribers reached.
    pub fn publish(&self, event: LogCompleted) -> usize {
        let reached = self.tx.send(Arc::new(event)).unwrap_or(0);
        debug!(reached, "log completed event published");
        reached
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<LogCompleted>> {
        self.tx.subscribe()
    }
}

/// Events for one user only. Lagging receivers skip what they missed.
pub fn user_events(
    rx: broadcast::Receiver<Arc<LogCompleted>>,
    user_id: Uuid,
) -> impl Stream<Item = Arc<LogCompleted>> {
    stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.user_id == user_id => return Some((event, rx)),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%user_id, skipped, "event subscriber lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", get(stream_events))
}

/// GET /events (text/event-stream)
pub async fn stream_events(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(%user_id, "dashboard subscribed");
    let events = user_events(state.events.subscribe(), user_id).map(|event| {
        let sse = Event::default()
            .event("log_completed")
            .json_data(event.as_ref())
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not encode event");
                Event::default().event("error").data("encoding failed")
            });
        Ok::<_, Infallible>(sse)
    });
    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
