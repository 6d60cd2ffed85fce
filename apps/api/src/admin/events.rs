//! Live change notifications for the admin console, as server-sent events.
//!
//! Each connection gets its own [`SyncController`]; dropping the stream
//! (client disconnect) tears the controller down.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::auth::{token_matches, ADMIN_TOKEN_HEADER};
use crate::errors::AppError;
use crate::state::AppState;
use crate::sync::{Notification, Notifier, SyncController};

struct ChannelNotifier(mpsc::UnboundedSender<Notification>);

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.0.send(notification);
    }
}

/// Stops the controller when the SSE stream is dropped.
struct ControllerGuard(SyncController);

impl Drop for ControllerGuard {
    fn drop(&mut self) {
        self.0.stop();
    }
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub token: Option<String>,
}

/// GET /api/admin/events
/// `EventSource` cannot set request headers, so the admin token is also
/// accepted as a `token` query parameter.
pub async fn events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let header_token = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let supplied = if header_token.is_empty() {
        query.token.clone().unwrap_or_default()
    } else {
        header_token.to_string()
    };
    if !token_matches(&supplied, &state.config.admin_token) {
        return Err(AppError::Unauthorized);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SyncController::new(state.store.clone(), Arc::new(ChannelNotifier(tx)));
    controller.start(&supplied).await?;
    let guard = ControllerGuard(controller);

    let stream = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let notification = rx.recv().await?;
        let event = Event::default()
            .event("change")
            .json_data(&notification)
            .unwrap_or_else(|_| Event::default().event("change"));
        Some((Ok(event), (rx, guard)))
    });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
