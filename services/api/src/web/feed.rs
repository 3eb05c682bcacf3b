//! services/api/src/web/feed.rs
//!
//! The live response feed for the teacher dashboard. Newly submitted responses
//! are fanned out over per-session broadcast channels and pushed to WebSocket
//! subscribers as JSON events.
//!
//! This is pure push: a client that connects late or drops its connection gets
//! no replay of missed events.

use crate::web::rest::AnswersPayload;
use crate::web::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

/// Capacity of each per-session broadcast channel. A subscriber that falls
/// further behind than this skips ahead and loses the lagged events.
const FEED_CAPACITY: usize = 64;

/// One newly inserted response, as pushed to feed subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEvent {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_name: String,
    pub answers: AnswersPayload,
    pub created_at: DateTime<Utc>,
}

/// A registry of per-session broadcast channels.
#[derive(Clone, Default)]
pub struct ResponseFeed {
    channels: Arc<Mutex<HashMap<Uuid, broadcast::Sender<ResponseEvent>>>>,
}

impl ResponseFeed {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, session_id: Uuid) -> broadcast::Sender<ResponseEvent> {
        let mut channels = self.channels.lock().expect("feed registry poisoned");
        channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .clone()
    }

    /// Publishes an event to any current subscribers of its session. A send
    /// with no subscribers is not an error; the event is simply dropped.
    pub fn publish(&self, event: ResponseEvent) {
        let _ = self.sender(event.session_id).send(event);
    }

    /// Subscribes to insertion events for one session.
    pub fn subscribe(&self, session_id: Uuid) -> broadcast::Receiver<ResponseEvent> {
        self.sender(session_id).subscribe()
    }
}

/// The handler for upgrading HTTP requests to WebSocket feed connections.
pub async fn feed_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<Uuid>,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| run_feed(socket, app_state, session_id))
}

async fn run_feed(socket: WebSocket, app_state: Arc<AppState>, session_id: Uuid) {
    info!("Feed subscriber connected for session {}", session_id);
    let mut rx = app_state.feed.subscribe(session_id);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!("Failed to serialize feed event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // No replay guarantee: skipped events are simply gone.
                    warn!("Feed subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                _ => {}
            },
        }
    }

    info!("Feed subscriber disconnected for session {}", session_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(session_id: Uuid, name: &str) -> ResponseEvent {
        ResponseEvent {
            id: Uuid::new_v4(),
            session_id,
            student_name: name.to_string(),
            answers: AnswersPayload {
                achievement: "organized a festival".to_string(),
                skill: "video editing".to_string(),
                lesson: "ask for help early".to_string(),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let feed = ResponseFeed::new();
        let session_id = Uuid::new_v4();
        let mut rx = feed.subscribe(session_id);

        feed.publish(event(session_id, "Ada"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, session_id);
        assert_eq!(received.student_name, "Ada");
    }

    #[tokio::test]
    async fn events_are_scoped_to_their_session() {
        let feed = ResponseFeed::new();
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut rx = feed.subscribe(watched);

        feed.publish(event(other, "Grace"));
        feed.publish(event(watched, "Ada"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, watched);
        assert_eq!(received.student_name, "Ada");
    }

    #[test]
    fn publishing_without_subscribers_is_a_no_op() {
        let feed = ResponseFeed::new();
        feed.publish(event(Uuid::new_v4(), "Nobody"));
    }
}
