use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, State};
use axum::response::Response;
use council_application::GovernanceEvent;
use council_core::Identity;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

const WELCOME_MESSAGE: &str = "connected to council events";

pub async fn events_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let events = state.event_publisher.subscribe();
    let subject = identity.subject().to_owned();

    upgrade.on_upgrade(move |socket| stream_events(socket, events, subject))
}

async fn stream_events(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<GovernanceEvent>,
    subject: String,
) {
    debug!(subject = %subject, "event subscriber connected");
    if socket
        .send(Message::Text(WELCOME_MESSAGE.into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(error) => {
                            warn!(error = %error, "failed to encode governance event");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(subject = %subject, skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(subject = %subject, "event subscriber disconnected");
}
