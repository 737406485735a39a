//! Real-time event stream over WebSocket.
//!
//! Every new subscriber first receives a full `stations-list` snapshot,
//! then live events as they are published. Delivery is at-most-once per
//! connected subscriber: there is no replay, and a reconnecting viewer
//! relies on the fresh snapshot to catch up.
//!
//! The one client-to-server message is `ping-stations`, which probes every
//! station's liveness and answers the requesting socket (and only it) with
//! a `stations-status` event.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use dualnode_core::StationEvent;
use tracing::debug;

use crate::state::SharedState;

/// Upgrade to the event-stream WebSocket.
pub async fn event_stream(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: SharedState) {
    debug!("viewer connected");

    // Snapshot first, before any live event.
    let snapshot = StationEvent::StationsList {
        stations: state.registry.list().await,
    };
    if send_event(&mut socket, &snapshot).await.is_err() {
        return;
    }

    let mut events = state.bus.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if is_ping_request(&text) => {
                        let stations = state.relay.ping_all().await;
                        let status = StationEvent::StationsStatus { stations };
                        if send_event(&mut socket, &status).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "viewer socket error");
                        break;
                    }
                }
            }
        }
    }

    debug!("viewer disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &StationEvent) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event).map_err(axum::Error::new)?;
    socket.send(Message::Text(payload.into())).await
}

/// Accept the ping request as a bare string or a JSON event envelope.
fn is_ping_request(text: &str) -> bool {
    let text = text.trim();
    if text == "ping-stations" {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(String::from))
        .is_some_and(|event| event == "ping-stations")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_request_detection() {
        assert!(is_ping_request("ping-stations"));
        assert!(is_ping_request("  ping-stations\n"));
        assert!(is_ping_request(r#"{"event":"ping-stations"}"#));
        assert!(!is_ping_request(r#"{"event":"something-else"}"#));
        assert!(!is_ping_request("hello"));
    }
}
