use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::RelayFrame;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    error::AppError,
    relay::{RelayHub, CONNECTION_BUFFER},
    routes::auth::authenticate,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct RelayQuery {
    token: Option<String>,
}

/// GET /ws/relay?token=<jwt>
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<RelayQuery>,
) -> Result<impl IntoResponse, AppError> {
    let token = query
        .token
        .ok_or_else(|| AppError::AuthError("Missing token".to_string()))?;
    let auth = authenticate(&state, &token).await?;
    let user_id =
        Uuid::parse_str(&auth.user.id).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let connection_id = Uuid::new_v4();

    // Channel for frames fanned out to this socket
    let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_BUFFER);
    state.relay.register(connection_id, user_id, tx);

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                forward_frame(&state.relay, &connection_id, &text);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Relay socket {} error: {}", connection_id, e);
                break;
            }
        }
    }

    state.relay.unregister(&connection_id);
    send_task.abort();
}

/// Fan a `message` frame out verbatim; anything else is logged and dropped.
fn forward_frame(relay: &RelayHub, origin: &Uuid, text: &str) -> usize {
    match serde_json::from_str::<RelayFrame>(text) {
        Ok(frame) if frame.is_message() => {
            let delivered = relay.broadcast_except(origin, text);
            tracing::debug!("Relayed frame from {} to {} sockets", origin, delivered);
            delivered
        }
        Ok(frame) => {
            tracing::debug!("Ignoring relay event '{}' from {}", frame.event, origin);
            0
        }
        Err(e) => {
            tracing::warn!("Invalid relay frame from {}: {}", origin, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_only_message_frames_are_forwarded() {
        let hub = RelayHub::new();
        let (origin, peer) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx_origin, mut rx_origin) = mpsc::channel(4);
        let (tx_peer, mut rx_peer) = mpsc::channel(4);
        hub.register(origin, Uuid::new_v4(), tx_origin);
        hub.register(peer, Uuid::new_v4(), tx_peer);

        let frame = r#"{"event":"message","data":{"anything":[1,2,3]}}"#;
        assert_eq!(forward_frame(&hub, &origin, frame), 1);
        // Forwarded byte-for-byte
        assert_eq!(rx_peer.recv().await.as_deref(), Some(frame));
        assert!(rx_origin.try_recv().is_err());

        assert_eq!(forward_frame(&hub, &origin, r#"{"event":"typing","data":{}}"#), 0);
        assert_eq!(forward_frame(&hub, &origin, "not json"), 0);
        assert!(rx_peer.try_recv().is_err());
    }
}
