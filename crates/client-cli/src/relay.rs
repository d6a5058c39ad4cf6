//! Relay socket client.
//!
//! Sends chat envelopes handed over by the inbox and reports inbound ones
//! back. Reconnects with capped exponential backoff; frames produced while
//! disconnected are dropped rather than replayed later.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use shared::{ChatEnvelope, RelayFrame};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// What the relay task reports to the UI thread
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    Connected,
    Disconnected { retry_in: Duration },
    Inbound(ChatEnvelope),
}

/// Result of a connection attempt
enum ConnectionResult {
    /// Server closed the socket or it dropped (reconnect)
    Disconnected,
    /// The inbox hung up (exit)
    Shutdown,
}

pub fn next_delay(current: Duration) -> Duration {
    std::cmp::min(current * 2, MAX_RECONNECT_DELAY)
}

/// Keep a relay connection alive until `outbound` closes.
pub async fn run(
    url: String,
    mut outbound: mpsc::Receiver<ChatEnvelope>,
    events: std_mpsc::Sender<RelayEvent>,
) {
    let mut reconnect_delay = INITIAL_RECONNECT_DELAY;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let retry_in = match run_connection(&url, &mut outbound, &events).await {
            Ok(ConnectionResult::Shutdown) => {
                tracing::info!("Relay shutting down");
                break;
            }
            Ok(ConnectionResult::Disconnected) => {
                // Reset backoff since we had a successful connection
                reconnect_delay = INITIAL_RECONNECT_DELAY;
                attempt = 0;
                tracing::warn!("Relay connection lost. Reconnecting in {:?}...", reconnect_delay);
                reconnect_delay
            }
            Err(e) => {
                tracing::error!(
                    "Relay connection error: {}. Reconnecting in {:?}... (attempt {})",
                    e,
                    reconnect_delay,
                    attempt
                );
                let current = reconnect_delay;
                reconnect_delay = next_delay(reconnect_delay);
                current
            }
        };

        if events.send(RelayEvent::Disconnected { retry_in }).is_err() {
            break;
        }
        tokio::time::sleep(retry_in).await;

        if drain_stale(&mut outbound) {
            tracing::info!("Relay shutting down");
            break;
        }
    }
}

/// Drop everything queued while offline. Returns true once the sender is gone.
fn drain_stale(outbound: &mut mpsc::Receiver<ChatEnvelope>) -> bool {
    let mut dropped = 0;
    loop {
        match outbound.try_recv() {
            Ok(_) => dropped += 1,
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => return true,
        }
    }
    if dropped > 0 {
        tracing::warn!("Dropped {} messages sent while offline", dropped);
    }
    false
}

async fn run_connection(
    url: &str,
    outbound: &mut mpsc::Receiver<ChatEnvelope>,
    events: &std_mpsc::Sender<RelayEvent>,
) -> Result<ConnectionResult> {
    tracing::info!("Connecting to relay...");
    let (ws_stream, _) = connect_async(url).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    tracing::info!("Relay connected");
    if events.send(RelayEvent::Connected).is_err() {
        return Ok(ConnectionResult::Shutdown);
    }

    loop {
        tokio::select! {
            envelope = outbound.recv() => {
                let Some(envelope) = envelope else {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    return Ok(ConnectionResult::Shutdown);
                };
                let text = serde_json::to_string(&RelayFrame::chat(&envelope)?)?;
                if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                    tracing::warn!("Relay send failed: {}", e);
                    return Ok(ConnectionResult::Disconnected);
                }
            }
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(envelope) = parse_inbound(&text) {
                            if events.send(RelayEvent::Inbound(envelope)).is_err() {
                                return Ok(ConnectionResult::Shutdown);
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("Relay closed connection");
                        return Ok(ConnectionResult::Disconnected);
                    }
                    Some(Ok(_)) => {
                        // tungstenite auto-responds to ping
                    }
                    Some(Err(e)) => {
                        tracing::error!("Relay socket error: {}", e);
                        return Ok(ConnectionResult::Disconnected);
                    }
                }
            }
        }
    }
}

/// Chat envelope from a relay frame; anything else is logged and dropped.
fn parse_inbound(text: &str) -> Option<ChatEnvelope> {
    let frame = match serde_json::from_str::<RelayFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Unparseable relay frame: {}", e);
            return None;
        }
    };
    let envelope = frame.chat_envelope();
    if envelope.is_none() {
        tracing::debug!("Ignoring relay frame '{}'", frame.event);
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let mut delay = INITIAL_RECONNECT_DELAY;
        let mut seen = vec![delay];
        for _ in 0..10 {
            delay = next_delay(delay);
            seen.push(delay);
        }
        assert_eq!(seen[1], Duration::from_secs(2));
        assert_eq!(seen[5], Duration::from_secs(32));
        assert_eq!(*seen.last().unwrap(), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn test_parse_inbound() {
        let frame = r#"{"event":"message","data":{"lineId":"line-sales","chatId":"chat-jane","message":{"id":"00000000-0000-0000-0000-000000000000","content":"hi","sentAt":"2024-05-01T10:00:00Z"}}}"#;
        let envelope = parse_inbound(frame).unwrap();
        assert_eq!(envelope.chat_id.0, "chat-jane");
        assert_eq!(envelope.message.content, "hi");

        assert!(parse_inbound(r#"{"event":"message","data":{"text":"other app"}}"#).is_none());
        assert!(parse_inbound(r#"{"event":"typing"}"#).is_none());
        assert!(parse_inbound("garbage").is_none());
    }

    #[tokio::test]
    async fn test_drain_stale() {
        let (tx, mut rx) = mpsc::channel(4);
        let envelope = ChatEnvelope {
            line_id: "l".into(),
            chat_id: "c".into(),
            message: shared::MessagePayload {
                id: uuid::Uuid::nil(),
                content: "x".to_string(),
                sent_at: chrono::Utc::now(),
            },
        };
        tx.send(envelope.clone()).await.unwrap();
        tx.send(envelope).await.unwrap();
        assert!(!drain_stale(&mut rx));
        assert!(rx.try_recv().is_err());

        drop(tx);
        assert!(drain_stale(&mut rx));
    }
}
