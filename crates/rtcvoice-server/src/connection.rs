//! Per-connection handler: parse request frames, run them, write replies.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use rtcvoice_core::SignalingCoordinator;

use crate::protocol::{ClientFrame, ErrorFrame, ServerFrame};

/// Handle a single WebSocket connection.
///
/// Each request runs in its own task so a slow gateway round-trip for one
/// viewer never delays another; replies are funneled through one writer.
pub async fn handle_connection(
    ws: tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    addr: SocketAddr,
    coordinator: Arc<SignalingCoordinator>,
) {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::channel::<String>(256);

    tracing::info!(peer = %addr, "Host connected");

    loop {
        tokio::select! {
            Some(reply) = rx.recv() => {
                if sink.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let coordinator = coordinator.clone();
                        let tx = tx.clone();
                        let text = text.to_string();
                        tokio::spawn(async move {
                            let reply = handle_frame(&coordinator, &text).await;
                            if tx.send(reply).await.is_err() {
                                tracing::debug!(peer = %addr, "Connection closed before reply");
                            }
                        });
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(peer = %addr, "Host disconnected");
}

/// Run one request frame and render its reply frame.
pub async fn handle_frame(coordinator: &SignalingCoordinator, text: &str) -> String {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Provision { id, request }) => {
            let body = coordinator.provision(request).await;
            render(&ServerFrame {
                kind: "provision",
                id,
                body,
            })
        }
        Ok(ClientFrame::Signal { id, request }) => {
            let body = coordinator.signal(request).await;
            render(&ServerFrame {
                kind: "signal",
                id,
                body,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "Invalid request frame");
            render(&ErrorFrame::Error {
                message: format!("invalid request: {e}"),
            })
        }
    }
}

fn render<T: Serialize>(frame: &T) -> String {
    serde_json::to_string(frame).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize reply");
        r#"{"type":"error","message":"internal error"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtcvoice_common::EventBus;
    use rtcvoice_config::{GatewayConfig, ReconnectConfig, RoomsConfig};
    use rtcvoice_janus::mock::MockTransport;
    use rtcvoice_janus::Gateway;
    use serde_json::{json, Value};

    async fn coordinator(connect: bool) -> (Arc<MockTransport>, SignalingCoordinator) {
        let mock = Arc::new(MockTransport::new());
        let events = Arc::new(EventBus::default());
        let gateway = Gateway::new(
            mock.clone(),
            GatewayConfig::default(),
            ReconnectConfig::default(),
            events.clone(),
        );
        if connect {
            gateway.connect_once().await.unwrap();
        }
        (
            mock,
            SignalingCoordinator::new(gateway, RoomsConfig::default(), events),
        )
    }

    async fn send(coordinator: &SignalingCoordinator, frame: Value) -> Value {
        let reply = handle_frame(coordinator, &frame.to_string()).await;
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn provision_then_signal_then_logout() {
        let (mock, coordinator) = coordinator(true).await;

        let reply = send(
            &coordinator,
            json!({
                "type": "provision",
                "id": 1,
                "parcel_id": 42,
                "channel_type": "local",
                "voice_server_type": "webrtc",
                "jsep": {"type": "offer", "sdp": "v=0\r\n"}
            }),
        )
        .await;
        assert_eq!(reply["type"], "provision");
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["jsep"]["type"], "answer");
        let token = reply["viewer_session"].as_str().unwrap().to_string();

        let reply = send(
            &coordinator,
            json!({"type": "signal", "id": 2, "viewer_session": token, "candidate": {"completed": true}}),
        )
        .await;
        assert_eq!(
            reply,
            json!({"type": "signal", "id": 2, "response": "ok", "viewer_session": token})
        );

        let reply = send(
            &coordinator,
            json!({"type": "provision", "viewer_session": token, "logout": true}),
        )
        .await;
        assert_eq!(reply, json!({"type": "provision", "response": "closed"}));
        assert!(mock.rooms().is_empty());
    }

    #[tokio::test]
    async fn not_ready_gateway_is_reported() {
        let (mock, coordinator) = coordinator(false).await;
        let reply = send(
            &coordinator,
            json!({"type": "provision", "channel_type": "local", "jsep": {"type": "offer", "sdp": "v=0"}}),
        )
        .await;
        assert_eq!(reply["response"], "failed");
        assert_eq!(reply["error"], "no JanusAudioBridge");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn garbage_frame_gets_error_reply() {
        let (_mock, coordinator) = coordinator(true).await;
        let reply = handle_frame(&coordinator, "not json").await;
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply["type"], "error");
        assert!(reply["message"]
            .as_str()
            .unwrap()
            .starts_with("invalid request"));
    }
}
