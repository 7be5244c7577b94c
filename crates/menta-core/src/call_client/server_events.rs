//! ============================================================================
//! Vapi Server Events - HTTP Receiver for Server Messages
//! ============================================================================
//! Vapi posts call lifecycle and transcript messages to the assistant's
//! server URL. This listener accepts them on `POST /vapi/events`, maps each
//! through `parse_server_message` and pushes the result onto the widget's
//! call event channel without waiting for capacity.
//!
//! Unknown message types are acknowledged with 200 so Vapi does not retry.
//! ============================================================================

use anyhow::{anyhow, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::parse_server_message;
use crate::types::CallEvent;

/// Route Vapi is pointed at (append to the public base URL)
pub const SERVER_EVENTS_PATH: &str = "/vapi/events";

#[derive(Clone)]
struct ListenerState {
    events: mpsc::Sender<CallEvent>,
}

/// Router serving `SERVER_EVENTS_PATH`
pub fn router(events: mpsc::Sender<CallEvent>) -> Router {
    Router::new()
        .route(SERVER_EVENTS_PATH, post(handle_server_message))
        .with_state(ListenerState { events })
}

async fn handle_server_message(
    State(state): State<ListenerState>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let Some(event) = parse_server_message(&body) else {
        return StatusCode::OK;
    };
    debug!("Vapi server event: {:?}", event);

    match state.events.try_send(event) {
        Ok(()) => StatusCode::OK,
        Err(mpsc::error::TrySendError::Full(event)) => {
            warn!("Call event channel full; rejecting {:?}", event);
            StatusCode::SERVICE_UNAVAILABLE
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            warn!("Widget no longer receives call events");
            StatusCode::GONE
        }
    }
}

/// Running server-message receiver
pub struct ServerEventListener {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerEventListener {
    /// Bind `bind_addr` (e.g. `0.0.0.0:8787`) and start serving
    pub async fn bind(bind_addr: &str, events: mpsc::Sender<CallEvent>) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| anyhow!("Failed to bind server event listener on {}: {}", bind_addr, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| anyhow!("Failed to read listener address: {}", e))?;
        info!("Receiving Vapi server messages on {}{}", local_addr, SERVER_EVENTS_PATH);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(events);
        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                error!("Server event listener failed: {}", e);
            }
        });

        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting messages and wait for in-flight requests
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Server event listener ended abnormally: {}", e);
        }
        info!("Server event listener stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_client::call_event_channel;
    use crate::types::CallId;

    async fn deliver(listener: &ServerEventListener, body: serde_json::Value) -> reqwest::StatusCode {
        reqwest::Client::new()
            .post(format!("http://{}{}", listener.local_addr(), SERVER_EVENTS_PATH))
            .json(&body)
            .send()
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_server_messages_reach_the_widget_channel() {
        let (tx, mut rx) = call_event_channel();
        let listener = ServerEventListener::bind("127.0.0.1:0", tx).await.unwrap();

        let started = serde_json::json!({
            "message": {
                "type": "status-update",
                "status": "in-progress",
                "call": { "id": "call-7" }
            }
        });
        assert_eq!(deliver(&listener, started).await, reqwest::StatusCode::OK);
        assert_eq!(
            rx.recv().await,
            Some(CallEvent::CallStart { id: Some(CallId::from("call-7")) })
        );

        let line = serde_json::json!({
            "message": {
                "type": "transcript",
                "role": "assistant",
                "transcriptType": "final",
                "transcript": "Please type your phone number below to confirm."
            }
        });
        assert_eq!(deliver(&listener, line).await, reqwest::StatusCode::OK);
        match rx.recv().await {
            Some(CallEvent::Message(msg)) => assert!(msg.final_assistant_transcript().is_some()),
            other => panic!("unexpected {:?}", other),
        }

        let failed = serde_json::json!({
            "message": { "type": "status-update", "status": "ended", "endedReason": "assistant-error" }
        });
        assert_eq!(deliver(&listener, failed).await, reqwest::StatusCode::OK);
        assert_eq!(
            rx.recv().await,
            Some(CallEvent::Error { detail: "assistant-error".into() })
        );

        listener.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_messages_are_acknowledged_and_dropped() {
        let (tx, mut rx) = call_event_channel();
        let listener = ServerEventListener::bind("127.0.0.1:0", tx).await.unwrap();

        let status = deliver(&listener, serde_json::json!({ "message": { "type": "speech-update" } })).await;
        assert_eq!(status, reqwest::StatusCode::OK);
        assert!(rx.try_recv().is_err());

        listener.shutdown().await;
    }

    #[tokio::test]
    async fn test_closed_widget_is_reported() {
        let (tx, rx) = call_event_channel();
        drop(rx);
        let listener = ServerEventListener::bind("127.0.0.1:0", tx).await.unwrap();

        let ended = serde_json::json!({ "type": "status-update", "status": "ended" });
        assert_eq!(deliver(&listener, ended).await, reqwest::StatusCode::GONE);

        listener.shutdown().await;
    }
}
