//! ============================================================================
//! Vapi Call Client - Hosted Voice Assistant via REST
//! ============================================================================
//! - start: POST /call/web with the assistant id, emits `call-start{id}`
//! - stop: POST {monitor.controlUrl} `{"type":"end-call"}`, emits `call-end`
//! - server messages (posted to `ServerEventListener`, or forwarded by the
//!   host) map to transcript, lifecycle and error events
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::CallClient;
use crate::types::{CallEvent, CallId, CallMessage};

/// Per-request limit on Vapi API calls
const API_TIMEOUT: Duration = Duration::from_secs(15);

/// Executor-style client for the Vapi call API
pub struct VapiCallClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    /// Public URL Vapi posts server messages to for calls we create
    server_url: Option<String>,
    events: mpsc::Sender<CallEvent>,
    active: Mutex<Option<ActiveCall>>,
}

#[derive(Debug, Clone)]
struct ActiveCall {
    id: CallId,
    control_url: Option<String>,
}

impl VapiCallClient {
    /// Create a new client that reports events on `events`
    pub fn new(api_url: &str, api_key: String, events: mpsc::Sender<CallEvent>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            server_url: None,
            events,
            active: Mutex::new(None),
        }
    }

    /// Ask Vapi to post server messages for new calls to `url`
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    fn emit(&self, event: CallEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!("Dropping call event: {}", e);
        }
    }

    fn create_request(&self, assistant_id: &str) -> CreateCallRequest {
        CreateCallRequest {
            assistant_id: assistant_id.to_string(),
            assistant_overrides: self.server_url.as_ref().map(|url| AssistantOverrides {
                server: ServerTarget { url: url.clone() },
            }),
        }
    }
}

#[async_trait]
impl CallClient for VapiCallClient {
    async fn start(&self, assistant_id: &str) -> Result<()> {
        info!("Starting Vapi call with assistant {}", assistant_id);

        let request = self.create_request(assistant_id);

        let response = self
            .client
            .post(format!("{}/call/web", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to start call: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Vapi API error {}: {}", status, body));
        }

        let call: VapiCall = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Vapi call response: {}", e))?;

        let id = call.id.or(call.call_id);
        if let Some(id) = &id {
            *self.active.lock().await = Some(ActiveCall {
                id: id.clone(),
                control_url: call.monitor.and_then(|m| m.control_url),
            });
        }

        info!("Vapi call created: {:?}", id);
        if let Some(url) = &call.web_call_url {
            info!("Join the call at {}", url);
        }
        self.emit(CallEvent::CallStart { id });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let active = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("No active call to stop"))?;

        let control_url = active
            .control_url
            .ok_or_else(|| anyhow!("Call {} has no control URL", active.id))?;

        info!("Ending Vapi call {}", active.id);

        let response = self
            .client
            .post(&control_url)
            .json(&serde_json::json!({ "type": "end-call" }))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to end call: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Call is still live; keep it stoppable
            *self.active.lock().await = Some(ActiveCall {
                id: active.id,
                control_url: Some(control_url),
            });
            return Err(anyhow!("Vapi control error {}: {}", status, body));
        }

        self.emit(CallEvent::CallEnd);
        Ok(())
    }
}

/// Map a Vapi server message (as delivered to a server URL) to a call event.
///
/// Accepts either the bare message or the `{"message": {...}}` envelope.
pub fn parse_server_message(value: &serde_json::Value) -> Option<CallEvent> {
    let message = value.get("message").unwrap_or(value);
    let kind = message.get("type").and_then(|v| v.as_str())?;

    match kind {
        "transcript" => serde_json::from_value::<CallMessage>(message.clone())
            .ok()
            .map(CallEvent::Message),
        "status-update" => match message.get("status").and_then(|v| v.as_str()) {
            Some("ended") => match message.get("endedReason").and_then(|v| v.as_str()) {
                Some(reason) if reason.contains("error") => Some(CallEvent::Error {
                    detail: reason.to_string(),
                }),
                _ => Some(CallEvent::CallEnd),
            },
            Some("in-progress") => {
                let id = message
                    .get("call")
                    .and_then(|c| c.get("id"))
                    .and_then(|v| v.as_str())
                    .map(CallId::from);
                Some(CallEvent::CallStart { id })
            }
            _ => None,
        },
        "end-of-call-report" => Some(CallEvent::CallEnd),
        other => {
            debug!("Ignoring Vapi server message type {}", other);
            None
        }
    }
}

// ============================================================================
// Vapi API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCallRequest {
    assistant_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assistant_overrides: Option<AssistantOverrides>,
}

#[derive(Debug, Serialize)]
struct AssistantOverrides {
    server: ServerTarget,
}

#[derive(Debug, Serialize)]
struct ServerTarget {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VapiCall {
    id: Option<CallId>,
    call_id: Option<CallId>,
    web_call_url: Option<String>,
    monitor: Option<VapiMonitor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VapiMonitor {
    control_url: Option<String>,
}
