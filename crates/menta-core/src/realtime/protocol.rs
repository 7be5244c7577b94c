//! Phoenix channel framing used by the Supabase realtime socket (vsn 1.0.0).

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::types::{CallId, RealtimeEvent};

/// Broadcast event that carries a freshly created call id
pub const CALL_CREATED_EVENT: &str = "call-created";

const PHOENIX_TOPIC: &str = "phoenix";

/// One JSON frame on the realtime socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixFrame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// Realtime websocket URL for a project (https -> wss, http -> ws)
pub fn realtime_url(project_url: &str, anon_key: &str) -> Result<Url> {
    let mut url = Url::parse(project_url)
        .map_err(|e| anyhow!("Invalid realtime project URL '{}': {}", project_url, e))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(anyhow!("Unsupported realtime URL scheme '{}'", other)),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("Cannot switch '{}' to {}", project_url, scheme))?;

    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");

    Ok(url)
}

/// Topic name for a broadcast channel
pub fn channel_topic(channel: &str) -> String {
    format!("realtime:{}", channel)
}

pub fn join_frame(channel: &str, reference: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: channel_topic(channel),
        event: "phx_join".into(),
        payload: serde_json::json!({
            "config": {
                "broadcast": { "self": false, "ack": false },
                "presence": { "key": "" },
                "postgres_changes": []
            }
        }),
        reference: Some(reference.to_string()),
    }
}

pub fn leave_frame(channel: &str, reference: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: channel_topic(channel),
        event: "phx_leave".into(),
        payload: serde_json::json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat_frame(reference: &str) -> PhoenixFrame {
    PhoenixFrame {
        topic: PHOENIX_TOPIC.into(),
        event: "heartbeat".into(),
        payload: serde_json::json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Translate an inbound frame for `channel` into a widget event
pub fn interpret(frame: &PhoenixFrame, channel: &str, join_ref: &str) -> Option<RealtimeEvent> {
    if frame.topic == PHOENIX_TOPIC {
        // heartbeat replies
        return None;
    }
    if frame.topic != channel_topic(channel) {
        debug!("Ignoring frame for topic {}", frame.topic);
        return None;
    }

    match frame.event.as_str() {
        "phx_reply" if frame.reference.as_deref() == Some(join_ref) => {
            match frame.payload.get("status").and_then(|s| s.as_str()) {
                Some("ok") => Some(RealtimeEvent::Subscribed),
                status => Some(RealtimeEvent::Closed {
                    reason: format!(
                        "join rejected ({}): {}",
                        status.unwrap_or("unknown"),
                        frame.payload.get("response").cloned().unwrap_or_default()
                    ),
                }),
            }
        }
        "broadcast" => {
            let event = frame.payload.get("event").and_then(|e| e.as_str())?;
            if event != CALL_CREATED_EVENT {
                debug!("Ignoring broadcast event {}", event);
                return None;
            }
            let call_id = frame
                .payload
                .get("payload")
                .and_then(|p| p.get("callId"))
                .and_then(|id| id.as_str())
                .filter(|id| !id.is_empty())?;
            Some(RealtimeEvent::CallCreated {
                call_id: CallId::from(call_id),
            })
        }
        "phx_close" => Some(RealtimeEvent::Closed {
            reason: "channel closed by server".into(),
        }),
        "phx_error" => Some(RealtimeEvent::Closed {
            reason: "channel error".into(),
        }),
        other => {
            debug!("Ignoring realtime event {}", other);
            None
        }
    }
}
