//! ============================================================================
//! Call Client Module - Injected Voice-Call Capability
//! ============================================================================
//! The widget never reaches for a global SDK. It is handed a `CallClient`
//! (start/stop requests) and the receiving half of that client's event
//! channel (`call-start`, `call-end`, `error`, `message`).
//!
//! - VapiCallClient: hosted voice assistant via the Vapi REST API
//! - ServerEventListener: receives Vapi server messages over HTTP
//! - SimulatedCallClient: offline scripted call for demos and tests
//! ============================================================================

mod server_events;
mod simulated;
mod vapi;

pub use server_events::{router as server_events_router, ServerEventListener, SERVER_EVENTS_PATH};
pub use simulated::{SimulatedCallClient, SimulatedCallScript};
pub use vapi::{parse_server_message, VapiCallClient};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::types::CallEvent;

/// Capacity of the call event channel
pub const CALL_EVENT_BUFFER: usize = 64;

/// Start/stop requests against a remote voice assistant.
///
/// Lifecycle and transcript events are delivered separately on the
/// channel created with [`call_event_channel`].
#[async_trait]
pub trait CallClient: Send + Sync {
    /// Request a new call bound to `assistant_id`
    async fn start(&self, assistant_id: &str) -> Result<()>;

    /// Request the active call to end
    async fn stop(&self) -> Result<()>;
}

/// Channel carrying call-client events into the widget
pub fn call_event_channel() -> (mpsc::Sender<CallEvent>, mpsc::Receiver<CallEvent>) {
    mpsc::channel(CALL_EVENT_BUFFER)
}
