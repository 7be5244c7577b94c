//! Offline call client that replays a fixed script.
//!
//! Used by the CLI `--simulate` mode and by the widget tests. It can also
//! publish the `call-created` broadcast so both id sources race like they
//! do against the hosted services.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::CallClient;
use crate::types::{CallEvent, CallId, CallMessage, RealtimeEvent};

/// What a simulated call does once started
#[derive(Debug, Clone)]
pub struct SimulatedCallScript {
    /// Id reported for the call (a fresh uuid when `None`)
    pub call_id: Option<CallId>,
    /// Include the id in the `call-start` event
    pub id_on_start: bool,
    /// Id published on the broadcast channel, if a broadcaster is attached
    pub broadcast_id: Option<CallId>,
    /// Final assistant transcript lines, spoken in order
    pub transcript: Vec<String>,
    pub line_delay: Duration,
    /// Reject start requests with this error
    pub fail_start: Option<String>,
    /// Emit lifecycle events at all (false simulates a hung client)
    pub responsive: bool,
}

impl Default for SimulatedCallScript {
    fn default() -> Self {
        Self {
            call_id: None,
            id_on_start: true,
            broadcast_id: None,
            transcript: vec![
                "Hi! I can book your free consultation.".to_string(),
                "Please type your phone number below to confirm.".to_string(),
            ],
            line_delay: Duration::from_millis(800),
            fail_start: None,
            responsive: true,
        }
    }
}

pub struct SimulatedCallClient {
    script: SimulatedCallScript,
    events: mpsc::Sender<CallEvent>,
    broadcast: Option<mpsc::Sender<RealtimeEvent>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl SimulatedCallClient {
    pub fn new(script: SimulatedCallScript, events: mpsc::Sender<CallEvent>) -> Self {
        Self {
            script,
            events,
            broadcast: None,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Also publish `call-created` on this realtime sender
    pub fn with_broadcast(mut self, broadcast: mpsc::Sender<RealtimeEvent>) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    /// Number of start requests received
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of stop requests received
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallClient for SimulatedCallClient {
    async fn start(&self, assistant_id: &str) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = &self.script.fail_start {
            return Err(anyhow!("{}", err));
        }

        info!("Simulated call starting with assistant {}", assistant_id);
        if !self.script.responsive {
            return Ok(());
        }

        let call_id = self
            .script
            .call_id
            .clone()
            .unwrap_or_else(|| CallId::new(uuid::Uuid::new_v4().to_string()));
        let script = self.script.clone();
        let events = self.events.clone();
        let broadcast = self.broadcast.clone();

        tokio::spawn(async move {
            let start_id = script.id_on_start.then(|| call_id.clone());
            if events.send(CallEvent::CallStart { id: start_id }).await.is_err() {
                return;
            }

            if let Some(broadcast) = broadcast {
                let id = script.broadcast_id.clone().unwrap_or_else(|| call_id.clone());
                let _ = broadcast.send(RealtimeEvent::CallCreated { call_id: id }).await;
            }

            for line in script.transcript {
                tokio::time::sleep(script.line_delay).await;
                debug!("Simulated assistant: {}", line);
                let event = CallEvent::Message(CallMessage::assistant_final(line));
                if events.send(event).await.is_err() {
                    return;
                }
            }
        });

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);

        if self.script.responsive {
            self.events
                .try_send(CallEvent::CallEnd)
                .map_err(|e| anyhow!("Failed to emit call-end: {}", e))?;
        }

        Ok(())
    }
}
