//! ============================================================================
//! Supabase Realtime Listener - Broadcast Side Channel
//! ============================================================================
//! Joins `realtime:<channel>` over a websocket, keeps the socket alive with
//! heartbeats and forwards `call-created` broadcasts to the widget.
//! Broadcasts received before the join reply are forwarded as well.
//! ============================================================================

use anyhow::{anyhow, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::protocol::{self, PhoenixFrame};
use crate::types::RealtimeEvent;

/// Interval between Phoenix heartbeats
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Capacity of the realtime event channel
pub const REALTIME_EVENT_BUFFER: usize = 32;

/// Channel carrying realtime events into the widget
pub fn realtime_event_channel() -> (mpsc::Sender<RealtimeEvent>, mpsc::Receiver<RealtimeEvent>) {
    mpsc::channel(REALTIME_EVENT_BUFFER)
}

/// Realtime broadcast listener for one channel
pub struct SupabaseRealtime {
    url: Url,
    channel: String,
}

/// Running subscription; `shutdown` or dropping the handle leaves the channel
pub struct RealtimeHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RealtimeHandle {
    /// Leave the channel and close the socket
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Realtime task ended abnormally: {}", e);
        }
    }
}

impl SupabaseRealtime {
    pub fn new(project_url: &str, anon_key: &str, channel: &str) -> Result<Self> {
        Ok(Self {
            url: protocol::realtime_url(project_url, anon_key)?,
            channel: channel.to_string(),
        })
    }

    /// Connect, join the channel and forward events on `events`.
    ///
    /// Fails only if the socket cannot be opened or the join cannot be sent;
    /// later transport problems are reported as `RealtimeEvent::Closed`.
    pub async fn subscribe(self, events: mpsc::Sender<RealtimeEvent>) -> Result<RealtimeHandle> {
        info!("Connecting to realtime channel {}", self.channel);

        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| anyhow!("Realtime connection failed: {}", e))?;
        let (mut write, mut read) = ws_stream.split();

        let mut next_ref: u64 = 1;
        let join_ref = next_ref.to_string();
        send_frame(&mut write, &protocol::join_frame(&self.channel, &join_ref)).await?;
        next_ref += 1;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let channel = self.channel;

        let task = tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;

            let reason = loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        let leave = protocol::leave_frame(&channel, &next_ref.to_string());
                        let _ = send_frame(&mut write, &leave).await;
                        let _ = write.send(Message::Close(None)).await;
                        info!("Left realtime channel {}", channel);
                        return;
                    }
                    _ = heartbeat.tick() => {
                        let frame = protocol::heartbeat_frame(&next_ref.to_string());
                        next_ref += 1;
                        if let Err(e) = send_frame(&mut write, &frame).await {
                            break format!("heartbeat failed: {}", e);
                        }
                    }
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let frame: PhoenixFrame = match serde_json::from_str(&text) {
                                Ok(frame) => frame,
                                Err(e) => {
                                    debug!("Unparseable realtime frame ({}): {}", e, text);
                                    continue;
                                }
                            };
                            if let Some(event) = protocol::interpret(&frame, &channel, &join_ref) {
                                match &event {
                                    RealtimeEvent::Subscribed => info!("Realtime listener active on {}", channel),
                                    RealtimeEvent::CallCreated { call_id } => info!("callId via realtime: {}", call_id),
                                    RealtimeEvent::Closed { reason } => warn!("Realtime channel closed: {}", reason),
                                }
                                let closed = matches!(event, RealtimeEvent::Closed { .. });
                                if events.send(event).await.is_err() {
                                    debug!("Realtime event receiver dropped");
                                    return;
                                }
                                if closed {
                                    return;
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break format!("socket closed: {:?}", frame);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Realtime socket error: {}", e);
                            break e.to_string();
                        }
                        None => break "socket ended".to_string(),
                    }
                }
            };

            let _ = events.send(RealtimeEvent::Closed { reason }).await;
        });

        Ok(RealtimeHandle {
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

async fn send_frame<S>(write: &mut S, frame: &PhoenixFrame) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = serde_json::to_string(frame)?;
    write
        .send(Message::Text(text))
        .await
        .map_err(|e| anyhow!("Failed to send realtime frame: {}", e))
}
