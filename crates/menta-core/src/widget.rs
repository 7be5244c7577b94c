//! ============================================================================
//! Voice Widget Runtime - Mount, Event Loop, Deadlines
//! ============================================================================
//! Owns one `VoiceCallController` on a single task:
//! - mount awaits the dependency loader (bounded by the ready timeout);
//!   failure leaves the mount permanently unavailable
//! - host commands, call-client events and realtime events are applied one
//!   at a time, so no handler is interrupted between an id check and set
//! - start/stop/submit requests run on their own tasks and report back to
//!   the loop, which keeps draining events while they are out
//! - every asynchronous wait gets a deadline surfaced as `TimedOut`
//!
//! Pattern: mount -> spawn -> WidgetHandle (clone freely) -> shutdown
//! ============================================================================

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::call_client::CallClient;
use crate::config::WidgetConfig;
use crate::host::CallHost;
use crate::submission::FormSubmitter;
use crate::types::*;
use crate::voice::{CallOutcome, Deadline, SubmitOutcome, ToggleAction, VoiceCallController};

/// Capacity of the host command channel
const COMMAND_BUFFER: usize = 16;

/// Everything the widget needs once the hosted SDKs are ready
pub struct WidgetDeps {
    pub call_client: Arc<dyn CallClient>,
    pub call_events: mpsc::Receiver<CallEvent>,
    pub realtime_events: mpsc::Receiver<RealtimeEvent>,
    /// Host-supplied submission callback; the webhook is used otherwise
    pub submitter: Option<Arc<dyn FormSubmitter>>,
}

/// Command sent by the host page
#[derive(Debug)]
pub enum WidgetCommand {
    Toggle(oneshot::Sender<Result<ToggleAction, WidgetError>>),
    SetField {
        field: FormField,
        value: String,
        reply: oneshot::Sender<Result<(), WidgetError>>,
    },
    Submit(oneshot::Sender<Result<(), WidgetError>>),
    Dismiss,
    Snapshot(oneshot::Sender<WidgetSnapshot>),
    Shutdown,
}

/// A mounted voice widget
pub struct VoiceWidget {
    mount_id: Uuid,
    controller: VoiceCallController,
    call_events: Option<mpsc::Receiver<CallEvent>>,
    realtime_events: Option<mpsc::Receiver<RealtimeEvent>>,
}

impl VoiceWidget {
    /// Mount the widget once `loader` reports its dependencies ready
    pub async fn mount<F>(config: WidgetConfig, host: Arc<dyn CallHost>, loader: F) -> Self
    where
        F: Future<Output = Result<WidgetDeps>>,
    {
        let mount_id = Uuid::new_v4();
        let ready = config.timeouts.ready;
        info!("Mounting voice widget {} (assistant {})", mount_id, config.assistant_id);

        let failure = match tokio::time::timeout(ready, loader).await {
            Ok(Ok(deps)) => {
                info!("Voice widget {} ready", mount_id);
                let controller =
                    VoiceCallController::new(config, deps.call_client, deps.submitter, host);
                return Self {
                    mount_id,
                    controller,
                    call_events: Some(deps.call_events),
                    realtime_events: Some(deps.realtime_events),
                };
            }
            Ok(Err(e)) => WidgetError::DependencyLoad(format!("{:#}", e)),
            Err(_) => WidgetError::TimedOut("dependencies".to_string()),
        };

        warn!("Voice widget {} unavailable: {}", mount_id, failure);
        host.on_error(&failure);

        Self {
            mount_id,
            controller: VoiceCallController::unavailable(config, host),
            call_events: None,
            realtime_events: None,
        }
    }

    pub fn mount_id(&self) -> Uuid {
        self.mount_id
    }

    pub fn controller(&self) -> &VoiceCallController {
        &self.controller
    }

    /// Run the widget on its own task
    pub fn spawn(self) -> (WidgetHandle, JoinHandle<VoiceCallController>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = tokio::spawn(self.run(rx));
        (WidgetHandle { tx }, task)
    }

    /// Process commands and events until shutdown; returns the controller
    pub async fn run(self, mut commands: mpsc::Receiver<WidgetCommand>) -> VoiceCallController {
        let VoiceWidget {
            mount_id,
            controller,
            mut call_events,
            mut realtime_events,
        } = self;
        let (done_tx, mut done_rx) = mpsc::channel(COMMAND_BUFFER);
        let mut runtime = Runtime {
            controller,
            done: done_tx,
            call: None,
            submit: None,
        };
        let mut armed: Option<(Deadline, Instant)> = None;

        loop {
            armed = match (runtime.controller.awaiting(), armed) {
                (Some(wait), Some((current, at))) if wait == current => Some((current, at)),
                (Some(wait), _) => {
                    let limit = wait.limit(&runtime.controller.config().timeouts);
                    debug!("Waiting up to {:?} for {}", limit, wait.describe());
                    Some((wait, Instant::now() + limit))
                }
                (None, _) => None,
            };

            // Sources are polled in a fixed order when several are ready
            tokio::select! {
                biased;

                event = recv_or_pending(&mut call_events) => match event {
                    Some(event) => runtime.controller.handle_call_event(event),
                    None => {
                        warn!("Call event stream closed for widget {}", mount_id);
                        call_events = None;
                    }
                },
                event = recv_or_pending(&mut realtime_events) => match event {
                    Some(event) => runtime.controller.handle_realtime_event(event),
                    None => {
                        warn!("Realtime stream closed for widget {}", mount_id);
                        realtime_events = None;
                    }
                },
                Some(done) = done_rx.recv() => runtime.completed(done),
                command = commands.recv() => match command {
                    Some(WidgetCommand::Shutdown) | None => break,
                    Some(command) => runtime.apply(command),
                },
                _ = sleep_until_armed(armed) => {
                    if let Some((wait, _)) = armed.take() {
                        runtime.expire(wait);
                    }
                }
            }
        }

        runtime.abandon();
        info!("Voice widget {} stopped", mount_id);
        runtime.controller
    }
}

// ============================================================================
// Request Runtime
// ============================================================================

/// Request running on its own task, with the host's reply parked until it ends
struct Pending<T> {
    seq: u64,
    reply: oneshot::Sender<Result<T, WidgetError>>,
    task: JoinHandle<()>,
}

/// Outcome sent back to the loop by a request task
enum Completion {
    Call(CallOutcome),
    Submit(SubmitOutcome),
}

/// Controller plus the requests it has handed off to tasks
struct Runtime {
    controller: VoiceCallController,
    done: mpsc::Sender<Completion>,
    call: Option<Pending<ToggleAction>>,
    submit: Option<Pending<()>>,
}

impl Runtime {
    fn apply(&mut self, command: WidgetCommand) {
        match command {
            WidgetCommand::Toggle(reply) => match self.controller.begin_toggle() {
                Ok(request) => {
                    let seq = request.seq();
                    let done = self.done.clone();
                    let task = tokio::spawn(async move {
                        let outcome = request.run().await;
                        let _ = done.send(Completion::Call(outcome)).await;
                    });
                    self.call = Some(Pending { seq, reply, task });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            WidgetCommand::SetField { field, value, reply } => {
                let _ = reply.send(self.controller.update_field(field, value));
            }
            WidgetCommand::Submit(reply) => match self.controller.begin_submit() {
                Ok(request) => {
                    let done = self.done.clone();
                    let task = tokio::spawn(async move {
                        let outcome = request.run().await;
                        let _ = done.send(Completion::Submit(outcome)).await;
                    });
                    self.submit = Some(Pending { seq: 0, reply, task });
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            WidgetCommand::Dismiss => self.controller.dismiss_form(),
            WidgetCommand::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
            WidgetCommand::Shutdown => {}
        }
    }

    fn completed(&mut self, done: Completion) {
        match done {
            Completion::Call(outcome) => {
                let seq = outcome.seq;
                let result = self.controller.finish_request(outcome);
                match self.call.take() {
                    Some(pending) if pending.seq == seq => {
                        let _ = pending.reply.send(result);
                    }
                    other => self.call = other,
                }
            }
            Completion::Submit(outcome) => {
                let result = self.controller.finish_submit(outcome);
                if let Some(pending) = self.submit.take() {
                    let _ = pending.reply.send(result);
                }
            }
        }
    }

    fn expire(&mut self, wait: Deadline) {
        self.controller.expire(wait);

        // Request the controller gave up on: stop it and answer the host
        let abandoned = self
            .call
            .as_ref()
            .is_some_and(|p| self.controller.pending_request() != Some(p.seq));
        if abandoned {
            if let Some(pending) = self.call.take() {
                pending.task.abort();
                let _ = pending.reply.send(Err(WidgetError::TimedOut(wait.describe().to_string())));
            }
        }
    }

    fn abandon(&mut self) {
        if let Some(pending) = self.call.take() {
            pending.task.abort();
        }
        if let Some(pending) = self.submit.take() {
            pending.task.abort();
        }
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_armed(armed: Option<(Deadline, Instant)>) {
    match armed {
        Some((_, at)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle used by the host to drive a running widget
#[derive(Clone)]
pub struct WidgetHandle {
    tx: mpsc::Sender<WidgetCommand>,
}

impl WidgetHandle {
    /// Resolves once the start/stop request returns or its deadline passes
    pub async fn toggle(&self) -> Result<ToggleAction, WidgetError> {
        let (reply, rx) = oneshot::channel();
        self.request(WidgetCommand::Toggle(reply), rx).await?
    }

    pub async fn set_field(&self, field: FormField, value: impl Into<String>) -> Result<(), WidgetError> {
        let (reply, rx) = oneshot::channel();
        let command = WidgetCommand::SetField {
            field,
            value: value.into(),
            reply,
        };
        self.request(command, rx).await?
    }

    pub async fn submit(&self) -> Result<(), WidgetError> {
        let (reply, rx) = oneshot::channel();
        self.request(WidgetCommand::Submit(reply), rx).await?
    }

    pub async fn dismiss(&self) {
        let _ = self.tx.send(WidgetCommand::Dismiss).await;
    }

    pub async fn snapshot(&self) -> Result<WidgetSnapshot, WidgetError> {
        let (reply, rx) = oneshot::channel();
        self.request(WidgetCommand::Snapshot(reply), rx).await
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(WidgetCommand::Shutdown).await;
    }

    /// Poll snapshots until `pred` holds or `limit` elapses
    pub async fn wait_for<P>(&self, limit: Duration, pred: P) -> Option<WidgetSnapshot>
    where
        P: Fn(&WidgetSnapshot) -> bool,
    {
        let deadline = Instant::now() + limit;
        loop {
            let snapshot = self.snapshot().await.ok()?;
            if pred(&snapshot) {
                return Some(snapshot);
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn request<T>(&self, command: WidgetCommand, rx: oneshot::Receiver<T>) -> Result<T, WidgetError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| WidgetError::Unavailable)?;
        rx.await.map_err(|_| WidgetError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_client::{call_event_channel, SimulatedCallClient, SimulatedCallScript};
    use crate::config::Timeouts;
    use crate::realtime::realtime_event_channel;
    use crate::testing::{HangingClient, HangingSubmitter, HostCall, RecordingHost, RecordingSubmitter};
    use anyhow::anyhow;

    fn config() -> WidgetConfig {
        WidgetConfig {
            assistant_id: "asst-1".into(),
            timeouts: Timeouts {
                ready: Duration::from_secs(5),
                call_start: Duration::from_secs(10),
                call_stop: Duration::from_secs(5),
                call_id: Duration::from_secs(8),
                submit: Duration::from_secs(3),
            },
            ..Default::default()
        }
    }

    struct Mounted {
        handle: WidgetHandle,
        task: JoinHandle<VoiceCallController>,
        client: Arc<SimulatedCallClient>,
        host: Arc<RecordingHost>,
        submitter: Arc<RecordingSubmitter>,
        /// Let tests inject events directly
        calls: mpsc::Sender<CallEvent>,
        realtime: mpsc::Sender<RealtimeEvent>,
    }

    async fn mount(script: SimulatedCallScript, broadcast: bool) -> Mounted {
        let (call_tx, call_rx) = call_event_channel();
        let (rt_tx, rt_rx) = realtime_event_channel();
        let mut client = SimulatedCallClient::new(script, call_tx.clone());
        if broadcast {
            client = client.with_broadcast(rt_tx.clone());
        }
        let client = Arc::new(client);
        let host = Arc::new(RecordingHost::default());
        let submitter = Arc::new(RecordingSubmitter::default());

        let deps = WidgetDeps {
            call_client: client.clone(),
            call_events: call_rx,
            realtime_events: rt_rx,
            submitter: Some(submitter.clone() as Arc<dyn FormSubmitter>),
        };
        let widget = VoiceWidget::mount(config(), host.clone(), async move { Ok(deps) }).await;
        assert!(widget.controller().is_available());

        let (handle, task) = widget.spawn();
        Mounted {
            handle,
            task,
            client,
            host,
            submitter,
            calls: call_tx,
            realtime: rt_tx,
        }
    }

    /// Widget over arbitrary dependencies, with senders for injecting events
    async fn mount_with(
        call_client: Arc<dyn CallClient>,
        submitter: Arc<dyn FormSubmitter>,
    ) -> (WidgetHandle, Arc<RecordingHost>, mpsc::Sender<CallEvent>, mpsc::Sender<RealtimeEvent>) {
        let (call_tx, call_rx) = call_event_channel();
        let (rt_tx, rt_rx) = realtime_event_channel();
        let host = Arc::new(RecordingHost::default());
        let deps = WidgetDeps {
            call_client,
            call_events: call_rx,
            realtime_events: rt_rx,
            submitter: Some(submitter),
        };
        let widget = VoiceWidget::mount(config(), host.clone(), async move { Ok(deps) }).await;
        let (handle, _task) = widget.spawn();
        (handle, host, call_tx, rt_tx)
    }

    fn quick_script(id: &str) -> SimulatedCallScript {
        SimulatedCallScript {
            call_id: Some(id.into()),
            line_delay: Duration::from_millis(200),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_booking_flow() {
        let m = mount(quick_script("abc"), true).await;

        assert_eq!(m.handle.toggle().await, Ok(ToggleAction::Started));
        let snapshot = m
            .handle
            .wait_for(Duration::from_secs(5), |s| s.form_open)
            .await
            .expect("form should open after the cue");
        assert_eq!(snapshot.call_id, Some(CallId::from("abc")));
        assert_eq!(snapshot.status, CallStatus::Active);

        m.handle.set_field(FormField::Name, "Rashad").await.unwrap();
        m.handle.set_field(FormField::Phone, "+994551234567").await.unwrap();
        m.handle.set_field(FormField::Email, "rashad@example.com").await.unwrap();
        m.handle.submit().await.unwrap();

        assert_eq!(m.submitter.attempts(), 1);
        assert_eq!(m.submitter.payloads()[0].call_id, CallId::from("abc"));

        let after = m.handle.snapshot().await.unwrap();
        assert!(!after.form_open);
        assert!(after.call_id.is_none());

        assert_eq!(m.handle.toggle().await, Ok(ToggleAction::Stopped));
        m.handle
            .wait_for(Duration::from_secs(1), |s| s.status == CallStatus::Ended)
            .await
            .expect("call should end");
        assert!(m.host.calls().contains(&HostCall::CallEnd));

        m.handle.shutdown().await;
        let controller = m.task.await.unwrap();
        assert_eq!(controller.status(), CallStatus::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_only_id_is_adopted() {
        let script = SimulatedCallScript {
            id_on_start: false,
            ..quick_script("xyz")
        };
        let m = mount(script, true).await;

        m.handle.toggle().await.unwrap();
        let snapshot = m
            .handle
            .wait_for(Duration::from_secs(5), |s| s.call_id.is_some())
            .await
            .unwrap();
        assert_eq!(snapshot.call_id, Some(CallId::from("xyz")));
        // no id on call-start, so the host was not told about one
        assert_eq!(m.host.count(|c| matches!(c, HostCall::CallStart(_))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_broadcast_wins_over_call_start() {
        let script = SimulatedCallScript {
            responsive: false,
            ..Default::default()
        };
        let m = mount(script, false).await;

        m.handle.toggle().await.unwrap();
        m.realtime
            .send(RealtimeEvent::CallCreated { call_id: "xyz".into() })
            .await
            .unwrap();
        m.handle
            .wait_for(Duration::from_secs(1), |s| s.call_id.is_some())
            .await
            .unwrap();

        // the late call-start carries a different id
        m.calls
            .send(CallEvent::CallStart { id: Some("abc".into()) })
            .await
            .unwrap();
        let snapshot = m
            .handle
            .wait_for(Duration::from_secs(1), |s| s.status == CallStatus::Active)
            .await
            .unwrap();

        assert_eq!(snapshot.call_id, Some(CallId::from("xyz")));
        assert_eq!(m.host.calls(), vec![HostCall::CallStart("xyz".into())]);
        assert_eq!(m.client.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_start_timeout() {
        let script = SimulatedCallScript {
            responsive: false,
            ..Default::default()
        };
        let m = mount(script, false).await;

        m.handle.toggle().await.unwrap();
        assert_eq!(m.handle.toggle().await, Err(WidgetError::RequestInFlight));

        tokio::time::sleep(Duration::from_secs(11)).await;

        let snapshot = m.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, CallStatus::Failed);
        assert!(!snapshot.busy);
        assert!(m
            .host
            .calls()
            .contains(&HostCall::Error(WidgetError::TimedOut("call start".into()))));
        assert_eq!(m.client.start_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_correlation_id_timeout_fires_once() {
        let script = SimulatedCallScript {
            id_on_start: false,
            transcript: vec![],
            ..quick_script("abc")
        };
        let m = mount(script, false).await;

        m.handle.toggle().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let timeouts = m.host.count(|c| *c == HostCall::Error(WidgetError::TimedOut("correlation id".into())));
        assert_eq!(timeouts, 1);
        assert_eq!(m.handle.snapshot().await.unwrap().status, CallStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependency_load_failure_is_permanent() {
        let host = Arc::new(RecordingHost::default());
        let widget = VoiceWidget::mount(config(), host.clone(), async {
            Err::<WidgetDeps, _>(anyhow!("realtime client failed to initialize"))
        })
        .await;

        assert!(!widget.controller().is_available());
        assert!(matches!(host.calls()[0], HostCall::Error(WidgetError::DependencyLoad(_))));

        let (handle, _task) = widget.spawn();
        assert_eq!(handle.toggle().await, Err(WidgetError::Unavailable));
        assert_eq!(handle.toggle().await, Err(WidgetError::Unavailable));
        assert!(handle.snapshot().await.unwrap().busy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependency_ready_timeout() {
        let host = Arc::new(RecordingHost::default());
        let widget = VoiceWidget::mount(
            config(),
            host.clone(),
            std::future::pending::<Result<WidgetDeps>>(),
        )
        .await;

        assert!(!widget.controller().is_available());
        assert_eq!(
            host.calls(),
            vec![HostCall::Error(WidgetError::TimedOut("dependencies".into()))]
        );
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_the_loop() {
        let m = mount(SimulatedCallScript::default(), false).await;
        drop(m.handle);
        let controller = m.task.await.unwrap();
        assert_eq!(controller.status(), CallStatus::Idle);
    }

    #[tokio::test]
    async fn test_handle_after_shutdown_reports_unavailable() {
        let m = mount(SimulatedCallScript::default(), false).await;
        m.handle.shutdown().await;
        m.task.await.unwrap();
        assert_eq!(m.handle.toggle().await, Err(WidgetError::Unavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_start_request_does_not_block_the_loop() {
        let client = Arc::new(HangingClient::default());
        let (handle, host, _calls, realtime) =
            mount_with(client.clone(), Arc::new(RecordingSubmitter::default())).await;

        let toggle = tokio::spawn({
            let handle = handle.clone();
            async move { handle.toggle().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        // events and commands are still served while the start request hangs
        realtime
            .send(RealtimeEvent::CallCreated { call_id: "xyz".into() })
            .await
            .unwrap();
        let snapshot = handle
            .wait_for(Duration::from_secs(1), |s| s.call_id.is_some())
            .await
            .unwrap();
        assert_eq!(snapshot.status, CallStatus::Connecting);
        assert!(snapshot.busy);
        assert_eq!(handle.toggle().await, Err(WidgetError::RequestInFlight));

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(toggle.await.unwrap(), Err(WidgetError::TimedOut("call start".into())));
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, CallStatus::Failed);
        assert!(!snapshot.busy);
        assert_eq!(
            host.count(|c| *c == HostCall::Error(WidgetError::TimedOut("call start".into()))),
            1
        );
        assert_eq!(client.starts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_stop_timeout() {
        let script = SimulatedCallScript {
            responsive: false,
            ..Default::default()
        };
        let m = mount(script, false).await;

        m.handle.toggle().await.unwrap();
        m.calls
            .send(CallEvent::CallStart { id: Some("abc".into()) })
            .await
            .unwrap();
        m.handle
            .wait_for(Duration::from_secs(1), |s| s.status == CallStatus::Active)
            .await
            .unwrap();

        assert_eq!(m.handle.toggle().await, Ok(ToggleAction::Stopped));
        tokio::time::sleep(Duration::from_secs(6)).await;

        let snapshot = m.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, CallStatus::Ended);
        assert!(!snapshot.busy);
        assert_eq!(m.host.count(|c| *c == HostCall::CallEnd), 1);
        assert!(m
            .host
            .calls()
            .contains(&HostCall::Error(WidgetError::TimedOut("call end".into()))));
        assert_eq!(m.client.stop_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_call_start_keeps_failed_session() {
        let script = SimulatedCallScript {
            responsive: false,
            ..Default::default()
        };
        let m = mount(script, false).await;

        m.handle.toggle().await.unwrap();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(m.handle.snapshot().await.unwrap().status, CallStatus::Failed);

        m.calls
            .send(CallEvent::CallStart { id: Some("abc".into()) })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshot = m.handle.snapshot().await.unwrap();
        assert_eq!(snapshot.status, CallStatus::Failed);
        assert!(snapshot.call_id.is_none());
        assert_eq!(m.host.count(|c| matches!(c, HostCall::CallStart(_))), 0);
        assert_eq!(m.host.count(|c| matches!(c, HostCall::Error(_))), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_submit_does_not_block_the_loop() {
        let (call_tx, _call_rx) = call_event_channel();
        let script = SimulatedCallScript {
            responsive: false,
            ..Default::default()
        };
        let client = Arc::new(SimulatedCallClient::new(script, call_tx));
        let (handle, host, calls, _realtime) = mount_with(client, Arc::new(HangingSubmitter)).await;

        handle.toggle().await.unwrap();
        calls
            .send(CallEvent::CallStart { id: Some("abc".into()) })
            .await
            .unwrap();
        calls
            .send(CallEvent::Message(CallMessage::assistant_final(
                "Please type your phone number below to confirm.",
            )))
            .await
            .unwrap();
        handle
            .wait_for(Duration::from_secs(1), |s| s.form_open)
            .await
            .unwrap();
        handle.set_field(FormField::Name, "Rashad").await.unwrap();
        handle.set_field(FormField::Phone, "+994551234567").await.unwrap();
        handle.set_field(FormField::Email, "rashad@example.com").await.unwrap();

        let submit = tokio::spawn({
            let handle = handle.clone();
            async move { handle.submit().await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;

        // second submit is refused, snapshots still answer
        assert_eq!(handle.submit().await, Err(WidgetError::RequestInFlight));
        assert!(handle.snapshot().await.unwrap().form_open);

        assert_eq!(submit.await.unwrap(), Err(WidgetError::TimedOut("submission".into())));
        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.form_open);
        assert_eq!(snapshot.call_id, Some(CallId::from("abc")));
        assert!(host.calls().contains(&HostCall::Notice(Notice::SubmitFailed)));
    }
}
