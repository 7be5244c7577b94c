//! ============================================================================
//! Voice Call Controller - Call Session + Confirmation Form
//! ============================================================================
//! Drives one call session end-to-end:
//! - start/stop the call, at most one request in flight
//! - adopt the call id from `call-start` or the realtime broadcast,
//!   whichever arrives first
//! - open the confirmation form when the assistant speaks the cue
//! - submit `{callId, name, phone, email}` once the id is known
//!
//! The controller is a plain state machine fed one event at a time; the
//! `widget` module owns it and supplies events, commands and deadlines.
//! Network work is split out: `begin_*` hands back a request that runs
//! without borrowing the controller, and `finish_*` applies its outcome.
//! ============================================================================

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::call_client::CallClient;
use crate::config::{Timeouts, WidgetConfig};
use crate::correlation::{Adoption, CorrelationCell};
use crate::host::CallHost;
use crate::submission::{FormSubmitter, WebhookSubmitter};
use crate::trigger::TriggerMatcher;
use crate::types::*;

/// What a toggle request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Started,
    Stopped,
}

/// Asynchronous wait the controller is currently blocked on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deadline {
    CallStart,
    CallStop,
    CallId,
}

impl Deadline {
    pub fn describe(&self) -> &'static str {
        match self {
            Deadline::CallStart => "call start",
            Deadline::CallStop => "call end",
            Deadline::CallId => "correlation id",
        }
    }

    /// Configured length of this wait
    pub fn limit(&self, timeouts: &Timeouts) -> Duration {
        match self {
            Deadline::CallStart => timeouts.call_start,
            Deadline::CallStop => timeouts.call_stop,
            Deadline::CallId => timeouts.call_id,
        }
    }
}

/// Name used when a submission runs out of time
const SUBMISSION: &str = "submission";

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Start,
    Stop,
}

impl RequestKind {
    pub fn deadline(&self) -> Deadline {
        match self {
            RequestKind::Start => Deadline::CallStart,
            RequestKind::Stop => Deadline::CallStop,
        }
    }

    fn action(&self) -> ToggleAction {
        match self {
            RequestKind::Start => ToggleAction::Started,
            RequestKind::Stop => ToggleAction::Stopped,
        }
    }
}

/// Start or stop request against the call client
pub struct CallRequest {
    seq: u64,
    kind: RequestKind,
    client: Arc<dyn CallClient>,
    assistant_id: String,
}

/// Result of a `CallRequest`, fed back through `finish_request`
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub seq: u64,
    pub kind: RequestKind,
    pub result: Result<(), String>,
}

impl CallRequest {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub async fn run(self) -> CallOutcome {
        let result = match self.kind {
            RequestKind::Start => self.client.start(&self.assistant_id).await,
            RequestKind::Stop => self.client.stop().await,
        };

        CallOutcome {
            seq: self.seq,
            kind: self.kind,
            result: result.map_err(|e| e.to_string()),
        }
    }
}

/// Confirmation submit, bounded by the submit timeout
pub struct SubmitRequest {
    submitter: Option<Arc<dyn FormSubmitter>>,
    payload: SubmissionPayload,
    limit: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitOutcome {
    pub call_id: CallId,
    pub result: Result<(), WidgetError>,
}

impl SubmitRequest {
    pub async fn run(self) -> SubmitOutcome {
        let result = match &self.submitter {
            Some(submitter) => match tokio::time::timeout(self.limit, submitter.submit(&self.payload)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(WidgetError::Submission(e.to_string())),
                Err(_) => Err(WidgetError::TimedOut(SUBMISSION.to_string())),
            },
            None => Err(WidgetError::Submission("No submission target configured".to_string())),
        };

        SubmitOutcome {
            call_id: self.payload.call_id,
            result,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

pub struct VoiceCallController {
    config: WidgetConfig,
    /// `None` once dependency loading failed for this mount
    call_client: Option<Arc<dyn CallClient>>,
    submitter: Option<Arc<dyn FormSubmitter>>,
    host: Arc<dyn CallHost>,
    status: CallStatus,
    call_id: CorrelationCell,
    trigger: TriggerMatcher,
    form: ConfirmationForm,
    form_open: bool,
    id_wait_expired: bool,
    /// Start/stop request whose outcome has not come back yet
    in_flight: Option<(u64, RequestKind)>,
    next_seq: u64,
    submitting: bool,
}

impl VoiceCallController {
    /// Controller with a ready call client.
    ///
    /// Without an explicit submitter the configured webhook is used.
    pub fn new(
        config: WidgetConfig,
        call_client: Arc<dyn CallClient>,
        submitter: Option<Arc<dyn FormSubmitter>>,
        host: Arc<dyn CallHost>,
    ) -> Self {
        let submitter = submitter.or_else(|| {
            config
                .webhook_url
                .as_ref()
                .map(|url| Arc::new(WebhookSubmitter::new(url.clone())) as Arc<dyn FormSubmitter>)
        });

        let mut controller = Self::unavailable(config, host);
        controller.call_client = Some(call_client);
        controller.submitter = submitter;
        controller
    }

    /// Controller whose dependencies never loaded; every call operation fails
    pub fn unavailable(config: WidgetConfig, host: Arc<dyn CallHost>) -> Self {
        let trigger = TriggerMatcher::new(&config.trigger_phrases);
        Self {
            config,
            call_client: None,
            submitter: None,
            host,
            status: CallStatus::Idle,
            call_id: CorrelationCell::new(),
            trigger,
            form: ConfirmationForm::default(),
            form_open: false,
            id_wait_expired: false,
            in_flight: None,
            next_seq: 0,
            submitting: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.call_client.is_some()
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.call_id.get()
    }

    pub fn form(&self) -> &ConfirmationForm {
        &self.form
    }

    pub fn is_form_open(&self) -> bool {
        self.form_open
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    /// Sequence number of the start/stop request still outstanding
    pub fn pending_request(&self) -> Option<u64> {
        self.in_flight.map(|(seq, _)| seq)
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            status: self.status,
            call_id: self.call_id.get().cloned(),
            call_id_source: self.call_id.source(),
            form_open: self.form_open,
            form: self.form.clone(),
            busy: self.is_busy() || !self.is_available(),
            available: self.is_available(),
        }
    }

    /// Start the call when idle, stop it when active.
    ///
    /// Runs the request inline, bounded by the matching deadline.
    pub async fn toggle_phone(&mut self) -> Result<ToggleAction, WidgetError> {
        let request = self.begin_toggle()?;
        let deadline = request.kind().deadline();
        let limit = deadline.limit(&self.config.timeouts);

        match tokio::time::timeout(limit, request.run()).await {
            Ok(outcome) => self.finish_request(outcome),
            Err(_) => {
                self.expire(deadline);
                Err(WidgetError::TimedOut(deadline.describe().to_string()))
            }
        }
    }

    /// Claim the toggle and build the start or stop request
    pub fn begin_toggle(&mut self) -> Result<CallRequest, WidgetError> {
        let client = self.call_client.clone().ok_or(WidgetError::Unavailable)?;

        if self.is_busy() {
            debug!("Toggle ignored: {:?} request in flight", self.status);
            return Err(WidgetError::RequestInFlight);
        }

        let kind = if self.status == CallStatus::Active {
            self.status = CallStatus::Stopping;
            info!("Stopping call {:?}", self.call_id.get());
            RequestKind::Stop
        } else {
            self.begin_session();
            self.status = CallStatus::Connecting;
            info!("Starting call with assistant {}", self.config.assistant_id);
            RequestKind::Start
        };

        self.next_seq += 1;
        self.in_flight = Some((self.next_seq, kind));

        Ok(CallRequest {
            seq: self.next_seq,
            kind,
            client,
            assistant_id: self.config.assistant_id.clone(),
        })
    }

    /// Apply the result of a request issued by `begin_toggle`
    pub fn finish_request(&mut self, outcome: CallOutcome) -> Result<ToggleAction, WidgetError> {
        if self.in_flight != Some((outcome.seq, outcome.kind)) {
            debug!("Discarding {:?} outcome #{} after its deadline", outcome.kind, outcome.seq);
            return Err(WidgetError::TimedOut(outcome.kind.deadline().describe().to_string()));
        }
        self.in_flight = None;

        let detail = match outcome.result {
            Ok(()) => return Ok(outcome.kind.action()),
            Err(detail) => detail,
        };

        match outcome.kind {
            RequestKind::Start => {
                if self.status == CallStatus::Connecting {
                    self.status = CallStatus::Failed;
                }
            }
            RequestKind::Stop => {
                // Call is still up; re-enable the control
                if self.status == CallStatus::Stopping {
                    self.status = CallStatus::Active;
                }
            }
        }
        Err(self.report(WidgetError::CallClient(detail)))
    }

    pub fn handle_call_event(&mut self, event: CallEvent) {
        match event {
            CallEvent::CallStart { id } => {
                if !matches!(self.status, CallStatus::Connecting | CallStatus::Active) {
                    warn!("Ignoring call-start ({:?}) while {:?}", id, self.status);
                    return;
                }
                self.status = CallStatus::Active;

                if let Some(id) = id {
                    self.adopt(id, IdSource::CallStart);
                    if let Some(effective) = self.call_id.get() {
                        self.host.on_call_start(effective);
                    }
                }
            }
            CallEvent::CallEnd => {
                info!("Call ended");
                self.status = CallStatus::Ended;
                self.host.on_call_end();
            }
            CallEvent::Error { detail } => {
                warn!("Call client error: {}", detail);
                self.status = CallStatus::Failed;
                self.report(WidgetError::CallClient(detail));
            }
            CallEvent::Message(message) => {
                let Some(text) = message.final_assistant_transcript() else {
                    return;
                };
                debug!("Assistant: {}", text);
                if self.trigger.observe(text) && !self.form_open {
                    self.open_form();
                }
            }
        }
    }

    pub fn handle_realtime_event(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::Subscribed => info!("Realtime listener active"),
            RealtimeEvent::CallCreated { call_id } => {
                self.adopt(call_id, IdSource::Broadcast);
            }
            RealtimeEvent::Closed { reason } => {
                warn!("Realtime channel closed: {}", reason);
            }
        }
    }

    pub fn update_field(&mut self, field: FormField, value: impl Into<String>) -> Result<(), WidgetError> {
        if !self.form_open {
            return Err(WidgetError::FormClosed);
        }
        self.form.set(field, value);
        Ok(())
    }

    /// Close the form and discard what was typed
    pub fn dismiss_form(&mut self) {
        if self.form_open {
            info!("Confirmation form dismissed");
        }
        self.form_open = false;
        self.form.clear();
    }

    /// Submit the confirmation form for the current call
    pub async fn submit_confirmation(&mut self) -> Result<(), WidgetError> {
        let request = self.begin_submit()?;
        let outcome = request.run().await;
        self.finish_submit(outcome)
    }

    /// Validate the form and build the submission
    pub fn begin_submit(&mut self) -> Result<SubmitRequest, WidgetError> {
        if !self.form_open {
            return Err(WidgetError::FormClosed);
        }
        if self.submitting {
            return Err(WidgetError::RequestInFlight);
        }

        let Some(call_id) = self.call_id.get().cloned() else {
            warn!("Submission blocked: call id not captured");
            self.host.on_notice(&Notice::CallIdMissing);
            return Err(WidgetError::MissingCallId);
        };

        if let Some(field) = self.form.first_missing(&self.config.form_fields) {
            self.host.on_notice(&Notice::FieldMissing(field));
            return Err(WidgetError::MissingField(field));
        }

        self.submitting = true;
        Ok(SubmitRequest {
            submitter: self.submitter.clone(),
            payload: SubmissionPayload::new(call_id, &self.form),
            limit: self.config.timeouts.submit,
        })
    }

    /// Apply the result of a request issued by `begin_submit`
    pub fn finish_submit(&mut self, outcome: SubmitOutcome) -> Result<(), WidgetError> {
        self.submitting = false;

        match outcome.result {
            Ok(()) => {
                info!("Confirmation submitted for call {}", outcome.call_id);
                self.form.clear();
                self.form_open = false;
                self.call_id.clear();
                self.trigger.rearm();
                self.id_wait_expired = false;
                self.host.on_notice(&Notice::Submitted);
                Ok(())
            }
            Err(err) => {
                warn!("Confirmation submit failed: {}", err);
                if matches!(err, WidgetError::TimedOut(_)) {
                    self.report(err.clone());
                }
                self.host.on_notice(&Notice::SubmitFailed);
                Err(err)
            }
        }
    }

    /// The wait the widget should put a deadline on, if any
    pub fn awaiting(&self) -> Option<Deadline> {
        match self.status {
            CallStatus::Connecting => Some(Deadline::CallStart),
            CallStatus::Stopping => Some(Deadline::CallStop),
            _ => match self.in_flight {
                // Events already moved the session on; the request still has to return
                Some((_, kind)) => Some(kind.deadline()),
                None if self.status == CallStatus::Active && !self.call_id.is_set() && !self.id_wait_expired => {
                    Some(Deadline::CallId)
                }
                None => None,
            },
        }
    }

    /// A deadline armed for `deadline` has passed
    pub fn expire(&mut self, deadline: Deadline) {
        if self.awaiting() != Some(deadline) {
            return;
        }
        warn!("Timed out waiting for {}", deadline.describe());

        match deadline {
            Deadline::CallStart => {
                self.in_flight = None;
                if self.status == CallStatus::Connecting {
                    self.status = CallStatus::Failed;
                }
            }
            Deadline::CallStop => {
                self.in_flight = None;
                if self.status == CallStatus::Stopping {
                    self.status = CallStatus::Ended;
                    self.host.on_call_end();
                }
            }
            Deadline::CallId => self.id_wait_expired = true,
        }
        self.report(WidgetError::TimedOut(deadline.describe().to_string()));
    }

    fn is_busy(&self) -> bool {
        self.status.is_busy() || self.in_flight.is_some()
    }

    /// Fresh session for a new call: new id, re-armed cue; typed data is kept
    fn begin_session(&mut self) {
        if let Some(previous) = self.call_id.clear() {
            debug!("Discarding call id {} from previous session", previous);
        }
        self.trigger.rearm();
        self.form_open = false;
        self.id_wait_expired = false;
    }

    fn adopt(&mut self, id: CallId, source: IdSource) {
        if let Adoption::Conflict { kept, rejected } = self.call_id.adopt(id, source) {
            debug!("Kept {} over {} from {:?}", kept, rejected, source);
        }
    }

    fn open_form(&mut self) {
        info!("Confirmation cue heard; opening form");
        self.form_open = true;
        self.host.on_form_opened(&self.config.modal_title, &self.config.form_fields);
    }

    fn report(&self, err: WidgetError) -> WidgetError {
        self.host.on_error(&err);
        err
    }
}
