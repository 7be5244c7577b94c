//! ============================================================================
//! Core Types for the Menta Voice Widget
//! ============================================================================
//! Defines call events, realtime events, the confirmation form and the
//! widget error kinds. Wire-facing types use the camelCase names the hosted
//! call SDK and realtime channel emit.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation id binding a voice call to its confirmation submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CallId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which event source delivered a correlation id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdSource {
    /// `call-start` event from the call client
    CallStart,
    /// `call-created` broadcast on the realtime channel
    Broadcast,
}

/// Lifecycle of the current call session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Idle,
    /// Start requested, waiting for `call-start`
    Connecting,
    Active,
    /// Stop requested, waiting for `call-end`
    Stopping,
    Ended,
    Failed,
}

impl CallStatus {
    /// A start or stop request is outstanding
    pub fn is_busy(&self) -> bool {
        matches!(self, CallStatus::Connecting | CallStatus::Stopping)
    }
}

/// Event emitted by the call client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CallEvent {
    CallStart {
        #[serde(default, alias = "callId")]
        id: Option<CallId>,
    },
    CallEnd,
    Error {
        detail: String,
    },
    Message(CallMessage),
}

/// Conversation message streamed by the call client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub transcript_type: Option<String>,
    #[serde(default)]
    pub transcript: Option<String>,
}

impl CallMessage {
    /// Final assistant transcript line
    pub fn assistant_final(text: impl Into<String>) -> Self {
        Self {
            message_type: "transcript".into(),
            role: Some("assistant".into()),
            transcript_type: Some("final".into()),
            transcript: Some(text.into()),
        }
    }

    /// Returns the transcript text only for final assistant transcript lines
    pub fn final_assistant_transcript(&self) -> Option<&str> {
        if self.message_type != "transcript"
            || self.role.as_deref() != Some("assistant")
            || self.transcript_type.as_deref() != Some("final")
        {
            return None;
        }
        self.transcript.as_deref()
    }
}

/// Event delivered by the realtime channel subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// Join confirmed by the server
    Subscribed,
    /// `call-created` broadcast
    CallCreated { call_id: CallId },
    /// Socket closed by the server or transport
    Closed { reason: String },
}

/// Confirmation form fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormField {
    Name,
    Phone,
    Email,
}

impl FormField {
    pub const ALL: [FormField; 3] = [FormField::Name, FormField::Phone, FormField::Email];

    pub fn label(&self) -> &'static str {
        match self {
            FormField::Name => "Name",
            FormField::Phone => "Phone (+xxx)",
            FormField::Email => "you@example.com",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormField::Name => "name",
            FormField::Phone => "phone",
            FormField::Email => "email",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FormField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(FormField::Name),
            "phone" => Ok(FormField::Phone),
            "email" => Ok(FormField::Email),
            other => Err(format!("Unknown form field '{}'", other)),
        }
    }
}

/// Which confirmation fields are shown and required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFields {
    pub name: bool,
    pub phone: bool,
    pub email: bool,
}

impl Default for FormFields {
    fn default() -> Self {
        Self {
            name: true,
            phone: true,
            email: true,
        }
    }
}

impl FormFields {
    pub fn is_required(&self, field: FormField) -> bool {
        match field {
            FormField::Name => self.name,
            FormField::Phone => self.phone,
            FormField::Email => self.email,
        }
    }

    pub fn required(&self) -> impl Iterator<Item = FormField> + '_ {
        FormField::ALL.into_iter().filter(move |f| self.is_required(*f))
    }
}

/// User-supplied contact data pending submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationForm {
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl ConfirmationForm {
    pub fn get(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Phone => &self.phone,
            FormField::Email => &self.email,
        }
    }

    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::Name => self.name = value,
            FormField::Phone => self.phone = value,
            FormField::Email => self.email = value,
        }
    }

    /// First required field that is blank
    pub fn first_missing(&self, fields: &FormFields) -> Option<FormField> {
        fields.required().find(|f| self.get(*f).trim().is_empty())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Payload handed to the submission endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub call_id: CallId,
    pub name: String,
    pub phone: String,
    pub email: String,
}

impl SubmissionPayload {
    pub fn new(call_id: CallId, form: &ConfirmationForm) -> Self {
        Self {
            call_id,
            name: form.name.clone(),
            phone: form.phone.clone(),
            email: form.email.clone(),
        }
    }
}

/// User-facing message the host should display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    CallIdMissing,
    FieldMissing(FormField),
    Submitted,
    SubmitFailed,
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::CallIdMissing => "Call ID not captured. Please try again.".into(),
            Notice::FieldMissing(field) => format!("Please fill in your {}.", field),
            Notice::Submitted => "Thank you! We have received your info.".into(),
            Notice::SubmitFailed => "Sending failed. Please try again later.".into(),
        }
    }
}

/// Read-only view of the widget for hosts and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSnapshot {
    pub status: CallStatus,
    pub call_id: Option<CallId>,
    /// Which source delivered `call_id`
    pub call_id_source: Option<IdSource>,
    pub form_open: bool,
    pub form: ConfirmationForm,
    /// Toggle control disabled (request in flight or widget unavailable)
    pub busy: bool,
    pub available: bool,
}

/// Error kinds surfaced by the voice widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum WidgetError {
    #[error("Call client error: {0}")]
    CallClient(String),

    #[error("Call ID not captured")]
    MissingCallId,

    #[error("Required field missing: {0}")]
    MissingField(FormField),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Failed to load dependencies: {0}")]
    DependencyLoad(String),

    #[error("Voice widget unavailable")]
    Unavailable,

    #[error("A request is already in flight")]
    RequestInFlight,

    #[error("Confirmation form is not open")]
    FormClosed,

    #[error("Timed out waiting for {0}")]
    TimedOut(String),
}

impl WidgetError {
    /// Whether the user can simply try the same action again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WidgetError::Submission(_) | WidgetError::MissingField(_) | WidgetError::RequestInFlight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_start_accepts_both_id_names() {
        let a: CallEvent = serde_json::from_str(r#"{"kind":"call-start","id":"abc"}"#).unwrap();
        let b: CallEvent = serde_json::from_str(r#"{"kind":"call-start","callId":"abc"}"#).unwrap();
        let none: CallEvent = serde_json::from_str(r#"{"kind":"call-start"}"#).unwrap();

        assert_eq!(a, CallEvent::CallStart { id: Some("abc".into()) });
        assert_eq!(a, b);
        assert_eq!(none, CallEvent::CallStart { id: None });
    }

    #[test]
    fn test_message_event_wire_format() {
        let event: CallEvent = serde_json::from_str(
            r#"{"kind":"message","type":"transcript","role":"assistant","transcriptType":"final","transcript":"Hello"}"#,
        )
        .unwrap();

        match event {
            CallEvent::Message(msg) => assert_eq!(msg.final_assistant_transcript(), Some("Hello")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_only_final_assistant_transcripts_count() {
        let partial = CallMessage {
            transcript_type: Some("partial".into()),
            ..CallMessage::assistant_final("hi")
        };
        let user = CallMessage {
            role: Some("user".into()),
            ..CallMessage::assistant_final("hi")
        };
        let status = CallMessage {
            message_type: "status-update".into(),
            ..CallMessage::assistant_final("hi")
        };

        assert!(partial.final_assistant_transcript().is_none());
        assert!(user.final_assistant_transcript().is_none());
        assert!(status.final_assistant_transcript().is_none());
        assert_eq!(CallMessage::assistant_final("hi").final_assistant_transcript(), Some("hi"));
    }

    #[test]
    fn test_first_missing_respects_configuration() {
        let mut form = ConfirmationForm::default();
        form.set(FormField::Name, "Aysel");

        let all = FormFields::default();
        assert_eq!(form.first_missing(&all), Some(FormField::Phone));

        let name_only = FormFields { name: true, phone: false, email: false };
        assert_eq!(form.first_missing(&name_only), None);

        form.set(FormField::Phone, "   ");
        let phone = FormFields { name: false, phone: true, email: false };
        assert_eq!(form.first_missing(&phone), Some(FormField::Phone));
    }

    #[test]
    fn test_submission_payload_uses_camel_case() {
        let form = ConfirmationForm {
            name: "A".into(),
            phone: "+994".into(),
            email: "a@b.c".into(),
        };
        let json = serde_json::to_value(SubmissionPayload::new("abc".into(), &form)).unwrap();
        assert_eq!(json["callId"], "abc");
        assert_eq!(json["phone"], "+994");
    }

    #[test]
    fn test_form_field_parsing() {
        assert_eq!("EMAIL".parse::<FormField>(), Ok(FormField::Email));
        assert!("address".parse::<FormField>().is_err());
    }

    #[test]
    fn test_busy_statuses() {
        assert!(CallStatus::Connecting.is_busy());
        assert!(CallStatus::Stopping.is_busy());
        assert!(!CallStatus::Active.is_busy());
        assert!(!CallStatus::Idle.is_busy());
    }
}
