//! ============================================================================
//! MENTA-CORE: Landing Page Widgets
//! ============================================================================
//! Backend logic for the two widgets embedded in the study-abroad landing page:
//! - Voice call widget: call client, realtime `call-created` listener,
//!   confirmation form gated on the call id
//! - Scripted chat: canned FAQ replies and consultation booking
//! - Adapters for Vapi (REST plus server messages) and Supabase Realtime
//!   (websocket)
//! ============================================================================

pub mod call_client;
pub mod chat;
pub mod config;
pub mod correlation;
pub mod host;
pub mod realtime;
pub mod submission;
pub mod trigger;
pub mod types;
pub mod voice;
pub mod widget;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use types::*;
pub use call_client::{CallClient, ServerEventListener, SimulatedCallClient, SimulatedCallScript, VapiCallClient};
pub use chat::{ChatError, ChatView, ScriptedChat};
pub use config::{ConfigError, ServiceConfig, Timeouts, WidgetConfig};
pub use correlation::{Adoption, CorrelationCell};
pub use host::{CallHost, LoggingHost};
pub use realtime::{RealtimeHandle, SupabaseRealtime};
pub use submission::{FormSubmitter, WebhookSubmitter};
pub use trigger::TriggerMatcher;
pub use voice::{CallOutcome, CallRequest, Deadline, RequestKind, SubmitOutcome, SubmitRequest, ToggleAction, VoiceCallController};
pub use widget::{VoiceWidget, WidgetCommand, WidgetDeps, WidgetHandle};
