//! Host callbacks: how the widget reports back to the page that mounted it.

use tracing::{error, info};

use crate::types::{CallId, FormFields, Notice, WidgetError};

/// Callbacks invoked by the voice widget. Every method defaults to a no-op.
pub trait CallHost: Send + Sync {
    /// Call became active and carried a correlation id
    fn on_call_start(&self, _call_id: &CallId) {}

    fn on_call_end(&self) {}

    fn on_error(&self, _error: &WidgetError) {}

    /// User-facing message (submitted, failed, missing id...)
    fn on_notice(&self, _notice: &Notice) {}

    /// Confirmation form opened after the assistant's cue
    fn on_form_opened(&self, _title: &str, _fields: &FormFields) {}
}

/// Host that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHost;

impl CallHost for LoggingHost {
    fn on_call_start(&self, call_id: &CallId) {
        info!("Call started: {}", call_id);
    }

    fn on_call_end(&self) {
        info!("Call ended");
    }

    fn on_error(&self, err: &WidgetError) {
        error!("Voice widget error: {}", err);
    }

    fn on_notice(&self, notice: &Notice) {
        info!("{}", notice.message());
    }

    fn on_form_opened(&self, title: &str, _fields: &FormFields) {
        info!("Confirmation form opened: {}", title);
    }
}
