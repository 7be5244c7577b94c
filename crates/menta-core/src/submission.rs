//! ============================================================================
//! Confirmation Submission - Webhook Hand-off
//! ============================================================================
//! The default path posts `{callId, name, phone, email}` form-encoded to the
//! configured webhook and does not inspect the response (the endpoint is a
//! cross-origin fire-and-forget hook). Hosts that need a delivery guarantee
//! supply their own `FormSubmitter`.
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::SubmissionPayload;

/// Per-request limit on the webhook call
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives a confirmed booking
#[async_trait]
pub trait FormSubmitter: Send + Sync {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<()>;
}

/// Default submitter posting to a webhook URL
pub struct WebhookSubmitter {
    client: reqwest::Client,
    webhook_url: String,
}

impl WebhookSubmitter {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl FormSubmitter for WebhookSubmitter {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<()> {
        info!("Submitting confirmation for call {}", payload.call_id);

        let response = self
            .client
            .post(&self.webhook_url)
            .form(&form_fields(payload))
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach webhook: {}", e))?;

        // Opaque response: only transport failures count
        debug!("Webhook answered {}", response.status());
        Ok(())
    }
}

/// Ordered form fields as posted to the webhook
pub fn form_fields(payload: &SubmissionPayload) -> [(&'static str, &str); 4] {
    [
        ("callId", payload.call_id.as_str()),
        ("name", payload.name.as_str()),
        ("phone", payload.phone.as_str()),
        ("email", payload.email.as_str()),
    ]
}
