//! Test doubles shared by the controller and widget tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::call_client::CallClient;
use crate::host::CallHost;
use crate::submission::FormSubmitter;
use crate::types::{CallId, FormFields, Notice, SubmissionPayload, WidgetError};

/// Everything the widget told its host, in order
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    CallStart(CallId),
    CallEnd,
    Error(WidgetError),
    Notice(Notice),
    FormOpened,
}

#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn push(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl CallHost for RecordingHost {
    fn on_call_start(&self, call_id: &CallId) {
        self.push(HostCall::CallStart(call_id.clone()));
    }

    fn on_call_end(&self) {
        self.push(HostCall::CallEnd);
    }

    fn on_error(&self, error: &WidgetError) {
        self.push(HostCall::Error(error.clone()));
    }

    fn on_notice(&self, notice: &Notice) {
        self.push(HostCall::Notice(notice.clone()));
    }

    fn on_form_opened(&self, _title: &str, _fields: &FormFields) {
        self.push(HostCall::FormOpened);
    }
}

/// Submitter that records payloads and can be told to fail
#[derive(Default)]
pub struct RecordingSubmitter {
    pub attempts: AtomicUsize,
    pub fail: AtomicBool,
    payloads: Mutex<Vec<SubmissionPayload>>,
}

impl RecordingSubmitter {
    pub fn failing() -> Self {
        let submitter = Self::default();
        submitter.fail.store(true, Ordering::SeqCst);
        submitter
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<SubmissionPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FormSubmitter for RecordingSubmitter {
    async fn submit(&self, payload: &SubmissionPayload) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("webhook unreachable"));
        }
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Call client whose requests never complete
#[derive(Default)]
pub struct HangingClient {
    pub starts: AtomicUsize,
}

#[async_trait]
impl CallClient for HangingClient {
    async fn start(&self, _assistant_id: &str) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    async fn stop(&self) -> Result<()> {
        std::future::pending().await
    }
}

/// Submitter whose webhook never answers
pub struct HangingSubmitter;

#[async_trait]
impl FormSubmitter for HangingSubmitter {
    async fn submit(&self, _payload: &SubmissionPayload) -> Result<()> {
        std::future::pending().await
    }
}
