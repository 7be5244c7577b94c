//! ============================================================================
//! Scripted Chat - FAQ Replies + Consultation Booking
//! ============================================================================
//! A local support panel with no network access:
//! - exact-phrase canned replies after a short typing delay
//! - a generic acknowledgment for anything else
//! - "Book a consultation" hands over to the booking form
//!
//! Messages are numbered from 1 in the order they are appended.
//! ============================================================================

pub mod booking;
pub mod replies;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub use booking::{available_dates, AvailableDate, Booking, BookingDraft, BookingField, BookingForm, TIME_SLOTS};
pub use replies::{Reply, GREETING, QUICK_REPLIES};

/// Errors from the booking flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ChatError {
    #[error("Please fill in all required fields")]
    MissingBookingFields,

    #[error("Date not offered: {0}")]
    InvalidDate(String),

    #[error("Time slot not offered: {0}")]
    InvalidTimeSlot(String),

    #[error("Unknown booking field: {0}")]
    UnknownField(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Support,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub text: String,
    pub sender: Sender,
    /// Local `HH:MM`
    pub timestamp: String,
}

/// Which panel the chat shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatView {
    #[default]
    Chat,
    Booking,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Simulated support typing time
    pub reply_delay: Duration,
    /// Pause between the booking hand-off reply and the form
    pub booking_switch_delay: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_delay: Duration::from_millis(1500),
            booking_switch_delay: Duration::from_millis(1000),
        }
    }
}

pub struct ScriptedChat {
    config: ChatConfig,
    messages: Vec<ChatMessage>,
    next_id: u64,
    view: ChatView,
    typing: bool,
    draft: BookingDraft,
    /// Fixed calendar day; the local date when unset
    today: Option<NaiveDate>,
}

impl Default for ScriptedChat {
    fn default() -> Self {
        Self::new(ChatConfig::default())
    }
}

impl ScriptedChat {
    /// New conversation opened with the support greeting
    pub fn new(config: ChatConfig) -> Self {
        let mut chat = Self {
            config,
            messages: Vec::new(),
            next_id: 1,
            view: ChatView::Chat,
            typing: false,
            draft: BookingDraft::default(),
            today: None,
        };
        chat.push(Sender::Support, GREETING.to_string());
        chat
    }

    /// Pin the calendar used for bookable dates
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn view(&self) -> ChatView {
        self.view
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn quick_replies(&self) -> &'static [&'static str] {
        &QUICK_REPLIES
    }

    pub fn draft(&self) -> &BookingDraft {
        &self.draft
    }

    /// Post a user message and wait for support's reply.
    ///
    /// Blank input is ignored and returns `None`; otherwise the reply is
    /// returned once appended.
    pub async fn send_message(&mut self, text: &str) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }

        self.push(Sender::User, text.to_string());
        let reply = Reply::for_message(text);
        debug!("Chat reply selected: {:?}", reply);

        self.typing = true;
        tokio::time::sleep(self.config.reply_delay).await;
        self.typing = false;
        self.push(Sender::Support, reply.text().to_string());

        if reply == Reply::Booking {
            tokio::time::sleep(self.config.booking_switch_delay).await;
            info!("Switching chat to booking view");
            self.view = ChatView::Booking;
        }

        self.messages.iter().rev().find(|m| m.sender == Sender::Support)
    }

    /// Dates offered by the booking form
    pub fn available_dates(&self) -> Vec<AvailableDate> {
        available_dates(self.today.unwrap_or_else(|| Local::now().date_naive()))
    }

    pub fn select_date(&mut self, iso: &str) -> Result<(), ChatError> {
        let offered = self.available_dates();
        self.draft.select_date(iso, &offered)
    }

    pub fn select_time(&mut self, slot: &str) -> Result<(), ChatError> {
        self.draft.select_time(slot)
    }

    pub fn set_booking_field(&mut self, field: BookingField, value: impl Into<String>) {
        self.draft.form.set(field, value);
    }

    /// Back button on the booking form; the draft is kept
    pub fn back_to_chat(&mut self) {
        self.view = ChatView::Chat;
    }

    /// Confirm the booking in the transcript and return to the chat
    pub fn submit_booking(&mut self) -> Result<Booking, ChatError> {
        let booking = self.draft.validate()?;
        info!("Consultation booked for {} at {}", booking.date.iso(), booking.time);

        self.push(Sender::Support, booking.confirmation());
        self.view = ChatView::Chat;
        self.draft = BookingDraft::default();
        Ok(booking)
    }

    fn push(&mut self, sender: Sender, text: String) {
        self.messages.push(ChatMessage {
            id: self.next_id,
            text,
            sender,
            timestamp: Local::now().format("%H:%M").to_string(),
        });
        self.next_id += 1;
    }
}
