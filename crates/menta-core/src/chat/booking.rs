//! ============================================================================
//! Consultation Booking - Dates, Slots, Form
//! ============================================================================
//! Offered dates are the next ten weekdays starting tomorrow. Slots are fixed
//! hours. Nothing leaves the process; a booking only produces a confirmation
//! message in the chat transcript.
//! ============================================================================

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ChatError;

/// Number of weekdays offered
pub const BOOKABLE_DAYS: usize = 10;

pub const TIME_SLOTS: [&str; 7] = ["09:00", "10:00", "11:00", "14:00", "15:00", "16:00", "17:00"];

/// One offered consultation day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableDate {
    pub date: NaiveDate,
    /// `Mon, Jan 5`
    pub display: String,
}

impl AvailableDate {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            display: date.format("%a, %b %-d").to_string(),
        }
    }

    /// `YYYY-MM-DD`
    pub fn iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Next `BOOKABLE_DAYS` weekdays after `today`
pub fn available_dates(today: NaiveDate) -> Vec<AvailableDate> {
    today
        .iter_days()
        .skip(1)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(BOOKABLE_DAYS)
        .map(AvailableDate::new)
        .collect()
}

/// Booking form inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BookingField {
    Name,
    Email,
    Phone,
    StudyField,
    PreferredCountry,
}

impl BookingField {
    pub const ALL: [BookingField; 5] = [
        BookingField::Name,
        BookingField::Email,
        BookingField::Phone,
        BookingField::StudyField,
        BookingField::PreferredCountry,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BookingField::Name => "name",
            BookingField::Email => "email",
            BookingField::Phone => "phone",
            BookingField::StudyField => "study field",
            BookingField::PreferredCountry => "preferred country",
        }
    }
}

impl fmt::Display for BookingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BookingField {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "name" => Ok(BookingField::Name),
            "email" => Ok(BookingField::Email),
            "phone" => Ok(BookingField::Phone),
            "studyfield" | "field" => Ok(BookingField::StudyField),
            "preferredcountry" | "country" => Ok(BookingField::PreferredCountry),
            _ => Err(ChatError::UnknownField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub study_field: String,
    pub preferred_country: String,
}

impl BookingForm {
    pub fn set(&mut self, field: BookingField, value: impl Into<String>) {
        let value = value.into();
        match field {
            BookingField::Name => self.name = value,
            BookingField::Email => self.email = value,
            BookingField::Phone => self.phone = value,
            BookingField::StudyField => self.study_field = value,
            BookingField::PreferredCountry => self.preferred_country = value,
        }
    }
}

/// In-progress booking: picked date and slot plus the form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingDraft {
    pub date: Option<AvailableDate>,
    pub time: Option<&'static str>,
    pub form: BookingForm,
}

/// A validated booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub date: AvailableDate,
    pub time: String,
    pub form: BookingForm,
}

impl BookingDraft {
    /// Pick one of the offered dates by its `YYYY-MM-DD` form
    pub fn select_date(&mut self, iso: &str, offered: &[AvailableDate]) -> Result<(), ChatError> {
        let picked = NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|date| offered.iter().find(|d| d.date == date))
            .ok_or_else(|| ChatError::InvalidDate(iso.to_string()))?;
        self.date = Some(picked.clone());
        Ok(())
    }

    pub fn select_time(&mut self, slot: &str) -> Result<(), ChatError> {
        let slot = TIME_SLOTS
            .iter()
            .find(|s| **s == slot.trim())
            .ok_or_else(|| ChatError::InvalidTimeSlot(slot.to_string()))?;
        self.time = Some(*slot);
        Ok(())
    }

    /// Date, time, name and email are required
    pub fn validate(&self) -> Result<Booking, ChatError> {
        match (&self.date, self.time) {
            (Some(date), Some(time))
                if !self.form.name.trim().is_empty() && !self.form.email.trim().is_empty() =>
            {
                Ok(Booking {
                    date: date.clone(),
                    time: time.to_string(),
                    form: self.form.clone(),
                })
            }
            _ => Err(ChatError::MissingBookingFields),
        }
    }
}

impl Booking {
    pub fn confirmation(&self) -> String {
        format!(
            "Perfect! I've scheduled your free consultation for {} at {}. You'll receive a confirmation email at {} with the meeting link. Looking forward to helping you with your study abroad journey!",
            self.date.display, self.time, self.form.email
        )
    }
}
