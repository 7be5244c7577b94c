//! Canned support replies keyed by exact user phrase.

pub const GREETING: &str =
    "Hi! I'm here to help you with your study abroad journey. How can I assist you today?";

/// Phrase that hands the conversation over to the booking form
pub const BOOKING_PHRASE: &str = "Book a consultation";

pub const BOOKING_REPLY: &str =
    "I'd be happy to help you schedule a free consultation! Let me open our booking system for you.";

pub const FALLBACK_REPLY: &str = "Thanks for your message! Our expert counselors typically respond within 2-3 minutes. For immediate assistance, you can also book a free consultation. What specific area would you like help with?";

/// Suggestions offered under the greeting
pub const QUICK_REPLIES: [&str; 5] = [
    "Tell me about pricing",
    "Which countries do you cover?",
    "How does the process work?",
    "I need scholarship help",
    BOOKING_PHRASE,
];

const CANNED: [(&str, &str); 4] = [
    (
        "Tell me about pricing",
        "Our complete guidance package is just ~1000 AZN/year with no hidden fees. This includes university matching, application support, scholarship assistance, and parent dashboard access. Would you like to schedule a free consultation to discuss your specific needs?",
    ),
    (
        "Which countries do you cover?",
        "We work with universities across Europe, North America, Australia, and select Asian countries - over 500 accredited institutions! Popular destinations include Germany, Canada, Netherlands, and Australia. Which region interests you most?",
    ),
    (
        "How does the process work?",
        "We start with a free consultation to understand your goals, then provide personalized university matching, step-by-step application guidance, and ongoing support. The typical timeline is 6-12 months. Would you like to book your free consultation?",
    ),
    (
        "I need scholarship help",
        "Great! Scholarship support is included in our service. We identify relevant scholarships, help with applications, and many students receive partial or full funding. Let's discuss your profile in a consultation - shall I schedule one for you?",
    ),
];

/// What support says in response to `text`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Booking hand-off; the panel switches to the booking form afterwards
    Booking,
    Canned(&'static str),
    Fallback,
}

impl Reply {
    /// Exact, case-sensitive match against the known phrases
    pub fn for_message(text: &str) -> Self {
        if text == BOOKING_PHRASE {
            return Reply::Booking;
        }
        CANNED
            .iter()
            .find(|(phrase, _)| *phrase == text)
            .map(|(_, reply)| Reply::Canned(reply))
            .unwrap_or(Reply::Fallback)
    }

    pub fn text(&self) -> &'static str {
        match self {
            Reply::Booking => BOOKING_REPLY,
            Reply::Canned(reply) => reply,
            Reply::Fallback => FALLBACK_REPLY,
        }
    }
}
