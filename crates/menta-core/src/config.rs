//! ============================================================================
//! Widget Configuration
//! ============================================================================
//! Options recognised by the voice widget plus the hosted-service settings
//! (call API, realtime project). Everything can be read from environment
//! variables; hosts typically load a `.env` file first.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::trigger::DEFAULT_TRIGGER_PHRASE;
use crate::types::FormFields;

/// Default Vapi REST endpoint
pub const DEFAULT_VAPI_API_URL: &str = "https://api.vapi.ai";

/// Errors while reading configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Timeout policy for every asynchronous wait the widget performs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    /// Dependency loader must report ready within this window
    pub ready: Duration,
    /// `call-start` must follow a start request within this window
    pub call_start: Duration,
    /// `call-end` must follow a stop request within this window
    pub call_stop: Duration,
    /// An active call must learn its id within this window
    pub call_id: Duration,
    /// A confirmation submit must finish within this window
    pub submit: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(10),
            call_start: Duration::from_secs(30),
            call_stop: Duration::from_secs(10),
            call_id: Duration::from_secs(20),
            submit: Duration::from_secs(15),
        }
    }
}

/// Voice widget options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetConfig {
    /// Remote assistant the call client connects to
    pub assistant_id: String,
    /// Realtime channel carrying `call-created` broadcasts
    pub channel: String,
    /// Default submission target when the host supplies no submitter
    pub webhook_url: Option<String>,
    pub form_fields: FormFields,
    pub modal_title: String,
    pub trigger_phrases: Vec<String>,
    pub timeouts: Timeouts,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            assistant_id: String::new(),
            channel: "calls".to_string(),
            webhook_url: None,
            form_fields: FormFields::default(),
            modal_title: "Confirm your booking".to_string(),
            trigger_phrases: vec![DEFAULT_TRIGGER_PHRASE.to_string()],
            timeouts: Timeouts::default(),
        }
    }
}

impl WidgetConfig {
    /// Build from `MENTA_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by `from_env` and tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let assistant_id = lookup("MENTA_ASSISTANT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("MENTA_ASSISTANT_ID"))?;

        let form_fields = match lookup("MENTA_FORM_FIELDS") {
            Some(list) => parse_form_fields(&list)?,
            None => defaults.form_fields,
        };

        let trigger_phrases = match lookup("MENTA_TRIGGER_PHRASES") {
            Some(list) => list
                .split('|')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.trigger_phrases,
        };

        let timeouts = Timeouts {
            ready: secs(&lookup, "MENTA_READY_TIMEOUT_SECS", defaults.timeouts.ready)?,
            call_start: secs(&lookup, "MENTA_CALL_START_TIMEOUT_SECS", defaults.timeouts.call_start)?,
            call_stop: secs(&lookup, "MENTA_CALL_STOP_TIMEOUT_SECS", defaults.timeouts.call_stop)?,
            call_id: secs(&lookup, "MENTA_CALL_ID_TIMEOUT_SECS", defaults.timeouts.call_id)?,
            submit: secs(&lookup, "MENTA_SUBMIT_TIMEOUT_SECS", defaults.timeouts.submit)?,
        };

        Ok(Self {
            assistant_id,
            channel: lookup("MENTA_CHANNEL").unwrap_or(defaults.channel),
            webhook_url: lookup("MENTA_WEBHOOK_URL").filter(|v| !v.trim().is_empty()),
            form_fields,
            modal_title: lookup("MENTA_MODAL_TITLE").unwrap_or(defaults.modal_title),
            trigger_phrases,
            timeouts,
        })
    }
}

/// Hosted-service credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub vapi_api_key: String,
    pub vapi_api_url: String,
    /// Public URL Vapi should post server messages to
    pub vapi_server_url: Option<String>,
    /// Local address the server-message listener binds
    pub server_events_addr: Option<String>,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            vapi_api_key: lookup("VAPI_API_KEY").ok_or(ConfigError::Missing("VAPI_API_KEY"))?,
            vapi_api_url: lookup("VAPI_API_URL").unwrap_or_else(|| DEFAULT_VAPI_API_URL.to_string()),
            vapi_server_url: lookup("VAPI_SERVER_URL").filter(|v| !v.trim().is_empty()),
            server_events_addr: lookup("MENTA_SERVER_EVENTS_ADDR").filter(|v| !v.trim().is_empty()),
            supabase_url: lookup("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?,
            supabase_anon_key: lookup("SUPABASE_ANON_KEY")
                .ok_or(ConfigError::Missing("SUPABASE_ANON_KEY"))?,
        })
    }
}

fn parse_form_fields(list: &str) -> Result<FormFields, ConfigError> {
    let mut fields = FormFields {
        name: false,
        phone: false,
        email: false,
    };

    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.to_lowercase().as_str() {
            "name" => fields.name = true,
            "phone" => fields.phone = true,
            "email" => fields.email = true,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "MENTA_FORM_FIELDS",
                    value: list.to_string(),
                })
            }
        }
    }

    Ok(fields)
}

fn secs<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_widget_config_defaults() {
        let config = WidgetConfig::from_lookup(lookup(&[("MENTA_ASSISTANT_ID", "asst-1")])).unwrap();
        assert_eq!(config.assistant_id, "asst-1");
        assert_eq!(config.channel, "calls");
        assert_eq!(config.form_fields, FormFields::default());
        assert_eq!(config.trigger_phrases, vec![DEFAULT_TRIGGER_PHRASE.to_string()]);
        assert_eq!(config.timeouts, Timeouts::default());
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_missing_assistant_id() {
        let err = WidgetConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("MENTA_ASSISTANT_ID"));
    }

    #[test]
    fn test_overrides() {
        let config = WidgetConfig::from_lookup(lookup(&[
            ("MENTA_ASSISTANT_ID", "asst-1"),
            ("MENTA_CHANNEL", "bookings"),
            ("MENTA_FORM_FIELDS", "name, phone"),
            ("MENTA_TRIGGER_PHRASES", "confirm below | type your email"),
            ("MENTA_CALL_START_TIMEOUT_SECS", "5"),
            ("MENTA_SUBMIT_TIMEOUT_SECS", "4"),
            ("MENTA_WEBHOOK_URL", "https://hooks.example.com/confirm"),
        ]))
        .unwrap();

        assert_eq!(config.channel, "bookings");
        assert!(config.form_fields.name && config.form_fields.phone && !config.form_fields.email);
        assert_eq!(config.trigger_phrases, vec!["confirm below", "type your email"]);
        assert_eq!(config.timeouts.call_start, Duration::from_secs(5));
        assert_eq!(config.timeouts.submit, Duration::from_secs(4));
        assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example.com/confirm"));
    }

    #[test]
    fn test_invalid_values() {
        let err = WidgetConfig::from_lookup(lookup(&[
            ("MENTA_ASSISTANT_ID", "asst-1"),
            ("MENTA_CALL_ID_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MENTA_CALL_ID_TIMEOUT_SECS", .. }));

        let err = WidgetConfig::from_lookup(lookup(&[
            ("MENTA_ASSISTANT_ID", "asst-1"),
            ("MENTA_FORM_FIELDS", "name,address"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MENTA_FORM_FIELDS", .. }));
    }

    #[test]
    fn test_service_config() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("VAPI_API_KEY", "key"),
            ("SUPABASE_URL", "https://proj.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .unwrap();
        assert_eq!(config.vapi_api_url, DEFAULT_VAPI_API_URL);
        assert!(config.vapi_server_url.is_none());
        assert!(config.server_events_addr.is_none());

        let routed = ServiceConfig::from_lookup(lookup(&[
            ("VAPI_API_KEY", "key"),
            ("VAPI_SERVER_URL", "https://hooks.example.com/vapi/events"),
            ("MENTA_SERVER_EVENTS_ADDR", "0.0.0.0:8787"),
            ("SUPABASE_URL", "https://proj.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .unwrap();
        assert_eq!(routed.server_events_addr.as_deref(), Some("0.0.0.0:8787"));

        let err = ServiceConfig::from_lookup(lookup(&[("VAPI_API_KEY", "key")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SUPABASE_URL"));
    }
}
