use crate::config::{ConversionConfig, IdentityFieldSet};
use crate::normalizer::NormalizedIdentity;
use crate::submission::RawSubmission;
use rand::Rng;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

pub const EVENT_NAME: &str = "Lead";
pub const ACTION_SOURCE: &str = "website";
pub const FALLBACK_EVENT_ID_PREFIX: &str = "srv-";

/// One server-side conversion event, in the shape the conversion API expects.
///
/// Optional fields are skipped when absent: the platform treats a present key as a
/// matching signal, so `null` or `""` placeholders are never sent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversionEvent {
    pub event_name: &'static str,
    /// Seconds since epoch, taken from the server clock
    pub event_time: u64,
    /// Deduplication key shared with the browser pixel event
    pub event_id: String,
    pub action_source: &'static str,
    pub event_source_url: String,
    pub user_data: UserData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_event_code: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UserData {
    #[serde(flatten)]
    pub identity: NormalizedIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_user_agent: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CustomData {
    pub value: f64,
    pub currency: String,
}

/// Presence flags for logging. Carries no personal data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventSummary {
    pub has_email: bool,
    pub has_phone: bool,
    pub has_first_name: bool,
    pub has_last_name: bool,
    pub has_fbp: bool,
    pub has_fbc: bool,
    pub has_user_agent: bool,
    pub has_custom_data: bool,
    pub test_mode: bool,
}

impl ConversionEvent {
    pub fn summary(&self) -> EventSummary {
        let user = &self.user_data;
        EventSummary {
            has_email: user.identity.em.is_some(),
            has_phone: user.identity.ph.is_some(),
            has_first_name: user.identity.first_name.is_some(),
            has_last_name: user.identity.last_name.is_some(),
            has_fbp: user.fbp.is_some(),
            has_fbc: user.fbc.is_some(),
            has_user_agent: user.client_user_agent.is_some(),
            has_custom_data: self.custom_data.is_some(),
            test_mode: self.test_event_code.is_some(),
        }
    }
}

/// Assembles conversion events from submissions and server-side defaults.
///
/// Apart from the fallback event id, `build` is a pure function of its arguments.
#[derive(Clone, Debug)]
pub struct EventBuilder {
    default_event_source_url: String,
    default_currency: String,
    default_value: f64,
    identity_fields: IdentityFieldSet,
    include_custom_data: bool,
    test_event_code: Option<String>,
}

impl EventBuilder {
    pub fn new(config: &ConversionConfig) -> Self {
        EventBuilder {
            default_event_source_url: config.default_event_source_url.clone(),
            default_currency: config.default_currency.to_ascii_uppercase(),
            default_value: config.default_value,
            identity_fields: config.identity_fields,
            include_custom_data: config.include_custom_data,
            test_event_code: config
                .test_event_code
                .clone()
                .filter(|code| !code.trim().is_empty()),
        }
    }

    pub fn build(&self, raw: &RawSubmission, now: SystemTime) -> ConversionEvent {
        let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();

        let event_id = match non_blank(&raw.event_id) {
            Some(id) => id.to_string(),
            None => fallback_event_id(since_epoch.as_millis()),
        };

        let event_source_url = non_blank(&raw.event_source_url)
            .unwrap_or(&self.default_event_source_url)
            .to_string();

        let user_data = UserData {
            identity: NormalizedIdentity::from_submission(raw, self.identity_fields),
            fbp: non_blank(&raw.fbp).map(str::to_string),
            fbc: non_blank(&raw.fbc).map(str::to_string),
            client_user_agent: non_blank(&raw.user_agent).map(str::to_string),
        };

        let custom_data = self.include_custom_data.then(|| CustomData {
            value: raw
                .value
                .as_deref()
                .and_then(parse_value)
                .unwrap_or(self.default_value),
            currency: raw
                .currency
                .as_deref()
                .and_then(parse_currency)
                .unwrap_or_else(|| self.default_currency.clone()),
        });

        ConversionEvent {
            event_name: EVENT_NAME,
            event_time: since_epoch.as_secs(),
            event_id,
            action_source: ACTION_SOURCE,
            event_source_url,
            user_data,
            custom_data,
            test_event_code: self.test_event_code.clone(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// Millisecond timestamp plus ten random digits, so two leads in the same millisecond
// still get distinct ids.
fn fallback_event_id(now_millis: u128) -> String {
    let suffix: u64 = rand::thread_rng().gen_range(0..10_000_000_000);
    format!("{FALLBACK_EVENT_ID_PREFIX}{now_millis}{suffix:010}")
}

fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_currency(raw: &str) -> Option<String> {
    let code = raw.trim();
    (code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}
