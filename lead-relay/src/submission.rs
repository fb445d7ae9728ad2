use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// The request body could not be read as a JSON object.
#[derive(Error, Debug)]
#[error("malformed submission body: {0}")]
pub struct MalformedInput(pub String);

/// Lead form submission as sent by the browser. Every field is optional.
#[derive(Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawSubmission {
    #[serde(default, deserialize_with = "text_only")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub event_source_url: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub fbp: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub fbc: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "text_only")]
    pub currency: Option<String>,
}

impl RawSubmission {
    /// Parses a request body. An empty body is a legitimately empty submission; anything
    /// that is not a JSON object is `MalformedInput`.
    pub fn from_body(body: &[u8]) -> Result<Self, MalformedInput> {
        parse_object(body)
    }
}

/// Parses `body` as a JSON object into `T`, treating an empty body as `{}`.
pub(crate) fn parse_object<T>(body: &[u8]) -> Result<T, MalformedInput>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| MalformedInput(e.to_string()))?;
    if !value.is_object() {
        return Err(MalformedInput(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| MalformedInput(e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Only non-blank strings count. Identity fields are match signals upstream, so a stray
/// `false` or `0` must not turn into a key.
pub(crate) fn text_only<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// Accepts non-blank strings, non-zero numbers and `true` as text. `false`, `0`, null,
/// nested values and blank strings become `None`.
pub(crate) fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Some(Value::Bool(true)) => Some("true".into()),
        _ => None,
    })
}

// Personal fields are reported by presence only.
impl fmt::Debug for RawSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSubmission")
            .field("event_id", &self.event_id)
            .field("event_source_url", &self.event_source_url)
            .field("has_email", &self.email.is_some())
            .field("has_phone", &self.phone.is_some())
            .field("has_first_name", &self.first_name.is_some())
            .field("has_last_name", &self.last_name.is_some())
            .field("has_full_name", &self.full_name.is_some())
            .field("has_fbp", &self.fbp.is_some())
            .field("has_fbc", &self.fbc.is_some())
            .field("has_user_agent", &self.user_agent.is_some())
            .field("value", &self.value)
            .field("currency", &self.currency)
            .finish()
    }
}
