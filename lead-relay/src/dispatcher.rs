use crate::config::ConversionConfig;
use crate::event::ConversionEvent;
use crate::http::upstream_error_message;
use crate::metrics_defs::DISPATCH_DURATION;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use shared::histogram;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::timeout;
use url::Url;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Deployment is missing a required setting. Carries the setting name, never its value.
    #[error("conversion API setting `{0}` is not configured")]
    MissingSetting(&'static str),

    #[error("conversion API setting `{0}` is invalid")]
    InvalidSetting(&'static str),

    /// Upstream answered with a non-2xx status. `body` is passed on untouched.
    #[error("conversion API rejected the event with status {status}")]
    UpstreamRejection { status: StatusCode, body: Value },

    #[error("conversion API request failed: {0}")]
    Transport(String),

    #[error("conversion API request timed out after {0:?}")]
    Timeout(Duration),
}

impl DispatchError {
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DispatchError::MissingSetting(_) | DispatchError::InvalidSetting(_)
        )
    }

    fn outcome(&self) -> &'static str {
        match self {
            DispatchError::MissingSetting(_) | DispatchError::InvalidSetting(_) => "misconfigured",
            DispatchError::UpstreamRejection { .. } => "rejected",
            DispatchError::Transport(_) => "transport_error",
            DispatchError::Timeout(_) => "timeout",
        }
    }
}

/// Successful upstream answer.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub status: StatusCode,
    pub body: Value,
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// The events endpoint takes a batch even though we only ever send one event.
#[derive(Serialize)]
struct EventBatch<'a> {
    data: [&'a ConversionEvent; 1],
}

/// Sends conversion events to the upstream API, one call per event, no retries.
pub struct Dispatcher {
    client: reqwest::Client,
    api_base_url: Url,
    api_version: String,
    pixel_id: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &ConversionConfig) -> Self {
        Dispatcher {
            client: reqwest::Client::new(),
            api_base_url: config.api_base_url.clone(),
            api_version: config.api_version.clone(),
            pixel_id: config.pixel_id.clone(),
            access_token: config.access_token.clone(),
            timeout: config.timeout(),
        }
    }

    /// Configuration is checked before anything touches the network.
    pub async fn dispatch(&self, event: &ConversionEvent) -> Result<DispatchResult, DispatchError> {
        let started = Instant::now();
        let result = match self.endpoint() {
            Ok(url) => self.send(url, event).await,
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome(),
        };
        histogram!(DISPATCH_DURATION, "outcome" => outcome).record(started.elapsed().as_secs_f64());

        result
    }

    async fn send(&self, url: Url, event: &ConversionEvent) -> Result<DispatchResult, DispatchError> {
        let batch = EventBatch { data: [event] };

        let call = async {
            let response = self.client.post(url).json(&batch).send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = timeout(self.timeout, call)
            .await
            .map_err(|_| DispatchError::Timeout(self.timeout))?
            .map_err(|e| DispatchError::Transport(upstream_error_message(e)))?;

        let body = parse_body(text);
        tracing::debug!(event_id = %event.event_id, %status, "conversion API responded");

        if status.is_success() {
            Ok(DispatchResult { status, body })
        } else {
            Err(DispatchError::UpstreamRejection { status, body })
        }
    }

    /// `{base}/{version}/{pixel_id}/events?access_token={token}`
    fn endpoint(&self) -> Result<Url, DispatchError> {
        let token = self
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(DispatchError::MissingSetting("access_token"))?;

        if self.pixel_id.trim().is_empty() {
            return Err(DispatchError::MissingSetting("pixel_id"));
        }

        let mut url = self.api_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DispatchError::InvalidSetting("api_base_url"))?
            .pop_if_empty()
            .extend([self.api_version.as_str(), self.pixel_id.as_str(), "events"]);
        url.query_pairs_mut().append_pair("access_token", token);

        Ok(url)
    }
}

/// Upstream bodies are JSON in practice; anything else is kept as a string.
fn parse_body(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
