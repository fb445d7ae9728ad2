use crate::config::ConversionConfig;
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::event::EventBuilder;
use crate::metrics_defs::{LEAD_MALFORMED_INPUT, LEAD_REQUESTS};
use crate::submission::RawSubmission;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::Value;
use shared::counter;
use std::time::SystemTime;

/// Body of the `/api/lead` response.
#[derive(Debug, Serialize, PartialEq)]
pub struct LeadResponse {
    #[serde(skip)]
    pub status: StatusCode,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Upstream response body, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LeadResponse {
    fn upstream(ok: bool, status: StatusCode, event_id: String, meta: Value) -> Self {
        LeadResponse {
            status,
            ok,
            event_id: Some(event_id),
            meta: Some(meta),
            error: None,
        }
    }

    fn failure(error: &DispatchError) -> Self {
        LeadResponse {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            ok: false,
            event_id: None,
            meta: None,
            error: Some(error.to_string()),
        }
    }
}

/// Normalizes a lead submission into a conversion event and dispatches it once.
pub struct LeadHandler {
    builder: EventBuilder,
    dispatcher: Dispatcher,
}

impl LeadHandler {
    pub fn new(config: &ConversionConfig) -> Self {
        LeadHandler {
            builder: EventBuilder::new(config),
            dispatcher: Dispatcher::new(config),
        }
    }

    pub async fn handle(&self, body: &[u8], now: SystemTime) -> LeadResponse {
        let raw = match RawSubmission::from_body(body) {
            Ok(raw) => raw,
            Err(e) => {
                counter!(LEAD_MALFORMED_INPUT).increment(1);
                tracing::warn!(error = %e, "Malformed lead body, continuing with an empty submission");
                RawSubmission::default()
            }
        };

        let event = self.builder.build(&raw, now);
        let summary = event.summary();
        tracing::info!(
            event_id = %event.event_id,
            has_email = summary.has_email,
            has_phone = summary.has_phone,
            has_first_name = summary.has_first_name,
            has_last_name = summary.has_last_name,
            has_fbp = summary.has_fbp,
            has_fbc = summary.has_fbc,
            has_user_agent = summary.has_user_agent,
            test_mode = summary.test_mode,
            "Dispatching conversion event"
        );

        let response = match self.dispatcher.dispatch(&event).await {
            Ok(result) => {
                tracing::info!(event_id = %event.event_id, status = %result.status, "Conversion event accepted");
                LeadResponse::upstream(true, result.status, event.event_id, result.body)
            }
            Err(DispatchError::UpstreamRejection { status, body }) => {
                tracing::error!(event_id = %event.event_id, %status, upstream_body = %body, "Conversion API rejected event");
                LeadResponse::upstream(false, status, event.event_id, body)
            }
            Err(e) if e.is_configuration_error() => {
                tracing::error!(error = %e, "Conversion API is not configured, event dropped");
                LeadResponse::failure(&e)
            }
            Err(e) => {
                tracing::error!(event_id = %event.event_id, error = %e, "Conversion API call did not complete");
                LeadResponse::failure(&e)
            }
        };

        let outcome = match (&response.ok, &response.meta) {
            (true, _) => "success",
            (false, Some(_)) => "rejected",
            (false, None) => "failed",
        };
        counter!(LEAD_REQUESTS, "outcome" => outcome).increment(1);

        response
    }
}
