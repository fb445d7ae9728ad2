use crate::api::{ArchiveHandler, LeadHandler};
use crate::archive::Archiver;
use crate::config::Config;
use crate::errors::{LeadRelayError, Result};
use crate::http::{BodyError, ResponseBody, empty_response, json_response, read_body, with_cors};
use crate::metrics_defs::REQUESTS_REJECTED;
use chrono::Utc;
use hyper::body::{Body, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use shared::counter;
use shared::http::make_boxed_error_response;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::SystemTime;

pub const LEAD_PATH: &str = "/api/lead";
pub const ARCHIVE_PATH: &str = "/api/saveToSheet";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    Lead,
    Archive,
}

impl Endpoint {
    fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            LEAD_PATH => Some(Endpoint::Lead),
            ARCHIVE_PATH => Some(Endpoint::Archive),
            _ => None,
        }
    }
}

/// Public entrypoint: method and CORS gate, body decoding, dispatch to the endpoint
/// handlers.
#[derive(Clone)]
pub struct LeadRelayService {
    lead: Arc<LeadHandler>,
    archive: Arc<ArchiveHandler>,
    max_body_bytes: usize,
}

impl LeadRelayService {
    pub fn new(config: &Config, archiver: Arc<dyn Archiver>) -> Self {
        LeadRelayService {
            lead: Arc::new(LeadHandler::new(&config.conversion)),
            archive: Arc::new(ArchiveHandler::new(archiver)),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<ResponseBody>>
    where
        B: Body + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(endpoint) = Endpoint::from_path(req.uri().path()) else {
            tracing::debug!(path = %req.uri().path(), "No endpoint matched");
            counter!(REQUESTS_REJECTED, "reason" => "not_found").increment(1);
            return Ok(with_cors(make_boxed_error_response(StatusCode::NOT_FOUND)));
        };

        // CORS preflight
        if req.method() == Method::OPTIONS {
            return empty_response(StatusCode::OK).map(with_cors);
        }

        if req.method() != Method::POST {
            tracing::debug!(method = %req.method(), ?endpoint, "Rejected non-POST request");
            counter!(REQUESTS_REJECTED, "reason" => "method").increment(1);
            let body = match endpoint {
                Endpoint::Lead => json!({"ok": false, "error": "Method Not Allowed"}),
                Endpoint::Archive => json!({"success": false, "error": "Method Not Allowed"}),
            };
            return json_response(StatusCode::METHOD_NOT_ALLOWED, &body).map(with_cors);
        }

        let body = match read_body(req.into_body(), self.max_body_bytes).await {
            Ok(body) => body,
            Err(BodyError::TooLarge) => {
                counter!(REQUESTS_REJECTED, "reason" => "body_too_large").increment(1);
                let body = json!({"ok": false, "error": "Request body too large"});
                return json_response(StatusCode::PAYLOAD_TOO_LARGE, &body).map(with_cors);
            }
            Err(BodyError::Read(e)) => {
                tracing::warn!(error = %e, "Failed to read request body");
                counter!(REQUESTS_REJECTED, "reason" => "body_read").increment(1);
                let body = json!({"ok": false, "error": "Failed to read request body"});
                return json_response(StatusCode::BAD_REQUEST, &body).map(with_cors);
            }
        };

        let response = match endpoint {
            Endpoint::Lead => {
                let result = self.lead.handle(&body, SystemTime::now()).await;
                json_response(result.status, &result)
            }
            Endpoint::Archive => {
                let result = self.archive.handle(&body, Utc::now()).await;
                json_response(result.status, &result)
            }
        };

        response.map(with_cors)
    }
}

impl Service<Request<Incoming>> for LeadRelayService {
    type Response = Response<ResponseBody>;
    type Error = LeadRelayError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { service.handle(req).await })
    }
}
