use crate::errors::{LeadRelayError, Result};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderValue,
};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub type ResponseBody = BoxBody<Bytes, LeadRelayError>;

#[derive(Debug)]
pub enum BodyError {
    TooLarge,
    Read(String),
}

/// Collects a request body, refusing anything above `limit` bytes.
pub async fn read_body<B>(body: B, limit: usize) -> std::result::Result<Bytes, BodyError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => Err(BodyError::TooLarge),
        Err(e) => Err(BodyError::Read(e.to_string())),
    }
}

/// Message for an outbound request failure with the full cause chain and without the
/// request URL, which may carry credentials.
pub(crate) fn upstream_error_message(error: reqwest::Error) -> String {
    let error = error.without_url();
    let mut message = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Serializes `value` as the JSON body of a response with `status`.
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<ResponseBody>> {
    let bytes = serde_json::to_vec(value).map(Bytes::from)?;

    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(bytes).map_err(|e| match e {}).boxed())
        .map_err(LeadRelayError::from)
}

pub fn empty_response(status: StatusCode) -> Result<Response<ResponseBody>> {
    Response::builder()
        .status(status)
        .body(Empty::new().map_err(|e| match e {}).boxed())
        .map_err(LeadRelayError::from)
}

/// The lead form is served from a different origin than this service.
pub fn with_cors(mut response: Response<ResponseBody>) -> Response<ResponseBody> {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_body_limit() {
        let body = Full::new(Bytes::from_static(b"0123456789"));
        assert_eq!(read_body(body, 10).await.unwrap().as_ref(), b"0123456789");

        let body = Full::new(Bytes::from_static(b"0123456789"));
        assert!(matches!(read_body(body, 9).await, Err(BodyError::TooLarge)));
    }

    #[tokio::test]
    async fn test_json_response_with_cors() {
        let response = with_cors(json_response(StatusCode::CREATED, &json!({"ok": true})).unwrap());
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), br#"{"ok":true}"#);
    }
}
