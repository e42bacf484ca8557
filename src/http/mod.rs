//! HTTP client wrapper for the analytics backend.
//!
//! Every request goes through [`HttpClient::send`], which delegates the wire
//! exchange to a [`Transport`] and funnels the response through
//! [`parse_response`], the single place where response-shape ambiguity is
//! resolved:
//!
//! - bodies are read as text and decoded as JSON when possible, otherwise kept
//!   as raw text
//! - non-2xx responses become [`ApiError::Http`] with a message taken from the
//!   payload's `error` field, the raw text (or a bare JSON string), or a synthesized
//!   `"<context> failed (<status> <reason>)"`
//! - an empty 2xx body becomes an empty JSON object
//!
//! The base URL is injected at construction so the layer can be exercised with
//! fake transports.

pub mod cancel;
pub mod error;
pub mod transport;

use std::fmt;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::telemetry::logger::{RequestLog, RequestOutcome};

pub use cancel::CancellationToken;
pub use error::ApiError;
pub use transport::UreqTransport;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// HTTP methods used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved request, ready for a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL without the query string.
    pub url: String,
    /// API path relative to the base URL (used for logging).
    pub path: String,
    /// Query parameters, in insertion order. Values are not yet encoded.
    pub query: Vec<(String, String)>,
    /// JSON body for POST requests.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Append a query parameter.
    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a query parameter by key.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Status line and body text of a completed exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure below the HTTP layer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The token was cancelled before or during the exchange.
    Cancelled,
    /// No response was received.
    Connection(String),
}

/// Performs a single HTTP exchange.
///
/// Implementations must return non-2xx responses as `Ok(RawResponse)`; status
/// interpretation belongs to [`parse_response`]. The cancellation token must
/// be checked before the request is sent and before the response is returned.
pub trait Transport: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// Response normalization
// ---------------------------------------------------------------------------

/// A response body after the decode attempt.
#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Empty,
    Json(Value),
    Text(String),
}

fn decode_body(body: &str) -> Payload {
    if body.trim().is_empty() {
        return Payload::Empty;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Payload::Json(value),
        Err(_) => Payload::Text(body.to_string()),
    }
}

/// Normalize a raw response into a JSON value or a uniform [`ApiError`].
///
/// `context` names the operation in synthesized error messages, e.g.
/// `"Overview request"` yields `"Overview request failed (503 Service Unavailable)"`.
pub fn parse_response(raw: &RawResponse, context: &str) -> Result<Value, ApiError> {
    let payload = decode_body(&raw.body);

    if !raw.is_success() {
        return Err(ApiError::Http {
            status: raw.status,
            message: error_message(&payload, raw, context),
        });
    }

    Ok(match payload {
        Payload::Empty => Value::Object(Map::new()),
        Payload::Json(value) => value,
        Payload::Text(text) => Value::String(text),
    })
}

fn error_message(payload: &Payload, raw: &RawResponse, context: &str) -> String {
    match payload {
        Payload::Json(Value::Object(map)) => {
            if let Some(Value::String(message)) = map.get("error")
                && !message.is_empty()
            {
                return message.clone();
            }
        }
        Payload::Json(Value::String(text)) if !text.trim().is_empty() => return text.clone(),
        Payload::Text(text) => return text.clone(),
        _ => {}
    }
    let reason = raw.status_text.trim();
    if reason.is_empty() {
        format!("{context} failed ({})", raw.status)
    } else {
        format!("{context} failed ({} {reason})", raw.status)
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Sends requests to a fixed base URL through a [`Transport`].
pub struct HttpClient<T: Transport> {
    base_url: String,
    transport: T,
    request_log: Option<RequestLog>,
}

impl<T: Transport> HttpClient<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            request_log: None,
        }
    }

    /// Record every exchange in the given JSONL request log.
    pub fn with_request_log(mut self, log: RequestLog) -> Self {
        self.request_log = Some(log);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start building a request for `path` (must begin with `/`).
    pub fn request(&self, method: Method, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            path: path.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Execute a request and normalize its response.
    pub fn send(
        &self,
        request: &HttpRequest,
        context: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, ApiError> {
        let start = Instant::now();
        let (status, result) = self.exchange(request, context, cancel);

        if let Some(log) = &self.request_log {
            let outcome = RequestOutcome::from_result(&result);
            log.record(request, status, start.elapsed(), outcome, &result);
        }

        result
    }

    fn exchange(
        &self,
        request: &HttpRequest,
        context: &str,
        cancel: &CancellationToken,
    ) -> (Option<u16>, Result<Value, ApiError>) {
        if cancel.is_cancelled() {
            return (None, Err(ApiError::Cancelled));
        }

        let raw = match self.transport.execute(request, cancel) {
            Ok(raw) => raw,
            Err(TransportError::Cancelled) => return (None, Err(ApiError::Cancelled)),
            Err(TransportError::Connection(reason)) => {
                return (
                    None,
                    Err(ApiError::Network {
                        context: context.to_string(),
                        reason,
                    }),
                );
            }
        };

        (Some(raw.status), parse_response(&raw, context))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    fn response(status: u16, status_text: &str, body: &str) -> RawResponse {
        RawResponse::new(status, status_text, body)
    }

    #[test]
    fn success_json_is_returned_unchanged() {
        let raw = response(200, "OK", r#"{"features":[{"name":"Age","importance":0.1}]}"#);
        let value = parse_response(&raw, "Feature importance request").unwrap();
        assert_eq!(value, json!({"features": [{"name": "Age", "importance": 0.1}]}));
    }

    #[test]
    fn success_bare_number_is_returned() {
        let raw = response(200, "OK", "0.73");
        assert_eq!(parse_response(&raw, "Prediction request").unwrap(), json!(0.73));
    }

    #[test]
    fn success_empty_body_is_empty_object() {
        let raw = response(204, "No Content", "");
        assert_eq!(parse_response(&raw, "Overview request").unwrap(), json!({}));
    }

    #[test]
    fn success_plain_text_becomes_string() {
        let raw = response(200, "OK", "all good");
        assert_eq!(parse_response(&raw, "Health check").unwrap(), json!("all good"));
    }

    #[test]
    fn error_field_wins() {
        let raw = response(400, "Bad Request", r#"{"error": "X"}"#);
        let err = parse_response(&raw, "Monthly features request").unwrap_err();
        assert_eq!(err.to_string(), "X");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn raw_text_is_used_when_not_json() {
        let raw = response(502, "Bad Gateway", "Y");
        let err = parse_response(&raw, "Monthly features request").unwrap_err();
        assert_eq!(err.to_string(), "Y");
    }

    #[test]
    fn json_string_error_body_is_the_message() {
        let raw = response(503, "Service Unavailable", r#""backend warming up""#);
        let err = parse_response(&raw, "Overview request").unwrap_err();
        assert_eq!(err.to_string(), "backend warming up");

        let raw = response(503, "Service Unavailable", r#""""#);
        let err = parse_response(&raw, "Overview request").unwrap_err();
        assert_eq!(err.to_string(), "Overview request failed (503 Service Unavailable)");
    }

    #[test]
    fn empty_error_body_synthesizes_message() {
        let raw = response(500, "Internal Server Error", "");
        let err = parse_response(&raw, "Overview request").unwrap_err();
        assert_eq!(err.to_string(), "Overview request failed (500 Internal Server Error)");
    }

    #[test]
    fn json_object_without_error_synthesizes_message() {
        let raw = response(404, "Not Found", r#"{"detail": "missing"}"#);
        let err = parse_response(&raw, "Overview request").unwrap_err();
        assert_eq!(err.to_string(), "Overview request failed (404 Not Found)");
    }

    #[test]
    fn missing_status_text_is_omitted() {
        let raw = response(500, "", "");
        let err = parse_response(&raw, "Overview request").unwrap_err();
        assert_eq!(err.to_string(), "Overview request failed (500)");
    }

    struct Scripted {
        reply: Result<RawResponse, TransportError>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Transport for Scripted {
        fn execute(
            &self,
            request: &HttpRequest,
            _cancel: &CancellationToken,
        ) -> Result<RawResponse, TransportError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn client(reply: Result<RawResponse, TransportError>) -> HttpClient<Scripted> {
        HttpClient::new(
            "http://backend:5000/",
            Scripted {
                reply,
                seen: Mutex::new(Vec::new()),
            },
        )
    }

    #[test]
    fn request_joins_base_url_and_path() {
        let client = client(Ok(response(200, "OK", "{}")));
        let request = client
            .request(Method::Get, "/api/monthly-features")
            .with_query("page", 2);
        assert_eq!(request.url, "http://backend:5000/api/monthly-features");
        assert_eq!(request.query_value("page"), Some("2"));
        assert_eq!(request.query_value("page_size"), None);
    }

    #[test]
    fn connection_failure_becomes_network_error() {
        let client = client(Err(TransportError::Connection("refused".to_string())));
        let request = client.request(Method::Get, "/api/metrics/overview");
        let err = client
            .send(&request, "Overview request", &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
    }

    #[test]
    fn cancelled_token_skips_transport() {
        let client = client(Ok(response(200, "OK", "{}")));
        let request = client.request(Method::Get, "/api/metrics/overview");
        let token = CancellationToken::new();
        token.cancel();
        let err = client.send(&request, "Overview request", &token).unwrap_err();
        assert!(err.is_cancelled());
        assert!(client.transport().seen.lock().unwrap().is_empty());
    }

    #[test]
    fn transport_cancellation_is_reported_as_cancelled() {
        let client = client(Err(TransportError::Cancelled));
        let request = client.request(Method::Get, "/api/monthly-features");
        let err = client
            .send(&request, "Monthly features request", &CancellationToken::new())
            .unwrap_err();
        assert_eq!(err, ApiError::Cancelled);
    }
}
