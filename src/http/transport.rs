/// Blocking `ureq` transport for the analytics backend.
///
/// One [`ureq::Agent`] is built per client and shared by every request, so
/// connections are pooled across the dashboard's concurrent loads. The agent
/// is cheap to clone and safe to use from worker threads.
///
/// `ureq` has no way to abort a request mid-flight, so cancellation is
/// honored at the two points we control: before the request is sent, and
/// after the response arrives but before its body is handed back.
use std::time::Duration;

use super::{CancellationToken, HttpRequest, Method, RawResponse, Transport, TransportError};

#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Build a transport with the given socket timeout. `0` disables it.
    pub fn new(timeout_ms: u64) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let url = prefer_ipv4_loopback(&request.url);

        let mut call = self.agent.request(request.method.as_str(), &url);
        for (key, value) in &request.query {
            call = call.query(key, value);
        }

        let result = match (&request.method, &request.body) {
            (Method::Post, Some(body)) => call.send_json(body),
            _ => call.call(),
        };

        let response = match result {
            Ok(response) => response,
            // ureq reports 4xx/5xx as errors; they still carry a usable response.
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                return Err(TransportError::Connection(transport.to_string()));
            }
        };

        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let status = response.status();
        let status_text = response.status_text().to_string();
        let body = response
            .into_string()
            .map_err(|e| TransportError::Connection(format!("failed to read response body: {e}")))?;

        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        Ok(RawResponse {
            status,
            status_text,
            body,
        })
    }
}

/// Rewrite a `localhost` host to `127.0.0.1`.
///
/// On Windows, "localhost" may resolve to ::1 first while the backend only
/// binds IPv4. Hosts that merely start with `localhost` are left alone.
fn prefer_ipv4_loopback(url: &str) -> String {
    if let Some((scheme, rest)) = url.split_once("://")
        && let Some(tail) = rest.strip_prefix("localhost")
        && (tail.is_empty() || tail.starts_with([':', '/', '?', '#']))
    {
        return format!("{scheme}://127.0.0.1{tail}");
    }
    url.to_string()
}
