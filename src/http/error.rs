/// Uniform error type for every request issued against the analytics backend.
///
/// Transport failures and non-2xx responses are folded into this enum at the
/// wrapper boundary so views only ever deal with a single error shape. The
/// `Display` output is the user-facing message rendered inline by the views.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, refused, timeout...).
    #[error("{context} failed: {reason}")]
    Network { context: String, reason: String },

    /// The backend answered with a non-2xx status. `message` is already
    /// normalized (payload `error` field, raw text, or synthesized).
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The response decoded but did not have the expected shape.
    #[error("unexpected {context} payload: {reason}")]
    Payload { context: String, reason: String },

    /// The request was superseded or its owner was torn down.
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Cancellation is never surfaced to the user.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status code, when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
