use std::collections::HashMap;

/// Every fallible boundary in the client resolves to exactly one of these.
///
/// All variants are recoverable by the caller; none terminate the process.
/// Raw transport errors (reqwest, tungstenite) are translated at the
/// gateway/session/realtime boundary and never leak upward.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend rejected the request body (HTTP 422). Carries the first
    /// message per field from the `errors` map.
    #[error("validation failed ({} field(s))", field_errors.len())]
    Validation {
        field_errors: HashMap<String, String>,
    },

    /// The backend rejected the bearer token (HTTP 401). The session has
    /// already been cleared; the caller should route to the login flow.
    #[error("session expired")]
    SessionExpired,

    /// Any other non-2xx response.
    #[error("request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    /// The server was unreachable (timeout, DNS, connection refused).
    /// The session is left intact: the token may still be valid.
    #[error("network error: {message}")]
    Network { message: String },

    /// Token persistence failed. The in-memory session is not updated.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// A privileged realtime action was attempted with no session token.
    #[error("not authenticated")]
    Unauthenticated,
}

impl ApiError {
    pub fn network(err: impl std::fmt::Display) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }

    /// Whether the caller should redirect to the login flow.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Unauthenticated)
    }
}
