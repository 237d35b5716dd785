use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    serde::Deserialize,
    tracing::debug,
};

use {propwire_common::ApiError, propwire_session::Session};

/// Response from the broadcast-auth endpoint: the signature forwarded in
/// the subscribe frame.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    auth: String,
}

/// Authorizes private-channel subscriptions against the backend's
/// broadcast-auth endpoint, using the current session token at subscribe
/// time.
#[derive(Clone)]
pub struct ChannelAuthorizer {
    http: reqwest::Client,
    endpoint: String,
    session: Arc<Session>,
}

impl ChannelAuthorizer {
    pub fn new(http: reqwest::Client, endpoint: String, session: Arc<Session>) -> Self {
        Self {
            http,
            endpoint,
            session,
        }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    /// Run the authorization round trip for one channel on one socket.
    /// With no session token this fails with `Unauthenticated` before any
    /// transport activity.
    pub async fn authorize(&self, socket_id: &str, channel_name: &str) -> Result<String, ApiError> {
        let token = self.session.token().ok_or(ApiError::Unauthenticated)?;

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({
                "socket_id": socket_id,
                "channel_name": channel_name,
            }))
            .send()
            .await
            .map_err(ApiError::network)?;

        let status = response.status().as_u16();
        self.session.handle_status(status)?;
        if !response.status().is_success() {
            let message = response
                .text()
                .await
                .ok()
                .filter(|body| !body.is_empty())
                .unwrap_or_else(|| "broadcast authorization rejected".into());
            return Err(ApiError::RequestFailed { status, message });
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ApiError::RequestFailed {
                status,
                message: format!("invalid broadcast auth response: {e}"),
            })?;

        debug!(channel = channel_name, "private channel authorized");
        Ok(auth.auth)
    }
}
