//! Pusher channel protocol framing (protocol 7), as spoken by Laravel
//! Reverb.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub const EVENT_CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
pub const EVENT_SUBSCRIBE: &str = "pusher:subscribe";
pub const EVENT_UNSUBSCRIBE: &str = "pusher:unsubscribe";
pub const EVENT_SUBSCRIPTION_SUCCEEDED: &str = "pusher_internal:subscription_succeeded";
pub const EVENT_PING: &str = "pusher:ping";
pub const EVENT_PONG: &str = "pusher:pong";
pub const EVENT_ERROR: &str = "pusher:error";

/// Wire prefix marking a channel that requires server-side authorization.
const PRIVATE_PREFIX: &str = "private-";

/// A named channel. Private channels require a broadcast-auth round trip
/// at subscribe time and carry the `private-` prefix on the wire, the way
/// Echo's `.private("chat.42")` subscribes to `private-chat.42`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    name: String,
    private: bool,
}

impl Channel {
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            private: false,
        }
    }

    pub fn private(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            private: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    /// The name sent over the wire and to the broadcast-auth endpoint.
    pub fn wire_name(&self) -> String {
        if self.private {
            format!("{PRIVATE_PREFIX}{}", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// One protocol frame. `data` is frequently a JSON document re-encoded as
/// a string by the server; [`decode_data`] unwraps either form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Frame {
    pub fn subscribe(channel_name: &str, auth: Option<&str>) -> Self {
        let mut data = serde_json::json!({ "channel": channel_name });
        if let Some(auth) = auth {
            data["auth"] = serde_json::Value::String(auth.to_string());
        }
        Self {
            event: EVENT_SUBSCRIBE.into(),
            channel: None,
            data: Some(data),
        }
    }

    pub fn unsubscribe(channel_name: &str) -> Self {
        Self {
            event: EVENT_UNSUBSCRIBE.into(),
            channel: None,
            data: Some(serde_json::json!({ "channel": channel_name })),
        }
    }

    pub fn pong() -> Self {
        Self {
            event: EVENT_PONG.into(),
            channel: None,
            data: None,
        }
    }
}

/// Payload of `pusher:connection_established`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionEstablished {
    pub socket_id: String,
    #[serde(default)]
    pub activity_timeout: Option<u64>,
}

/// Decode a frame's `data` field, unwrapping the double-encoded string
/// form when present.
pub fn decode_data<T: DeserializeOwned>(
    data: &serde_json::Value,
) -> Result<T, serde_json::Error> {
    match data {
        serde_json::Value::String(inner) => serde_json::from_str(inner),
        other => serde_json::from_value(other.clone()),
    }
}
