use serde::{Deserialize, Serialize};

/// Top-level config. Every field has a default so a missing config file
/// still yields a working localhost setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropwireConfig {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL all resource paths are resolved against. Must end with `/`
    /// for relative joins to behave; `normalized_base_url` enforces it.
    pub base_url: String,
    /// Bounded per-request timeout. A request never hangs past this.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/".into(),
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn normalized_base_url(&self) -> String {
        if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        }
    }
}

/// Realtime (Pusher-protocol) connection settings for a Reverb backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub host: String,
    pub port: u16,
    /// Optional path prefix in front of `/app/<key>` (Reverb behind a
    /// reverse proxy, e.g. "/reverb").
    pub path: String,
    /// Application key baked into the WebSocket URL.
    pub app_key: String,
    pub tls: bool,
    /// Broadcast-auth path, relative to the API base URL.
    pub auth_path: String,
    /// Bound on connect and on waiting for a subscription confirmation.
    pub connect_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 443,
            path: String::new(),
            app_key: String::new(),
            tls: true,
            auth_path: "broadcasting/auth".into(),
            connect_timeout_secs: 10,
        }
    }
}

impl RealtimeConfig {
    /// The WebSocket URL for the Pusher channel protocol (protocol 7).
    pub fn websocket_url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!(
            "{scheme}://{}:{}{}/app/{}?protocol=7&client=propwire&version={}",
            self.host,
            self.port,
            self.path,
            self.app_key,
            env!("CARGO_PKG_VERSION"),
        )
    }
}
