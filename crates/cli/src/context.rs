use std::sync::Arc;

use {
    propwire_config::PropwireConfig,
    propwire_gateway::ApiClient,
    propwire_realtime::ChannelManager,
    propwire_session::{Session, TokenStore},
};

/// Wires config → session → gateway → realtime with an explicit
/// lifecycle: built once at process start, torn down at process end.
/// Everything the UI layer is allowed to touch hangs off this.
pub struct AppContext {
    pub config: PropwireConfig,
    pub session: Arc<Session>,
    pub api: ApiClient,
    pub realtime: ChannelManager,
}

impl AppContext {
    pub fn init() -> anyhow::Result<Self> {
        let config = propwire_config::discover_and_load();

        let session = Arc::new(Session::new(TokenStore::new()));
        session.restore();

        let api = ApiClient::new(&config.api, session.clone())?;

        let auth_endpoint = format!(
            "{}{}",
            config.api.normalized_base_url(),
            config.realtime.auth_path
        );
        let realtime = ChannelManager::new(config.realtime.clone(), auth_endpoint, session.clone())?;

        Ok(Self {
            config,
            session,
            api,
            realtime,
        })
    }

    pub async fn shutdown(&self) {
        self.realtime.disconnect().await;
    }
}
