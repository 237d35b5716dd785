//! Configuration for the propwire client: API base URL, HTTP timeout, and
//! the realtime (Reverb/Pusher-protocol) connection settings.

mod env_subst;
mod loader;
mod schema;

pub use {
    env_subst::substitute_env,
    loader::{clear_config_dir, config_dir, discover_and_load, load_config, set_config_dir},
    schema::{ApiConfig, PropwireConfig, RealtimeConfig},
};
