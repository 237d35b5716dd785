//! Realtime channel client for a Reverb backend speaking the Pusher
//! channel protocol: one lazy process-wide connection, named channel
//! bindings with idempotent re-subscribe, and server-side authorization
//! for private channels.

mod auth;
mod manager;
pub mod protocol;
mod subscription;

pub use {
    auth::ChannelAuthorizer,
    manager::ChannelManager,
    protocol::Channel,
    subscription::{EventHandlers, Subscription},
};
