//! Typed resource gateway: thin wrappers translating logical operations
//! (login, fetch listings, send a chat message, …) into authorized HTTP
//! requests, and raw responses into typed results or the shared error
//! taxonomy. No caching, pagination state, or display formatting lives
//! here — snapshots pass through as the backend sent them.

mod auth;
mod chat;
mod client;
mod inquiries;
mod properties;
pub mod types;
mod user;

pub use {
    chat::{EVENT_MESSAGE_SENT, MessageEnvelope},
    client::ApiClient,
};
