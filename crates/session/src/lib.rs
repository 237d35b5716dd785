//! Session lifecycle: the persisted bearer token, its in-memory copy, and
//! the single point where an authentication-rejected response clears it.

mod session;
mod store;

pub use {session::Session, store::TokenStore};
