//! Shared error taxonomy and request plumbing for the propwire client crates.

pub mod error;
pub mod request;

pub use {
    error::ApiError,
    request::{RequestDescriptor, bearer_header},
};
