//! Client configuration and connection management for Quiver.
//!
//! This module contains:
//! - [`QuiverHttpClient`] - The main client handle for database operations
//! - [`QuiverClientOptions`] - Configuration for client initialization
//! - [`QuiverAuthMethod`] - Authentication strategy enumeration
//! - [`QuiverRetryOptions`] - Retry behavior configuration
//! - [`QuiverHttpClientError`] - Error type for client operations

mod http_client;
mod options;

pub use http_client::*;
pub use options::*;
