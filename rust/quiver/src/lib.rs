//! Rust client library for Quiver, a vector database service.
//!
//! Quiver stores embeddings in named collections and serves similarity
//! queries over them. This crate provides the HTTP client, collection
//! handles, the configuration and schema value objects, and embedding
//! function resolution for the supported providers.
//!
//! # Core Types
//!
//! - [`QuiverHttpClient`] - Main client for database-level operations
//!   (create/list/delete collections and databases)
//! - [`QuiverCollection`] - Collection handle for record operations and
//!   configuration updates
//! - [`client::QuiverClientOptions`] - Client configuration including auth
//!   and retry behavior
//!
//! # Quick Start
//!
//! ```no_run
//! use quiver::QuiverHttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = QuiverHttpClient::cloud()?;
//!
//! let heartbeat = client.heartbeat().await?;
//! println!("Connected! Heartbeat: {}", heartbeat.nanosecond_heartbeat);
//!
//! let collection = client.get_or_create_collection("docs", None, None).await?;
//! println!("Collection: {}", collection.name());
//! # Ok(())
//! # }
//! ```
//!
//! # Collection Configuration
//!
//! Collections carry an immutable, validated configuration built through
//! [`types::CollectionConfiguration`]. Mutable index parameters are changed
//! with [`types::UpdateCollectionConfiguration`], which the collection handle
//! merges into its local state once the server confirms the update.
//!
//! ```
//! use quiver::types::{CollectionConfiguration, Space};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let configuration = CollectionConfiguration::builder()
//!     .space(Space::Cosine)
//!     .hnsw_max_neighbors(16)
//!     .hnsw_ef_construction(200)
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return `Result<T, QuiverHttpClientError>` where
//! [`client::QuiverHttpClientError`] captures network errors, serialization
//! failures, and validation errors.
//!
//! # Feature Flags
//!
//! - `default` - Enables `rustls` for TLS support
//! - `native-tls` - Use native system TLS
//! - `rustls` - Use pure-Rust TLS implementation

pub mod client;
mod collection;
pub mod embed;
mod reconcile;
pub mod types;

pub use client::QuiverHttpClient;
pub use client::QuiverClientOptions;
pub use collection::QuiverCollection;
