mod api;
mod collection;
mod collection_configuration;
mod collection_schema;
mod embedding_function;
mod validators;

// Re-export everything so downstream crates use a single import path.
pub use api::*;
pub use collection::*;
pub use collection_configuration::*;
pub use collection_schema::*;
pub use embedding_function::*;
pub use validators::*;
