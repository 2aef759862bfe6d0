//! Embedding function abstractions for converting text to vector
//! representations.
//!
//! This module provides the [`DenseEmbeddingFunction`] trait along with
//! implementations for the supported providers, and [`resolve`], which turns
//! a stored [`EmbeddingFunctionSpec`] into a ready-to-call embedder.

use std::sync::Arc;

use quiver_error::{ErrorCodes, QuiverError};
use quiver_types::{EmbeddingFunctionSpec, KNOWN_EMBEDDING_FUNCTION_TYPE};
use serde_json::{Map, Value};
use thiserror::Error;

pub mod cohere;
pub mod huggingface;
pub mod ollama;
pub mod openai;

/// Errors that occur while an embedder is producing vectors. Malformed
/// response bodies surface through the request variant since the providers
/// decode through `reqwest::Response::json`.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Network request to the provider failed.
    #[error("request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl QuiverError for EmbeddingError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Internal
    }
}

/// Transforms text strings into dense embeddings.
///
/// Implementations must be thread-safe and support batch processing. The
/// trait is object safe so resolved embedders can be shared as
/// `Arc<dyn DenseEmbeddingFunction>`.
#[async_trait::async_trait]
pub trait DenseEmbeddingFunction: std::fmt::Debug + Send + Sync + 'static {
    /// Converts a batch of text strings into embeddings, in input order.
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The canonical provider name of this implementation.
    fn name(&self) -> &'static str;
}

/// The closed set of providers an [`EmbeddingFunctionSpec`] can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnownProvider {
    OpenAi,
    Cohere,
    HuggingFace,
    Ollama,
}

impl KnownProvider {
    /// Parses a provider name case-insensitively, accepting the synonyms
    /// users actually write.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openai" | "open_ai" => Some(KnownProvider::OpenAi),
            "cohere" => Some(KnownProvider::Cohere),
            "huggingface" | "hugging_face" | "hf" => Some(KnownProvider::HuggingFace),
            "ollama" => Some(KnownProvider::Ollama),
            _ => None,
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            KnownProvider::OpenAi => "openai",
            KnownProvider::Cohere => "cohere",
            KnownProvider::HuggingFace => "huggingface",
            KnownProvider::Ollama => "ollama",
        }
    }
}

const SUPPORTED_PROVIDERS: &str = "openai, cohere, huggingface, ollama";

/// Errors raised while turning a spec into an embedder.
#[derive(Debug, Error)]
pub enum ResolveEmbeddingFunctionError {
    #[error("Embedding function name must not be blank")]
    BlankName,
    #[error("Unsupported embedding function type '{0}'; only \"known\" is supported")]
    UnsupportedType(String),
    #[error(
        "Unknown embedding function provider '{name}'; supported providers: {SUPPORTED_PROVIDERS}"
    )]
    UnknownProvider { name: String },
    #[error("Invalid embedding function config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    #[error(
        "Missing API key for {provider}: provide api_key or api_key_env_var in the \
         embedding function config, or set {env_var}"
    )]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("Failed to initialize embedding function: {0}")]
    Construction(#[from] EmbeddingError),
}

impl QuiverError for ResolveEmbeddingFunctionError {
    fn code(&self) -> ErrorCodes {
        match self {
            ResolveEmbeddingFunctionError::Construction(err) => err.code(),
            _ => ErrorCodes::InvalidArgument,
        }
    }
}

/// Builds an embedder from a stored spec.
///
/// `None` in, `Ok(None)` out. Performs no caching; the collection handle is
/// responsible for reusing the result. Constructors perform no network I/O,
/// so resolution is synchronous.
pub fn resolve(
    spec: Option<&EmbeddingFunctionSpec>,
) -> Result<Option<Arc<dyn DenseEmbeddingFunction>>, ResolveEmbeddingFunctionError> {
    let Some(spec) = spec else {
        return Ok(None);
    };

    if spec.name().trim().is_empty() {
        return Err(ResolveEmbeddingFunctionError::BlankName);
    }
    if let Some(spec_type) = spec.spec_type() {
        if spec_type != KNOWN_EMBEDDING_FUNCTION_TYPE {
            return Err(ResolveEmbeddingFunctionError::UnsupportedType(
                spec_type.to_string(),
            ));
        }
    }

    let provider = KnownProvider::parse(spec.name()).ok_or_else(|| {
        ResolveEmbeddingFunctionError::UnknownProvider {
            name: spec.name().to_string(),
        }
    })?;

    let config = spec.config();
    let embedder: Arc<dyn DenseEmbeddingFunction> = match provider {
        KnownProvider::OpenAi => Arc::new(openai::OpenAiEmbeddingFunction::from_spec_config(
            &config,
        )?),
        KnownProvider::Cohere => Arc::new(cohere::CohereEmbeddingFunction::from_spec_config(
            &config,
        )?),
        KnownProvider::HuggingFace => Arc::new(
            huggingface::HuggingFaceEmbeddingFunction::from_spec_config(&config)?,
        ),
        KnownProvider::Ollama => Arc::new(ollama::OllamaEmbeddingFunction::from_spec_config(
            &config,
        )?),
    };

    Ok(Some(embedder))
}

/// Resolves a provider API key with fixed precedence: explicit `api_key` in
/// the config, then the env var named by `api_key_env_var`, then the
/// provider's default env var.
pub(crate) fn resolve_api_key(
    config: &Map<String, Value>,
    provider: &'static str,
    default_env_var: &'static str,
) -> Result<String, ResolveEmbeddingFunctionError> {
    if let Some(Value::String(api_key)) = config.get("api_key") {
        return Ok(api_key.clone());
    }
    if let Some(Value::String(env_var)) = config.get("api_key_env_var") {
        if let Ok(api_key) = std::env::var(env_var) {
            return Ok(api_key);
        }
    }
    std::env::var(default_env_var).map_err(|_| ResolveEmbeddingFunctionError::MissingApiKey {
        provider,
        env_var: default_env_var,
    })
}
