//! Hugging Face Inference API embedding function implementation.

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::embed::{
    resolve_api_key, DenseEmbeddingFunction, EmbeddingError, ResolveEmbeddingFunctionError,
};

const DEFAULT_API_BASE: &str = "https://router.huggingface.co/hf-inference/models";
const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
const DEFAULT_ENV_VAR: &str = "HF_TOKEN";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Configuration accepted in the `config` map of an embedding function spec.
#[derive(Serialize, Deserialize)]
pub struct HuggingFaceEmbeddingFunctionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model", alias = "model")]
    pub model_name: String,
}

/// Generates embeddings via the Hugging Face Inference API
/// feature-extraction pipeline.
#[derive(Debug)]
pub struct HuggingFaceEmbeddingFunction {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HuggingFaceEmbeddingFunction {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: default_api_base(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub(crate) fn from_spec_config(
        config: &Map<String, Value>,
    ) -> Result<Self, ResolveEmbeddingFunctionError> {
        let api_key = resolve_api_key(config, "huggingface", DEFAULT_ENV_VAR)?;
        let config: HuggingFaceEmbeddingFunctionConfig =
            serde_json::from_value(Value::Object(config.clone()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: config.api_base,
            api_key,
            model: config.model_name,
        })
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let req = EmbedRequest { inputs: batches };
        let embeddings = self
            .client
            .post(format!(
                "{}/{}/pipeline/feature-extraction",
                self.api_base, self.model
            ))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Vec<f32>>>()
            .await?;
        Ok(embeddings)
    }
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for HuggingFaceEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

#[derive(Clone, Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
}
