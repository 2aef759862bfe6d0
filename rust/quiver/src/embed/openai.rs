//! OpenAI embedding function implementation.

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::embed::{
    resolve_api_key, DenseEmbeddingFunction, EmbeddingError, ResolveEmbeddingFunctionError,
};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_ENV_VAR: &str = "OPENAI_API_KEY";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Configuration accepted in the `config` map of an embedding function spec.
/// The API key itself is resolved separately and never round-trips through
/// this struct.
#[derive(Serialize, Deserialize)]
pub struct OpenAiEmbeddingFunctionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model", alias = "model")]
    pub model_name: String,
    #[serde(default)]
    pub dimensions: Option<u32>,
}

/// Generates embeddings via the OpenAI embeddings API.
#[derive(Debug)]
pub struct OpenAiEmbeddingFunction {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: Option<u32>,
}

impl OpenAiEmbeddingFunction {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: default_api_base(),
            api_key: api_key.into(),
            model: model.into(),
            dimensions: None,
        }
    }

    pub(crate) fn from_spec_config(
        config: &Map<String, Value>,
    ) -> Result<Self, ResolveEmbeddingFunctionError> {
        let api_key = resolve_api_key(config, "openai", DEFAULT_ENV_VAR)?;
        let config: OpenAiEmbeddingFunctionConfig =
            serde_json::from_value(Value::Object(config.clone()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: config.api_base,
            api_key,
            model: config.model_name,
            dimensions: config.dimensions,
        })
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let req = EmbedRequest {
            model: &self.model,
            input: batches,
            dimensions: self.dimensions,
        };
        let resp = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;
        Ok(resp.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for OpenAiEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Clone, Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

#[derive(Clone, Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedResponseItem>,
}

#[derive(Clone, Debug, Deserialize)]
struct EmbedResponseItem {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn embeds_against_mock_server() {
        let server = httpmock::MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/embeddings")
                    .header("authorization", "Bearer sk-test")
                    .json_body_includes(r#"{"model": "text-embedding-3-small"}"#);
                then.status(200).json_body(json!({
                    "data": [
                        { "embedding": [0.1, 0.2] },
                        { "embedding": [0.3, 0.4] },
                    ],
                }));
            })
            .await;

        let mut config = Map::new();
        config.insert("api_key".to_string(), json!("sk-test"));
        config.insert("api_base".to_string(), json!(server.base_url()));
        let embedder = OpenAiEmbeddingFunction::from_spec_config(&config).unwrap();

        let embeddings = embedder.embed_strs(&["a", "b"]).await.unwrap();
        assert_eq!(embeddings, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
        mock.assert_async().await;
    }
}
