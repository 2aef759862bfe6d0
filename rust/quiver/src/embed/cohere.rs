//! Cohere embedding function implementation.

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::embed::{
    resolve_api_key, DenseEmbeddingFunction, EmbeddingError, ResolveEmbeddingFunctionError,
};

const DEFAULT_API_BASE: &str = "https://api.cohere.com/v1";
const DEFAULT_MODEL: &str = "embed-english-v3.0";
const DEFAULT_INPUT_TYPE: &str = "search_document";
const DEFAULT_ENV_VAR: &str = "COHERE_API_KEY";

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_input_type() -> String {
    DEFAULT_INPUT_TYPE.to_string()
}

/// Configuration accepted in the `config` map of an embedding function spec.
#[derive(Serialize, Deserialize)]
pub struct CohereEmbeddingFunctionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model", alias = "model")]
    pub model_name: String,
    #[serde(default = "default_input_type")]
    pub input_type: String,
}

/// Generates embeddings via the Cohere embed API.
#[derive(Debug)]
pub struct CohereEmbeddingFunction {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    input_type: String,
}

impl CohereEmbeddingFunction {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: default_api_base(),
            api_key: api_key.into(),
            model: model.into(),
            input_type: default_input_type(),
        }
    }

    pub(crate) fn from_spec_config(
        config: &Map<String, Value>,
    ) -> Result<Self, ResolveEmbeddingFunctionError> {
        let api_key = resolve_api_key(config, "cohere", DEFAULT_ENV_VAR)?;
        let config: CohereEmbeddingFunctionConfig =
            serde_json::from_value(Value::Object(config.clone()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: config.api_base,
            api_key,
            model: config.model_name,
            input_type: config.input_type,
        })
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let req = EmbedRequest {
            model: &self.model,
            texts: batches,
            input_type: &self.input_type,
        };
        let resp = self
            .client
            .post(format!("{}/embed", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&req)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;
        Ok(resp.embeddings)
    }
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for CohereEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        "cohere"
    }
}

#[derive(Clone, Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [&'a str],
    input_type: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
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
                    .path("/embed")
                    .json_body_includes(r#"{"texts": ["hello"], "input_type": "search_document"}"#);
                then.status(200)
                    .json_body(json!({ "embeddings": [[1.0, 2.0]] }));
            })
            .await;

        let mut config = Map::new();
        config.insert("api_key".to_string(), json!("co-test"));
        config.insert("api_base".to_string(), json!(server.base_url()));
        let embedder = CohereEmbeddingFunction::from_spec_config(&config).unwrap();

        let embeddings = embedder.embed_strs(&["hello"]).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 2.0]]);
        mock.assert_async().await;
    }
}
