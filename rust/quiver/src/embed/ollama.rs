//! Ollama embedding function implementation for local model inference.
//!
//! Connects to a locally running Ollama instance to generate embeddings using
//! models like `nomic-embed-text` or `mxbai-embed-large`, without sending data
//! to external APIs.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::embed::{DenseEmbeddingFunction, EmbeddingError, ResolveEmbeddingFunctionError};

const DEFAULT_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "nomic-embed-text";

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    60
}

/// Configuration accepted in the `config` map of an embedding function spec.
#[derive(Serialize, Deserialize)]
pub struct OllamaEmbeddingFunctionConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_model", alias = "model")]
    pub model_name: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Generates embeddings using a locally running Ollama instance.
///
/// Ollama requires no API key. The model must already be pulled locally with
/// `ollama pull <model>`.
#[derive(Debug)]
pub struct OllamaEmbeddingFunction {
    client: reqwest::Client,
    url: String,
    model: String,
}

impl OllamaEmbeddingFunction {
    /// Constructs an embedder without contacting the server. Use
    /// [`heartbeat`](Self::heartbeat) to verify connectivity.
    pub fn new(
        url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, EmbeddingError> {
        Self::with_timeout(url, model, default_timeout())
    }

    pub fn with_timeout(
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: u64,
    ) -> Result<Self, EmbeddingError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(timeout))
                .build()?,
            url: url.into(),
            model: model.into(),
        })
    }

    pub(crate) fn from_spec_config(
        config: &Map<String, Value>,
    ) -> Result<Self, ResolveEmbeddingFunctionError> {
        let config: OllamaEmbeddingFunctionConfig =
            serde_json::from_value(Value::Object(config.clone()))?;
        Ok(Self::with_timeout(config.url, config.model_name, config.timeout)?)
    }

    /// Verifies that the Ollama server is responsive and the model is
    /// accessible by embedding a single throwaway input.
    pub async fn heartbeat(&self) -> Result<(), EmbeddingError> {
        self.embed(&["heartbeat"]).await?;
        Ok(())
    }

    async fn embed(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let req = EmbedRequest {
            model: &self.model,
            input: batches,
        };
        let resp = req
            .make_request(self)
            .send()
            .await?
            .error_for_status()?
            .json::<EmbedResponse>()
            .await?;
        Ok(resp.embeddings)
    }
}

#[async_trait::async_trait]
impl DenseEmbeddingFunction for OllamaEmbeddingFunction {
    async fn embed_strs(&self, batches: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.embed(batches).await
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

/// A request to embed multiple input documents.
#[derive(Clone, Debug, Serialize)]
pub struct EmbedRequest<'a> {
    pub model: &'a str,
    pub input: &'a [&'a str],
}

impl EmbedRequest<'_> {
    fn make_request(&self, ef: &OllamaEmbeddingFunction) -> RequestBuilder {
        ef.client.post(format!("{}/api/embed", ef.url)).json(self)
    }
}

/// The server's embed response.
#[derive(Clone, Debug, Deserialize)]
pub struct EmbedResponse {
    /// The name of the model used to generate the response.
    pub model: String,
    /// The embeddings of the input, in the same order.
    pub embeddings: Vec<Vec<f32>>,
    /// The duration of the response.
    pub total_duration: Option<f64>,
    /// The duration of loading the model.
    pub load_duration: Option<f64>,
    /// The number of tokens counted in the prompt.
    pub prompt_eval_count: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[tokio::test]
    async fn embeds_against_mock_server() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/embed")
                    .json_body_includes(r#"{"model": "nomic-embed-text", "input": ["hello"]}"#);
                then.status(200)
                    .body(r#"{"model": "nomic-embed-text", "embeddings": [[0.1, 0.2]]}"#);
            })
            .await;

        let embedder =
            OllamaEmbeddingFunction::new(server.base_url(), "nomic-embed-text").unwrap();
        let embeddings = embedder.embed_strs(&["hello"]).await.unwrap();
        assert_eq!(embeddings, vec![vec![0.1, 0.2]]);
        mock.assert_async().await;
    }

    #[test]
    fn spec_config_defaults_apply() {
        let embedder = OllamaEmbeddingFunction::from_spec_config(&Map::new()).unwrap();
        assert_eq!(embedder.url, DEFAULT_URL);
        assert_eq!(embedder.model, DEFAULT_MODEL);
    }
}
