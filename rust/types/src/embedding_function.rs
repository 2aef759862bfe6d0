use quiver_error::{ErrorCodes, QuiverError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The only recognized value for the `type` field of a spec.
pub const KNOWN_EMBEDDING_FUNCTION_TYPE: &str = "known";

/// Replacement for sensitive config values in any textual rendering.
pub const REDACTED_VALUE: &str = "***REDACTED***";

const SENSITIVE_KEY_MARKERS: &[&str] = &["api_key", "apikey", "token", "secret", "password"];

#[derive(Debug, Error)]
pub enum EmbeddingFunctionSpecError {
    #[error("Embedding function name must not be blank")]
    BlankName,
}

impl QuiverError for EmbeddingFunctionSpecError {
    fn code(&self) -> ErrorCodes {
        match self {
            EmbeddingFunctionSpecError::BlankName => ErrorCodes::InvalidArgument,
        }
    }
}

/// Serializable descriptor from which a runtime embedding function is built.
///
/// The `config` map is opaque to the client and may hold secrets, so the
/// `Debug` and `Display` renderings redact any key that looks sensitive.
/// Wire form: `{ "type": "known" | absent, "name": "<provider>", "config": {...} }`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingFunctionSpec {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    spec_type: Option<String>,
    name: String,
    #[serde(default)]
    config: Map<String, Value>,
}

impl EmbeddingFunctionSpec {
    /// Builds a spec with an explicit `type` field.
    pub fn new(
        spec_type: Option<String>,
        name: impl Into<String>,
        config: Map<String, Value>,
    ) -> Result<Self, EmbeddingFunctionSpecError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EmbeddingFunctionSpecError::BlankName);
        }
        Ok(EmbeddingFunctionSpec {
            spec_type,
            name,
            config,
        })
    }

    /// Builds a spec tagged with the `"known"` type.
    pub fn known(
        name: impl Into<String>,
        config: Map<String, Value>,
    ) -> Result<Self, EmbeddingFunctionSpecError> {
        Self::new(Some(KNOWN_EMBEDDING_FUNCTION_TYPE.to_string()), name, config)
    }

    pub fn spec_type(&self) -> Option<&str> {
        self.spec_type.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a copy of the config map so callers cannot mutate the spec.
    pub fn config(&self) -> Map<String, Value> {
        self.config.clone()
    }

    fn redacted_config(&self) -> Map<String, Value> {
        self.config
            .iter()
            .map(|(key, value)| {
                let lowercase = key.to_lowercase();
                if SENSITIVE_KEY_MARKERS
                    .iter()
                    .any(|marker| lowercase.contains(marker))
                {
                    (key.clone(), Value::String(REDACTED_VALUE.to_string()))
                } else {
                    (key.clone(), value.clone())
                }
            })
            .collect()
    }
}

impl fmt::Debug for EmbeddingFunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingFunctionSpec")
            .field("type", &self.spec_type)
            .field("name", &self.name)
            .field("config", &self.redacted_config())
            .finish()
    }
}

impl fmt::Display for EmbeddingFunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.name,
            Value::Object(self.redacted_config())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config_with_secret() -> Map<String, Value> {
        let mut config = Map::new();
        config.insert("api_key".to_string(), json!("sk-super-secret"));
        config.insert("Api_Key_Env_Var".to_string(), json!("MY_KEY"));
        config.insert("model".to_string(), json!("all-MiniLM-L6-v2"));
        config
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(EmbeddingFunctionSpec::known("  ", Map::new()).is_err());
        assert!(EmbeddingFunctionSpec::known("openai", Map::new()).is_ok());
    }

    #[test]
    fn debug_and_display_redact_sensitive_keys() {
        let spec = EmbeddingFunctionSpec::known("openai", config_with_secret()).unwrap();
        for rendering in [format!("{:?}", spec), format!("{}", spec)] {
            assert!(!rendering.contains("sk-super-secret"), "{rendering}");
            assert!(rendering.contains(REDACTED_VALUE));
            assert!(rendering.contains("all-MiniLM-L6-v2"));
        }
    }

    #[test]
    fn config_accessor_returns_a_copy() {
        let spec = EmbeddingFunctionSpec::known("openai", config_with_secret()).unwrap();
        let mut copy = spec.config();
        copy.insert("model".to_string(), json!("mutated"));
        assert_eq!(spec.config().get("model"), Some(&json!("all-MiniLM-L6-v2")));
    }

    #[test]
    fn equality_is_structural() {
        let a = EmbeddingFunctionSpec::known("openai", config_with_secret()).unwrap();
        let b = EmbeddingFunctionSpec::known("openai", config_with_secret()).unwrap();
        let c = EmbeddingFunctionSpec::known("cohere", config_with_secret()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(
            a,
            EmbeddingFunctionSpec::new(None, "openai", config_with_secret()).unwrap()
        );
    }

    #[test]
    fn wire_round_trip() {
        let spec = EmbeddingFunctionSpec::known("ollama", Map::new()).unwrap();
        let encoded = serde_json::to_value(&spec).unwrap();
        assert_eq!(encoded["type"], json!("known"));
        assert_eq!(encoded["name"], json!("ollama"));
        let decoded: EmbeddingFunctionSpec = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, spec);
    }
}
