use std::time::Duration;

use backon::ExponentialBuilder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};

const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:9400";
const DEFAULT_CLOUD_ENDPOINT: &str = "https://api.quiverdb.ai";

const ENDPOINT_VAR: &str = "QUIVER_ENDPOINT";
const API_KEY_VAR: &str = "QUIVER_API_KEY";
const TENANT_VAR: &str = "QUIVER_TENANT";
const DATABASE_VAR: &str = "QUIVER_DATABASE";

#[derive(Debug, thiserror::Error)]
pub enum QuiverClientOptionsError {
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),
    #[error("Missing required configuration: {0}")]
    MissingConfiguration(String),
}

/// Connection settings for a [`QuiverHttpClient`](super::QuiverHttpClient).
#[derive(Debug, Clone)]
pub struct QuiverClientOptions {
    pub endpoint: reqwest::Url,
    pub auth_method: QuiverAuthMethod,
    pub retry_options: QuiverRetryOptions,
    /// Will be automatically resolved at request time if not provided.
    pub tenant_id: Option<String>,
    /// Will be automatically resolved at request time if not provided. It can
    /// only be resolved automatically if this client has access to exactly
    /// one database.
    pub default_database_name: Option<String>,
}

impl Default for QuiverClientOptions {
    fn default() -> Self {
        QuiverClientOptions {
            endpoint: DEFAULT_LOCAL_ENDPOINT.parse().expect("valid URL"),
            auth_method: QuiverAuthMethod::None,
            retry_options: QuiverRetryOptions::default(),
            tenant_id: None,
            default_database_name: None,
        }
    }
}

fn endpoint_from_env(fallback: &str) -> Result<reqwest::Url, QuiverClientOptionsError> {
    let raw = std::env::var(ENDPOINT_VAR).unwrap_or_else(|_| fallback.to_string());
    raw.parse()
        .map_err(|err| QuiverClientOptionsError::InvalidEndpoint(format!("{err}")))
}

impl QuiverClientOptions {
    /// Options for a local, unauthenticated deployment, overridable through
    /// `QUIVER_ENDPOINT`, `QUIVER_TENANT`, and `QUIVER_DATABASE`.
    pub fn from_env() -> Result<Self, QuiverClientOptionsError> {
        let tenant_id = std::env::var(TENANT_VAR).unwrap_or_else(|_| "default_tenant".to_string());
        let database_name =
            std::env::var(DATABASE_VAR).unwrap_or_else(|_| "default_database".to_string());

        Ok(QuiverClientOptions {
            endpoint: endpoint_from_env(DEFAULT_LOCAL_ENDPOINT)?,
            tenant_id: Some(tenant_id),
            default_database_name: Some(database_name),
            ..Default::default()
        })
    }

    /// Options for a cloud deployment. `QUIVER_API_KEY` is required; tenant
    /// and database fall back to identity resolution when unset.
    pub fn from_cloud_env() -> Result<Self, QuiverClientOptionsError> {
        let api_key = std::env::var(API_KEY_VAR)
            .map_err(|_| QuiverClientOptionsError::MissingConfiguration(API_KEY_VAR.to_string()))?;

        Ok(QuiverClientOptions {
            endpoint: endpoint_from_env(DEFAULT_CLOUD_ENDPOINT)?,
            auth_method: QuiverAuthMethod::cloud_api_key(&api_key)?,
            tenant_id: std::env::var(TENANT_VAR).ok(),
            default_database_name: std::env::var(DATABASE_VAR).ok(),
            ..Default::default()
        })
    }

    /// Options for a cloud deployment with explicit credentials.
    pub fn cloud(
        api_key: impl Into<String>,
        database_name: impl Into<String>,
    ) -> Result<Self, QuiverClientOptionsError> {
        Ok(QuiverClientOptions {
            endpoint: DEFAULT_CLOUD_ENDPOINT.parse().expect("valid URL"),
            auth_method: QuiverAuthMethod::cloud_api_key(&api_key.into())?,
            default_database_name: Some(database_name.into()),
            ..Default::default()
        })
    }

    pub(crate) fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let QuiverAuthMethod::HeaderAuth { header, value } = &self.auth_method {
            headers.insert(header.clone(), value.clone());
        }
        headers
    }
}

/// How requests authenticate against the server.
#[derive(Debug, Clone)]
pub enum QuiverAuthMethod {
    None,
    HeaderAuth {
        header: HeaderName,
        value: HeaderValue,
    },
}

impl QuiverAuthMethod {
    /// Token auth for cloud deployments. The header value is marked sensitive
    /// so it never appears in debug output.
    pub fn cloud_api_key(key: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(key)?;
        value.set_sensitive(true);

        Ok(QuiverAuthMethod::HeaderAuth {
            header: HeaderName::from_static("x-quiver-token"),
            value,
        })
    }
}

/// Exponential backoff parameters applied by the client's transport layer.
#[derive(Clone, Debug)]
pub struct QuiverRetryOptions {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for QuiverRetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl From<QuiverRetryOptions> for ExponentialBuilder {
    fn from(options: QuiverRetryOptions) -> Self {
        let builder = ExponentialBuilder::new()
            .with_max_times(options.max_retries)
            .with_min_delay(options.min_delay)
            .with_max_delay(options.max_delay);
        if options.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cloud_options_mark_api_key_sensitive() {
        let options = QuiverClientOptions::cloud("qv-secret", "prod").unwrap();
        let QuiverAuthMethod::HeaderAuth { header, value } = &options.auth_method else {
            panic!("expected header auth");
        };
        assert_eq!(header.as_str(), "x-quiver-token");
        assert!(value.is_sensitive());
        assert!(!format!("{:?}", value).contains("qv-secret"));
    }

    #[test]
    fn headers_are_empty_without_auth() {
        assert!(QuiverClientOptions::default().headers().is_empty());
    }
}
