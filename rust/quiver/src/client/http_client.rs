use backon::ExponentialBuilder;
use backon::Retryable;
use parking_lot::Mutex;
use quiver_error::QuiverValidationError;
use quiver_types::{
    Collection, CollectionConfiguration, CollectionConfigurationError, CreateCollectionPayload,
    CreateDatabasePayload, Database, ErrorResponse, GetUserIdentityResponse, HeartbeatResponse,
    Metadata, Schema,
};
use reqwest::Method;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::client::QuiverClientOptions;
use crate::client::QuiverClientOptionsError;
use crate::collection::QuiverCollection;

const USER_AGENT: &str = concat!("Quiver Rust Client v", env!("CARGO_PKG_VERSION"));

/// Errors that originate from the Quiver client during request execution.
#[derive(Error, Debug)]
pub enum QuiverHttpClientError {
    /// Network-level HTTP request failed.
    #[error("Request error: {0:?}")]
    RequestError(#[from] reqwest::Error),
    /// The server returned an error status with a structured error message.
    #[error("API error: {0:?} ({1})")]
    ApiError(String, reqwest::StatusCode),
    /// Client lacks access to a unique database or cannot determine which database to use.
    #[error("Could not resolve database: {0}")]
    CouldNotResolveDatabaseId(String),
    /// JSON serialization or deserialization of request/response bodies failed.
    #[error("Serialization/Deserialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    /// Request parameters failed validation checks before transmission.
    #[error("Validation error: {0}")]
    ValidationError(#[from] QuiverValidationError),
    /// The server returned a collection configuration that fails local validation.
    #[error("Server returned invalid collection configuration: {0}")]
    InvalidConfiguration(#[from] CollectionConfigurationError),
    /// The collection's embedding function spec could not be turned into an embedder.
    #[error("Embedding function error: {0}")]
    EmbeddingFunction(#[from] crate::embed::ResolveEmbeddingFunctionError),
    /// A resolved embedder failed while producing vectors.
    #[error("Embedding error: {0}")]
    Embedding(#[from] crate::embed::EmbeddingError),
    /// A text-based operation was attempted on a collection without an embedding function.
    #[error("Collection has no embedding function configured; provide embeddings explicitly")]
    NoEmbeddingFunction,
}

/// Client handle for a Quiver deployment.
///
/// The entry point for all database-level operations: database lifecycle,
/// collection enumeration, and health checks. Manages connection state,
/// authentication, automatic retries, and tenant/database resolution.
///
/// Cloning shares the connection pool but gives the clone independent cached
/// tenant/database state.
#[derive(Debug)]
pub struct QuiverHttpClient {
    base_url: reqwest::Url,
    client: reqwest::Client,
    retry_policy: ExponentialBuilder,
    tenant_id: Arc<Mutex<Option<String>>>,
    database_name: Arc<Mutex<Option<String>>>,
    resolve_tenant_or_database_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Default for QuiverHttpClient {
    fn default() -> Self {
        Self::new(QuiverClientOptions::default())
    }
}

impl Clone for QuiverHttpClient {
    fn clone(&self) -> Self {
        QuiverHttpClient {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            retry_policy: self.retry_policy,
            tenant_id: Arc::new(Mutex::new(self.tenant_id.lock().clone())),
            database_name: Arc::new(Mutex::new(self.database_name.lock().clone())),
            resolve_tenant_or_database_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

impl QuiverHttpClient {
    /// Constructs a client from explicit configuration options.
    pub fn new(options: QuiverClientOptions) -> Self {
        let mut headers = options.headers();
        headers.append("user-agent", USER_AGENT.try_into().expect("static value"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to initialize TLS backend");

        QuiverHttpClient {
            base_url: options.endpoint.clone(),
            client,
            retry_policy: options.retry_options.into(),
            tenant_id: Arc::new(Mutex::new(options.tenant_id)),
            database_name: Arc::new(Mutex::new(options.default_database_name)),
            resolve_tenant_or_database_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Constructs a client from `QUIVER_ENDPOINT`, `QUIVER_TENANT`, and
    /// `QUIVER_DATABASE`, defaulting to the local endpoint.
    pub fn from_env() -> Result<Self, QuiverClientOptionsError> {
        Ok(Self::new(QuiverClientOptions::from_env()?))
    }

    /// Constructs a cloud client from `QUIVER_API_KEY` (required) plus the
    /// optional endpoint/tenant/database environment variables.
    pub fn cloud() -> Result<Self, QuiverClientOptionsError> {
        Ok(Self::new(QuiverClientOptions::from_cloud_env()?))
    }

    /// Assigns the database to use for subsequent collection operations.
    pub fn set_database_name(&self, database_name: impl AsRef<str>) {
        let mut lock = self.database_name.lock();
        *lock = Some(database_name.as_ref().to_string());
    }

    /// Resolves the database name for collection operations.
    ///
    /// Returns the cached database name if available, otherwise fetches the
    /// user's identity and caches the result. Resolution only succeeds when
    /// the identity grants access to exactly one database.
    pub async fn get_database_name(&self) -> Result<String, QuiverHttpClientError> {
        if let Some(database_name) = self.database_name.lock().clone() {
            return Ok(database_name);
        }

        // Double-checked: another task may have resolved while we waited.
        let _guard = self.resolve_tenant_or_database_lock.lock().await;
        if let Some(database_name) = self.database_name.lock().clone() {
            return Ok(database_name);
        }

        let mut databases = self.get_auth_identity().await?.databases;
        let database_name = match databases.len() {
            0 => {
                return Err(QuiverHttpClientError::CouldNotResolveDatabaseId(
                    "Client has access to no databases".to_string(),
                ))
            }
            1 => databases.remove(0),
            _ => {
                return Err(QuiverHttpClientError::CouldNotResolveDatabaseId(
                    "Client has access to multiple databases; please provide a database_name"
                        .to_string(),
                ))
            }
        };

        *self.database_name.lock() = Some(database_name.clone());
        Ok(database_name)
    }

    /// Resolves the tenant ID for the authenticated user, with the same
    /// caching discipline as [`get_database_name`](Self::get_database_name).
    pub async fn get_tenant_id(&self) -> Result<String, QuiverHttpClientError> {
        if let Some(tenant_id) = self.tenant_id.lock().clone() {
            return Ok(tenant_id);
        }

        let _guard = self.resolve_tenant_or_database_lock.lock().await;
        if let Some(tenant_id) = self.tenant_id.lock().clone() {
            return Ok(tenant_id);
        }

        let tenant_id = self.get_auth_identity().await?.tenant;
        *self.tenant_id.lock() = Some(tenant_id.clone());
        Ok(tenant_id)
    }

    /// Creates a new database within the authenticated tenant.
    pub async fn create_database(
        &self,
        name: impl AsRef<str>,
    ) -> Result<(), QuiverHttpClientError> {
        // Returns empty map ({})
        self.send::<_, (), serde_json::Value>(
            Method::POST,
            format!("/api/v1/tenants/{}/databases", self.get_tenant_id().await?),
            Some(CreateDatabasePayload {
                name: name.as_ref().to_string(),
            }),
            None,
        )
        .await?;

        Ok(())
    }

    /// Enumerates all databases accessible to this client within the
    /// authenticated tenant.
    pub async fn list_databases(&self) -> Result<Vec<Database>, QuiverHttpClientError> {
        let tenant_id = self.get_tenant_id().await?;

        self.send::<(), (), _>(
            Method::GET,
            format!("/api/v1/tenants/{}/databases", tenant_id),
            None,
            None,
        )
        .await
    }

    /// Deletes a database from the current tenant.
    pub async fn delete_database(
        &self,
        database_name: impl AsRef<str>,
    ) -> Result<(), QuiverHttpClientError> {
        // Returns empty map ({})
        self.send::<(), (), serde_json::Value>(
            Method::DELETE,
            format!(
                "/api/v1/tenants/{}/databases/{}",
                self.get_tenant_id().await?,
                database_name.as_ref()
            ),
            None,
            None,
        )
        .await?;

        Ok(())
    }

    /// Retrieves identity information for the authenticated user. Used
    /// internally to resolve tenant and database names but can also be called
    /// directly to verify authentication status.
    pub async fn get_auth_identity(
        &self,
    ) -> Result<GetUserIdentityResponse, QuiverHttpClientError> {
        self.send::<(), (), _>(
            Method::GET,
            "/api/v1/auth/identity".to_string(),
            None,
            None,
        )
        .await
    }

    /// Performs a health check against the server.
    pub async fn heartbeat(&self) -> Result<HeartbeatResponse, QuiverHttpClientError> {
        self.send::<(), (), _>(Method::GET, "/api/v1/heartbeat".to_string(), None, None)
            .await
    }

    /// Retrieves an existing collection or creates it if it doesn't exist.
    pub async fn get_or_create_collection(
        &self,
        name: impl AsRef<str>,
        configuration: Option<CollectionConfiguration>,
        metadata: Option<Metadata>,
    ) -> Result<QuiverCollection, QuiverHttpClientError> {
        self.common_create_collection(name, configuration, None, metadata, true)
            .await
    }

    /// Creates a new collection, failing if one with the same name exists.
    pub async fn create_collection(
        &self,
        name: impl AsRef<str>,
        configuration: Option<CollectionConfiguration>,
        metadata: Option<Metadata>,
    ) -> Result<QuiverCollection, QuiverHttpClientError> {
        self.common_create_collection(name, configuration, None, metadata, false)
            .await
    }

    /// Creates a new collection with an explicit schema instead of a
    /// configuration.
    pub async fn create_collection_with_schema(
        &self,
        name: impl AsRef<str>,
        schema: Schema,
        metadata: Option<Metadata>,
    ) -> Result<QuiverCollection, QuiverHttpClientError> {
        self.common_create_collection(name, None, Some(schema), metadata, false)
            .await
    }

    /// Retrieves an existing collection by name.
    pub async fn get_collection(
        &self,
        name: impl AsRef<str>,
    ) -> Result<QuiverCollection, QuiverHttpClientError> {
        let tenant_id = self.get_tenant_id().await?;
        let database_name = self.get_database_name().await?;

        let collection: Collection = self
            .send::<(), (), _>(
                Method::GET,
                format!(
                    "/api/v1/tenants/{}/databases/{}/collections/{}",
                    tenant_id,
                    database_name,
                    name.as_ref()
                ),
                None,
                None,
            )
            .await?;

        QuiverCollection::from_collection(self.clone(), collection)
    }

    /// Removes a collection and all its records. This cannot be undone.
    pub async fn delete_collection(
        &self,
        name: impl AsRef<str>,
    ) -> Result<(), QuiverHttpClientError> {
        let tenant_id = self.get_tenant_id().await?;
        let database_name = self.get_database_name().await?;

        self.send::<(), (), serde_json::Value>(
            Method::DELETE,
            format!(
                "/api/v1/tenants/{}/databases/{}/collections/{}",
                tenant_id,
                database_name,
                name.as_ref()
            ),
            None,
            None,
        )
        .await?;

        Ok(())
    }

    /// Enumerates collections in the current database with pagination.
    pub async fn list_collections(
        &self,
        limit: usize,
        offset: Option<usize>,
    ) -> Result<Vec<QuiverCollection>, QuiverHttpClientError> {
        let tenant_id = self.get_tenant_id().await?;
        let database_name = self.get_database_name().await?;

        #[derive(Serialize)]
        struct QueryParams {
            limit: usize,
            offset: Option<usize>,
        }

        let collections = self
            .send::<(), _, Vec<Collection>>(
                Method::GET,
                format!(
                    "/api/v1/tenants/{}/databases/{}/collections",
                    tenant_id, database_name
                ),
                None,
                Some(QueryParams { limit, offset }),
            )
            .await?;

        collections
            .into_iter()
            .map(|collection| QuiverCollection::from_collection(self.clone(), collection))
            .collect()
    }

    async fn common_create_collection(
        &self,
        name: impl AsRef<str>,
        configuration: Option<CollectionConfiguration>,
        schema: Option<Schema>,
        metadata: Option<Metadata>,
        get_or_create: bool,
    ) -> Result<QuiverCollection, QuiverHttpClientError> {
        let tenant_id = self.get_tenant_id().await?;
        let database_name = self.get_database_name().await?;

        let payload = CreateCollectionPayload {
            name: name.as_ref().to_string(),
            configuration: configuration.as_ref().map(CollectionConfiguration::to_wire),
            schema,
            metadata,
            get_or_create,
        };

        let collection: Collection = self
            .send(
                Method::POST,
                format!(
                    "/api/v1/tenants/{}/databases/{}/collections",
                    tenant_id, database_name
                ),
                Some(payload),
                None::<()>,
            )
            .await?;

        QuiverCollection::from_collection(self.clone(), collection)
    }

    /// Executes an HTTP request with automatic retry logic.
    ///
    /// This is the core transport method used by all higher-level operations.
    /// Retries automatically for any GET request that fails with a retryable
    /// error and for any request that receives a 429 response. Non-GET
    /// requests with other error statuses fail immediately without retry.
    pub(crate) async fn send<
        Body: Serialize,
        QueryParams: Serialize,
        Response: DeserializeOwned,
    >(
        &self,
        method: Method,
        path: impl AsRef<str>,
        body: Option<Body>,
        query_params: Option<QueryParams>,
    ) -> Result<Response, QuiverHttpClientError> {
        let url = self.base_url.join(path.as_ref()).expect(
            "The base URL is valid and we control all path construction, so this should never fail",
        );

        let attempt = || async {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = &body {
                request = request.json(body);
            }
            if let Some(query_params) = &query_params {
                request = request.query(query_params);
            }

            tracing::trace!(url = %url, method =? method, "Sending request");

            let response = request.send().await.map_err(|err| (err, None))?;
            match response.error_for_status_ref() {
                Ok(_) => Ok(response),
                Err(err) => Err((err, Some(response))),
            }
        };

        // 429 is retried for every method; transport errors and 5xx only for
        // GETs, which are safe to replay.
        let should_retry = |err: &reqwest::Error| match err.status() {
            Some(StatusCode::TOO_MANY_REQUESTS) => true,
            Some(status) => method == Method::GET && status.is_server_error(),
            None => method == Method::GET,
        };

        let outcome = attempt
            .retry(&self.retry_policy)
            .when(|(err, _)| should_retry(err))
            .notify(|(err, _), _| {
                tracing::warn!(
                    url = %url,
                    method =? method,
                    status =? err.status(),
                    "Request failed with retryable error. Retrying...",
                );
            })
            .await;

        let response = match outcome {
            Ok(response) => response,
            Err((_, Some(response))) => return Err(Self::decode_error(response).await),
            Err((err, None)) => return Err(QuiverHttpClientError::RequestError(err)),
        };

        let json = response.json::<serde_json::Value>().await?;
        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                url = %url,
                method =? method,
                "Received response: {}",
                serde_json::to_string_pretty(&json)
                    .unwrap_or_else(|_| "<failed to serialize>".to_string())
            );
        }

        Ok(serde_json::from_value(json)?)
    }

    /// Turns a non-2xx response into an [`QuiverHttpClientError::ApiError`],
    /// preferring the server's structured error envelope when present.
    async fn decode_error(response: reqwest::Response) -> QuiverHttpClientError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(envelope) => QuiverHttpClientError::ApiError(
                format!("{}: {}", envelope.error, envelope.message),
                status,
            ),
            Err(_) if serde_json::from_str::<serde_json::Value>(&text).is_ok() => {
                QuiverHttpClientError::ApiError(text, status)
            }
            Err(_) => {
                tracing::trace!("Received non-JSON error response: {}", text);
                QuiverHttpClientError::ApiError(format!("Non-JSON error response: {}", text), status)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QuiverRetryOptions;
    use httpmock::{HttpMockResponse, MockServer};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn client_for(server: &MockServer) -> QuiverHttpClient {
        QuiverHttpClient::new(QuiverClientOptions {
            endpoint: server.base_url().parse().unwrap(),
            tenant_id: Some("default_tenant".to_string()),
            default_database_name: Some("default_database".to_string()),
            retry_options: QuiverRetryOptions {
                max_retries: 3,
                min_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                jitter: false,
            },
            ..Default::default()
        })
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_retries_get_requests() {
        let server = MockServer::start_async().await;

        let was_called = Arc::new(AtomicBool::new(false));
        let mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/retry-get");

                let was_called = was_called.clone();
                then.respond_with(move |_| {
                    if was_called.swap(true, std::sync::atomic::Ordering::SeqCst) {
                        return HttpMockResponse::builder()
                            .status(200)
                            .body(r#"{"value": "ok"}"#)
                            .build();
                    }

                    HttpMockResponse::builder()
                        .status(500)
                        .body("Internal Server Error")
                        .build()
                });
            })
            .await;

        let client = client_for(&server);

        let response: serde_json::Value = client
            .send::<(), (), serde_json::Value>(Method::GET, "/retry-get", None, None)
            .await
            .unwrap();

        assert_eq!(response, serde_json::json!({"value": "ok"}));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_retries_non_get_on_429() {
        let server = MockServer::start_async().await;

        let was_called = Arc::new(AtomicBool::new(false));
        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/retry-post");

                let was_called = was_called.clone();

                then.respond_with(move |_| {
                    if was_called.swap(true, std::sync::atomic::Ordering::SeqCst) {
                        return HttpMockResponse::builder()
                            .status(200)
                            .body(r#"{"status": "ok"}"#)
                            .build();
                    }

                    HttpMockResponse::builder()
                        .status(429)
                        .body("Too Many Requests")
                        .build()
                });
            })
            .await;

        let client = client_for(&server);

        let response: serde_json::Value = client
            .send::<serde_json::Value, (), serde_json::Value>(
                Method::POST,
                "/retry-post",
                Some(serde_json::json!({"request": "body"})),
                None::<()>,
            )
            .await
            .unwrap();

        assert_eq!(response, serde_json::json!({"status": "ok"}));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_does_not_retry_post_on_500() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/no-retry");
                then.status(500)
                    .body(r#"{"error": "InternalError", "message": "boom"}"#);
            })
            .await;

        let client = client_for(&server);

        let err = client
            .send::<serde_json::Value, (), serde_json::Value>(
                Method::POST,
                "/no-retry",
                Some(serde_json::json!({})),
                None::<()>,
            )
            .await
            .unwrap_err();

        match err {
            QuiverHttpClientError::ApiError(msg, status) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(msg.contains("boom"));
            }
            _ => panic!("Expected ApiError"),
        }
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_heartbeat() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method("GET").path("/api/v1/heartbeat");
                then.status(200).body(r#"{"nanosecond heartbeat": 42}"#);
            })
            .await;

        let client = client_for(&server);
        let heartbeat = client.heartbeat().await.unwrap();
        assert_eq!(heartbeat.nanosecond_heartbeat, 42);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_create_collection_sends_flat_configuration() {
        let server = MockServer::start_async().await;

        let mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path("/api/v1/tenants/default_tenant/databases/default_database/collections")
                    .json_body_includes(
                        r#"{"configuration": {"hnsw:space": "cosine", "hnsw:M": 16}}"#,
                    );
                then.status(200).body(
                    r#"{
                        "id": "6c1820a0-3b61-4b0e-902e-8a14e1d166e3",
                        "name": "docs",
                        "tenant": "default_tenant",
                        "database": "default_database",
                        "configuration": {"hnsw:space": "cosine", "hnsw:M": 16}
                    }"#,
                );
            })
            .await;

        let client = client_for(&server);
        let configuration = CollectionConfiguration::builder()
            .space(quiver_types::Space::Cosine)
            .hnsw_max_neighbors(16)
            .build()
            .unwrap();

        let collection = client
            .create_collection("docs", Some(configuration), None)
            .await
            .unwrap();

        assert_eq!(collection.name(), "docs");
        let stored = collection.configuration().unwrap();
        assert_eq!(stored.hnsw().unwrap().max_neighbors, Some(16));
        mock.assert_async().await;
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_get_collection_rejects_invalid_server_configuration() {
        let server = MockServer::start_async().await;

        server
            .mock_async(|when, then| {
                when.method("GET").path(
                    "/api/v1/tenants/default_tenant/databases/default_database/collections/bad",
                );
                then.status(200).body(
                    r#"{
                        "id": "6c1820a0-3b61-4b0e-902e-8a14e1d166e3",
                        "name": "bad",
                        "tenant": "default_tenant",
                        "database": "default_database",
                        "configuration": {"hnsw:search_ef": 10, "spann:search_nprobe": 8}
                    }"#,
                );
            })
            .await;

        let client = client_for(&server);
        let err = client.get_collection("bad").await.unwrap_err();
        assert!(matches!(
            err,
            QuiverHttpClientError::InvalidConfiguration(
                CollectionConfigurationError::MultipleVectorIndexConfigurations
            )
        ));
    }
}
