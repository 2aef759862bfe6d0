//! Collection operations for managing and querying vector embeddings.
//!
//! This module provides the [`QuiverCollection`] type, a handle to a specific
//! collection within a Quiver database. The handle owns the collection's
//! mutable runtime state (configuration, schema, resolved embedding function,
//! and a lazily built embedder) behind a single lock, so concurrent readers
//! never observe a partially merged configuration.

use std::sync::Arc;

use parking_lot::Mutex;
use quiver_types::{
    AddCollectionRecordsPayload, Collection, CollectionConfiguration, CollectionUuid,
    EmbeddingFunctionSpec, Metadata, QueryCollectionPayload, QueryCollectionResponse, Schema,
    UpdateCollectionConfiguration, UpdateCollectionPayload,
};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};

use crate::client::QuiverHttpClientError;
use crate::embed::{resolve, DenseEmbeddingFunction, ResolveEmbeddingFunctionError};
use crate::reconcile;
use crate::QuiverHttpClient;

/// Mutable runtime state of a collection handle. All fields are read and
/// written under the handle's single lock; snapshots handed out are `Arc`s
/// so getters never block behind a merge.
pub(crate) struct CollectionState {
    pub(crate) configuration: Option<Arc<CollectionConfiguration>>,
    pub(crate) schema: Option<Arc<Schema>>,
    pub(crate) metadata: Option<Metadata>,
    pub(crate) effective_embedding_function: Option<EmbeddingFunctionSpec>,
    pub(crate) embedder: Option<Arc<dyn DenseEmbeddingFunction>>,
}

/// A handle to a specific collection within a Quiver database.
///
/// A `QuiverCollection` is a lightweight reference sharing the underlying
/// HTTP client. Cloning the handle shares the runtime state, so a
/// configuration update through one clone is visible through the others.
#[derive(Clone)]
pub struct QuiverCollection {
    client: QuiverHttpClient,
    collection_id: CollectionUuid,
    name: String,
    tenant: String,
    database: String,
    state: Arc<Mutex<CollectionState>>,
}

impl std::fmt::Debug for QuiverCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuiverCollection")
            .field("database", &self.database)
            .field("tenant", &self.tenant)
            .field("name", &self.name)
            .field("collection_id", &self.collection_id)
            .finish()
    }
}

impl QuiverCollection {
    /// Builds a handle from a server response, decoding the flat
    /// configuration map and computing the effective embedding function.
    ///
    /// If the server returned no top-level schema but the configuration
    /// carries one, the configuration's schema is adopted.
    pub(crate) fn from_collection(
        client: QuiverHttpClient,
        collection: Collection,
    ) -> Result<Self, QuiverHttpClientError> {
        let configuration = collection
            .configuration
            .map(CollectionConfiguration::from_wire)
            .transpose()?;
        let schema = collection
            .schema
            .or_else(|| {
                configuration
                    .as_ref()
                    .and_then(|configuration| configuration.schema().cloned())
            })
            .map(Arc::new);
        let effective_embedding_function =
            reconcile::effective_embedding_function(configuration.as_ref(), schema.as_deref());

        Ok(QuiverCollection {
            client,
            collection_id: collection.collection_id,
            name: collection.name,
            tenant: collection.tenant,
            database: collection.database,
            state: Arc::new(Mutex::new(CollectionState {
                configuration: configuration.map(Arc::new),
                schema,
                metadata: collection.metadata,
                effective_embedding_function,
                embedder: None,
            })),
        })
    }

    /// Returns the unique identifier assigned to this collection.
    pub fn id(&self) -> CollectionUuid {
        self.collection_id
    }

    /// Returns the user-assigned name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tenant that owns this collection.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Returns the database that contains this collection.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Returns the collection's metadata, if any was specified during creation.
    pub fn metadata(&self) -> Option<Metadata> {
        self.state.lock().metadata.clone()
    }

    /// Returns a snapshot of the collection's current configuration.
    pub fn configuration(&self) -> Option<Arc<CollectionConfiguration>> {
        self.state.lock().configuration.clone()
    }

    /// Returns a snapshot of the collection's current schema.
    pub fn schema(&self) -> Option<Arc<Schema>> {
        self.state.lock().schema.clone()
    }

    /// Returns the embedding function spec currently in effect for this
    /// collection, after precedence resolution.
    pub fn effective_embedding_function(&self) -> Option<EmbeddingFunctionSpec> {
        self.state.lock().effective_embedding_function.clone()
    }

    /// Computes the total number of records stored in this collection.
    pub async fn count(&self) -> Result<u32, QuiverHttpClientError> {
        self.send::<(), u32>("count", Method::GET, None).await
    }

    /// Modifies the collection's name or metadata.
    ///
    /// Takes a mutable reference because the local handle is synchronized
    /// with the new values after the server-side modification succeeds.
    pub async fn modify(
        &mut self,
        new_name: Option<impl AsRef<str>>,
        new_metadata: Option<Metadata>,
    ) -> Result<(), QuiverHttpClientError> {
        // Returns empty map ({})
        self.send::<_, serde_json::Value>(
            "",
            Method::PUT,
            Some(UpdateCollectionPayload {
                new_name: new_name.as_ref().map(|name| name.as_ref().to_string()),
                new_metadata: new_metadata.clone(),
                new_configuration: None,
            }),
        )
        .await?;

        if let Some(name) = new_name {
            self.name = name.as_ref().to_string();
        }
        if let Some(metadata) = new_metadata {
            self.state.lock().metadata = Some(metadata);
        }

        Ok(())
    }

    /// Applies a partial configuration update to the collection.
    ///
    /// The update is sent to the server first; once confirmed, the local
    /// state is merged under the handle's lock: every current field is
    /// carried forward, update fields overlay them, and the cached embedder
    /// is dropped only if the effective embedding function changed.
    pub async fn update_configuration(
        &self,
        update: UpdateCollectionConfiguration,
    ) -> Result<(), QuiverHttpClientError> {
        // Returns empty map ({})
        self.send::<_, serde_json::Value>(
            "",
            Method::PUT,
            Some(UpdateCollectionPayload {
                new_name: None,
                new_metadata: None,
                new_configuration: Some(update.clone()),
            }),
        )
        .await?;

        let mut state = self.state.lock();
        reconcile::apply_update(&mut state, &update)?;

        Ok(())
    }

    /// Adds records to the collection.
    ///
    /// When `embeddings` is absent and `documents` is present, the documents
    /// are embedded locally with the collection's resolved embedding
    /// function.
    pub async fn add(
        &self,
        ids: Vec<String>,
        embeddings: Option<Vec<Vec<f32>>>,
        documents: Option<Vec<String>>,
        metadatas: Option<Vec<Option<Metadata>>>,
    ) -> Result<(), QuiverHttpClientError> {
        let embeddings = match (embeddings, &documents) {
            (Some(embeddings), _) => Some(embeddings),
            (None, Some(documents)) => Some(self.embed_documents(documents).await?),
            (None, None) => None,
        };

        // Returns empty map ({})
        self.send::<_, serde_json::Value>(
            "add",
            Method::POST,
            Some(AddCollectionRecordsPayload {
                ids,
                embeddings,
                documents: documents.map(|documents| documents.into_iter().map(Some).collect()),
                metadatas,
            }),
        )
        .await?;

        Ok(())
    }

    /// Performs vector similarity search against the collection.
    ///
    /// Accepts either raw query embeddings or query texts; texts are embedded
    /// locally with the collection's resolved embedding function.
    pub async fn query(
        &self,
        query_embeddings: Option<Vec<Vec<f32>>>,
        query_texts: Option<Vec<String>>,
        n_results: usize,
        include: Option<Vec<String>>,
    ) -> Result<QueryCollectionResponse, QuiverHttpClientError> {
        let query_embeddings = match (query_embeddings, query_texts) {
            (Some(embeddings), _) => embeddings,
            (None, Some(texts)) => self.embed_documents(&texts).await?,
            (None, None) => Vec::new(),
        };

        self.send(
            "query",
            Method::POST,
            Some(QueryCollectionPayload {
                query_embeddings,
                n_results,
                include,
            }),
        )
        .await
    }

    /// Returns the collection's embedder, resolving and caching it on first
    /// use. Returns `Ok(None)` when no embedding function is in effect.
    pub fn embedder(
        &self,
    ) -> Result<Option<Arc<dyn DenseEmbeddingFunction>>, ResolveEmbeddingFunctionError> {
        let mut state = self.state.lock();
        if let Some(embedder) = &state.embedder {
            return Ok(Some(embedder.clone()));
        }
        let resolved = resolve(state.effective_embedding_function.as_ref())?;
        state.embedder = resolved.clone();
        Ok(resolved)
    }

    async fn embed_documents(
        &self,
        documents: &[String],
    ) -> Result<Vec<Vec<f32>>, QuiverHttpClientError> {
        let embedder = self
            .embedder()?
            .ok_or(QuiverHttpClientError::NoEmbeddingFunction)?;
        let refs: Vec<&str> = documents.iter().map(String::as_str).collect();
        Ok(embedder.embed_strs(&refs).await?)
    }

    async fn send<Body: Serialize, Response: DeserializeOwned>(
        &self,
        path: &str,
        method: Method,
        body: Option<Body>,
    ) -> Result<Response, QuiverHttpClientError> {
        let path = format!(
            "/api/v1/tenants/{}/databases/{}/collections/{}/{}",
            self.tenant, self.database, self.collection_id, path
        );
        let path = path.trim_end_matches('/');

        self.client.send(method, path, body, None::<()>).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{QuiverClientOptions, QuiverRetryOptions};
    use httpmock::MockServer;
    use serde_json::json;
    use std::time::Duration;

    const COLLECTION_ID: &str = "6c1820a0-3b61-4b0e-902e-8a14e1d166e3";

    fn client_for(server: &MockServer) -> QuiverHttpClient {
        QuiverHttpClient::new(QuiverClientOptions {
            endpoint: server.base_url().parse().unwrap(),
            tenant_id: Some("default_tenant".to_string()),
            default_database_name: Some("default_database".to_string()),
            retry_options: QuiverRetryOptions {
                max_retries: 1,
                min_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
                jitter: false,
            },
            ..Default::default()
        })
    }

    fn collection_with_config(
        client: QuiverHttpClient,
        configuration: serde_json::Value,
    ) -> QuiverCollection {
        let collection: Collection = serde_json::from_value(json!({
            "id": COLLECTION_ID,
            "name": "docs",
            "tenant": "default_tenant",
            "database": "default_database",
            "configuration": configuration,
        }))
        .unwrap();
        QuiverCollection::from_collection(client, collection).unwrap()
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_count() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path(format!(
                    "/api/v1/tenants/default_tenant/databases/default_database/collections/{}/count",
                    COLLECTION_ID
                ));
                then.status(200).body("7");
            })
            .await;

        let collection = collection_with_config(client_for(&server), json!({}));
        assert_eq!(collection.count().await.unwrap(), 7);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_update_configuration_merges_after_confirmation() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("PUT")
                    .path(format!(
                        "/api/v1/tenants/default_tenant/databases/default_database/collections/{}",
                        COLLECTION_ID
                    ))
                    .json_body_includes(
                        r#"{"new_configuration": {"hnsw": {"ef_search": 100}}}"#,
                    );
                then.status(200).body("{}");
            })
            .await;

        let collection = collection_with_config(
            client_for(&server),
            json!({ "hnsw:search_ef": 50, "hnsw:M": 16 }),
        );

        let update = UpdateCollectionConfiguration::builder()
            .hnsw_ef_search(100)
            .build()
            .unwrap();
        collection.update_configuration(update).await.unwrap();

        let configuration = collection.configuration().unwrap();
        let hnsw = configuration.hnsw().unwrap();
        assert_eq!(hnsw.ef_search, Some(100));
        assert_eq!(hnsw.max_neighbors, Some(16));
        mock.assert_async().await;
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_update_configuration_keeps_state_on_server_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("PUT").path(format!(
                    "/api/v1/tenants/default_tenant/databases/default_database/collections/{}",
                    COLLECTION_ID
                ));
                then.status(422)
                    .body(r#"{"error": "InvalidArgument", "message": "rejected"}"#);
            })
            .await;

        let collection =
            collection_with_config(client_for(&server), json!({ "hnsw:search_ef": 50 }));

        let update = UpdateCollectionConfiguration::builder()
            .hnsw_ef_search(100)
            .build()
            .unwrap();
        let err = collection.update_configuration(update).await.unwrap_err();
        assert!(matches!(err, QuiverHttpClientError::ApiError(_, _)));

        let configuration = collection.configuration().unwrap();
        assert_eq!(configuration.hnsw().unwrap().ef_search, Some(50));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_query_with_texts_uses_resolved_embedder() {
        let server = MockServer::start_async().await;

        let embed_mock = server
            .mock_async(|when, then| {
                when.method("POST").path("/api/embed");
                then.status(200)
                    .body(r#"{"model": "nomic-embed-text", "embeddings": [[0.1, 0.2]]}"#);
            })
            .await;
        let query_mock = server
            .mock_async(|when, then| {
                when.method("POST")
                    .path(format!(
                        "/api/v1/tenants/default_tenant/databases/default_database/collections/{}/query",
                        COLLECTION_ID
                    ))
                    .json_body_includes(r#"{"query_embeddings": [[0.1, 0.2]], "n_results": 3}"#);
                then.status(200).json_body(json!({ "ids": [["a", "b"]] }));
            })
            .await;

        let collection = collection_with_config(
            client_for(&server),
            json!({
                "embedding_function": {
                    "type": "known",
                    "name": "ollama",
                    "config": { "url": server.base_url() },
                },
            }),
        );

        let response = collection
            .query(None, Some(vec!["hello".to_string()]), 3, None)
            .await
            .unwrap();
        assert_eq!(response.ids, vec![vec!["a".to_string(), "b".to_string()]]);
        embed_mock.assert_async().await;
        query_mock.assert_async().await;
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_query_with_texts_fails_without_embedding_function() {
        let server = MockServer::start_async().await;
        let collection = collection_with_config(client_for(&server), json!({}));

        let err = collection
            .query(None, Some(vec!["hello".to_string()]), 3, None)
            .await
            .unwrap_err();
        assert!(matches!(err, QuiverHttpClientError::NoEmbeddingFunction));
    }
}
