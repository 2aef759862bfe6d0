use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::Metadata;
use crate::collection_configuration::{CollectionConfigurationWire, UpdateCollectionConfiguration};
use crate::collection_schema::Schema;

/// Error envelope the server attaches to non-2xx responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(rename = "nanosecond heartbeat")]
    pub nanosecond_heartbeat: u128,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetUserIdentityResponse {
    pub user_id: String,
    pub tenant: String,
    pub databases: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Database {
    pub id: Uuid,
    pub name: String,
    pub tenant: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateDatabasePayload {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateCollectionPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<CollectionConfigurationWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub get_or_create: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateCollectionPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_configuration: Option<UpdateCollectionConfiguration>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddCollectionRecordsPayload {
    pub ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<Vec<f32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Option<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadatas: Option<Vec<Option<Metadata>>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryCollectionPayload {
    pub query_embeddings: Vec<Vec<f32>>,
    pub n_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryCollectionResponse {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_payload_omits_absent_optional_fields() {
        let payload = CreateCollectionPayload {
            name: "docs".to_string(),
            configuration: None,
            schema: None,
            metadata: None,
            get_or_create: false,
        };
        let encoded = serde_json::to_value(&payload).unwrap();
        assert_eq!(encoded, json!({ "name": "docs", "get_or_create": false }));
    }

    #[test]
    fn heartbeat_uses_spaced_wire_key() {
        let response: HeartbeatResponse =
            serde_json::from_value(json!({ "nanosecond heartbeat": 12345 })).unwrap();
        assert_eq!(response.nanosecond_heartbeat, 12345);
    }
}
