use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection_configuration::CollectionConfigurationWire;
use crate::collection_schema::Schema;

/// Newtype over [`Uuid`] so collection ids cannot be confused with other ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionUuid(pub Uuid);

impl CollectionUuid {
    pub fn new() -> Self {
        CollectionUuid(Uuid::new_v4())
    }
}

impl FromStr for CollectionUuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CollectionUuid(Uuid::parse_str(s)?))
    }
}

impl std::fmt::Display for CollectionUuid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scalar metadata value attachable to a collection or a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

pub type Metadata = HashMap<String, MetadataValue>;

/// Collection record as returned by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    #[serde(rename = "id")]
    pub collection_id: CollectionUuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<CollectionConfigurationWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<i32>,
    pub tenant: String,
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_server_payload_with_flat_configuration() {
        let collection: Collection = serde_json::from_value(json!({
            "id": "6c1820a0-3b61-4b0e-902e-8a14e1d166e3",
            "name": "docs",
            "tenant": "default_tenant",
            "database": "default_database",
            "configuration": { "hnsw:space": "cosine", "hnsw:search_ef": 100 },
        }))
        .unwrap();
        assert_eq!(collection.name, "docs");
        let configuration = collection.configuration.unwrap();
        assert_eq!(configuration.hnsw_search_ef, Some(100));
        assert!(collection.metadata.is_none());
    }

    #[test]
    fn metadata_values_are_untagged() {
        let metadata: Metadata = serde_json::from_value(json!({
            "flag": true,
            "count": 3,
            "ratio": 0.5,
            "label": "prod",
        }))
        .unwrap();
        assert_eq!(metadata["flag"], MetadataValue::Bool(true));
        assert_eq!(metadata["count"], MetadataValue::Int(3));
        assert_eq!(metadata["ratio"], MetadataValue::Float(0.5));
        assert_eq!(metadata["label"], MetadataValue::Str("prod".to_string()));
    }
}
