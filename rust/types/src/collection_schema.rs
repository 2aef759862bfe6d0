use std::collections::HashMap;

use quiver_error::{ErrorCodes, QuiverError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collection_configuration::{
    default_batch_size, default_construction_ef, default_construction_ef_spann, default_m,
    default_m_spann, default_merge_threshold, default_num_threads,
    default_reassign_neighbor_count, default_resize_factor, default_search_ef,
    default_search_ef_spann, default_search_nprobe, default_space, default_split_threshold,
    default_sync_threshold, default_write_nprobe, HnswConfiguration, KnnIndex, Space,
    SpannConfiguration,
};
use crate::embedding_function::EmbeddingFunctionSpec;

// Value type names used on the wire.
pub const STRING_VALUE_NAME: &str = "string";
pub const INT_VALUE_NAME: &str = "int";
pub const BOOL_VALUE_NAME: &str = "bool";
pub const FLOAT_VALUE_NAME: &str = "float";
pub const FLOAT_LIST_VALUE_NAME: &str = "float_list";
pub const SPARSE_VECTOR_VALUE_NAME: &str = "sparse_vector";

// Index type names used on the wire.
pub const FTS_INDEX_NAME: &str = "fts_index";
pub const VECTOR_INDEX_NAME: &str = "vector_index";
pub const SPARSE_VECTOR_INDEX_NAME: &str = "sparse_vector_index";
pub const STRING_INVERTED_INDEX_NAME: &str = "string_inverted_index";
pub const INT_INVERTED_INDEX_NAME: &str = "int_inverted_index";
pub const FLOAT_INVERTED_INDEX_NAME: &str = "float_inverted_index";
pub const BOOL_INVERTED_INDEX_NAME: &str = "bool_inverted_index";

// Reserved keys every schema understands.
pub const DOCUMENT_KEY: &str = "#document";
pub const EMBEDDING_KEY: &str = "#embedding";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema keys must not be blank")]
    BlankKey,
    #[error("Vector index for key '{key}' sets both hnsw and spann parameters")]
    MultipleVectorIndexConfigurations { key: String },
}

impl QuiverError for SchemaError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// Per-key index layout for a collection. `defaults` applies to any field
/// without an explicit entry in `keys`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub defaults: ValueTypes,
    #[serde(default, rename = "keys", alias = "key_overrides")]
    pub keys: HashMap<String, ValueTypes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmek: Option<String>,
}

/// Index configurations per primitive value kind. At most one configuration
/// per kind; an all-`None` value means nothing is configured.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueTypes {
    #[serde(
        rename = "string",
        alias = "#string",
        skip_serializing_if = "Option::is_none"
    )]
    pub string: Option<StringValueType>,

    #[serde(
        rename = "float_list",
        alias = "#float_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub float_list: Option<FloatListValueType>,

    #[serde(
        rename = "sparse_vector",
        alias = "#sparse_vector",
        skip_serializing_if = "Option::is_none"
    )]
    pub sparse_vector: Option<SparseVectorValueType>,

    #[serde(
        rename = "int",
        alias = "#int",
        skip_serializing_if = "Option::is_none"
    )]
    pub int: Option<IntValueType>,

    #[serde(
        rename = "float",
        alias = "#float",
        skip_serializing_if = "Option::is_none"
    )]
    pub float: Option<FloatValueType>,

    #[serde(
        rename = "bool",
        alias = "#bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub boolean: Option<BoolValueType>,
}

impl ValueTypes {
    pub fn is_empty(&self) -> bool {
        self.string.is_none()
            && self.float_list.is_none()
            && self.sparse_vector.is_none()
            && self.int.is_none()
            && self.float.is_none()
            && self.boolean.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StringValueType {
    #[serde(
        rename = "fts_index",
        alias = "$fts_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub fts_index: Option<FtsIndexType>,

    #[serde(
        rename = "string_inverted_index",
        alias = "$string_inverted_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub string_inverted_index: Option<StringInvertedIndexType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatListValueType {
    #[serde(
        rename = "vector_index",
        alias = "$vector_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub vector_index: Option<VectorIndexType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVectorValueType {
    #[serde(
        rename = "sparse_vector_index",
        alias = "$sparse_vector_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub sparse_vector_index: Option<SparseVectorIndexType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntValueType {
    #[serde(
        rename = "int_inverted_index",
        alias = "$int_inverted_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub int_inverted_index: Option<IntInvertedIndexType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatValueType {
    #[serde(
        rename = "float_inverted_index",
        alias = "$float_inverted_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub float_inverted_index: Option<FloatInvertedIndexType>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoolValueType {
    #[serde(
        rename = "bool_inverted_index",
        alias = "$bool_inverted_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub bool_inverted_index: Option<BoolInvertedIndexType>,
}

// Index type structs pairing an enabled flag with a config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FtsIndexType {
    pub enabled: bool,
    pub config: FtsIndexConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VectorIndexType {
    pub enabled: bool,
    pub config: VectorIndexConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SparseVectorIndexType {
    pub enabled: bool,
    pub config: SparseVectorIndexConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StringInvertedIndexType {
    pub enabled: bool,
    pub config: StringInvertedIndexConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntInvertedIndexType {
    pub enabled: bool,
    pub config: IntInvertedIndexConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloatInvertedIndexType {
    pub enabled: bool,
    pub config: FloatInvertedIndexConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoolInvertedIndexType {
    pub enabled: bool,
    pub config: BoolInvertedIndexConfig,
}

/// Vector index parameters for a float-list key. Carries the same HNSW/SPANN
/// exclusivity invariant as the top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VectorIndexConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<Space>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_function: Option<EmbeddingFunctionSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hnsw: Option<HnswConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spann: Option<SpannConfiguration>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SparseVectorIndexConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_function: Option<EmbeddingFunctionSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FtsIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StringInvertedIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntInvertedIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FloatInvertedIndexConfig {}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoolInvertedIndexConfig {}

impl Schema {
    /// The stock schema for a new collection: inverted indexes on for scalar
    /// kinds, fts on for `#document`, and the vector index enabled only on
    /// `#embedding` sourcing from `#document`.
    pub fn new_default(default_knn_index: KnnIndex) -> Self {
        let default_hnsw = || match default_knn_index {
            KnnIndex::Hnsw => Some(HnswConfiguration {
                ef_construction: Some(default_construction_ef()),
                max_neighbors: Some(default_m()),
                ef_search: Some(default_search_ef()),
                num_threads: Some(default_num_threads()),
                batch_size: Some(default_batch_size()),
                sync_threshold: Some(default_sync_threshold()),
                resize_factor: Some(default_resize_factor()),
            }),
            KnnIndex::Spann => None,
        };
        let default_spann = || match default_knn_index {
            KnnIndex::Hnsw => None,
            KnnIndex::Spann => Some(SpannConfiguration {
                search_nprobe: Some(default_search_nprobe()),
                write_nprobe: Some(default_write_nprobe()),
                ef_construction: Some(default_construction_ef_spann()),
                ef_search: Some(default_search_ef_spann()),
                max_neighbors: Some(default_m_spann()),
                split_threshold: Some(default_split_threshold()),
                merge_threshold: Some(default_merge_threshold()),
                reassign_neighbor_count: Some(default_reassign_neighbor_count()),
            }),
        };

        let defaults = ValueTypes {
            string: Some(StringValueType {
                string_inverted_index: Some(StringInvertedIndexType {
                    enabled: true,
                    config: StringInvertedIndexConfig {},
                }),
                fts_index: Some(FtsIndexType {
                    enabled: false,
                    config: FtsIndexConfig {},
                }),
            }),
            float: Some(FloatValueType {
                float_inverted_index: Some(FloatInvertedIndexType {
                    enabled: true,
                    config: FloatInvertedIndexConfig {},
                }),
            }),
            int: Some(IntValueType {
                int_inverted_index: Some(IntInvertedIndexType {
                    enabled: true,
                    config: IntInvertedIndexConfig {},
                }),
            }),
            boolean: Some(BoolValueType {
                bool_inverted_index: Some(BoolInvertedIndexType {
                    enabled: true,
                    config: BoolInvertedIndexConfig {},
                }),
            }),
            // Vector index disabled everywhere except #embedding.
            float_list: Some(FloatListValueType {
                vector_index: Some(VectorIndexType {
                    enabled: false,
                    config: VectorIndexConfig {
                        space: Some(default_space()),
                        embedding_function: None,
                        source_key: None,
                        hnsw: default_hnsw(),
                        spann: default_spann(),
                    },
                }),
            }),
            sparse_vector: Some(SparseVectorValueType {
                sparse_vector_index: Some(SparseVectorIndexType {
                    enabled: false,
                    config: SparseVectorIndexConfig {
                        embedding_function: None,
                        source_key: None,
                    },
                }),
            }),
        };

        let mut keys = HashMap::new();
        keys.insert(
            EMBEDDING_KEY.to_string(),
            ValueTypes {
                float_list: Some(FloatListValueType {
                    vector_index: Some(VectorIndexType {
                        enabled: true,
                        config: VectorIndexConfig {
                            space: Some(default_space()),
                            embedding_function: None,
                            source_key: Some(DOCUMENT_KEY.to_string()),
                            hnsw: default_hnsw(),
                            spann: default_spann(),
                        },
                    }),
                }),
                ..Default::default()
            },
        );
        keys.insert(
            DOCUMENT_KEY.to_string(),
            ValueTypes {
                string: Some(StringValueType {
                    fts_index: Some(FtsIndexType {
                        enabled: true,
                        config: FtsIndexConfig {},
                    }),
                    string_inverted_index: Some(StringInvertedIndexType {
                        enabled: false,
                        config: StringInvertedIndexConfig {},
                    }),
                }),
                ..Default::default()
            },
        );

        Schema {
            defaults,
            keys,
            cmek: None,
        }
    }

    /// Checks key well-formedness and HNSW/SPANN exclusivity on every vector
    /// index reachable from `defaults` or `keys`.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for key in self.keys.keys() {
            if key.trim().is_empty() {
                return Err(SchemaError::BlankKey);
            }
        }
        Self::validate_value_types("(defaults)", &self.defaults)?;
        for (key, value_types) in &self.keys {
            Self::validate_value_types(key, value_types)?;
        }
        Ok(())
    }

    fn validate_value_types(key: &str, value_types: &ValueTypes) -> Result<(), SchemaError> {
        if let Some(vector_index) = value_types
            .float_list
            .as_ref()
            .and_then(|float_list| float_list.vector_index.as_ref())
        {
            if vector_index.config.hnsw.is_some() && vector_index.config.spann.is_some() {
                return Err(SchemaError::MultipleVectorIndexConfigurations {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// The embedding function carried by the default vector index, reached by
    /// descending `keys["#embedding"].float_list.vector_index.config`. Absent
    /// links short-circuit to `None`. Recomputed on every call.
    pub fn default_embedding_function_spec(&self) -> Option<&EmbeddingFunctionSpec> {
        self.keys
            .get(EMBEDDING_KEY)?
            .float_list
            .as_ref()?
            .vector_index
            .as_ref()?
            .config
            .embedding_function
            .as_ref()
    }

    /// Replaces the default vector index's embedding function, creating the
    /// `#embedding` chain if missing.
    pub fn set_default_embedding_function_spec(&mut self, spec: EmbeddingFunctionSpec) {
        let value_types = self.keys.entry(EMBEDDING_KEY.to_string()).or_default();
        let float_list = value_types
            .float_list
            .get_or_insert_with(|| FloatListValueType { vector_index: None });
        let vector_index = float_list.vector_index.get_or_insert_with(|| VectorIndexType {
            enabled: true,
            config: VectorIndexConfig::default(),
        });
        vector_index.config.embedding_function = Some(spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn spec(name: &str) -> EmbeddingFunctionSpec {
        EmbeddingFunctionSpec::known(name, Map::new()).unwrap()
    }

    #[test]
    fn default_schema_enables_vector_index_only_for_embedding_key() {
        let schema = Schema::new_default(KnnIndex::Hnsw);

        let default_vector = schema
            .defaults
            .float_list
            .as_ref()
            .unwrap()
            .vector_index
            .as_ref()
            .unwrap();
        assert!(!default_vector.enabled);

        let embedding_vector = schema.keys[EMBEDDING_KEY]
            .float_list
            .as_ref()
            .unwrap()
            .vector_index
            .as_ref()
            .unwrap();
        assert!(embedding_vector.enabled);
        assert_eq!(
            embedding_vector.config.source_key.as_deref(),
            Some(DOCUMENT_KEY)
        );
        assert!(embedding_vector.config.hnsw.is_some());
        assert!(embedding_vector.config.spann.is_none());

        let document_string = schema.keys[DOCUMENT_KEY].string.as_ref().unwrap();
        assert!(document_string.fts_index.as_ref().unwrap().enabled);
        assert!(!document_string.string_inverted_index.as_ref().unwrap().enabled);

        schema.validate().unwrap();
    }

    #[test]
    fn default_spann_schema_carries_spann_parameters() {
        let schema = Schema::new_default(KnnIndex::Spann);
        let config = &schema.keys[EMBEDDING_KEY]
            .float_list
            .as_ref()
            .unwrap()
            .vector_index
            .as_ref()
            .unwrap()
            .config;
        assert!(config.hnsw.is_none());
        assert_eq!(config.spann.as_ref().unwrap().search_nprobe, Some(64));
        schema.validate().unwrap();
    }

    #[test]
    fn validate_rejects_blank_keys_and_mixed_vector_indexes() {
        let mut schema = Schema::new_default(KnnIndex::Hnsw);
        schema.keys.insert("  ".to_string(), ValueTypes::default());
        assert!(matches!(schema.validate(), Err(SchemaError::BlankKey)));

        let mut schema = Schema::new_default(KnnIndex::Hnsw);
        let config = &mut schema
            .keys
            .get_mut(EMBEDDING_KEY)
            .unwrap()
            .float_list
            .as_mut()
            .unwrap()
            .vector_index
            .as_mut()
            .unwrap()
            .config;
        config.spann = Some(SpannConfiguration {
            search_nprobe: Some(64),
            ..Default::default()
        });
        assert!(matches!(
            schema.validate(),
            Err(SchemaError::MultipleVectorIndexConfigurations { .. })
        ));
    }

    #[test]
    fn default_spec_derivation_short_circuits_on_absent_links() {
        let schema = Schema::default();
        assert!(schema.default_embedding_function_spec().is_none());

        let mut schema = Schema::new_default(KnnIndex::Hnsw);
        assert!(schema.default_embedding_function_spec().is_none());

        schema.set_default_embedding_function_spec(spec("openai"));
        assert_eq!(
            schema.default_embedding_function_spec().map(|s| s.name()),
            Some("openai")
        );
    }

    #[test]
    fn wire_round_trip() {
        let mut schema = Schema::new_default(KnnIndex::Hnsw);
        schema.set_default_embedding_function_spec(spec("ollama"));
        let encoded = serde_json::to_value(&schema).unwrap();
        assert!(encoded["keys"][EMBEDDING_KEY]["float_list"]["vector_index"]["enabled"]
            .as_bool()
            .unwrap());
        let decoded: Schema = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, schema);
    }
}
