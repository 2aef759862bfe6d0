pub use quiver_types::{
    Collection, CollectionConfiguration, CollectionConfigurationBuilder,
    CollectionConfigurationError, CollectionUuid, EmbeddingFunctionSpec,
    EmbeddingFunctionSpecError, HeartbeatResponse, HnswConfiguration, KnnIndex, Metadata,
    MetadataValue, QueryCollectionResponse, Schema, SchemaError, Space, SpannConfiguration,
    UpdateCollectionConfiguration, UpdateCollectionConfigurationBuilder, UpdateHnswConfiguration,
    UpdateSpannConfiguration, ValueTypes, VectorIndexConfig,
};
