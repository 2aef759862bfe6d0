//! Merges configuration updates into collection state.
//!
//! The merge is pure computation: seed a builder from every field of the
//! current configuration, overlay every present update field, and rebuild so
//! the result passes the same validation as a fresh configuration. The
//! caller holds the collection lock for the whole sequence.

use quiver_types::{
    CollectionConfiguration, CollectionConfigurationError, EmbeddingFunctionSpec, Schema,
    UpdateCollectionConfiguration,
};

use crate::collection::CollectionState;

/// What a merge did, beyond producing the new configuration.
#[derive(Debug, PartialEq)]
pub(crate) struct ReconcileReport {
    pub(crate) invalidated_embedder: bool,
}

/// Produces the new configuration from the current one and a validated
/// update. Fields absent from the update carry forward unchanged; fields
/// present overlay unconditionally (last write wins).
pub(crate) fn merge_configuration(
    current: Option<&CollectionConfiguration>,
    update: &UpdateCollectionConfiguration,
) -> Result<CollectionConfiguration, CollectionConfigurationError> {
    let mut builder = current
        .map(CollectionConfiguration::to_builder)
        .unwrap_or_else(CollectionConfiguration::builder);

    if let Some(hnsw) = update.hnsw() {
        if let Some(ef_search) = hnsw.ef_search {
            builder = builder.hnsw_ef_search(ef_search);
        }
        if let Some(num_threads) = hnsw.num_threads {
            builder = builder.hnsw_num_threads(num_threads);
        }
        if let Some(batch_size) = hnsw.batch_size {
            builder = builder.hnsw_batch_size(batch_size);
        }
        if let Some(sync_threshold) = hnsw.sync_threshold {
            builder = builder.hnsw_sync_threshold(sync_threshold);
        }
        if let Some(resize_factor) = hnsw.resize_factor {
            builder = builder.hnsw_resize_factor(resize_factor);
        }
    }
    if let Some(spann) = update.spann() {
        if let Some(search_nprobe) = spann.search_nprobe {
            builder = builder.spann_search_nprobe(search_nprobe);
        }
        if let Some(ef_search) = spann.ef_search {
            builder = builder.spann_ef_search(ef_search);
        }
    }

    builder.build()
}

/// Resolves the embedding function spec in effect for a collection, by
/// precedence: the configuration's own descriptor, else the one derived from
/// the collection's current schema, else the one derived from the
/// configuration's schema.
pub(crate) fn effective_embedding_function(
    configuration: Option<&CollectionConfiguration>,
    current_schema: Option<&Schema>,
) -> Option<EmbeddingFunctionSpec> {
    if let Some(spec) = configuration.and_then(CollectionConfiguration::embedding_function) {
        return Some(spec.clone());
    }
    if let Some(spec) = current_schema.and_then(Schema::default_embedding_function_spec) {
        return Some(spec.clone());
    }
    configuration
        .and_then(CollectionConfiguration::schema)
        .and_then(Schema::default_embedding_function_spec)
        .cloned()
}

/// Applies a validated update to the collection state. Must be called with
/// the collection lock held so the whole sequence is atomic.
///
/// Adopts the merged configuration's schema when the collection has none,
/// recomputes the effective embedding function, and drops the cached
/// embedder only when the effective function actually changed.
pub(crate) fn apply_update(
    state: &mut CollectionState,
    update: &UpdateCollectionConfiguration,
) -> Result<ReconcileReport, CollectionConfigurationError> {
    let merged = merge_configuration(state.configuration.as_deref(), update)?;

    if state.schema.is_none() {
        if let Some(schema) = merged.schema() {
            state.schema = Some(std::sync::Arc::new(schema.clone()));
        }
    }

    let effective = effective_embedding_function(Some(&merged), state.schema.as_deref());
    let invalidated_embedder = effective != state.effective_embedding_function;
    if invalidated_embedder {
        state.embedder = None;
    }
    state.effective_embedding_function = effective;
    state.configuration = Some(std::sync::Arc::new(merged));

    Ok(ReconcileReport {
        invalidated_embedder,
    })
}
