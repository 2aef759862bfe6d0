use quiver_error::{ErrorCodes, QuiverError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

use crate::collection_schema::Schema;
use crate::embedding_function::EmbeddingFunctionSpec;
use crate::validators::{
    require_at_least, require_positive, require_positive_finite, require_range,
};

/// Distance metric for vector similarity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Space {
    #[default]
    #[serde(rename = "l2")]
    L2,
    #[serde(rename = "cosine")]
    Cosine,
    #[serde(rename = "ip")]
    Ip,
}

/// Which vector index family a collection uses. HNSW and SPANN are mutually
/// exclusive per collection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnnIndex {
    Hnsw,
    Spann,
}

pub fn default_space() -> Space {
    Space::L2
}

pub fn default_construction_ef() -> usize {
    100
}

pub fn default_search_ef() -> usize {
    100
}

pub fn default_m() -> usize {
    16
}

pub fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|threads| threads.get())
        .unwrap_or(1)
}

pub fn default_resize_factor() -> f64 {
    1.2
}

pub fn default_sync_threshold() -> usize {
    1000
}

pub fn default_batch_size() -> usize {
    100
}

pub fn default_search_nprobe() -> u32 {
    64
}

pub fn default_write_nprobe() -> u32 {
    32
}

pub fn default_construction_ef_spann() -> usize {
    200
}

pub fn default_search_ef_spann() -> usize {
    200
}

pub fn default_m_spann() -> usize {
    64
}

pub fn default_split_threshold() -> u32 {
    50
}

pub fn default_merge_threshold() -> u32 {
    25
}

pub fn default_reassign_neighbor_count() -> u32 {
    64
}

#[derive(Debug, Error)]
pub enum CollectionConfigurationError {
    #[error("Multiple vector index configurations provided")]
    MultipleVectorIndexConfigurations,
    #[error("Update configuration must set at least one field")]
    EmptyUpdate,
    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ValidationErrors),
    #[error(transparent)]
    InvalidSchema(#[from] crate::collection_schema::SchemaError),
}

impl QuiverError for CollectionConfigurationError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

/// HNSW tuning parameters. Fields left unset are omitted on the wire and the
/// server applies its own defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HnswConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ef_construction: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_neighbors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_factor: Option<f64>,
}

impl HnswConfiguration {
    pub fn is_empty(&self) -> bool {
        self.ef_construction.is_none()
            && self.max_neighbors.is_none()
            && self.ef_search.is_none()
            && self.num_threads.is_none()
            && self.batch_size.is_none()
            && self.sync_threshold.is_none()
            && self.resize_factor.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(ef_construction) = self.ef_construction {
            if let Err(err) = require_positive("hnsw:construction_ef", ef_construction) {
                errors.add("hnsw:construction_ef", err);
            }
        }
        if let Some(max_neighbors) = self.max_neighbors {
            if let Err(err) = require_positive("hnsw:M", max_neighbors) {
                errors.add("hnsw:M", err);
            }
        }
        if let Some(ef_search) = self.ef_search {
            if let Err(err) = require_positive("hnsw:search_ef", ef_search) {
                errors.add("hnsw:search_ef", err);
            }
        }
        if let Some(num_threads) = self.num_threads {
            if let Err(err) = require_positive("hnsw:num_threads", num_threads) {
                errors.add("hnsw:num_threads", err);
            }
        }
        if let Some(batch_size) = self.batch_size {
            if let Err(err) = require_at_least("hnsw:batch_size", batch_size, 2) {
                errors.add("hnsw:batch_size", err);
            }
        }
        if let Some(sync_threshold) = self.sync_threshold {
            if let Err(err) = require_at_least("hnsw:sync_threshold", sync_threshold, 2) {
                errors.add("hnsw:sync_threshold", err);
            }
        }
        if let Some(resize_factor) = self.resize_factor {
            if let Err(err) = require_positive_finite("hnsw:resize_factor", resize_factor) {
                errors.add("hnsw:resize_factor", err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// SPANN tuning parameters, with documented inclusive bounds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpannConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_nprobe: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_nprobe: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ef_construction: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_neighbors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reassign_neighbor_count: Option<u32>,
}

impl SpannConfiguration {
    pub fn is_empty(&self) -> bool {
        self.search_nprobe.is_none()
            && self.write_nprobe.is_none()
            && self.ef_construction.is_none()
            && self.ef_search.is_none()
            && self.max_neighbors.is_none()
            && self.split_threshold.is_none()
            && self.merge_threshold.is_none()
            && self.reassign_neighbor_count.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(search_nprobe) = self.search_nprobe {
            if let Err(err) = require_range("spann:search_nprobe", search_nprobe, 1, 128) {
                errors.add("spann:search_nprobe", err);
            }
        }
        if let Some(write_nprobe) = self.write_nprobe {
            if let Err(err) = require_range("spann:write_nprobe", write_nprobe, 1, 128) {
                errors.add("spann:write_nprobe", err);
            }
        }
        if let Some(ef_construction) = self.ef_construction {
            if let Err(err) = require_range("spann:construction_ef", ef_construction, 1, 200) {
                errors.add("spann:construction_ef", err);
            }
        }
        if let Some(ef_search) = self.ef_search {
            if let Err(err) = require_range("spann:search_ef", ef_search, 1, 200) {
                errors.add("spann:search_ef", err);
            }
        }
        if let Some(max_neighbors) = self.max_neighbors {
            if let Err(err) = require_range("spann:M", max_neighbors, 1, 64) {
                errors.add("spann:M", err);
            }
        }
        if let Some(split_threshold) = self.split_threshold {
            if let Err(err) = require_range("spann:split_threshold", split_threshold, 25, 200) {
                errors.add("spann:split_threshold", err);
            }
        }
        if let Some(merge_threshold) = self.merge_threshold {
            if let Err(err) = require_range("spann:merge_threshold", merge_threshold, 25, 100) {
                errors.add("spann:merge_threshold", err);
            }
        }
        if let Some(reassign_neighbor_count) = self.reassign_neighbor_count {
            if let Err(err) = require_range(
                "spann:reassign_neighbor_count",
                reassign_neighbor_count,
                1,
                64,
            ) {
                errors.add("spann:reassign_neighbor_count", err);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Immutable, validated collection configuration. Built once via
/// [`CollectionConfigurationBuilder`] or decoded from a server response; any
/// change produces a new instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionConfiguration {
    space: Option<Space>,
    hnsw: Option<HnswConfiguration>,
    spann: Option<SpannConfiguration>,
    schema: Option<Schema>,
    embedding_function: Option<EmbeddingFunctionSpec>,
}

impl CollectionConfiguration {
    pub fn builder() -> CollectionConfigurationBuilder {
        CollectionConfigurationBuilder::default()
    }

    pub fn space(&self) -> Option<&Space> {
        self.space.as_ref()
    }

    pub fn hnsw(&self) -> Option<&HnswConfiguration> {
        self.hnsw.as_ref()
    }

    pub fn spann(&self) -> Option<&SpannConfiguration> {
        self.spann.as_ref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn embedding_function(&self) -> Option<&EmbeddingFunctionSpec> {
        self.embedding_function.as_ref()
    }

    /// Seeds a builder with every field present on this configuration.
    pub fn to_builder(&self) -> CollectionConfigurationBuilder {
        CollectionConfigurationBuilder {
            space: self.space.clone(),
            hnsw: self.hnsw.clone().unwrap_or_default(),
            spann: self.spann.clone().unwrap_or_default(),
            schema: self.schema.clone(),
            embedding_function: self.embedding_function.clone(),
        }
    }

    /// Encodes to the flat `hnsw:*` / `spann:*` parameter map sent under the
    /// `configuration` key.
    pub fn to_wire(&self) -> CollectionConfigurationWire {
        let mut wire = CollectionConfigurationWire::default();
        if self.spann.is_some() {
            wire.spann_space = self.space.clone();
        } else {
            wire.hnsw_space = self.space.clone();
        }
        if let Some(hnsw) = &self.hnsw {
            wire.hnsw_construction_ef = hnsw.ef_construction;
            wire.hnsw_m = hnsw.max_neighbors;
            wire.hnsw_search_ef = hnsw.ef_search;
            wire.hnsw_num_threads = hnsw.num_threads;
            wire.hnsw_batch_size = hnsw.batch_size;
            wire.hnsw_sync_threshold = hnsw.sync_threshold;
            wire.hnsw_resize_factor = hnsw.resize_factor;
        }
        if let Some(spann) = &self.spann {
            wire.spann_search_nprobe = spann.search_nprobe;
            wire.spann_write_nprobe = spann.write_nprobe;
            wire.spann_construction_ef = spann.ef_construction;
            wire.spann_search_ef = spann.ef_search;
            wire.spann_m = spann.max_neighbors;
            wire.spann_split_threshold = spann.split_threshold;
            wire.spann_merge_threshold = spann.merge_threshold;
            wire.spann_reassign_neighbor_count = spann.reassign_neighbor_count;
        }
        wire.schema = self.schema.clone();
        wire.embedding_function = self.embedding_function.clone();
        wire
    }

    /// Decodes a server-provided parameter map, re-running builder validation.
    pub fn from_wire(
        wire: CollectionConfigurationWire,
    ) -> Result<Self, CollectionConfigurationError> {
        let mut builder = Self::builder();
        if let Some(space) = wire.hnsw_space.or(wire.spann_space) {
            builder = builder.space(space);
        }
        if let Some(ef_construction) = wire.hnsw_construction_ef {
            builder = builder.hnsw_ef_construction(ef_construction);
        }
        if let Some(max_neighbors) = wire.hnsw_m {
            builder = builder.hnsw_max_neighbors(max_neighbors);
        }
        if let Some(ef_search) = wire.hnsw_search_ef {
            builder = builder.hnsw_ef_search(ef_search);
        }
        if let Some(num_threads) = wire.hnsw_num_threads {
            builder = builder.hnsw_num_threads(num_threads);
        }
        if let Some(batch_size) = wire.hnsw_batch_size {
            builder = builder.hnsw_batch_size(batch_size);
        }
        if let Some(sync_threshold) = wire.hnsw_sync_threshold {
            builder = builder.hnsw_sync_threshold(sync_threshold);
        }
        if let Some(resize_factor) = wire.hnsw_resize_factor {
            builder = builder.hnsw_resize_factor(resize_factor);
        }
        if let Some(search_nprobe) = wire.spann_search_nprobe {
            builder = builder.spann_search_nprobe(search_nprobe);
        }
        if let Some(write_nprobe) = wire.spann_write_nprobe {
            builder = builder.spann_write_nprobe(write_nprobe);
        }
        if let Some(ef_construction) = wire.spann_construction_ef {
            builder = builder.spann_ef_construction(ef_construction);
        }
        if let Some(ef_search) = wire.spann_search_ef {
            builder = builder.spann_ef_search(ef_search);
        }
        if let Some(max_neighbors) = wire.spann_m {
            builder = builder.spann_max_neighbors(max_neighbors);
        }
        if let Some(split_threshold) = wire.spann_split_threshold {
            builder = builder.spann_split_threshold(split_threshold);
        }
        if let Some(merge_threshold) = wire.spann_merge_threshold {
            builder = builder.spann_merge_threshold(merge_threshold);
        }
        if let Some(reassign_neighbor_count) = wire.spann_reassign_neighbor_count {
            builder = builder.spann_reassign_neighbor_count(reassign_neighbor_count);
        }
        if let Some(schema) = wire.schema {
            builder = builder.schema(schema);
        }
        if let Some(embedding_function) = wire.embedding_function {
            builder = builder.embedding_function(embedding_function);
        }
        builder.build()
    }
}

/// Flat wire form of [`CollectionConfiguration`] using reserved parameter
/// names. Unknown keys are ignored on decode; a known key with the wrong JSON
/// type is a decode failure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfigurationWire {
    #[serde(rename = "hnsw:space", skip_serializing_if = "Option::is_none")]
    pub hnsw_space: Option<Space>,
    #[serde(rename = "hnsw:construction_ef", skip_serializing_if = "Option::is_none")]
    pub hnsw_construction_ef: Option<usize>,
    #[serde(rename = "hnsw:M", skip_serializing_if = "Option::is_none")]
    pub hnsw_m: Option<usize>,
    #[serde(rename = "hnsw:search_ef", skip_serializing_if = "Option::is_none")]
    pub hnsw_search_ef: Option<usize>,
    #[serde(rename = "hnsw:num_threads", skip_serializing_if = "Option::is_none")]
    pub hnsw_num_threads: Option<usize>,
    #[serde(rename = "hnsw:batch_size", skip_serializing_if = "Option::is_none")]
    pub hnsw_batch_size: Option<usize>,
    #[serde(rename = "hnsw:sync_threshold", skip_serializing_if = "Option::is_none")]
    pub hnsw_sync_threshold: Option<usize>,
    #[serde(rename = "hnsw:resize_factor", skip_serializing_if = "Option::is_none")]
    pub hnsw_resize_factor: Option<f64>,
    #[serde(rename = "spann:space", skip_serializing_if = "Option::is_none")]
    pub spann_space: Option<Space>,
    #[serde(rename = "spann:search_nprobe", skip_serializing_if = "Option::is_none")]
    pub spann_search_nprobe: Option<u32>,
    #[serde(rename = "spann:write_nprobe", skip_serializing_if = "Option::is_none")]
    pub spann_write_nprobe: Option<u32>,
    #[serde(rename = "spann:construction_ef", skip_serializing_if = "Option::is_none")]
    pub spann_construction_ef: Option<usize>,
    #[serde(rename = "spann:search_ef", skip_serializing_if = "Option::is_none")]
    pub spann_search_ef: Option<usize>,
    #[serde(rename = "spann:M", skip_serializing_if = "Option::is_none")]
    pub spann_m: Option<usize>,
    #[serde(rename = "spann:split_threshold", skip_serializing_if = "Option::is_none")]
    pub spann_split_threshold: Option<u32>,
    #[serde(
        rename = "spann:merge_threshold",
        skip_serializing_if = "Option::is_none"
    )]
    pub spann_merge_threshold: Option<u32>,
    #[serde(
        rename = "spann:reassign_neighbor_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub spann_reassign_neighbor_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_function: Option<EmbeddingFunctionSpec>,
}

/// Mutable staging area for [`CollectionConfiguration`]; `build()` runs every
/// validator so invalid configurations cannot be constructed.
#[derive(Clone, Debug, Default)]
pub struct CollectionConfigurationBuilder {
    space: Option<Space>,
    hnsw: HnswConfiguration,
    spann: SpannConfiguration,
    schema: Option<Schema>,
    embedding_function: Option<EmbeddingFunctionSpec>,
}

impl CollectionConfigurationBuilder {
    pub fn space(mut self, space: Space) -> Self {
        self.space = Some(space);
        self
    }

    pub fn hnsw_ef_construction(mut self, ef_construction: usize) -> Self {
        self.hnsw.ef_construction = Some(ef_construction);
        self
    }

    pub fn hnsw_max_neighbors(mut self, max_neighbors: usize) -> Self {
        self.hnsw.max_neighbors = Some(max_neighbors);
        self
    }

    pub fn hnsw_ef_search(mut self, ef_search: usize) -> Self {
        self.hnsw.ef_search = Some(ef_search);
        self
    }

    pub fn hnsw_num_threads(mut self, num_threads: usize) -> Self {
        self.hnsw.num_threads = Some(num_threads);
        self
    }

    pub fn hnsw_batch_size(mut self, batch_size: usize) -> Self {
        self.hnsw.batch_size = Some(batch_size);
        self
    }

    pub fn hnsw_sync_threshold(mut self, sync_threshold: usize) -> Self {
        self.hnsw.sync_threshold = Some(sync_threshold);
        self
    }

    pub fn hnsw_resize_factor(mut self, resize_factor: f64) -> Self {
        self.hnsw.resize_factor = Some(resize_factor);
        self
    }

    pub fn spann_search_nprobe(mut self, search_nprobe: u32) -> Self {
        self.spann.search_nprobe = Some(search_nprobe);
        self
    }

    pub fn spann_write_nprobe(mut self, write_nprobe: u32) -> Self {
        self.spann.write_nprobe = Some(write_nprobe);
        self
    }

    pub fn spann_ef_construction(mut self, ef_construction: usize) -> Self {
        self.spann.ef_construction = Some(ef_construction);
        self
    }

    pub fn spann_ef_search(mut self, ef_search: usize) -> Self {
        self.spann.ef_search = Some(ef_search);
        self
    }

    pub fn spann_max_neighbors(mut self, max_neighbors: usize) -> Self {
        self.spann.max_neighbors = Some(max_neighbors);
        self
    }

    pub fn spann_split_threshold(mut self, split_threshold: u32) -> Self {
        self.spann.split_threshold = Some(split_threshold);
        self
    }

    pub fn spann_merge_threshold(mut self, merge_threshold: u32) -> Self {
        self.spann.merge_threshold = Some(merge_threshold);
        self
    }

    pub fn spann_reassign_neighbor_count(mut self, reassign_neighbor_count: u32) -> Self {
        self.spann.reassign_neighbor_count = Some(reassign_neighbor_count);
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn embedding_function(mut self, embedding_function: EmbeddingFunctionSpec) -> Self {
        self.embedding_function = Some(embedding_function);
        self
    }

    pub fn build(self) -> Result<CollectionConfiguration, CollectionConfigurationError> {
        let hnsw_set = !self.hnsw.is_empty();
        let spann_set = !self.spann.is_empty();
        if hnsw_set && spann_set {
            return Err(CollectionConfigurationError::MultipleVectorIndexConfigurations);
        }
        if hnsw_set {
            self.hnsw.validate()?;
        }
        if spann_set {
            self.spann.validate()?;
        }
        if let Some(schema) = &self.schema {
            schema.validate()?;
        }
        Ok(CollectionConfiguration {
            space: self.space,
            hnsw: hnsw_set.then_some(self.hnsw),
            spann: spann_set.then_some(self.spann),
            schema: self.schema,
            embedding_function: self.embedding_function,
        })
    }
}

/// Mutable subset of HNSW parameters accepted by a running collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateHnswConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_threshold: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_factor: Option<f64>,
}

impl UpdateHnswConfiguration {
    pub fn is_empty(&self) -> bool {
        self.ef_search.is_none()
            && self.num_threads.is_none()
            && self.batch_size.is_none()
            && self.sync_threshold.is_none()
            && self.resize_factor.is_none()
    }
}

/// Mutable subset of SPANN parameters accepted by a running collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpannConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_nprobe: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<usize>,
}

impl UpdateSpannConfiguration {
    pub fn is_empty(&self) -> bool {
        self.search_nprobe.is_none() && self.ef_search.is_none()
    }
}

/// Immutable partial-update payload for a running collection. Constructed per
/// update call, consumed once by the merge, then discarded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateCollectionConfiguration {
    #[serde(skip_serializing_if = "Option::is_none")]
    hnsw: Option<UpdateHnswConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spann: Option<UpdateSpannConfiguration>,
}

impl UpdateCollectionConfiguration {
    pub fn builder() -> UpdateCollectionConfigurationBuilder {
        UpdateCollectionConfigurationBuilder::default()
    }

    pub fn hnsw(&self) -> Option<&UpdateHnswConfiguration> {
        self.hnsw.as_ref()
    }

    pub fn spann(&self) -> Option<&UpdateSpannConfiguration> {
        self.spann.as_ref()
    }
}

#[derive(Clone, Debug, Default)]
pub struct UpdateCollectionConfigurationBuilder {
    hnsw: UpdateHnswConfiguration,
    spann: UpdateSpannConfiguration,
}

impl UpdateCollectionConfigurationBuilder {
    pub fn hnsw_ef_search(mut self, ef_search: usize) -> Self {
        self.hnsw.ef_search = Some(ef_search);
        self
    }

    pub fn hnsw_num_threads(mut self, num_threads: usize) -> Self {
        self.hnsw.num_threads = Some(num_threads);
        self
    }

    pub fn hnsw_batch_size(mut self, batch_size: usize) -> Self {
        self.hnsw.batch_size = Some(batch_size);
        self
    }

    pub fn hnsw_sync_threshold(mut self, sync_threshold: usize) -> Self {
        self.hnsw.sync_threshold = Some(sync_threshold);
        self
    }

    pub fn hnsw_resize_factor(mut self, resize_factor: f64) -> Self {
        self.hnsw.resize_factor = Some(resize_factor);
        self
    }

    pub fn spann_search_nprobe(mut self, search_nprobe: u32) -> Self {
        self.spann.search_nprobe = Some(search_nprobe);
        self
    }

    pub fn spann_ef_search(mut self, ef_search: usize) -> Self {
        self.spann.ef_search = Some(ef_search);
        self
    }

    pub fn build(self) -> Result<UpdateCollectionConfiguration, CollectionConfigurationError> {
        let hnsw_set = !self.hnsw.is_empty();
        let spann_set = !self.spann.is_empty();
        if hnsw_set && spann_set {
            return Err(CollectionConfigurationError::MultipleVectorIndexConfigurations);
        }
        if !hnsw_set && !spann_set {
            return Err(CollectionConfigurationError::EmptyUpdate);
        }
        let mut errors = ValidationErrors::new();
        if let Some(ef_search) = self.hnsw.ef_search {
            if let Err(err) = require_positive("hnsw:search_ef", ef_search) {
                errors.add("hnsw:search_ef", err);
            }
        }
        if let Some(num_threads) = self.hnsw.num_threads {
            if let Err(err) = require_positive("hnsw:num_threads", num_threads) {
                errors.add("hnsw:num_threads", err);
            }
        }
        if let Some(batch_size) = self.hnsw.batch_size {
            if let Err(err) = require_at_least("hnsw:batch_size", batch_size, 2) {
                errors.add("hnsw:batch_size", err);
            }
        }
        if let Some(sync_threshold) = self.hnsw.sync_threshold {
            if let Err(err) = require_at_least("hnsw:sync_threshold", sync_threshold, 2) {
                errors.add("hnsw:sync_threshold", err);
            }
        }
        if let Some(resize_factor) = self.hnsw.resize_factor {
            if let Err(err) = require_positive_finite("hnsw:resize_factor", resize_factor) {
                errors.add("hnsw:resize_factor", err);
            }
        }
        if let Some(search_nprobe) = self.spann.search_nprobe {
            if let Err(err) = require_range("spann:search_nprobe", search_nprobe, 1, 128) {
                errors.add("spann:search_nprobe", err);
            }
        }
        if let Some(ef_search) = self.spann.ef_search {
            if let Err(err) = require_range("spann:search_ef", ef_search, 1, 200) {
                errors.add("spann:search_ef", err);
            }
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }
        Ok(UpdateCollectionConfiguration {
            hnsw: hnsw_set.then_some(self.hnsw),
            spann: spann_set.then_some(self.spann),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_rejects_mixed_index_families() {
        let result = CollectionConfiguration::builder()
            .hnsw_ef_search(50)
            .spann_search_nprobe(64)
            .build();
        assert!(matches!(
            result,
            Err(CollectionConfigurationError::MultipleVectorIndexConfigurations)
        ));
    }

    #[test]
    fn build_rejects_out_of_range_parameters() {
        assert!(CollectionConfiguration::builder()
            .hnsw_batch_size(1)
            .build()
            .is_err());
        assert!(CollectionConfiguration::builder()
            .hnsw_resize_factor(f64::NAN)
            .build()
            .is_err());
        assert!(CollectionConfiguration::builder()
            .spann_search_nprobe(129)
            .build()
            .is_err());
        assert!(CollectionConfiguration::builder()
            .spann_merge_threshold(24)
            .build()
            .is_err());
    }

    #[test]
    fn update_build_rejects_empty_payload() {
        assert!(matches!(
            UpdateCollectionConfiguration::builder().build(),
            Err(CollectionConfigurationError::EmptyUpdate)
        ));
    }

    #[test]
    fn update_build_rejects_mixed_index_families() {
        let result = UpdateCollectionConfiguration::builder()
            .hnsw_ef_search(100)
            .spann_ef_search(100)
            .build();
        assert!(matches!(
            result,
            Err(CollectionConfigurationError::MultipleVectorIndexConfigurations)
        ));
    }

    #[test]
    fn wire_encoding_uses_reserved_parameter_names() {
        let config = CollectionConfiguration::builder()
            .space(Space::Cosine)
            .hnsw_max_neighbors(16)
            .hnsw_ef_construction(200)
            .build()
            .unwrap();
        let encoded = serde_json::to_value(config.to_wire()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "hnsw:space": "cosine",
                "hnsw:M": 16,
                "hnsw:construction_ef": 200,
            })
        );
    }

    #[test]
    fn wire_round_trip_preserves_set_and_unset_fields() {
        let config = CollectionConfiguration::builder()
            .space(Space::Ip)
            .hnsw_ef_search(50)
            .hnsw_batch_size(128)
            .build()
            .unwrap();
        let encoded = serde_json::to_value(config.to_wire()).unwrap();
        let wire: CollectionConfigurationWire = serde_json::from_value(encoded).unwrap();
        let decoded = CollectionConfiguration::from_wire(wire).unwrap();
        assert_eq!(decoded, config);
        assert!(decoded.hnsw().unwrap().ef_construction.is_none());
        assert!(decoded.spann().is_none());
    }

    #[test]
    fn wire_round_trip_spann() {
        let config = CollectionConfiguration::builder()
            .space(Space::L2)
            .spann_search_nprobe(64)
            .spann_merge_threshold(50)
            .build()
            .unwrap();
        let encoded = serde_json::to_value(config.to_wire()).unwrap();
        assert_eq!(encoded["spann:space"], json!("l2"));
        assert_eq!(encoded["spann:search_nprobe"], json!(64));
        let wire: CollectionConfigurationWire = serde_json::from_value(encoded).unwrap();
        assert_eq!(CollectionConfiguration::from_wire(wire).unwrap(), config);
    }

    #[test]
    fn wire_decode_ignores_unknown_keys() {
        let wire: CollectionConfigurationWire = serde_json::from_value(json!({
            "hnsw:search_ef": 100,
            "hnsw:future_parameter": "ignored",
        }))
        .unwrap();
        let config = CollectionConfiguration::from_wire(wire).unwrap();
        assert_eq!(config.hnsw().unwrap().ef_search, Some(100));
    }

    #[test]
    fn wire_decode_fails_on_wrong_json_type() {
        let result: Result<CollectionConfigurationWire, _> = serde_json::from_value(json!({
            "hnsw:search_ef": "one hundred",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn knn_index_round_trips_lowercase() {
        assert_eq!(serde_json::to_value(KnnIndex::Hnsw).unwrap(), json!("hnsw"));
        assert_eq!(
            serde_json::from_value::<KnnIndex>(json!("spann")).unwrap(),
            KnnIndex::Spann
        );
    }

    #[test]
    fn update_serializes_only_present_blocks() {
        let update = UpdateCollectionConfiguration::builder()
            .hnsw_ef_search(100)
            .build()
            .unwrap();
        let encoded = serde_json::to_value(&update).unwrap();
        assert_eq!(encoded, json!({ "hnsw": { "ef_search": 100 } }));
    }
}
