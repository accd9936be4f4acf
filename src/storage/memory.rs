//! In-memory document index
//!
//! This module provides a process-local implementation of [`DocumentIndex`]
//! used for embedding and testing. Each index is one `DashMap` entry; writes
//! take that entry's lock for the duration of the version check and the
//! write, which makes every conditional write a single compare-and-swap.
//! Deleted ids leave a tombstone holding the delete version, so a later
//! create continues the id's version sequence. Dropping an index keeps its
//! tombstones for when an index of the same name is created again.

use crate::error::{Error, Result};
use crate::storage::engine::{
    DocumentIndex, IndexMetadata, IndexWriteResponse, IndexedDocument, WriteCondition,
    WriteResult,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredDocument {
    version: u64,
    source: Value,
}

#[derive(Debug)]
struct IndexShard {
    metadata: IndexMetadata,
    docs: HashMap<String, StoredDocument>,
    tombstones: HashMap<String, u64>,
}

/// In-memory document index
#[derive(Clone, Default)]
pub struct InMemoryIndex {
    indices: Arc<DashMap<String, IndexShard>>,
    retired: Arc<DashMap<String, HashMap<String, u64>>>,
}

impl InMemoryIndex {
    /// Create a new, empty in-memory index
    pub fn new() -> Self {
        Self {
            indices: Arc::new(DashMap::new()),
            retired: Arc::new(DashMap::new()),
        }
    }

    /// Get the number of documents stored in an index
    pub fn len(&self, index: &str) -> usize {
        self.indices
            .get(index)
            .map(|shard| shard.docs.len())
            .unwrap_or(0)
    }

    /// Check whether an index holds no documents
    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }

    fn missing_index(index: &str) -> Error {
        Error::NotFound(format!("Index [{}] does not exist", index))
    }
}

#[async_trait]
impl DocumentIndex for InMemoryIndex {
    async fn create_index(&self, name: &str) -> Result<IndexMetadata> {
        match self.indices.entry(name.to_string()) {
            Entry::Occupied(_) => Err(Error::AlreadyExists(format!(
                "Index [{}] already exists",
                name
            ))),
            Entry::Vacant(slot) => {
                let metadata = IndexMetadata::new(name);
                let tombstones = self
                    .retired
                    .remove(name)
                    .map(|(_, tombstones)| tombstones)
                    .unwrap_or_default();
                slot.insert(IndexShard {
                    metadata: metadata.clone(),
                    docs: HashMap::new(),
                    tombstones,
                });
                debug!(index = %name, id = %metadata.id, "Created index");
                Ok(metadata)
            }
        }
    }

    async fn drop_index(&self, name: &str) -> Result<()> {
        // Retire under the entry lock so a concurrent create sees the tombstones
        let shard = match self.indices.entry(name.to_string()) {
            Entry::Occupied(slot) => {
                let shard = slot.get();
                let mut tombstones = shard.tombstones.clone();
                tombstones.extend(
                    shard
                        .docs
                        .iter()
                        .map(|(id, doc)| (id.clone(), doc.version + 1)),
                );
                self.retired.insert(name.to_string(), tombstones);
                slot.remove()
            }
            Entry::Vacant(_) => return Err(Self::missing_index(name)),
        };
        debug!(index = %name, docs = shard.docs.len(), "Dropped index");
        Ok(())
    }

    async fn index_metadata(&self, name: &str) -> Result<Option<IndexMetadata>> {
        Ok(self.indices.get(name).map(|shard| shard.metadata.clone()))
    }

    async fn list_indices(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.indices.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn get(&self, index: &str, id: &str) -> Result<Option<IndexedDocument>> {
        let shard = self
            .indices
            .get(index)
            .ok_or_else(|| Self::missing_index(index))?;
        Ok(shard.docs.get(id).map(|doc| IndexedDocument {
            id: id.to_string(),
            version: doc.version,
            source: doc.source.clone(),
        }))
    }

    async fn put(
        &self,
        index: &str,
        id: &str,
        source: Value,
        condition: WriteCondition,
    ) -> Result<IndexWriteResponse> {
        // Holding the shard guard makes check-and-write atomic
        let mut shard = self
            .indices
            .get_mut(index)
            .ok_or_else(|| Self::missing_index(index))?;

        let current = shard.docs.get(id).map(|doc| doc.version);
        let (version, result) = match (condition, current) {
            (WriteCondition::Create, None) => {
                let version = shard.tombstones.remove(id).map_or(1, |deleted| deleted + 1);
                (version, WriteResult::Created)
            }
            (WriteCondition::Create, Some(_)) => {
                return Err(Error::AlreadyExists(format!(
                    "Document [{}] already exists in index [{}]",
                    id, index
                )))
            }
            (WriteCondition::Version(_), None) => {
                return Err(Error::NotFound(format!(
                    "Document [{}] does not exist in index [{}]",
                    id, index
                )))
            }
            (WriteCondition::Version(expected), Some(actual)) if expected != actual => {
                return Err(Error::VersionConflict {
                    id: id.to_string(),
                    expected,
                    actual,
                })
            }
            (WriteCondition::Version(expected), Some(_)) => (expected + 1, WriteResult::Updated),
        };

        shard
            .docs
            .insert(id.to_string(), StoredDocument { version, source });
        debug!(index = %index, id = %id, version, result = %result, "Wrote document");

        Ok(IndexWriteResponse {
            index: index.to_string(),
            id: id.to_string(),
            version,
            result,
        })
    }

    async fn delete(&self, index: &str, id: &str) -> Result<IndexWriteResponse> {
        let mut shard = self
            .indices
            .get_mut(index)
            .ok_or_else(|| Self::missing_index(index))?;

        let (version, result) = match shard.docs.remove(id) {
            Some(doc) => {
                let version = doc.version + 1;
                shard.tombstones.insert(id.to_string(), version);
                (version, WriteResult::Deleted)
            }
            None => (
                shard.tombstones.get(id).copied().unwrap_or(0),
                WriteResult::NotFound,
            ),
        };
        debug!(index = %index, id = %id, result = %result, "Deleted document");

        Ok(IndexWriteResponse {
            index: index.to_string(),
            id: id.to_string(),
            version,
            result,
        })
    }

    async fn list_ids(&self, index: &str) -> Result<Vec<String>> {
        let shard = self
            .indices
            .get(index)
            .ok_or_else(|| Self::missing_index(index))?;
        let mut ids: Vec<String> = shard.docs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
