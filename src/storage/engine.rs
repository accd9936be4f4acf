//! Backing document index trait

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Index metadata recorded when an index is provisioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Unique index identifier (UUIDv4).
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl IndexMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Precondition attached to a document write.
///
/// The check and the write happen as one atomic step inside the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCondition {
    /// The document must not exist yet. The write is assigned version 1, or
    /// the version after its last delete when the id existed before.
    Create,
    /// The document must exist at exactly this version; the write is assigned
    /// the next one.
    Version(u64),
}

/// Outcome of a document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteResult {
    Created,
    Updated,
    Deleted,
    NotFound,
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WriteResult::Created => "created",
            WriteResult::Updated => "updated",
            WriteResult::Deleted => "deleted",
            WriteResult::NotFound => "not_found",
        };
        f.write_str(s)
    }
}

/// Response of a document write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexWriteResponse {
    pub index: String,
    pub id: String,
    pub version: u64,
    pub result: WriteResult,
}

/// A document as returned by a point lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedDocument {
    pub id: String,
    pub version: u64,
    pub source: Value,
}

/// Backing document index.
///
/// # Contract
///
/// - `put` with [`WriteCondition::Create`] fails with `AlreadyExists` when the
///   id is taken. Otherwise it returns version 1 for a never-used id and the
///   delete version plus one for a deleted id, so an id never repeats a
///   version.
/// - `put` with [`WriteCondition::Version`] fails with `NotFound` when the id
///   is absent and with `VersionConflict` when the stored version differs;
///   otherwise it returns the supplied version plus one.
/// - `delete` of a live id reports its last version plus one. Deleting an
///   absent id is not an error: it reports [`WriteResult::NotFound`].
/// - Every document operation against an index that was never created fails
///   with `NotFound`.
///
/// Implementations surface their own transport failures as `Error::Index`.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn create_index(&self, name: &str) -> Result<IndexMetadata>;

    async fn drop_index(&self, name: &str) -> Result<()>;

    async fn index_metadata(&self, name: &str) -> Result<Option<IndexMetadata>>;

    async fn index_exists(&self, name: &str) -> Result<bool> {
        Ok(self.index_metadata(name).await?.is_some())
    }

    /// List all index names, sorted
    async fn list_indices(&self) -> Result<Vec<String>>;

    async fn get(&self, index: &str, id: &str) -> Result<Option<IndexedDocument>>;

    async fn put(
        &self,
        index: &str,
        id: &str,
        source: Value,
        condition: WriteCondition,
    ) -> Result<IndexWriteResponse>;

    async fn delete(&self, index: &str, id: &str) -> Result<IndexWriteResponse>;

    /// List all document ids of an index, sorted
    async fn list_ids(&self, index: &str) -> Result<Vec<String>>;
}
