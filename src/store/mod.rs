//! Feature stores
//!
//! A feature store is one index of the backing [`DocumentIndex`], recognized
//! by its name: the default store is `.ltrstore` and named stores are
//! `.ltrstore_{name}`. Elements live in a store as JSON source documents
//! under their composite id.
//!
//! [`IndexFeatureStore`] reads and writes the elements of one store.
//! [`FeatureStoreAction`] is the administrative surface: store provisioning,
//! validated writes, and the set-merge and model-from-set operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::element::{composite_id, ElementType, StorableElement, TypedElement};
use crate::error::{Error, Result};
use crate::storage::{DocumentIndex, IndexMetadata, IndexWriteResponse, WriteCondition, WriteResult};

pub mod action;

pub use action::{FeatureStoreAction, FeatureStoreRequest, FeatureStoreResponse, StoreOperation};

/// Name of the default store
pub const DEFAULT_STORE: &str = ".ltrstore";

/// Prefix of every named store
pub const STORE_PREFIX: &str = ".ltrstore_";

/// Index name of the named store `name`
pub fn store_name(name: &str) -> String {
    format!("{}{}", STORE_PREFIX, name)
}

/// Whether `index` is a feature store name
pub fn is_store(index: &str) -> bool {
    index == DEFAULT_STORE
        || index
            .strip_prefix(STORE_PREFIX)
            .map_or(false, |suffix| !suffix.is_empty())
}

/// Recorded when a store is provisioned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<IndexMetadata> for StoreConfig {
    fn from(metadata: IndexMetadata) -> Self {
        Self {
            id: metadata.id,
            name: metadata.name,
            created_at: metadata.created_at,
        }
    }
}

pub(crate) fn check_store(store: &str) -> Result<()> {
    if !is_store(store) {
        return Err(Error::InvalidArgument(format!(
            "[{}] is not a feature store name, expected [{}] or [{}<name>]",
            store, DEFAULT_STORE, STORE_PREFIX
        )));
    }
    Ok(())
}

/// Elements of one feature store
#[derive(Clone)]
pub struct IndexFeatureStore {
    store: String,
    index: Arc<dyn DocumentIndex>,
}

impl IndexFeatureStore {
    /// Bind to `store`; the name must pass [`is_store`].
    pub fn new(store: impl Into<String>, index: Arc<dyn DocumentIndex>) -> Result<Self> {
        let store = store.into();
        check_store(&store)?;
        Ok(Self { store, index })
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub async fn exists(&self) -> Result<bool> {
        self.index.index_exists(&self.store).await
    }

    pub async fn config(&self) -> Result<StoreConfig> {
        self.index
            .index_metadata(&self.store)
            .await?
            .map(StoreConfig::from)
            .ok_or_else(|| self.missing_store())
    }

    /// Persist a new element; `AlreadyExists` if its key is taken.
    #[instrument(skip(self, element), fields(store = %self.store, id = %element.id()))]
    pub async fn create(&self, element: &StorableElement) -> Result<IndexWriteResponse> {
        self.write(element, WriteCondition::Create).await
    }

    /// Replace an element if its current version is `expected_version`.
    #[instrument(skip(self, element), fields(store = %self.store, id = %element.id()))]
    pub async fn update(
        &self,
        element: &StorableElement,
        expected_version: u64,
    ) -> Result<IndexWriteResponse> {
        self.write(element, WriteCondition::Version(expected_version))
            .await
    }

    async fn write(
        &self,
        element: &StorableElement,
        condition: WriteCondition,
    ) -> Result<IndexWriteResponse> {
        element.verify()?;
        let source = element.to_source()?;
        let response = match self
            .index
            .put(&self.store, &element.id(), source, condition)
            .await
        {
            Ok(response) => response,
            Err(e) => return Err(self.store_error(e).await),
        };
        debug!(version = response.version, result = %response.result, "Stored element");
        Ok(response)
    }

    #[instrument(skip(self), fields(store = %self.store))]
    pub async fn delete(
        &self,
        element_type: ElementType,
        name: &str,
    ) -> Result<IndexWriteResponse> {
        let id = composite_id(element_type, name);
        let response = match self.index.delete(&self.store, &id).await {
            Ok(response) => response,
            Err(e) => return Err(self.store_error(e).await),
        };
        if response.result == WriteResult::NotFound {
            return Err(Error::NotFound(format!(
                "Element [{}] not found in store [{}]",
                id, self.store
            )));
        }
        debug!(id = %id, version = response.version, "Deleted element");
        Ok(response)
    }

    pub async fn get(&self, element_type: ElementType, name: &str) -> Result<StorableElement> {
        Ok(self.get_versioned(element_type, name).await?.0)
    }

    /// Fetch an element and its current version
    pub async fn get_versioned(
        &self,
        element_type: ElementType,
        name: &str,
    ) -> Result<(StorableElement, u64)> {
        let id = composite_id(element_type, name);
        let document = match self.index.get(&self.store, &id).await {
            Ok(document) => document,
            Err(e) => return Err(self.store_error(e).await),
        }
        .ok_or_else(|| {
            Error::NotFound(format!("Element [{}] not found in store [{}]", id, self.store))
        })?;

        let element = StorableElement::from_source(document.source)?;
        if element.element_type() != element_type {
            return Err(Error::ParseError(format!(
                "Document [{}] holds an element of type [{}]",
                id,
                element.element_type()
            )));
        }
        Ok((element, document.version))
    }

    pub async fn get_typed<E: TypedElement>(&self, name: &str) -> Result<E> {
        Ok(self.get_typed_versioned(name).await?.0)
    }

    pub async fn get_typed_versioned<E: TypedElement>(&self, name: &str) -> Result<(E, u64)> {
        let (element, version) = self.get_versioned(E::TYPE, name).await?;
        Ok((E::from_element(element)?, version))
    }

    /// Names of the stored elements of one type, sorted, optionally limited
    /// to names starting with `prefix`.
    pub async fn list(
        &self,
        element_type: ElementType,
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        let id_prefix = composite_id(element_type, prefix.unwrap_or(""));
        let ids = match self.index.list_ids(&self.store).await {
            Ok(ids) => ids,
            Err(e) => return Err(self.store_error(e).await),
        };
        let type_prefix_len = element_type.as_str().len() + 1;
        let mut names: Vec<String> = ids
            .into_iter()
            .filter(|id| id.starts_with(&id_prefix))
            .map(|id| id[type_prefix_len..].to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn missing_store(&self) -> Error {
        Error::NotFound(format!("Store [{}] does not exist", self.store))
    }

    /// A `NotFound` from a store that is not provisioned surfaces as a
    /// missing store; everything else passes through. A failure while
    /// checking the store replaces the original error.
    async fn store_error(&self, error: Error) -> Error {
        match error {
            Error::NotFound(reason) => match self.exists().await {
                Ok(false) => self.missing_store(),
                Ok(true) => Error::NotFound(reason),
                Err(e) => {
                    warn!(
                        store = %self.store,
                        error = %e,
                        not_found = %reason,
                        "Store check failed"
                    );
                    e
                }
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{StoredFeature, StoredFeatureSet};
    use crate::storage::InMemoryIndex;
    use serde_json::json;

    fn feature(name: &str) -> StoredFeature {
        StoredFeature::new(
            name,
            vec!["keywords".to_string()],
            json!({"match": {"title": "{{keywords}}"}}),
        )
        .unwrap()
    }

    async fn provisioned() -> IndexFeatureStore {
        let index: Arc<dyn DocumentIndex> = Arc::new(InMemoryIndex::new());
        index.create_index(DEFAULT_STORE).await.unwrap();
        IndexFeatureStore::new(DEFAULT_STORE, index).unwrap()
    }

    #[test]
    fn test_store_names() {
        assert!(is_store(DEFAULT_STORE));
        assert!(is_store(&store_name("mystore")));
        assert!(!is_store(STORE_PREFIX));
        assert!(!is_store("products"));
        assert!(!is_store(".ltrstorefoo"));
        assert!(matches!(
            IndexFeatureStore::new("products", Arc::new(InMemoryIndex::new())),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_create_get_update() -> Result<()> {
        let store = provisioned().await;
        let created = store.create(&feature("f1").into()).await?;
        assert_eq!(created.version, 1);
        assert_eq!(created.result, WriteResult::Created);
        assert_eq!(created.id, "feature-f1");

        let (f, version): (StoredFeature, u64) = store.get_typed_versioned("f1").await?;
        assert_eq!(f, feature("f1"));
        assert_eq!(version, 1);

        let updated = store.update(&feature("f1").into(), 1).await?;
        assert_eq!(updated.version, 2);
        assert!(matches!(
            store.update(&feature("f1").into(), 1).await,
            Err(Error::VersionConflict { expected: 1, actual: 2, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_types_do_not_collide() -> Result<()> {
        let store = provisioned().await;
        store.create(&feature("x").into()).await?;
        let set = StoredFeatureSet::new("x", vec![feature("f1")])?;
        store.create(&set.into()).await?;

        assert!(matches!(
            store.get(ElementType::Feature, "x").await?,
            StorableElement::Feature(_)
        ));
        assert!(matches!(
            store.get(ElementType::FeatureSet, "x").await?,
            StorableElement::FeatureSet(_)
        ));
        assert!(matches!(
            store.get(ElementType::Model, "x").await,
            Err(Error::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_mismatched_stored_type_is_parse_error() -> Result<()> {
        let index: Arc<dyn DocumentIndex> = Arc::new(InMemoryIndex::new());
        index.create_index(DEFAULT_STORE).await?;
        let source = StorableElement::from(feature("f1")).to_source()?;
        index
            .put(DEFAULT_STORE, "model-f1", source, WriteCondition::Create)
            .await?;

        let store = IndexFeatureStore::new(DEFAULT_STORE, index)?;
        assert!(matches!(
            store.get(ElementType::Model, "f1").await,
            Err(Error::ParseError(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_by_type_and_prefix() -> Result<()> {
        let store = provisioned().await;
        for name in ["title_a", "title_b", "body"] {
            store.create(&feature(name).into()).await?;
        }
        store
            .create(&StoredFeatureSet::new("title_set", vec![feature("f")])?.into())
            .await?;

        assert_eq!(
            store.list(ElementType::Feature, None).await?,
            vec!["body", "title_a", "title_b"]
        );
        assert_eq!(
            store.list(ElementType::Feature, Some("title")).await?,
            vec!["title_a", "title_b"]
        );
        assert_eq!(
            store.list(ElementType::FeatureSet, None).await?,
            vec!["title_set"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_and_missing_store() -> Result<()> {
        let store = provisioned().await;
        store.create(&feature("f1").into()).await?;
        let deleted = store.delete(ElementType::Feature, "f1").await?;
        assert_eq!(deleted.result, WriteResult::Deleted);
        assert_eq!(deleted.version, 2);
        assert!(matches!(
            store.delete(ElementType::Feature, "f1").await,
            Err(Error::NotFound(_))
        ));

        let unprovisioned =
            IndexFeatureStore::new(store_name("other"), Arc::new(InMemoryIndex::new()))?;
        assert!(!unprovisioned.exists().await?);
        match unprovisioned.get(ElementType::Feature, "f1").await {
            Err(Error::NotFound(reason)) => assert!(reason.contains("Store")),
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }
}
