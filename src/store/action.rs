//! Feature store administration
//!
//! Every write runs its validation directive before touching the store, so a
//! rejected request leaves the store unchanged.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{check_store, is_store, IndexFeatureStore, StoreConfig, DEFAULT_STORE};
use crate::config::LtrSettings;
use crate::element::{
    ElementType, StorableElement, StoredFeature, StoredFeatureSet, StoredModel,
    StoredRankerDefinition,
};
use crate::error::{Error, Result};
use crate::metrics;
use crate::ranker::RankerCache;
use crate::storage::{DocumentIndex, WriteResult};
use crate::validation::{FeatureValidation, ValidationEngine};

#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    Create(StorableElement),
    Update {
        element: StorableElement,
        expected_version: u64,
    },
    Delete {
        element_type: ElementType,
        name: String,
    },
}

impl StoreOperation {
    pub fn name(&self) -> &'static str {
        match self {
            StoreOperation::Create(_) => "create",
            StoreOperation::Update { .. } => "update",
            StoreOperation::Delete { .. } => "delete",
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            StoreOperation::Create(element) | StoreOperation::Update { element, .. } => {
                element.element_type()
            }
            StoreOperation::Delete { element_type, .. } => *element_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStoreRequest {
    pub store: String,
    pub operation: StoreOperation,
    pub validation: Option<FeatureValidation>,
}

impl FeatureStoreRequest {
    pub fn create(store: impl Into<String>, element: impl Into<StorableElement>) -> Self {
        Self {
            store: store.into(),
            operation: StoreOperation::Create(element.into()),
            validation: None,
        }
    }

    pub fn update(
        store: impl Into<String>,
        element: impl Into<StorableElement>,
        expected_version: u64,
    ) -> Self {
        Self {
            store: store.into(),
            operation: StoreOperation::Update {
                element: element.into(),
                expected_version,
            },
            validation: None,
        }
    }

    pub fn delete(
        store: impl Into<String>,
        element_type: ElementType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            store: store.into(),
            operation: StoreOperation::Delete {
                element_type,
                name: name.into(),
            },
            validation: None,
        }
    }

    pub fn with_validation(mut self, validation: FeatureValidation) -> Self {
        self.validation = Some(validation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureStoreResponse {
    pub id: String,
    pub store: String,
    pub element_type: ElementType,
    pub version: u64,
    pub result: WriteResult,
}

pub struct FeatureStoreAction {
    index: Arc<dyn DocumentIndex>,
    validation: Arc<ValidationEngine>,
    cache: Option<Arc<RankerCache>>,
    default_store: String,
    default_validation: Option<FeatureValidation>,
}

impl FeatureStoreAction {
    pub fn new(index: Arc<dyn DocumentIndex>, validation: Arc<ValidationEngine>) -> Self {
        Self {
            index,
            validation,
            cache: None,
            default_store: DEFAULT_STORE.to_string(),
            default_validation: None,
        }
    }

    /// Apply the default store and default validation strategy of `settings`
    pub fn from_settings(
        index: Arc<dyn DocumentIndex>,
        validation: Arc<ValidationEngine>,
        settings: &LtrSettings,
    ) -> Self {
        let mut action = Self::new(index, validation).with_default_store(&settings.default_store);
        if let Some(strategy) = &settings.default_validation {
            action = action.with_default_validation(FeatureValidation::new(strategy.as_str()));
        }
        action
    }

    /// Store used by requests with an empty store name
    pub fn with_default_store(mut self, store: impl Into<String>) -> Self {
        self.default_store = store.into();
        self
    }

    /// Drop compiled rankers from `cache` when their model changes
    pub fn with_cache(mut self, cache: Arc<RankerCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validation applied to writes that carry no directive of their own
    pub fn with_default_validation(mut self, validation: FeatureValidation) -> Self {
        self.default_validation = Some(validation);
        self
    }

    fn resolve<'a>(&'a self, store: &'a str) -> &'a str {
        if store.is_empty() {
            &self.default_store
        } else {
            store
        }
    }

    /// Element access for one store
    pub fn store(&self, store: &str) -> Result<IndexFeatureStore> {
        IndexFeatureStore::new(self.resolve(store), Arc::clone(&self.index))
    }

    #[instrument(skip(self))]
    pub async fn provision_store(&self, store: &str) -> Result<StoreConfig> {
        let store = self.resolve(store);
        check_store(store)?;
        let result = self.index.create_index(store).await;
        metrics::record_store_operation("provision", "store", result.is_ok());
        let config = StoreConfig::from(result?);
        info!(store = %store, id = %config.id, "Provisioned feature store");
        Ok(config)
    }

    /// Drop a store and everything stored in it
    #[instrument(skip(self))]
    pub async fn drop_store(&self, store: &str) -> Result<()> {
        let store = self.resolve(store);
        check_store(store)?;
        let result = self.index.drop_index(store).await.map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("Store [{}] does not exist", store)),
            other => other,
        });
        metrics::record_store_operation("drop", "store", result.is_ok());
        result?;
        if let Some(cache) = &self.cache {
            cache.invalidate_store(store);
        }
        info!(store = %store, "Dropped feature store");
        Ok(())
    }

    pub async fn store_exists(&self, store: &str) -> Result<bool> {
        self.store(store)?.exists().await
    }

    /// Provisioned stores, sorted
    pub async fn list_stores(&self) -> Result<Vec<String>> {
        Ok(self
            .index
            .list_indices()
            .await?
            .into_iter()
            .filter(|name| is_store(name))
            .collect())
    }

    /// Execute one store request.
    #[instrument(
        skip(self, request),
        fields(
            store = %request.store,
            operation = request.operation.name(),
            element_type = %request.operation.element_type()
        )
    )]
    pub async fn execute(&self, request: FeatureStoreRequest) -> Result<FeatureStoreResponse> {
        let operation = request.operation.name();
        let element_type = request.operation.element_type();
        let validation = request
            .validation
            .as_ref()
            .or(self.default_validation.as_ref());

        let result = self.apply(&request.store, &request.operation, validation).await;

        metrics::record_store_operation(operation, element_type.as_str(), result.is_ok());
        if let Err(e) = &result {
            if matches!(e, Error::VersionConflict { .. }) {
                metrics::record_version_conflict(element_type.as_str());
            }
            warn!(error = %e, "Store request failed");
        }
        result
    }

    async fn apply(
        &self,
        store: &str,
        operation: &StoreOperation,
        validation: Option<&FeatureValidation>,
    ) -> Result<FeatureStoreResponse> {
        let store = self.resolve(store);
        let feature_store = self.store(store)?;
        let element_type = operation.element_type();

        let response = match operation {
            StoreOperation::Create(element) => {
                self.validation.validate(element, validation)?;
                feature_store.create(element).await?
            }
            StoreOperation::Update {
                element,
                expected_version,
            } => {
                self.validation.validate(element, validation)?;
                let response = feature_store.update(element, *expected_version).await?;
                self.invalidate(store, element_type, element.name());
                response
            }
            StoreOperation::Delete { element_type, name } => {
                let response = feature_store.delete(*element_type, name).await?;
                self.invalidate(store, *element_type, name);
                response
            }
        };

        Ok(FeatureStoreResponse {
            id: response.id,
            store: response.index,
            element_type,
            version: response.version,
            result: response.result,
        })
    }

    fn invalidate(&self, store: &str, element_type: ElementType, name: &str) {
        if let (Some(cache), ElementType::Model) = (&self.cache, element_type) {
            cache.invalidate(store, name);
        }
    }

    pub async fn create(
        &self,
        store: &str,
        element: impl Into<StorableElement>,
        validation: Option<FeatureValidation>,
    ) -> Result<FeatureStoreResponse> {
        let mut request = FeatureStoreRequest::create(store, element);
        request.validation = validation;
        self.execute(request).await
    }

    pub async fn update(
        &self,
        store: &str,
        element: impl Into<StorableElement>,
        expected_version: u64,
        validation: Option<FeatureValidation>,
    ) -> Result<FeatureStoreResponse> {
        let mut request = FeatureStoreRequest::update(store, element, expected_version);
        request.validation = validation;
        self.execute(request).await
    }

    pub async fn delete(
        &self,
        store: &str,
        element_type: ElementType,
        name: &str,
    ) -> Result<FeatureStoreResponse> {
        self.execute(FeatureStoreRequest::delete(store, element_type, name))
            .await
    }

    pub async fn get(
        &self,
        store: &str,
        element_type: ElementType,
        name: &str,
    ) -> Result<StorableElement> {
        self.store(store)?.get(element_type, name).await
    }

    pub async fn get_versioned(
        &self,
        store: &str,
        element_type: ElementType,
        name: &str,
    ) -> Result<(StorableElement, u64)> {
        self.store(store)?.get_versioned(element_type, name).await
    }

    pub async fn list(
        &self,
        store: &str,
        element_type: ElementType,
        prefix: Option<&str>,
    ) -> Result<Vec<String>> {
        self.store(store)?.list(element_type, prefix).await
    }

    /// Append features to a stored set through a versioned update.
    ///
    /// With `expected_version` the merge only applies to that version of the
    /// set; without it the merge applies to whatever version was read, and a
    /// concurrent change between read and write is still a `VersionConflict`.
    #[instrument(skip(self, features, validation), fields(count = features.len()))]
    pub async fn add_features_to_set(
        &self,
        store: &str,
        set_name: &str,
        features: Vec<StoredFeature>,
        expected_version: Option<u64>,
        validation: Option<FeatureValidation>,
    ) -> Result<FeatureStoreResponse> {
        let (set, current) = self
            .store(store)?
            .get_typed_versioned::<StoredFeatureSet>(set_name)
            .await?;
        let expected = expected_version.unwrap_or(current);
        if expected != current {
            metrics::record_version_conflict(ElementType::FeatureSet.as_str());
            return Err(Error::VersionConflict {
                id: crate::element::composite_id(ElementType::FeatureSet, set_name),
                expected,
                actual: current,
            });
        }
        let merged = set.append(features)?;
        self.update(store, merged, expected, validation).await
    }

    /// Create a model from a snapshot of a stored feature set. Later changes
    /// to the set do not affect the model.
    #[instrument(skip(self, ranker, validation))]
    pub async fn create_model_from_set(
        &self,
        store: &str,
        set_name: &str,
        model_name: &str,
        ranker: StoredRankerDefinition,
        validation: Option<FeatureValidation>,
    ) -> Result<FeatureStoreResponse> {
        let set: StoredFeatureSet = self.store(store)?.get_typed(set_name).await?;
        let model = StoredModel::new(model_name, set, ranker)?;
        self.create(store, model, validation).await
    }
}
