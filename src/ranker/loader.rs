//! Stored model loading

use std::sync::Arc;
use tracing::debug;

use super::{CompiledRanker, RankerCache, RankerParserFactory};
use crate::config::LtrSettings;
use crate::element::StoredModel;
use crate::error::Result;
use crate::storage::DocumentIndex;
use crate::store::IndexFeatureStore;

/// Resolves stored models into compiled rankers.
///
/// Every load re-reads the model from its store, so a new version is picked
/// up by the next query after the update. With a cache, compilation only
/// happens once per version.
pub struct ModelLoader {
    index: Arc<dyn DocumentIndex>,
    factory: Arc<RankerParserFactory>,
    cache: Option<Arc<RankerCache>>,
}

impl ModelLoader {
    pub fn new(index: Arc<dyn DocumentIndex>, factory: Arc<RankerParserFactory>) -> Self {
        Self {
            index,
            factory,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<RankerCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// A loader with a fresh cache when `settings.ranker_cache` is on
    pub fn from_settings(
        index: Arc<dyn DocumentIndex>,
        factory: Arc<RankerParserFactory>,
        settings: &LtrSettings,
    ) -> Self {
        let loader = Self::new(index, factory);
        if settings.ranker_cache {
            loader.with_cache(Arc::new(RankerCache::new()))
        } else {
            loader
        }
    }

    pub fn cache(&self) -> Option<&Arc<RankerCache>> {
        self.cache.as_ref()
    }

    pub fn factory(&self) -> &Arc<RankerParserFactory> {
        &self.factory
    }

    /// Load the current version of model `name` from `store`.
    pub async fn load(&self, store: &str, name: &str) -> Result<Arc<CompiledRanker>> {
        let feature_store = IndexFeatureStore::new(store, Arc::clone(&self.index))?;
        let (model, version) = feature_store
            .get_typed_versioned::<StoredModel>(name)
            .await?;

        if let Some(cached) = self
            .cache
            .as_ref()
            .and_then(|cache| cache.get(store, name, version))
        {
            debug!(store = %store, model = %name, version, "Ranker cache hit");
            return Ok(cached);
        }

        let compiled = Arc::new(self.factory.compile(store, &model, version)?);
        if let Some(cache) = &self.cache {
            cache.insert(Arc::clone(&compiled));
        }
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{StorableElement, StoredFeature, StoredFeatureSet, StoredRankerDefinition};
    use crate::error::Error;
    use crate::ranker::FeatureVector;
    use crate::storage::InMemoryIndex;
    use crate::store::DEFAULT_STORE;
    use serde_json::json;

    fn model(weight: f64) -> StorableElement {
        let f = StoredFeature::new("f1", vec![], json!({"match_all": {}})).unwrap();
        let set = StoredFeatureSet::new("set", vec![f]).unwrap();
        StoredModel::new(
            "m1",
            set,
            StoredRankerDefinition::new("model/linear", json!({"f1": weight})),
        )
        .unwrap()
        .into()
    }

    async fn setup() -> (IndexFeatureStore, ModelLoader) {
        let index: Arc<dyn DocumentIndex> = Arc::new(InMemoryIndex::new());
        index.create_index(DEFAULT_STORE).await.unwrap();
        let store = IndexFeatureStore::new(DEFAULT_STORE, Arc::clone(&index)).unwrap();
        let loader = ModelLoader::new(index, Arc::new(RankerParserFactory::with_defaults()))
            .with_cache(Arc::new(RankerCache::new()));
        (store, loader)
    }

    #[tokio::test]
    async fn test_reuses_compiled_version() -> Result<()> {
        let (store, loader) = setup().await;
        store.create(&model(10.0)).await?;

        let first = loader.load(DEFAULT_STORE, "m1").await?;
        let second = loader.load(DEFAULT_STORE, "m1").await?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.version(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_picks_up_new_version() -> Result<()> {
        let (store, loader) = setup().await;
        store.create(&model(10.0)).await?;
        let v1 = loader.load(DEFAULT_STORE, "m1").await?;

        store.update(&model(2.0), 1).await?;
        let v2 = loader.load(DEFAULT_STORE, "m1").await?;
        assert_eq!(v2.version(), 2);

        let vector = FeatureVector::from_values(vec![3.0]);
        assert_eq!(v1.score(&vector), 30.0);
        assert_eq!(v2.score(&vector), 6.0);
        assert_eq!(loader.cache().map(|c| c.len()), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_model() {
        let (_, loader) = setup().await;
        assert!(matches!(
            loader.load(DEFAULT_STORE, "m1").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            loader.load("products", "m1").await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_settings() {
        let index: Arc<dyn DocumentIndex> = Arc::new(InMemoryIndex::new());
        let factory = Arc::new(RankerParserFactory::with_defaults());
        let settings = LtrSettings {
            ranker_cache: false,
            ..LtrSettings::default()
        };
        assert!(ModelLoader::from_settings(Arc::clone(&index), Arc::clone(&factory), &settings)
            .cache()
            .is_none());
        assert!(
            ModelLoader::from_settings(index, factory, &LtrSettings::default())
                .cache()
                .is_some()
        );
    }
}
