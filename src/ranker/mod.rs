//! Ranker compilation
//!
//! A stored [`StoredModel`] carries a ranker type and an opaque definition.
//! The [`RankerParserFactory`] turns it into a [`CompiledRanker`]: the parsed
//! ranker plus everything needed to map a feature-name → value mapping onto
//! the dense [`FeatureVector`] the ranker scores.
//!
//! ```text
//! StoredModel ──compile──▶ CompiledRanker ──bind(params)──▶ LeafFactory
//!                               │                               │
//!                           RankerCache                 new_instance(segment)
//!                    (store, name) → version                    │
//!                                                           Evaluator
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::element::{Normalizer, StoredFeatureSet, StoredModel};
use crate::error::{Error, Result};

pub mod cache;
pub mod linear;
pub mod loader;
pub mod parser;
pub mod tree;

pub use cache::RankerCache;
pub use linear::{LinearRanker, LinearRankerParser};
pub use loader::ModelLoader;
pub use parser::{RankerParser, RankerParserFactory};
pub use tree::{XGBoostJsonParser, XGBoostRanker};

/// Dense feature values indexed by feature ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
}

impl FeatureVector {
    /// A vector of `size` features, all `0.0`
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0.0; size],
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn get(&self, ordinal: usize) -> f64 {
        self.values.get(ordinal).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, ordinal: usize, value: f64) {
        if let Some(slot) = self.values.get_mut(ordinal) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// A parsed ranking function over a dense feature vector.
///
/// Rankers are immutable once parsed and are shared across threads.
pub trait Ranker: Send + Sync + fmt::Debug {
    fn ranker_type(&self) -> &str;

    /// Number of features the ranker expects
    fn size(&self) -> usize;

    fn score(&self, vector: &FeatureVector) -> f64;
}

/// Reads a ranker definition that may be inline JSON or a JSON document
/// embedded in a string.
pub(crate) fn definition_json(definition: &Value) -> Result<Value> {
    match definition {
        Value::String(raw) => serde_json::from_str(raw)
            .map_err(|e| Error::ParseError(format!("Malformed ranker definition: {}", e))),
        other => Ok(other.clone()),
    }
}

/// A model compiled for evaluation.
///
/// Identity is `(store, name, version)`; the artifact is immutable and can
/// be bound to any number of segments concurrently. Clones share the
/// parsed ranker and feature set.
#[derive(Debug, Clone)]
pub struct CompiledRanker {
    store: String,
    name: String,
    version: u64,
    feature_set: Arc<StoredFeatureSet>,
    normalizers: Arc<[Option<Normalizer>]>,
    ranker: Arc<dyn Ranker>,
}

impl CompiledRanker {
    pub(crate) fn new(
        store: impl Into<String>,
        model: &StoredModel,
        version: u64,
        ranker: Arc<dyn Ranker>,
    ) -> Self {
        let feature_set = Arc::new(model.feature_set().clone());
        let normalizers = feature_set
            .feature_names()
            .map(|name| model.feature_normalizers().get(name).cloned())
            .collect();
        Self {
            store: store.into(),
            name: model.name().to_string(),
            version,
            feature_set,
            normalizers,
            ranker,
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn feature_set(&self) -> &StoredFeatureSet {
        &self.feature_set
    }

    pub fn ranker(&self) -> &Arc<dyn Ranker> {
        &self.ranker
    }

    /// Builds the dense, normalized vector for a feature-name → value
    /// mapping. Features absent from the mapping score as `0.0` before
    /// normalization; names outside the feature set are ignored.
    pub fn feature_vector(&self, values: &HashMap<String, f64>) -> FeatureVector {
        self.layered_feature_vector(None, values)
    }

    /// Like [`feature_vector`](Self::feature_vector), reading `overrides`
    /// first and falling back to `values`.
    pub fn layered_feature_vector(
        &self,
        overrides: Option<&HashMap<String, f64>>,
        values: &HashMap<String, f64>,
    ) -> FeatureVector {
        let mut vector = FeatureVector::new(self.feature_set.size());
        for (ordinal, name) in self.feature_set.feature_names().enumerate() {
            let raw = overrides
                .and_then(|o| o.get(name))
                .or_else(|| values.get(name))
                .copied()
                .unwrap_or(0.0);
            let value = match &self.normalizers[ordinal] {
                Some(normalizer) => normalizer.normalize(raw),
                None => raw,
            };
            vector.set(ordinal, value);
        }
        vector
    }

    pub fn score(&self, vector: &FeatureVector) -> f64 {
        self.ranker.score(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{StoredFeature, StoredRankerDefinition};
    use serde_json::json;

    fn model() -> StoredModel {
        let features = ["a", "b"]
            .iter()
            .map(|n| StoredFeature::new(*n, vec![], json!({"match_all": {}})).unwrap())
            .collect();
        let set = StoredFeatureSet::new("set", features).unwrap();
        StoredModel::new(
            "m",
            set,
            StoredRankerDefinition::new("model/linear", json!({"a": 1.0, "b": 2.0})),
        )
        .unwrap()
        .with_normalizer(
            "b",
            Normalizer::MinMax {
                minimum: 0.0,
                maximum: 10.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_feature_vector_bounds() {
        let mut v = FeatureVector::new(2);
        v.set(5, 1.0);
        assert_eq!(v.get(5), 0.0);
        v.set(1, 3.0);
        assert_eq!(v.as_slice(), &[0.0, 3.0]);
    }

    #[test]
    fn test_definition_json_accepts_embedded_string() {
        let v = definition_json(&json!("{\"a\": 1.5}")).unwrap();
        assert_eq!(v["a"], 1.5);
        assert!(definition_json(&json!("{not json")).is_err());
    }

    #[test]
    fn test_feature_vector_normalizes_and_defaults() {
        let model = model();
        let ranker = LinearRankerParser
            .parse(model.feature_set(), &model.ranker().definition)
            .unwrap();
        let compiled = CompiledRanker::new("store", &model, 3, ranker);

        let mut values = HashMap::new();
        values.insert("b".to_string(), 5.0);
        values.insert("unknown".to_string(), 100.0);

        let vector = compiled.feature_vector(&values);
        assert_eq!(vector.as_slice(), &[0.0, 0.5]);
        assert_eq!(compiled.score(&vector), 1.0);
        assert_eq!(compiled.version(), 3);
    }
}
