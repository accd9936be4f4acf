//! Linear ranker
//!
//! Definition format (`model/linear`): an object mapping feature names to
//! weights.
//!
//! ```json
//! {"title_match": 1.5, "recency": -0.25}
//! ```
//!
//! Features of the set without a weight contribute nothing.

use super::{definition_json, FeatureVector, Ranker, RankerParser};
use crate::element::StoredFeatureSet;
use crate::error::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

pub const LINEAR_RANKER_TYPE: &str = "model/linear";

/// Weighted sum of feature values
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRanker {
    weights: Vec<f64>,
}

impl LinearRanker {
    pub fn new(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Ranker for LinearRanker {
    fn ranker_type(&self) -> &str {
        LINEAR_RANKER_TYPE
    }

    fn size(&self) -> usize {
        self.weights.len()
    }

    fn score(&self, vector: &FeatureVector) -> f64 {
        self.weights
            .iter()
            .zip(vector.as_slice())
            .map(|(w, v)| w * v)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRankerParser;

impl RankerParser for LinearRankerParser {
    fn ranker_type(&self) -> &'static str {
        LINEAR_RANKER_TYPE
    }

    fn parse(&self, feature_set: &StoredFeatureSet, definition: &Value) -> Result<Arc<dyn Ranker>> {
        let definition = definition_json(definition)?;
        let object = definition.as_object().ok_or_else(|| {
            Error::ParseError("Linear ranker definition must be an object of weights".to_string())
        })?;

        let mut weights = vec![0.0; feature_set.size()];
        for (feature, weight) in object {
            let ordinal = feature_set.feature_ordinal(feature).ok_or_else(|| {
                Error::ParseError(format!(
                    "Unknown feature [{}] in feature set [{}]",
                    feature,
                    feature_set.name()
                ))
            })?;
            let weight = weight.as_f64().ok_or_else(|| {
                Error::ParseError(format!("Weight of feature [{}] is not a number", feature))
            })?;
            weights[ordinal] = weight;
        }

        Ok(Arc::new(LinearRanker::new(weights)))
    }
}
