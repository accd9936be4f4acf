//! Stored ranking model

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::{validate_name, StoredFeatureSet};
use crate::error::{Error, Result};

/// Ranker type plus its opaque definition, e.g.
/// `{"type": "model/linear", "definition": {"f1": 10.0}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRankerDefinition {
    #[serde(rename = "type")]
    pub ranker_type: String,
    pub definition: Value,
}

impl StoredRankerDefinition {
    pub fn new(ranker_type: impl Into<String>, definition: Value) -> Self {
        Self {
            ranker_type: ranker_type.into(),
            definition,
        }
    }
}

/// Per-feature normalization applied before the ranker sees a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalizer {
    Standard { mean: f64, standard_deviation: f64 },
    MinMax { minimum: f64, maximum: f64 },
}

impl Normalizer {
    pub fn normalize(&self, value: f64) -> f64 {
        match *self {
            Normalizer::Standard {
                mean,
                standard_deviation,
            } => (value - mean) / standard_deviation,
            Normalizer::MinMax { minimum, maximum } => (value - minimum) / (maximum - minimum),
        }
    }

    fn check(&self) -> std::result::Result<(), String> {
        match *self {
            Normalizer::Standard {
                standard_deviation, ..
            } if !(standard_deviation > 0.0) => {
                Err("standard_deviation must be greater than 0".to_string())
            }
            Normalizer::MinMax { minimum, maximum } if !(maximum > minimum) => {
                Err("maximum must be greater than minimum".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A ranking model: a snapshot of the feature set it was trained on plus the
/// ranker definition compiled at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    name: String,
    feature_set: StoredFeatureSet,
    #[serde(rename = "model")]
    ranker: StoredRankerDefinition,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    feature_normalizers: HashMap<String, Normalizer>,
}

impl StoredModel {
    pub fn new(
        name: impl Into<String>,
        feature_set: StoredFeatureSet,
        ranker: StoredRankerDefinition,
    ) -> Result<Self> {
        let model = Self {
            name: name.into(),
            feature_set,
            ranker,
            feature_normalizers: HashMap::new(),
        };
        model.verify()?;
        Ok(model)
    }

    /// Attaches a normalizer to a feature of the model's set (builder pattern).
    pub fn with_normalizer(
        mut self,
        feature: impl Into<String>,
        normalizer: Normalizer,
    ) -> Result<Self> {
        self.feature_normalizers.insert(feature.into(), normalizer);
        self.verify()?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn feature_set(&self) -> &StoredFeatureSet {
        &self.feature_set
    }

    pub fn ranker(&self) -> &StoredRankerDefinition {
        &self.ranker
    }

    pub fn feature_normalizers(&self) -> &HashMap<String, Normalizer> {
        &self.feature_normalizers
    }

    pub(crate) fn verify(&self) -> Result<()> {
        validate_name(&self.name)?;
        self.feature_set.verify()?;
        if self.ranker.ranker_type.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "Model [{}] requires a ranker type",
                self.name
            )));
        }
        for (feature, normalizer) in &self.feature_normalizers {
            if self.feature_set.feature_ordinal(feature).is_none() {
                return Err(Error::InvalidArgument(format!(
                    "Model [{}] normalizes unknown feature [{}]",
                    self.name, feature
                )));
            }
            normalizer.check().map_err(|reason| {
                Error::InvalidArgument(format!(
                    "Invalid normalizer for feature [{}]: {}",
                    feature, reason
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::StoredFeature;
    use serde_json::json;

    fn set() -> StoredFeatureSet {
        let f = StoredFeature::new("f1", vec![], json!({"match_all": {}})).unwrap();
        StoredFeatureSet::new("set", vec![f]).unwrap()
    }

    #[test]
    fn test_model_serializes_ranker_under_model_key() {
        let model = StoredModel::new(
            "m1",
            set(),
            StoredRankerDefinition::new("model/linear", json!({"f1": 10.0})),
        )
        .unwrap();
        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["model"]["type"], "model/linear");
        assert_eq!(value["feature_set"]["name"], "set");
        assert!(value.get("feature_normalizers").is_none());
    }

    #[test]
    fn test_normalizers() {
        let standard = Normalizer::Standard {
            mean: 2.0,
            standard_deviation: 2.0,
        };
        assert_eq!(standard.normalize(6.0), 2.0);

        let min_max = Normalizer::MinMax {
            minimum: 0.0,
            maximum: 4.0,
        };
        assert_eq!(min_max.normalize(1.0), 0.25);
    }

    #[test]
    fn test_normalizer_wire_format() {
        let n: Normalizer =
            serde_json::from_value(json!({"min_max": {"minimum": 1.0, "maximum": 3.0}})).unwrap();
        assert_eq!(
            n,
            Normalizer::MinMax {
                minimum: 1.0,
                maximum: 3.0
            }
        );
    }

    #[test]
    fn test_normalizer_on_unknown_feature_rejected() {
        let model = StoredModel::new(
            "m1",
            set(),
            StoredRankerDefinition::new("model/linear", json!({})),
        )
        .unwrap();
        let err = model
            .with_normalizer(
                "missing",
                Normalizer::Standard {
                    mean: 0.0,
                    standard_deviation: 1.0,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_degenerate_normalizer_rejected() {
        let model = StoredModel::new(
            "m1",
            set(),
            StoredRankerDefinition::new("model/linear", json!({})),
        )
        .unwrap();
        assert!(model
            .with_normalizer(
                "f1",
                Normalizer::MinMax {
                    minimum: 1.0,
                    maximum: 1.0
                }
            )
            .is_err());
    }
}
