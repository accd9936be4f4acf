//! Built-in validation strategies

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

use super::Validator;
use crate::element::{StorableElement, StoredFeature, StoredFeatureSet, StoredModel};
use crate::ranker::{CompiledRanker, RankerParserFactory};
use crate::script::context::parse_feature_values;
use crate::script::FEATURE_VECTOR;

type Outcome = std::result::Result<(), String>;

/// Accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValidation;

impl Validator for NoValidation {
    fn name(&self) -> &'static str {
        "none"
    }

    fn validate(&self, _element: &StorableElement, _params: &Map<String, Value>) -> Outcome {
        Ok(())
    }
}

/// Checks that an element is well formed and, for models, that the ranker
/// definition compiles.
#[derive(Clone)]
pub struct StructuralValidator {
    factory: Arc<RankerParserFactory>,
}

impl StructuralValidator {
    pub const NAME: &'static str = "structural";

    pub fn new(factory: Arc<RankerParserFactory>) -> Self {
        Self { factory }
    }

    fn check_feature(feature: &StoredFeature) -> Outcome {
        let empty = match feature.template() {
            Value::Null => return Err(format!("feature [{}] has no template", feature.name())),
            Value::String(s) => s.trim().is_empty(),
            Value::Object(o) => o.is_empty(),
            Value::Array(a) => a.is_empty(),
            _ => false,
        };
        if empty {
            return Err(format!("feature [{}] has an empty template", feature.name()));
        }

        let mut seen = HashSet::new();
        for param in feature.params() {
            if param.is_empty() {
                return Err(format!("feature [{}] declares an empty param", feature.name()));
            }
            if !seen.insert(param.as_str()) {
                return Err(format!(
                    "feature [{}] declares param [{}] twice",
                    feature.name(),
                    param
                ));
            }
        }
        Ok(())
    }

    fn check_set(set: &StoredFeatureSet) -> Outcome {
        if set.is_empty() {
            return Err(format!("feature set [{}] has no features", set.name()));
        }
        let mut seen = HashSet::new();
        for feature in set.features() {
            if !seen.insert(feature.name()) {
                return Err(format!(
                    "feature set [{}] contains feature [{}] twice",
                    set.name(),
                    feature.name()
                ));
            }
            Self::check_feature(feature)?;
        }
        Ok(())
    }

    fn compile(&self, model: &StoredModel) -> std::result::Result<CompiledRanker, String> {
        Self::check_set(model.feature_set())?;
        self.factory
            .compile("_validation", model, 0)
            .map_err(|e| e.to_string())
    }
}

impl Validator for StructuralValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, element: &StorableElement, _params: &Map<String, Value>) -> Outcome {
        match element {
            StorableElement::Feature(feature) => Self::check_feature(feature),
            StorableElement::FeatureSet(set) => Self::check_set(set),
            StorableElement::Model(model) => self.compile(model).map(|_| ()),
        }
    }
}

/// `structural`, plus a trial scoring of models against the
/// `feature_vector` directive param
#[derive(Clone)]
pub struct SampleValidator {
    structural: StructuralValidator,
}

impl SampleValidator {
    pub const NAME: &'static str = "sample";

    pub fn new(structural: StructuralValidator) -> Self {
        Self { structural }
    }
}

impl Validator for SampleValidator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, element: &StorableElement, params: &Map<String, Value>) -> Outcome {
        let StorableElement::Model(model) = element else {
            return self.structural.validate(element, params);
        };

        let compiled = self.structural.compile(model)?;
        let sample = params
            .get(FEATURE_VECTOR)
            .ok_or_else(|| format!("missing param [{}]", FEATURE_VECTOR))?;
        let values = parse_feature_values(sample).map_err(|e| e.to_string())?;
        let score = compiled.score(&compiled.feature_vector(&values));
        if !score.is_finite() {
            return Err(format!("model [{}] scored the sample as [{}]", model.name(), score));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::StoredRankerDefinition;
    use serde_json::json;

    fn structural() -> StructuralValidator {
        StructuralValidator::new(Arc::new(RankerParserFactory::with_defaults()))
    }

    fn feature(name: &str, template: Value) -> StoredFeature {
        StoredFeature::new(name, vec![], template).unwrap()
    }

    fn model(definition: Value) -> StorableElement {
        let set =
            StoredFeatureSet::new("set", vec![feature("f1", json!({"match_all": {}}))]).unwrap();
        StoredModel::new("m1", set, StoredRankerDefinition::new("model/linear", definition))
            .unwrap()
            .into()
    }

    #[test]
    fn test_feature_templates() {
        let v = structural();
        let params = Map::new();
        assert!(v.validate(&feature("f", json!({"match_all": {}})).into(), &params).is_ok());
        assert!(v.validate(&feature("f", json!("doc['x']")).into(), &params).is_ok());
        for empty in [json!(""), json!("  "), json!({}), json!([])] {
            assert!(v.validate(&feature("f", empty).into(), &params).is_err());
        }
    }

    #[test]
    fn test_feature_params() {
        let v = structural();
        let dup =
            StoredFeature::new("f", vec!["q".into(), "q".into()], json!({"term": {}})).unwrap();
        let err = v.validate(&dup.into(), &Map::new()).unwrap_err();
        assert!(err.contains("twice"));

        let blank = StoredFeature::new("f", vec!["".into()], json!({"term": {}})).unwrap();
        assert!(v.validate(&blank.into(), &Map::new()).is_err());
    }

    #[test]
    fn test_sets() {
        let v = structural();
        let empty = StoredFeatureSet::new("set", vec![]).unwrap();
        assert!(v.validate(&empty.into(), &Map::new()).is_err());

        let bad_member = StoredFeatureSet::new("set", vec![feature("f", json!(""))]).unwrap();
        assert!(v.validate(&bad_member.into(), &Map::new()).is_err());
    }

    #[test]
    fn test_model_must_compile() {
        let v = structural();
        assert!(v.validate(&model(json!({"f1": 1.0})), &Map::new()).is_ok());
        let err = v.validate(&model(json!({"f9": 1.0})), &Map::new()).unwrap_err();
        assert!(err.contains("f9"));
    }

    #[test]
    fn test_sample_scores_models() {
        let v = SampleValidator::new(structural());
        let mut params = Map::new();

        let err = v.validate(&model(json!({"f1": 1.0})), &params).unwrap_err();
        assert!(err.contains(FEATURE_VECTOR));

        params.insert(FEATURE_VECTOR.to_string(), json!({"f1": 2.0}));
        assert!(v.validate(&model(json!({"f1": 1.0})), &params).is_ok());

        // Features and sets only get the structural checks
        assert!(v
            .validate(&feature("f", json!({"match_all": {}})).into(), &Map::new())
            .is_ok());
    }

    #[test]
    fn test_sample_rejects_non_finite_score() {
        let v = SampleValidator::new(structural());
        let set =
            StoredFeatureSet::new("set", vec![feature("f1", json!({"match_all": {}}))]).unwrap();
        let overflowing = StoredModel::new(
            "m1",
            set,
            StoredRankerDefinition::new(
                "model/xgboost+json",
                json!([{"nodeid": 0, "leaf": 1.0e308}, {"nodeid": 0, "leaf": 1.0e308}]),
            ),
        )
        .unwrap();

        let mut params = Map::new();
        params.insert(FEATURE_VECTOR.to_string(), json!({"f1": 1.0}));
        let err = v.validate(&overflowing.into(), &params).unwrap_err();
        assert!(err.contains("inf"));
    }
}
