//! Evaluation context
//!
//! Parameters are read once at bind time into an immutable
//! [`EvaluationContext`] that evaluators share through an `Arc`.

use serde_json::Value;
use std::collections::HashMap;

use super::ScriptParams;
use crate::error::{Error, Result};

/// Name of the feature-vector parameter
pub const FEATURE_VECTOR: &str = "feature_vector";

/// Feature name → value
pub type FeatureValues = HashMap<String, f64>;

/// Parse a feature-vector mapping (`{"f1": 3.0, ...}`).
pub fn parse_feature_values(value: &Value) -> Result<FeatureValues> {
    let object = value.as_object().ok_or_else(|| {
        Error::InvalidArgument(format!("Parameter [{}] must be an object", FEATURE_VECTOR))
    })?;
    object
        .iter()
        .map(|(name, v)| {
            v.as_f64().map(|n| (name.clone(), n)).ok_or_else(|| {
                Error::InvalidArgument(format!("Feature [{}] must be numeric", name))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationContext {
    feature_vector: FeatureValues,
    params: ScriptParams,
}

impl EvaluationContext {
    /// Build a context; `feature_vector` is always required.
    pub fn from_params(params: ScriptParams) -> Result<Self> {
        let raw = params
            .get(FEATURE_VECTOR)
            .ok_or_else(|| Error::MissingParameter(FEATURE_VECTOR.to_string()))?;
        let feature_vector = parse_feature_values(raw)?;
        Ok(Self {
            feature_vector,
            params,
        })
    }

    pub fn feature_vector(&self) -> &FeatureValues {
        &self.feature_vector
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.feature_vector.get(name).copied()
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// A required parameter rendered as a string
    pub fn require_str(&self, name: &str) -> Result<String> {
        match self.params.get(name) {
            None | Some(Value::Null) => Err(Error::MissingParameter(name.to_string())),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Ok(other.to_string()),
        }
    }

    /// An optional numeric parameter
    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.params.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| {
                Error::InvalidArgument(format!("Parameter [{}] must be numeric", name))
            }),
        }
    }
}
