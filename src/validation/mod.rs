//! Write-time validation
//!
//! A write may carry a [`FeatureValidation`] directive naming a strategy.
//! The [`ValidationEngine`] looks the strategy up and runs it against the
//! element before anything is persisted.
//!
//! Built-in strategies:
//!
//! | strategy     | checks                                                    |
//! |--------------|-----------------------------------------------------------|
//! | `none`       | nothing                                                   |
//! | `structural` | templates, params, set membership, model compilation      |
//! | `sample`     | `structural`, then scores `params.feature_vector` (models) |

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::element::StorableElement;
use crate::error::{Error, Result};
use crate::metrics;
use crate::ranker::RankerParserFactory;

pub mod strategies;

pub use strategies::{NoValidation, SampleValidator, StructuralValidator};

/// A validation directive attached to a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureValidation {
    pub strategy: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl FeatureValidation {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }
}

/// A named validation strategy.
///
/// Returns the rejection reason on failure.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    fn validate(
        &self,
        element: &StorableElement,
        params: &Map<String, Value>,
    ) -> std::result::Result<(), String>;
}

pub struct ValidationEngine {
    validators: RwLock<HashMap<String, Arc<dyn Validator>>>,
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self {
            validators: RwLock::new(HashMap::new()),
        }
    }

    /// An engine with the `none`, `structural` and `sample` strategies
    pub fn with_defaults(factory: Arc<RankerParserFactory>) -> Self {
        let engine = Self::new();
        let structural = StructuralValidator::new(factory);
        engine.validators.write().extend([
            (
                NoValidation.name().to_string(),
                Arc::new(NoValidation) as Arc<dyn Validator>,
            ),
            (
                structural.name().to_string(),
                Arc::new(structural.clone()) as Arc<dyn Validator>,
            ),
            (
                SampleValidator::NAME.to_string(),
                Arc::new(SampleValidator::new(structural)) as Arc<dyn Validator>,
            ),
        ]);
        engine
    }

    pub fn register(&self, validator: Arc<dyn Validator>) -> Result<()> {
        let mut validators = self.validators.write();
        let name = validator.name();
        if validators.contains_key(name) {
            return Err(Error::AlreadyExists(format!(
                "Validation strategy [{}] already registered",
                name
            )));
        }
        validators.insert(name.to_string(), validator);
        Ok(())
    }

    /// Registered strategies, sorted
    pub fn strategies(&self) -> Vec<String> {
        let mut names: Vec<String> = self.validators.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a directive against an element. No directive always passes.
    pub fn validate(
        &self,
        element: &StorableElement,
        validation: Option<&FeatureValidation>,
    ) -> Result<()> {
        let Some(validation) = validation else {
            return Ok(());
        };
        let strategy = validation.strategy.as_str();
        let validator = self.validators.read().get(strategy).cloned();
        let outcome = match validator {
            Some(validator) => validator.validate(element, &validation.params),
            None => Err(format!("Unknown validation strategy [{}]", strategy)),
        };

        match outcome {
            Ok(()) => {
                debug!(strategy = %strategy, id = %element.id(), "Validation passed");
                Ok(())
            }
            Err(reason) => {
                metrics::record_validation_rejection(strategy);
                Err(Error::ValidationRejected(format!(
                    "[{}] rejected [{}]: {}",
                    strategy,
                    element.id(),
                    reason
                )))
            }
        }
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults(Arc::new(RankerParserFactory::with_defaults()))
    }
}
