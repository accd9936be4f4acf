//! Ranker parser registry

use super::{CompiledRanker, LinearRankerParser, Ranker, XGBoostJsonParser};
use crate::element::{StoredFeatureSet, StoredModel};
use crate::error::{Error, Result};
use crate::metrics;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Parses one ranker type's definition against a feature set.
///
/// Feature references must resolve to the set's ordinals; anything else is a
/// `ParseError`. Parsing has no side effects.
pub trait RankerParser: Send + Sync {
    fn ranker_type(&self) -> &'static str;

    fn parse(&self, feature_set: &StoredFeatureSet, definition: &Value) -> Result<Arc<dyn Ranker>>;
}

/// Registry of ranker parsers keyed by ranker type
pub struct RankerParserFactory {
    parsers: RwLock<HashMap<String, Arc<dyn RankerParser>>>,
}

impl RankerParserFactory {
    /// An empty factory
    pub fn new() -> Self {
        Self {
            parsers: RwLock::new(HashMap::new()),
        }
    }

    /// A factory with the built-in `model/linear` and `model/xgboost+json`
    /// parsers registered
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        factory.parsers.write().extend([
            (
                LinearRankerParser.ranker_type().to_string(),
                Arc::new(LinearRankerParser) as Arc<dyn RankerParser>,
            ),
            (
                XGBoostJsonParser.ranker_type().to_string(),
                Arc::new(XGBoostJsonParser) as Arc<dyn RankerParser>,
            ),
        ]);
        factory
    }

    /// Register a parser
    pub fn register(&self, parser: Arc<dyn RankerParser>) -> Result<()> {
        let mut parsers = self.parsers.write();
        let ranker_type = parser.ranker_type();
        if parsers.contains_key(ranker_type) {
            return Err(Error::AlreadyExists(format!(
                "Ranker parser [{}] already registered",
                ranker_type
            )));
        }
        parsers.insert(ranker_type.to_string(), parser);
        Ok(())
    }

    pub fn get(&self, ranker_type: &str) -> Option<Arc<dyn RankerParser>> {
        self.parsers.read().get(ranker_type).cloned()
    }

    /// List registered ranker types, sorted
    pub fn ranker_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.parsers.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Compile a model into an executable ranker.
    ///
    /// Deterministic: the same model content always yields an equivalent
    /// ranker. Nothing is cached here; see [`super::RankerCache`].
    pub fn compile(
        &self,
        store: &str,
        model: &StoredModel,
        version: u64,
    ) -> Result<CompiledRanker> {
        let ranker_type = model.ranker().ranker_type.as_str();
        let parser = self.get(ranker_type).ok_or_else(|| {
            Error::ParseError(format!(
                "Unsupported ranker type [{}] for model [{}]",
                ranker_type,
                model.name()
            ))
        })?;

        let started = Instant::now();
        let ranker = parser
            .parse(model.feature_set(), &model.ranker().definition)
            .map_err(|e| match e {
                Error::ParseError(reason) => Error::ParseError(format!(
                    "Failed to compile model [{}]: {}",
                    model.name(),
                    reason
                )),
                other => other,
            })?;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::observe_compile(ranker_type, elapsed);

        debug!(
            store = %store,
            model = %model.name(),
            version,
            ranker_type = %ranker_type,
            elapsed_secs = elapsed,
            "Compiled ranker"
        );

        Ok(CompiledRanker::new(store, model, version, ranker))
    }
}

impl Default for RankerParserFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}
