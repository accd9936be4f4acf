//! Model scripts
//!
//! The `ltr` language compiles a stored model's JSON content into a
//! [`CompiledRanker`]. Binding it takes the query's `feature_vector`; each
//! evaluation scores the vector, layered under any per-document values the
//! segment carries.

use std::sync::Arc;

use super::{
    DocId, EvaluationContext, Evaluator, ExecutableUnit, LeafFactory, ScriptContext, ScriptEngine,
    ScriptParams, SegmentContext,
};
use crate::element::StoredModel;
use crate::error::{Error, Result};
use crate::ranker::{CompiledRanker, FeatureVector, RankerParserFactory};

pub const RANKER_LANG: &str = "ltr";

/// Store recorded on rankers compiled from inline script source. Store
/// names cannot start with `_`, so it never collides with a real store.
pub const INLINE_STORE: &str = "_script";

pub struct RankerScriptEngine {
    factory: Arc<RankerParserFactory>,
}

impl RankerScriptEngine {
    pub fn new(factory: Arc<RankerParserFactory>) -> Self {
        Self { factory }
    }
}

impl Default for RankerScriptEngine {
    fn default() -> Self {
        Self::new(Arc::new(RankerParserFactory::with_defaults()))
    }
}

impl ScriptEngine for RankerScriptEngine {
    fn lang(&self) -> &'static str {
        RANKER_LANG
    }

    fn compile(
        &self,
        _name: Option<&str>,
        source: &str,
        context: &ScriptContext,
    ) -> Result<Arc<dyn ExecutableUnit>> {
        if !context.is_scoring() {
            return Err(Error::UnsupportedOperation(format!(
                "{} scripts cannot be used for context [{}]",
                RANKER_LANG, context
            )));
        }
        let model: StoredModel = serde_json::from_str(source)
            .map_err(|e| Error::ParseError(format!("Malformed model script: {}", e)))?;
        model.verify()?;
        let compiled = self.factory.compile(INLINE_STORE, &model, 0)?;
        Ok(Arc::new(compiled))
    }
}

impl ExecutableUnit for CompiledRanker {
    fn bind(&self, params: ScriptParams) -> Result<Arc<dyn LeafFactory>> {
        let context = EvaluationContext::from_params(params)?;
        let query_vector = self.feature_vector(context.feature_vector());
        Ok(Arc::new(RankerLeafFactory {
            ranker: self.clone(),
            context: Arc::new(context),
            query_vector: Arc::new(query_vector),
        }))
    }
}

struct RankerLeafFactory {
    ranker: CompiledRanker,
    context: Arc<EvaluationContext>,
    query_vector: Arc<FeatureVector>,
}

impl LeafFactory for RankerLeafFactory {
    fn new_instance(&self, segment: &SegmentContext) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(RankerEvaluator {
            ranker: self.ranker.clone(),
            context: Arc::clone(&self.context),
            query_vector: Arc::clone(&self.query_vector),
            segment: segment.clone(),
        }))
    }

    fn needs_score(&self) -> bool {
        false
    }
}

struct RankerEvaluator {
    ranker: CompiledRanker,
    context: Arc<EvaluationContext>,
    query_vector: Arc<FeatureVector>,
    segment: SegmentContext,
}

impl Evaluator for RankerEvaluator {
    fn evaluate(&mut self, doc: DocId) -> Result<f64> {
        self.segment.check_doc(doc)?;
        let score = match self.segment.doc_features(doc) {
            Some(overrides) => {
                let vector = self
                    .ranker
                    .layered_feature_vector(Some(overrides), self.context.feature_vector());
                self.ranker.score(&vector)
            }
            None => self.ranker.score(&self.query_vector),
        };
        Ok(score)
    }
}
