//! Native scripts
//!
//! Scripts in the `native` language are identified by their source text.
//! The only script shipped is `feature_extractor`, which scores a document
//! with one value of the query's feature vector scaled by a constant:
//!
//! ```json
//! {"lang": "native", "source": "feature_extractor",
//!  "params": {"feature_vector": {"f1": 3.0}, "dependent_feature": "f1"}}
//! ```

use std::sync::Arc;

use super::{
    DocId, EvaluationContext, Evaluator, ExecutableUnit, LeafFactory, ScriptContext, ScriptEngine,
    ScriptParams, SegmentContext,
};
use crate::error::{Error, Result};

pub const NATIVE_LANG: &str = "native";
pub const FEATURE_EXTRACTOR: &str = "feature_extractor";
pub const DEPENDENT_FEATURE: &str = "dependent_feature";
pub const SCALE: &str = "scale";
pub const DEFAULT_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeScriptEngine;

impl ScriptEngine for NativeScriptEngine {
    fn lang(&self) -> &'static str {
        NATIVE_LANG
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
                NATIVE_LANG, context
            )));
        }
        match source {
            FEATURE_EXTRACTOR => Ok(Arc::new(FeatureExtractor)),
            other => Err(Error::UnsupportedOperation(format!(
                "Unknown {} script [{}]",
                NATIVE_LANG, other
            ))),
        }
    }
}

struct FeatureExtractor;

impl ExecutableUnit for FeatureExtractor {
    fn bind(&self, params: ScriptParams) -> Result<Arc<dyn LeafFactory>> {
        let context = EvaluationContext::from_params(params)?;
        let dependent_feature = context.require_str(DEPENDENT_FEATURE)?;
        let scale = context.f64_or(SCALE, DEFAULT_SCALE)?;
        Ok(Arc::new(FeatureExtractorFactory {
            context: Arc::new(context),
            dependent_feature,
            scale,
        }))
    }
}

struct FeatureExtractorFactory {
    context: Arc<EvaluationContext>,
    dependent_feature: String,
    scale: f64,
}

impl LeafFactory for FeatureExtractorFactory {
    fn new_instance(&self, segment: &SegmentContext) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(FeatureExtractorEvaluator {
            context: Arc::clone(&self.context),
            dependent_feature: self.dependent_feature.clone(),
            scale: self.scale,
            segment: segment.clone(),
        }))
    }

    fn needs_score(&self) -> bool {
        false
    }
}

struct FeatureExtractorEvaluator {
    context: Arc<EvaluationContext>,
    dependent_feature: String,
    scale: f64,
    segment: SegmentContext,
}

impl Evaluator for FeatureExtractorEvaluator {
    fn evaluate(&mut self, doc: DocId) -> Result<f64> {
        self.segment.check_doc(doc)?;
        let value = self
            .segment
            .doc_features(doc)
            .and_then(|f| f.get(&self.dependent_feature).copied())
            .or_else(|| self.context.feature(&self.dependent_feature))
            .ok_or_else(|| Error::MissingParameter(self.dependent_feature.clone()))?;
        Ok(value * self.scale)
    }
}
