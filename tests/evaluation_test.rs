//! Script evaluation across segments

use ltrstore::element::{StoredFeature, StoredFeatureSet, StoredModel, StoredRankerDefinition};
use ltrstore::error::{Error, Result};
use ltrstore::ranker::{ModelLoader, RankerParserFactory};
use ltrstore::script::{
    score_segments, DocId, Evaluator, ExecutableUnit, LeafFactory, ScriptContext, ScriptEngine,
    ScriptParams, ScriptService, SegmentContext,
};
use ltrstore::storage::{DocumentIndex, InMemoryIndex};
use ltrstore::store::IndexFeatureStore;
use ltrstore::DEFAULT_STORE;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

fn params(value: Value) -> ScriptParams {
    serde_json::from_value(value).expect("Failed to build params")
}

fn segments() -> Vec<SegmentContext> {
    vec![
        SegmentContext::new(0, 0, 4),
        SegmentContext::new(1, 4, 3),
        SegmentContext::new(2, 7, 5),
    ]
}

fn model() -> StoredModel {
    let features = ["title", "body"]
        .iter()
        .map(|name| {
            StoredFeature::new(*name, vec!["q".to_string()], json!({"match": {"text": "{{q}}"}}))
                .expect("Failed to build feature")
        })
        .collect();
    let set = StoredFeatureSet::new("set1", features).expect("Failed to build set");
    StoredModel::new(
        "m1",
        set,
        StoredRankerDefinition::new("model/linear", json!({"title": 2.0, "body": 0.5})),
    )
    .expect("Failed to build model")
}

#[test]
fn test_feature_extractor_over_segments() -> Result<()> {
    let service = ScriptService::default();
    let unit = service.compile("native", None, "feature_extractor", &ScriptContext::Search)?;
    let factory = unit.bind(params(json!({
        "feature_vector": {"f1": 3.0},
        "dependent_feature": "f1"
    })))?;

    let scores = score_segments(factory.as_ref(), &segments(), None)?;
    assert_eq!(scores.len(), 3);
    assert_eq!(scores[0], vec![30.0; 4]);
    assert_eq!(scores[1], vec![30.0; 3]);
    assert_eq!(scores[2], vec![30.0; 5]);
    Ok(())
}

#[test]
fn test_native_missing_parameters() {
    let service = ScriptService::default();
    let unit = service
        .compile("native", None, "feature_extractor", &ScriptContext::Aggs)
        .expect("Failed to compile feature_extractor");

    for (p, missing) in [
        (json!({"dependent_feature": "f1"}), "feature_vector"),
        (json!({"feature_vector": {}}), "dependent_feature"),
    ] {
        match unit.bind(params(p)) {
            Err(Error::MissingParameter(name)) => assert_eq!(name, missing),
            Err(other) => panic!("Unexpected error: {:?}", other),
            Ok(_) => panic!("Expected missing [{}]", missing),
        }
    }

    assert!(matches!(
        service.compile("native", None, "unknown_script", &ScriptContext::Search),
        Err(Error::UnsupportedOperation(_))
    ));
    assert!(matches!(
        service.compile("mustache", None, "feature_extractor", &ScriptContext::Search),
        Err(Error::UnsupportedOperation(_))
    ));
}

#[tokio::test]
async fn test_stored_model_over_segments() -> Result<()> {
    let index: Arc<dyn DocumentIndex> = Arc::new(InMemoryIndex::new());
    index.create_index(DEFAULT_STORE).await?;
    let store = IndexFeatureStore::new(DEFAULT_STORE, Arc::clone(&index))?;
    store.create(&model().into()).await?;

    let loader = ModelLoader::new(index, Arc::new(RankerParserFactory::with_defaults()));
    let compiled = loader.load(DEFAULT_STORE, "m1").await?;
    let unit: Arc<dyn ExecutableUnit> = compiled;
    let factory = unit.bind(params(json!({"feature_vector": {"title": 1.0, "body": 2.0}})))?;
    assert!(!factory.needs_score());

    let mut doc_features = HashMap::new();
    doc_features.insert(2, HashMap::from([("title".to_string(), 5.0)]));
    let segments = vec![
        SegmentContext::new(0, 0, 3).with_doc_features(doc_features),
        SegmentContext::new(1, 3, 2),
    ];

    let scores = score_segments(factory.as_ref(), &segments, None)?;
    assert_eq!(scores, vec![vec![3.0, 3.0, 11.0], vec![3.0, 3.0]]);

    // Same inputs, same scores
    assert_eq!(score_segments(factory.as_ref(), &segments, None)?, scores);
    Ok(())
}

#[test]
fn test_inline_model_script() -> Result<()> {
    let service = ScriptService::default();
    let source = serde_json::to_string(&model())?;
    let unit = service.compile("ltr", Some("inline"), &source, &ScriptContext::Search)?;

    let factory = unit.bind(params(json!({"feature_vector": {"title": 4.0}})))?;
    let mut evaluator = factory.new_instance(&SegmentContext::new(0, 0, 1))?;
    assert_eq!(evaluator.evaluate(0)?, 8.0);
    assert!(matches!(evaluator.evaluate(1), Err(Error::InvalidArgument(_))));
    Ok(())
}

/// Multiplies the raw match score by a `boost` param
struct BoostEngine;

struct BoostUnit;

struct BoostFactory {
    boost: f64,
}

struct BoostEvaluator {
    boost: f64,
    score: Option<f64>,
}

impl ScriptEngine for BoostEngine {
    fn lang(&self) -> &'static str {
        "boost"
    }

    fn compile(
        &self,
        _name: Option<&str>,
        _source: &str,
        _context: &ScriptContext,
    ) -> Result<Arc<dyn ExecutableUnit>> {
        Ok(Arc::new(BoostUnit))
    }
}

impl ExecutableUnit for BoostUnit {
    fn bind(&self, params: ScriptParams) -> Result<Arc<dyn LeafFactory>> {
        let boost = params
            .get("boost")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::MissingParameter("boost".to_string()))?;
        Ok(Arc::new(BoostFactory { boost }))
    }
}

impl LeafFactory for BoostFactory {
    fn new_instance(&self, _segment: &SegmentContext) -> Result<Box<dyn Evaluator>> {
        Ok(Box::new(BoostEvaluator {
            boost: self.boost,
            score: None,
        }))
    }

    fn needs_score(&self) -> bool {
        true
    }
}

impl Evaluator for BoostEvaluator {
    fn set_score(&mut self, score: f64) {
        self.score = Some(score);
    }

    fn evaluate(&mut self, _doc: DocId) -> Result<f64> {
        let score = self
            .score
            .take()
            .ok_or_else(|| Error::InvalidArgument("No raw score set".to_string()))?;
        Ok(score * self.boost)
    }
}

#[test]
fn test_custom_engine_receives_raw_scores() -> Result<()> {
    let service = ScriptService::default();
    service.register(Arc::new(BoostEngine))?;
    assert!(matches!(
        service.register(Arc::new(BoostEngine)),
        Err(Error::AlreadyExists(_))
    ));

    let unit = service.compile("boost", None, "", &ScriptContext::Search)?;
    let factory = unit.bind(params(json!({"boost": 2.0})))?;

    let raw: &(dyn Fn(&SegmentContext, DocId) -> f64 + Sync) =
        &|segment, doc| (segment.doc_base() + doc) as f64;
    let scores = score_segments(factory.as_ref(), &segments(), Some(raw))?;
    assert_eq!(scores[1], vec![8.0, 10.0, 12.0]);

    assert!(matches!(
        score_segments(factory.as_ref(), &segments(), None),
        Err(Error::InvalidArgument(_))
    ));
    Ok(())
}
