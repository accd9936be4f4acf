//! Segments and parallel scoring

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{DocId, FeatureValues, LeafFactory};
use crate::error::{Error, Result};

/// One independently searchable partition of the host index.
///
/// Documents are addressed by segment-local ids in `0..max_doc`. A segment
/// may carry precomputed per-document feature values which take precedence
/// over the query-level feature vector.
#[derive(Debug, Clone, Default)]
pub struct SegmentContext {
    ord: usize,
    doc_base: DocId,
    max_doc: DocId,
    doc_features: Option<Arc<HashMap<DocId, FeatureValues>>>,
}

impl SegmentContext {
    pub fn new(ord: usize, doc_base: DocId, max_doc: DocId) -> Self {
        Self {
            ord,
            doc_base,
            max_doc,
            doc_features: None,
        }
    }

    pub fn with_doc_features(mut self, features: HashMap<DocId, FeatureValues>) -> Self {
        self.doc_features = Some(Arc::new(features));
        self
    }

    pub fn ord(&self) -> usize {
        self.ord
    }

    pub fn doc_base(&self) -> DocId {
        self.doc_base
    }

    pub fn max_doc(&self) -> DocId {
        self.max_doc
    }

    pub fn doc_features(&self, doc: DocId) -> Option<&FeatureValues> {
        self.doc_features.as_ref().and_then(|f| f.get(&doc))
    }

    pub fn check_doc(&self, doc: DocId) -> Result<()> {
        if doc >= self.max_doc {
            return Err(Error::InvalidArgument(format!(
                "Document [{}] out of range for segment [{}] with max_doc [{}]",
                doc, self.ord, self.max_doc
            )));
        }
        Ok(())
    }
}

/// Raw match score supplier for factories that need one
pub type RawScore<'a> = &'a (dyn Fn(&SegmentContext, DocId) -> f64 + Sync);

/// Score every document of every segment, one evaluator per segment.
///
/// Segments are scored in parallel; results are returned in segment order.
pub fn score_segments(
    factory: &dyn LeafFactory,
    segments: &[SegmentContext],
    raw_score: Option<RawScore<'_>>,
) -> Result<Vec<Vec<f64>>> {
    let needs_score = factory.needs_score();
    if needs_score && raw_score.is_none() {
        return Err(Error::InvalidArgument(
            "Script needs the raw score but none was supplied".to_string(),
        ));
    }
    debug!(segments = segments.len(), needs_score, "Scoring segments");

    segments
        .par_iter()
        .map(|segment| {
            let mut evaluator = factory.new_instance(segment)?;
            (0..segment.max_doc())
                .map(|doc| {
                    if let Some(score) = raw_score.filter(|_| needs_score) {
                        evaluator.set_score(score(segment, doc));
                    }
                    evaluator.evaluate(doc)
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}
