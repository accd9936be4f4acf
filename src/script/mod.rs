//! Script runtime integration
//!
//! Ranking logic plugs into a host search runtime through a narrow set of
//! capability traits:
//!
//! ```text
//! ScriptEngine::compile(name, source)      once per program
//!   └─→ ExecutableUnit::bind(params)        once per query
//!        └─→ LeafFactory::new_instance(seg) once per segment
//!             └─→ Evaluator::evaluate(doc)  once per matching document
//! ```
//!
//! Executable units and leaf factories are shared across threads. An
//! evaluator belongs to exactly one segment and one thread.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

pub mod context;
pub mod native;
pub mod ranker;
pub mod segment;
pub mod service;

pub use context::{EvaluationContext, FeatureValues, FEATURE_VECTOR};
pub use native::NativeScriptEngine;
pub use ranker::RankerScriptEngine;
pub use segment::{score_segments, SegmentContext};
pub use service::ScriptService;

/// Segment-local document id
pub type DocId = u32;

/// Query-time script parameters
pub type ScriptParams = HashMap<String, Value>;

/// Where in query execution a script runs
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScriptContext {
    Search,
    Aggs,
    Other(String),
}

impl ScriptContext {
    pub fn name(&self) -> &str {
        match self {
            ScriptContext::Search => "search",
            ScriptContext::Aggs => "aggs",
            ScriptContext::Other(name) => name,
        }
    }

    /// Contexts that score documents
    pub fn is_scoring(&self) -> bool {
        matches!(self, ScriptContext::Search | ScriptContext::Aggs)
    }
}

impl fmt::Display for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scripting backend registered with the host runtime.
pub trait ScriptEngine: Send + Sync {
    /// The language name used in script requests to refer to this backend
    fn lang(&self) -> &'static str;

    /// Compile a script.
    ///
    /// # Arguments
    /// * `name` - stored script identifier, `None` for inline scripts
    /// * `source` - script source
    /// * `context` - where the script will run
    fn compile(
        &self,
        name: Option<&str>,
        source: &str,
        context: &ScriptContext,
    ) -> Result<Arc<dyn ExecutableUnit>>;
}

/// A compiled program, reusable across queries.
pub trait ExecutableUnit: Send + Sync {
    /// Bind query parameters. Every missing required parameter is reported
    /// as `MissingParameter` naming it.
    fn bind(&self, params: ScriptParams) -> Result<Arc<dyn LeafFactory>>;
}

/// A program bound to one query's parameters.
pub trait LeafFactory: Send + Sync {
    fn new_instance(&self, segment: &SegmentContext) -> Result<Box<dyn Evaluator>>;

    /// Whether evaluators need the document's raw match score. The runtime
    /// calls [`Evaluator::set_score`] before each evaluation when true.
    fn needs_score(&self) -> bool;
}

/// Per-segment scorer, used by a single thread.
pub trait Evaluator: Send {
    fn set_score(&mut self, _score: f64) {}

    fn evaluate(&mut self, doc: DocId) -> Result<f64>;
}
