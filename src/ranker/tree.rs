//! Gradient boosted regression trees (XGBoost JSON dump)
//!
//! Definition format (`model/xgboost+json`) is either the raw array of trees
//! produced by `dump_model(..., dump_format="json")` or an object wrapping it
//! with the training objective:
//!
//! ```json
//! {
//!   "objective": "reg:logistic",
//!   "splits": [
//!     {"nodeid": 0, "split": "f1", "split_condition": 0.5, "yes": 1, "no": 2,
//!      "missing": 1, "children": [
//!        {"nodeid": 1, "leaf": -0.4},
//!        {"nodeid": 2, "leaf": 0.7}
//!     ]}
//!   ]
//! }
//! ```
//!
//! A split sends a document to `yes` when `value < split_condition`, to
//! `no` otherwise, and to `missing` (default `yes`) when the value is NaN.

use super::{definition_json, FeatureVector, Ranker, RankerParser};
use crate::element::StoredFeatureSet;
use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const XGBOOST_RANKER_TYPE: &str = "model/xgboost+json";

/// Output transform derived from the training objective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Identity,
    Logistic,
}

impl Objective {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "reg:linear" | "reg:squarederror" | "rank:pairwise" | "rank:ndcg" | "rank:map" => {
                Ok(Objective::Identity)
            }
            "reg:logistic" | "binary:logistic" => Ok(Objective::Logistic),
            other => Err(Error::ParseError(format!(
                "Unsupported xgboost objective [{}]",
                other
            ))),
        }
    }

    fn apply(&self, raw: f64) -> f64 {
        match self {
            Objective::Identity => raw,
            Objective::Logistic => 1.0 / (1.0 + (-raw).exp()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        yes: usize,
        no: usize,
        missing_goes_yes: bool,
    },
    Leaf(f64),
}

/// Tree ensemble stored as one node arena; `roots` index the first node of
/// each tree.
#[derive(Debug, Clone, PartialEq)]
pub struct XGBoostRanker {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    size: usize,
    objective: Objective,
}

impl XGBoostRanker {
    pub fn tree_count(&self) -> usize {
        self.roots.len()
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    fn eval_tree(&self, root: usize, vector: &FeatureVector) -> f64 {
        let mut current = root;
        loop {
            match self.nodes[current] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    yes,
                    no,
                    missing_goes_yes,
                } => {
                    let value = vector.get(feature);
                    current = if value.is_nan() {
                        if missing_goes_yes {
                            yes
                        } else {
                            no
                        }
                    } else if value < threshold {
                        yes
                    } else {
                        no
                    };
                }
            }
        }
    }
}

impl Ranker for XGBoostRanker {
    fn ranker_type(&self) -> &str {
        XGBOOST_RANKER_TYPE
    }

    fn size(&self) -> usize {
        self.size
    }

    fn score(&self, vector: &FeatureVector) -> f64 {
        let raw: f64 = self
            .roots
            .iter()
            .map(|&root| self.eval_tree(root, vector))
            .sum();
        self.objective.apply(raw)
    }
}

#[derive(Debug, Deserialize)]
struct JsonNode {
    nodeid: u32,
    #[serde(default)]
    split: Option<String>,
    #[serde(default)]
    split_condition: Option<f64>,
    #[serde(default)]
    yes: Option<u32>,
    #[serde(default)]
    no: Option<u32>,
    #[serde(default)]
    missing: Option<u32>,
    #[serde(default)]
    children: Vec<JsonNode>,
    #[serde(default)]
    leaf: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct JsonModel {
    #[serde(default)]
    objective: Option<String>,
    splits: Vec<JsonNode>,
}

struct TreeBuilder<'a> {
    feature_set: &'a StoredFeatureSet,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, node: &JsonNode) -> Result<usize> {
        if let Some(leaf) = node.leaf {
            if node.split.is_some() || !node.children.is_empty() {
                return Err(Error::ParseError(format!(
                    "Node [{}] cannot be both a leaf and a split",
                    node.nodeid
                )));
            }
            self.nodes.push(Node::Leaf(leaf));
            return Ok(self.nodes.len() - 1);
        }

        let split = node.split.as_deref().ok_or_else(|| {
            Error::ParseError(format!(
                "Node [{}] has neither a leaf value nor a split",
                node.nodeid
            ))
        })?;
        let feature = self.feature_set.feature_ordinal(split).ok_or_else(|| {
            Error::ParseError(format!(
                "Unknown feature [{}] in feature set [{}]",
                split,
                self.feature_set.name()
            ))
        })?;
        let field = |value: Option<u32>, name: &str| {
            value.ok_or_else(|| {
                Error::ParseError(format!("Split node [{}] is missing [{}]", node.nodeid, name))
            })
        };
        let threshold = node.split_condition.ok_or_else(|| {
            Error::ParseError(format!(
                "Split node [{}] is missing [split_condition]",
                node.nodeid
            ))
        })?;
        let yes_id = field(node.yes, "yes")?;
        let no_id = field(node.no, "no")?;
        let missing_id = node.missing.unwrap_or(yes_id);
        if missing_id != yes_id && missing_id != no_id {
            return Err(Error::ParseError(format!(
                "Split node [{}] sends missing values to unknown node [{}]",
                node.nodeid, missing_id
            )));
        }
        if node.children.len() != 2 {
            return Err(Error::ParseError(format!(
                "Split node [{}] must have exactly 2 children",
                node.nodeid
            )));
        }
        let child = |id: u32| {
            node.children.iter().find(|c| c.nodeid == id).ok_or_else(|| {
                Error::ParseError(format!(
                    "Split node [{}] references missing child [{}]",
                    node.nodeid, id
                ))
            })
        };
        let yes_child = child(yes_id)?;
        let no_child = child(no_id)?;

        // Reserve the slot so the split precedes its subtrees in the arena
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf(0.0));
        let yes = self.build(yes_child)?;
        let no = self.build(no_child)?;
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            yes,
            no,
            missing_goes_yes: missing_id == yes_id,
        };
        Ok(index)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XGBoostJsonParser;

impl RankerParser for XGBoostJsonParser {
    fn ranker_type(&self) -> &'static str {
        XGBOOST_RANKER_TYPE
    }

    fn parse(&self, feature_set: &StoredFeatureSet, definition: &Value) -> Result<Arc<dyn Ranker>> {
        let definition = definition_json(definition)?;
        let model: JsonModel = if definition.is_array() {
            JsonModel {
                objective: None,
                splits: serde_json::from_value(definition)
                    .map_err(|e| Error::ParseError(format!("Malformed xgboost trees: {}", e)))?,
            }
        } else {
            serde_json::from_value(definition)
                .map_err(|e| Error::ParseError(format!("Malformed xgboost model: {}", e)))?
        };

        let objective = match model.objective.as_deref() {
            Some(name) => Objective::parse(name)?,
            None => Objective::Identity,
        };

        let mut builder = TreeBuilder {
            feature_set,
            nodes: Vec::new(),
        };
        let roots = model
            .splits
            .iter()
            .map(|tree| builder.build(tree))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(XGBoostRanker {
            nodes: builder.nodes,
            roots,
            size: feature_set.size(),
            objective,
        }))
    }
}
