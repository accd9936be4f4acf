//! Storable elements
//!
//! # Overview
//!
//! Everything persisted in a feature store is a `StorableElement`:
//!
//! ```text
//! StorableElement
//!   ├─ Feature     (a named query template)
//!   ├─ FeatureSet  (an ordered list of features)
//!   └─ Model       (a feature set snapshot + a ranker definition)
//! ```
//!
//! Elements are addressed by the composite key `(store, type, name)`. Inside
//! a store the document id is `"{type}-{name}"`, see [`composite_id`].
//!
//! # Storage Format
//!
//! Elements serialize to a single JSON object tagged by `type`:
//!
//! ```json
//! {
//!   "type": "feature",
//!   "name": "title_match",
//!   "params": ["keywords"],
//!   "template_language": "mustache",
//!   "template": {"match": {"title": "{{keywords}}"}}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub mod feature;
pub mod feature_set;
pub mod model;

pub use feature::StoredFeature;
pub use feature_set::StoredFeatureSet;
pub use model::{Normalizer, StoredModel, StoredRankerDefinition};

/// Maximum length of an element name in bytes.
pub const MAX_NAME_LENGTH: usize = 256;

/// Element type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Feature,
    #[serde(rename = "featureset")]
    FeatureSet,
    Model,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Feature => "feature",
            ElementType::FeatureSet => "featureset",
            ElementType::Model => "model",
        }
    }

    pub fn all() -> [ElementType; 3] {
        [ElementType::Feature, ElementType::FeatureSet, ElementType::Model]
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "feature" => Ok(ElementType::Feature),
            "featureset" => Ok(ElementType::FeatureSet),
            "model" => Ok(ElementType::Model),
            other => Err(Error::InvalidArgument(format!(
                "Unknown element type [{}]",
                other
            ))),
        }
    }
}

/// Builds the document id of an element inside its store.
///
/// Type tags never contain `-`, so everything before the first `-` is the
/// type and ids never collide across types.
pub fn composite_id(element_type: ElementType, name: &str) -> String {
    format!("{}-{}", element_type.as_str(), name)
}

/// Validates an element name.
///
/// Names must follow these rules:
/// 1. Not empty and at most [`MAX_NAME_LENGTH`] bytes
/// 2. Only ASCII letters, digits, `_`, `-` and `.`
/// 3. Not `.` or `..`, and not starting with `_`
///
/// # Examples
///
/// ```rust
/// use ltrstore::element::validate_name;
///
/// assert!(validate_name("title_match").is_ok());
/// assert!(validate_name("bm25.body-v2").is_ok());
///
/// assert!(validate_name("").is_err());
/// assert!(validate_name("a/b").is_err());
/// assert!(validate_name("..").is_err());
/// ```
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument(
            "Element name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "Element name cannot be longer than {} bytes",
            MAX_NAME_LENGTH
        )));
    }

    if name == "." || name == ".." {
        return Err(Error::InvalidArgument(format!(
            "Element name [{}] is reserved",
            name
        )));
    }

    if name.starts_with('_') {
        return Err(Error::InvalidArgument(format!(
            "Element name [{}] cannot start with an underscore",
            name
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(Error::InvalidArgument(format!(
            "Element name [{}] can only contain letters, numbers, '_', '-' and '.'",
            name
        )));
    }

    Ok(())
}

/// A versioned, named, typed document persisted in a feature store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StorableElement {
    #[serde(rename = "feature")]
    Feature(StoredFeature),
    #[serde(rename = "featureset")]
    FeatureSet(StoredFeatureSet),
    #[serde(rename = "model")]
    Model(StoredModel),
}

impl StorableElement {
    pub fn name(&self) -> &str {
        match self {
            StorableElement::Feature(f) => f.name(),
            StorableElement::FeatureSet(s) => s.name(),
            StorableElement::Model(m) => m.name(),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            StorableElement::Feature(_) => ElementType::Feature,
            StorableElement::FeatureSet(_) => ElementType::FeatureSet,
            StorableElement::Model(_) => ElementType::Model,
        }
    }

    pub fn id(&self) -> String {
        composite_id(self.element_type(), self.name())
    }

    /// Re-checks every name and feature template reachable from this element.
    ///
    /// Deserialized elements bypass the constructors, so parsers call this
    /// before handing an element out.
    pub fn verify(&self) -> Result<()> {
        match self {
            StorableElement::Feature(f) => f.verify(),
            StorableElement::FeatureSet(s) => s.verify(),
            StorableElement::Model(m) => m.verify(),
        }
    }

    /// Serializes the element into its stored source document.
    pub fn to_source(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses a stored source document.
    pub fn from_source(source: serde_json::Value) -> Result<Self> {
        let element: StorableElement = serde_json::from_value(source)
            .map_err(|e| Error::ParseError(format!("Malformed element source: {}", e)))?;
        element.verify().map_err(|e| match e {
            Error::InvalidArgument(msg) => Error::ParseError(msg),
            other => other,
        })?;
        Ok(element)
    }

    /// Parses a JSON payload as sent by a client.
    pub fn from_json(json: &str) -> Result<Self> {
        let source: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| Error::ParseError(format!("Malformed element payload: {}", e)))?;
        Self::from_source(source)
    }
}

impl From<StoredFeature> for StorableElement {
    fn from(feature: StoredFeature) -> Self {
        StorableElement::Feature(feature)
    }
}

impl From<StoredFeatureSet> for StorableElement {
    fn from(set: StoredFeatureSet) -> Self {
        StorableElement::FeatureSet(set)
    }
}

impl From<StoredModel> for StorableElement {
    fn from(model: StoredModel) -> Self {
        StorableElement::Model(model)
    }
}

/// A concrete element variant that can be extracted from a [`StorableElement`].
pub trait TypedElement: Sized + Into<StorableElement> {
    const TYPE: ElementType;

    fn from_element(element: StorableElement) -> Result<Self>;
}

macro_rules! typed_element {
    ($ty:ty, $variant:ident) => {
        impl TypedElement for $ty {
            const TYPE: ElementType = ElementType::$variant;

            fn from_element(element: StorableElement) -> Result<Self> {
                match element {
                    StorableElement::$variant(inner) => Ok(inner),
                    other => Err(Error::ParseError(format!(
                        "Expected element of type [{}] but found [{}]",
                        ElementType::$variant,
                        other.element_type()
                    ))),
                }
            }
        }
    };
}

typed_element!(StoredFeature, Feature);
typed_element!(StoredFeatureSet, FeatureSet);
typed_element!(StoredModel, Model);
