//! Stored feature

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::validate_name;
use crate::error::{Error, Result};

/// Default template language for features.
pub const DEFAULT_TEMPLATE_LANGUAGE: &str = "mustache";

fn default_template_language() -> String {
    DEFAULT_TEMPLATE_LANGUAGE.to_string()
}

/// A named, parameterized query template whose score becomes one entry of a
/// feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFeature {
    name: String,

    /// Query-time parameters the template expects.
    #[serde(default)]
    params: Vec<String>,

    #[serde(default = "default_template_language")]
    template_language: String,

    /// Opaque template body; never interpreted by the store.
    template: Value,
}

impl StoredFeature {
    pub fn new(name: impl Into<String>, params: Vec<String>, template: Value) -> Result<Self> {
        let feature = Self {
            name: name.into(),
            params,
            template_language: default_template_language(),
            template,
        };
        feature.verify()?;
        Ok(feature)
    }

    pub(crate) fn verify(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.template.is_null() {
            return Err(Error::InvalidArgument(format!(
                "Feature [{}] requires a template",
                self.name
            )));
        }
        Ok(())
    }

    pub fn with_template_language(mut self, language: impl Into<String>) -> Self {
        self.template_language = language.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn template_language(&self) -> &str {
        &self.template_language
    }

    pub fn template(&self) -> &Value {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_feature_defaults() {
        let f = StoredFeature::new(
            "title",
            vec!["keywords".to_string()],
            json!({"match": {"title": "{{keywords}}"}}),
        )
        .unwrap();
        assert_eq!(f.name(), "title");
        assert_eq!(f.template_language(), "mustache");
        assert_eq!(f.params(), ["keywords".to_string()]);
    }

    #[test]
    fn test_null_template_rejected() {
        assert!(StoredFeature::new("f", vec![], Value::Null).is_err());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let f: StoredFeature =
            serde_json::from_value(json!({"name": "f", "template": "doc['x']"})).unwrap();
        assert!(f.params().is_empty());
        assert_eq!(f.template_language(), DEFAULT_TEMPLATE_LANGUAGE);
    }
}
