//! Stored feature set

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{validate_name, StoredFeature};
use crate::error::{Error, Result};

/// An ordered list of features. The position of a feature in the set is its
/// ordinal in every feature vector built from the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFeatureSet {
    name: String,
    #[serde(default)]
    features: Vec<StoredFeature>,
}

impl StoredFeatureSet {
    pub fn new(name: impl Into<String>, features: Vec<StoredFeature>) -> Result<Self> {
        let set = Self {
            name: name.into(),
            features,
        };
        set.verify()?;
        Ok(set)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[StoredFeature] {
        &self.features
    }

    pub fn size(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature(&self, name: &str) -> Option<&StoredFeature> {
        self.features.iter().find(|f| f.name() == name)
    }

    pub fn feature_ordinal(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name() == name)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|f| f.name())
    }

    /// Returns a new set with `features` appended after the existing ones.
    ///
    /// Ordinals of existing features are preserved. Fails if any appended
    /// feature shares a name with an existing one or with another appended
    /// feature.
    pub fn append(&self, features: Vec<StoredFeature>) -> Result<Self> {
        let mut merged = self.features.clone();
        for feature in features {
            if merged.iter().any(|f| f.name() == feature.name()) {
                return Err(Error::AlreadyExists(format!(
                    "Feature [{}] already exists in set [{}]",
                    feature.name(),
                    self.name
                )));
            }
            merged.push(feature);
        }
        Ok(Self {
            name: self.name.clone(),
            features: merged,
        })
    }

    /// Renames the set, keeping its features. Used when a set is snapshotted
    /// into a model.
    pub fn with_name(&self, name: impl Into<String>) -> Result<Self> {
        Self::new(name, self.features.clone())
    }

    pub(crate) fn verify(&self) -> Result<()> {
        validate_name(&self.name)?;
        let mut seen = HashSet::with_capacity(self.features.len());
        for feature in &self.features {
            feature.verify()?;
            if !seen.insert(feature.name()) {
                return Err(Error::InvalidArgument(format!(
                    "Feature set [{}] contains feature [{}] more than once",
                    self.name,
                    feature.name()
                )));
            }
        }
        Ok(())
    }
}
