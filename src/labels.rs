//! Class label map loaded from the `class_map.json` artifact
//!
//! The label artifact has the shape `{ "classes": [..], "class_to_idx": {..} }`
//! where `class_to_idx` is optional. Index position in `classes` is the class
//! identity shared with the model's logits output.

use crate::error::{ClassifierError, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Deserialize)]
struct RawClassMap {
    classes: Vec<String>,
    #[serde(default)]
    class_to_idx: Option<HashMap<String, usize>>,
}

/// Ordered class names, index-aligned with the model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelMap {
    classes: Vec<String>,
}

impl ClassLabelMap {
    /// Build a label map from an ordered list of class names
    ///
    /// # Errors
    /// - Empty list
    /// - Empty or duplicate class names
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            return Err(ClassifierError::load(
                "Label map must contain at least one class",
            ));
        }

        let mut seen = HashSet::with_capacity(classes.len());
        for (index, name) in classes.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ClassifierError::load(format!(
                    "Label map entry {} is empty",
                    index
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ClassifierError::load(format!(
                    "Label map contains duplicate class '{}'",
                    name
                )));
            }
        }

        Ok(Self { classes })
    }

    /// Parse and validate the JSON label artifact
    ///
    /// # Errors
    /// - Not valid JSON, or `classes` missing / not an array of strings
    /// - Any violation reported by [`ClassLabelMap::new`]
    /// - `class_to_idx` present but inconsistent with `classes`
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let raw: RawClassMap = serde_json::from_slice(bytes).map_err(|e| {
            ClassifierError::artifact_error_with_context(
                "parse",
                "label map",
                &e.to_string(),
                &["expected {\"classes\": [\"...\"]}"],
            )
        })?;

        let map = Self::new(raw.classes)?;

        if let Some(class_to_idx) = raw.class_to_idx {
            map.check_class_to_idx(&class_to_idx)?;
        }

        Ok(map)
    }

    fn check_class_to_idx(&self, class_to_idx: &HashMap<String, usize>) -> Result<()> {
        if class_to_idx.len() != self.classes.len() {
            return Err(ClassifierError::load(format!(
                "class_to_idx has {} entries but classes has {}",
                class_to_idx.len(),
                self.classes.len()
            )));
        }

        for (index, name) in self.classes.iter().enumerate() {
            match class_to_idx.get(name) {
                Some(&mapped) if mapped == index => {},
                Some(&mapped) => {
                    return Err(ClassifierError::load(format!(
                        "class_to_idx maps '{}' to {} but it is listed at {}",
                        name, mapped, index
                    )));
                },
                None => {
                    return Err(ClassifierError::load(format!(
                        "class_to_idx is missing class '{}'",
                        name
                    )));
                },
            }
        }

        Ok(())
    }

    /// Class name at `index`, if any
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Class name at `index`, or the synthetic `class_<index>` label
    #[must_use]
    pub fn label_or_synthetic(&self, index: usize) -> String {
        self.get(index)
            .map_or_else(|| format!("class_{}", index), ToString::to_string)
    }

    /// Number of classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Always false for a validated map
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate class names in index order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Whether `name` is one of the classes
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name)
    }
}
