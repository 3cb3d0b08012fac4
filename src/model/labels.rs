//! Label Registry
//!
//! The class index ↔ class name bijection fixed when training starts. It is
//! computed once from the training directory and saved next to the model so
//! inference never re-derives indices from a directory listing.
//!
//! On disk it is a JSON object keyed by the decimal class index:
//!
//! ```json
//! {"0": "Tomato_Early_blight", "1": "Tomato_healthy"}
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::utils::error::{PlantDoctorError, Result};

/// Bidirectional class index ↔ class name mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRegistry {
    names: Vec<String>,
    indices: HashMap<String, usize>,
}

impl LabelRegistry {
    /// Build a registry where `names[i]` is the class with index `i`
    ///
    /// Fails on an empty list or a duplicated name.
    pub fn from_class_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(PlantDoctorError::Dataset(
                "a label registry needs at least one class".to_string(),
            ));
        }

        let mut indices = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if indices.insert(name.clone(), idx).is_some() {
                return Err(PlantDoctorError::Dataset(format!(
                    "class name '{}' appears more than once",
                    name
                )));
            }
        }

        Ok(Self { names, indices })
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed registry; kept for API symmetry
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Class name for an index
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Class index for a name
    pub fn index(&self, name: &str) -> Option<usize> {
        self.indices.get(name).copied()
    }

    /// All class names in index order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Iterate over `(index, name)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }

    /// Fail with `ArtifactMismatch` unless the model emits one output per class
    pub fn ensure_matches(&self, model_outputs: usize) -> Result<()> {
        if self.len() != model_outputs {
            return Err(PlantDoctorError::ArtifactMismatch {
                registry: self.len(),
                model: model_outputs,
            });
        }
        Ok(())
    }

    /// Serialize to the `{"index": "name"}` JSON object
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse the `{"index": "name"}` JSON object
    ///
    /// Every key must be a decimal index and the indices must cover
    /// `0..len` without gaps.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;

        let mut by_index = BTreeMap::new();
        for (key, name) in raw {
            let idx: usize = key.trim().parse().map_err(|_| {
                PlantDoctorError::Serialization(format!(
                    "label registry key '{}' is not a class index",
                    key
                ))
            })?;
            if by_index.insert(idx, name).is_some() {
                return Err(PlantDoctorError::Serialization(format!(
                    "label registry lists class index {} more than once",
                    idx
                )));
            }
        }

        for (expected, idx) in by_index.keys().enumerate() {
            if *idx != expected {
                return Err(PlantDoctorError::Serialization(format!(
                    "label registry is missing class index {}",
                    expected
                )));
            }
        }

        Self::from_class_names(by_index.into_values())
    }

    /// Write the registry to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!("Saved {} class labels to {:?}", self.len(), path);
        Ok(())
    }

    /// Read a registry from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let registry = Self::from_json(&json)?;
        tracing::debug!("Loaded {} class labels from {:?}", registry.len(), path);
        Ok(registry)
    }
}

// Entries are emitted in numeric index order ("9" before "10")
impl Serialize for LabelRegistry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (idx, name) in self.iter() {
            map.serialize_entry(&idx.to_string(), name)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tomato_registry() -> LabelRegistry {
        LabelRegistry::from_class_names(["Tomato_healthy", "Tomato_Early_blight"]).unwrap()
    }

    #[test]
    fn test_bidirectional_lookup() {
        let registry = tomato_registry();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name(1), Some("Tomato_Early_blight"));
        assert_eq!(registry.index("Tomato_healthy"), Some(0));
        assert_eq!(registry.name(2), None);
        assert_eq!(registry.index("Potato___healthy"), None);
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(LabelRegistry::from_class_names(["a", "b", "a"]).is_err());
        assert!(LabelRegistry::from_class_names(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("class_labels.json");

        // More than ten classes so string-ordering bugs would show
        let names: Vec<String> = (0..12).map(|i| format!("Class_{:02}", 11 - i)).collect();
        let registry = LabelRegistry::from_class_names(names).unwrap();

        registry.save(&path).unwrap();
        let loaded = LabelRegistry::load(&path).unwrap();

        assert_eq!(loaded, registry);
        assert_eq!(loaded.name(10), Some("Class_01"));
    }

    #[test]
    fn test_json_uses_decimal_string_keys() {
        let json = tomato_registry().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["0"], "Tomato_healthy");
        assert_eq!(value["1"], "Tomato_Early_blight");
    }

    #[test]
    fn test_from_json_rejects_gaps_and_bad_keys() {
        assert!(LabelRegistry::from_json(r#"{"0": "a", "2": "b"}"#).is_err());
        assert!(LabelRegistry::from_json(r#"{"zero": "a"}"#).is_err());
        assert!(LabelRegistry::from_json("[]").is_err());
    }

    #[test]
    fn test_from_json_rejects_colliding_keys() {
        for json in [r#"{"0": "a", "00": "b", "1": "c"}"#, r#"{"0": "a", " 0": "b"}"#] {
            assert!(matches!(
                LabelRegistry::from_json(json),
                Err(PlantDoctorError::Serialization(_))
            ));
        }
    }

    #[test]
    fn test_ensure_matches() {
        let registry = tomato_registry();
        assert!(registry.ensure_matches(2).is_ok());

        match registry.ensure_matches(3) {
            Err(PlantDoctorError::ArtifactMismatch { registry, model }) => {
                assert_eq!(registry, 2);
                assert_eq!(model, 3);
            }
            other => panic!("expected ArtifactMismatch, got {:?}", other),
        }
    }
}
