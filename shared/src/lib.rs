use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Label recorded for an image in which no face was found.
pub const NO_FACE_DETECTED: &str = "No se detectó ninguna cara en la imagen.";

/// Canonical expression vocabulary of the face-expression model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

/// Per-image display labels keyed `emotion_<n>`, kept in submission order.
///
/// Serializes as a JSON object whose keys appear in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsMapping {
    entries: Vec<(String, String)>,
}

impl ResultsMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Key used for the image at 1-based `position`.
    pub fn key_for(position: usize) -> String {
        format!("emotion_{}", position)
    }

    /// Appends the label for the next image, returning the key it was stored under.
    pub fn push_label(&mut self, label: impl Into<String>) -> String {
        let key = Self::key_for(self.entries.len() + 1);
        self.entries.push((key.clone(), label.into()));
        key
    }

    /// Inserts an explicit key. An existing key keeps its position and takes the new label.
    pub fn insert(&mut self, key: impl Into<String>, label: impl Into<String>) {
        let key = key.into();
        let label = label.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = label,
            None => self.entries.push((key, label)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, label)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResultsMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = ResultsMapping::new();
        for (key, label) in iter {
            mapping.insert(key, label);
        }
        mapping
    }
}

impl Serialize for ResultsMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, label) in &self.entries {
            map.serialize_entry(key, label)?;
        }
        map.end()
    }
}

struct ResultsMappingVisitor;

impl<'de> Visitor<'de> for ResultsMappingVisitor {
    type Value = ResultsMapping;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of image keys to expression labels")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut mapping = ResultsMapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, label)) = access.next_entry::<String, String>()? {
            mapping.insert(key, label);
        }
        Ok(mapping)
    }
}

impl<'de> Deserialize<'de> for ResultsMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ResultsMappingVisitor)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeasibilityVerdict {
    pub success: bool,
    pub reliability: f64,
    pub consecutive_recognition: usize,
    pub emotion_prediction: String,
    pub results: ResultsMapping,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
