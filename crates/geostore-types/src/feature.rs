use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::item::{Item, ItemRef};

/// Reference item: a keyed geometry with free-form JSON properties.
///
/// Encoded as JSON. Concrete applications usually bring their own item
/// types; `Feature` backs the command-line tool and the test suites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub key: String,
    /// Flattened lat/lng pairs.
    pub position: Vec<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

impl Feature {
    pub fn new(key: impl Into<String>, position: Vec<f64>) -> Self {
        Self {
            key: key.into(),
            position,
            properties: BTreeMap::new(),
        }
    }

    /// A single-coordinate feature.
    pub fn point(key: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self::new(key, vec![lat, lng])
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Decode bytes produced by [`Item::encode`] into a shared item handle.
    ///
    /// Matches the decoder signature expected when opening a store.
    pub fn decode(bytes: &[u8]) -> Result<ItemRef, TypeError> {
        let feature: Feature =
            serde_json::from_slice(bytes).map_err(|e| TypeError::Decode(e.to_string()))?;
        Ok(Arc::new(feature))
    }

    /// Decode bytes into a concrete `Feature`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        serde_json::from_slice(bytes).map_err(|e| TypeError::Decode(e.to_string()))
    }
}

impl Item for Feature {
    fn position(&self) -> Vec<f64> {
        self.position.clone()
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn encode(&self) -> Result<Vec<u8>, TypeError> {
        serde_json::to_vec(self).map_err(|e| TypeError::Encode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_preserves_properties() {
        let f = Feature::point("cafe", 48.85, 2.35).with_property("rating", 4);
        let bytes = f.encode().unwrap();
        assert_eq!(Feature::from_bytes(&bytes).unwrap(), f);

        let item = Feature::decode(&bytes).unwrap();
        assert_eq!(item.key(), "cafe");
        assert_eq!(item.position(), vec![48.85, 2.35]);
    }

    #[test]
    fn empty_properties_are_omitted() {
        let bytes = Feature::point("a", 1.0, 2.0).encode().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("properties"));
    }

    #[test]
    fn garbage_is_decode_error() {
        assert!(matches!(
            Feature::decode(b"\x00\x01not json"),
            Err(TypeError::Decode(_))
        ));
    }
}
