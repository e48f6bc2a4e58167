//! Vector output: GeoJSON-compatible features
//!
//! Flood extents and catchments leave the core as `Feature`s so that
//! collaborators can store or render them without knowing about rasters.

use geo_types::Geometry;
use geojson::JsonObject;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    /// Numeric value as f64 (integers are widened)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(v) => Some(*v as f64),
            AttributeValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            AttributeValue::Null => Value::Null,
            AttributeValue::Bool(b) => json!(b),
            AttributeValue::Int(i) => json!(i),
            AttributeValue::Float(f) => json!(f),
            AttributeValue::String(s) => json!(s),
        }
    }
}

/// A geographic feature with an optional geometry and attributes.
///
/// A `None` geometry is a valid, explicit "nothing here" result (for
/// example an empty flood extent) and serializes as GeoJSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes, kept sorted for stable output
    pub properties: BTreeMap<String, AttributeValue>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: BTreeMap::new(),
        }
    }

    /// Create a feature with no geometry
    pub fn empty() -> Self {
        Self {
            geometry: None,
            properties: BTreeMap::new(),
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }

    /// GeoJSON `Feature` with the geometry converted by `geojson`.
    ///
    /// A missing geometry stays `None` and serializes as `"geometry": null`.
    pub fn to_geojson(&self) -> geojson::Feature {
        let properties: JsonObject = self
            .properties
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        geojson::Feature {
            bbox: None,
            geometry: self
                .geometry
                .as_ref()
                .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}
