//! GeoJSON feature types handed to the map renderer
//!
//! Only the subset the overlays produce or consume: points, line strings
//! and polygons with a free-form property bag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::geo::LngLat;

/// Renderer feature id. Vector tiles use numbers, hand-made GeoJSON often strings.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Num(u64),
    Str(String),
}

impl FeatureId {
    /// Parse an id from a JSON value; floats with no fraction count as numbers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(FeatureId::Num).or_else(|| Self::from_f64(n.as_f64()?)),
            Value::String(s) if !s.is_empty() => Some(FeatureId::Str(s.clone())),
            _ => None,
        }
    }

    /// Numeric id from a float; rejects fractions, negatives and non-finite values.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
            Some(FeatureId::Num(value as u64))
        } else {
            None
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Num(n) => write!(f, "{}", n),
            FeatureId::Str(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: LngLat },
    LineString { coordinates: Vec<LngLat> },
    Polygon { coordinates: Vec<Vec<LngLat>> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<FeatureId>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub geometry: Geometry,
}

impl Feature {
    pub fn point(coordinates: LngLat, properties: Map<String, Value>) -> Self {
        Self {
            id: None,
            properties,
            geometry: Geometry::Point { coordinates },
        }
    }

    pub fn line(coordinates: Vec<LngLat>, properties: Map<String, Value>) -> Self {
        Self {
            id: None,
            properties,
            geometry: Geometry::LineString { coordinates },
        }
    }

    /// Numeric property lookup
    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<Vec<Feature>> for FeatureCollection {
    fn from(features: Vec<Feature>) -> Self {
        Self { features }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// Paint attributes read by the circle layers (`particleSize`, `opacity`, `color`).
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleStyle {
    pub size: f64,
    pub opacity: f64,
    pub color: String,
}

impl ParticleStyle {
    pub fn new(size: f64, opacity: f64, color: impl Into<String>) -> Self {
        Self {
            size,
            opacity,
            color: color.into(),
        }
    }

    pub fn to_properties(&self) -> Map<String, Value> {
        let mut props = Map::with_capacity(3);
        props.insert("particleSize".into(), Value::from(self.size));
        props.insert("opacity".into(), Value::from(self.opacity));
        props.insert("color".into(), Value::from(self.color.clone()));
        props
    }

    /// Point feature carrying this style
    pub fn particle(&self, at: LngLat) -> Feature {
        Feature::point(at, self.to_properties())
    }
}

/// CSS `rgba()` color string
pub fn rgba(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({}, {}, {}, {:.3})", r, g, b, a.clamp(0.0, 1.0))
}
