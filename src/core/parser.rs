//! GeoJSON parser for road and building layers
//!
//! Accepts the static asset files (and rendered-feature dumps) as plain
//! FeatureCollections. Malformed features are skipped, not fatal.

use serde_json::Value;
use std::path::Path;
use tracing::{debug, trace, warn};

use super::buildings::{BuildingProxy, RoadProxy};
use super::error::AssetError;
use super::features::FeatureId;
use super::geo::LngLat;

/// Parse road polylines. MultiLineStrings contribute one road per part.
pub fn parse_roads(json: &str) -> Result<Vec<RoadProxy>, AssetError> {
    let features = collection_features(json)?;
    let mut roads = Vec::with_capacity(features.len());

    for feature in &features {
        let id = feature_id(feature);
        let geometry = &feature["geometry"];
        let lines: Vec<Vec<LngLat>> = match geometry["type"].as_str() {
            Some("LineString") => parse_line(&geometry["coordinates"]).into_iter().collect(),
            Some("MultiLineString") => geometry["coordinates"]
                .as_array()
                .map(|parts| parts.iter().filter_map(parse_line).collect())
                .unwrap_or_default(),
            other => {
                trace!(geometry_type = ?other, "Skipping non-line road feature");
                Vec::new()
            }
        };

        for coords in lines {
            if coords.len() < 2 {
                trace!(?id, "Skipping road with fewer than two vertices");
                continue;
            }
            roads.push(RoadProxy { id: id.clone(), coords });
        }
    }

    debug!(features = features.len(), roads = roads.len(), "Parsed roads");
    Ok(roads)
}

/// Parse building footprints. MultiPolygons use their first polygon.
pub fn parse_buildings(json: &str) -> Result<Vec<BuildingProxy>, AssetError> {
    let features = collection_features(json)?;
    let mut buildings = Vec::with_capacity(features.len());

    for feature in &features {
        let geometry = &feature["geometry"];
        let rings = match geometry["type"].as_str() {
            Some("Polygon") => &geometry["coordinates"],
            Some("MultiPolygon") => &geometry["coordinates"][0],
            other => {
                trace!(geometry_type = ?other, "Skipping non-polygon building feature");
                continue;
            }
        };

        let Some(ring) = parse_line(&rings[0]).filter(|r| !r.is_empty()) else {
            warn!(id = ?feature_id(feature), "Building without a usable outer ring");
            continue;
        };

        let properties = feature["properties"].as_object().cloned().unwrap_or_default();
        buildings.push(BuildingProxy {
            id: feature_id(feature),
            height: properties.get("height").and_then(Value::as_f64),
            area: properties.get("area").and_then(Value::as_f64),
            ring,
            properties,
        });
    }

    debug!(features = features.len(), buildings = buildings.len(), "Parsed buildings");
    Ok(buildings)
}

/// Read a text asset from disk.
pub fn read_asset(path: impl AsRef<Path>) -> Result<String, AssetError> {
    let path = path.as_ref();
    std::fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_roads(path: impl AsRef<Path>) -> Result<Vec<RoadProxy>, AssetError> {
    parse_roads(&read_asset(path)?)
}

pub fn load_buildings(path: impl AsRef<Path>) -> Result<Vec<BuildingProxy>, AssetError> {
    parse_buildings(&read_asset(path)?)
}

fn collection_features(json: &str) -> Result<Vec<Value>, AssetError> {
    let mut root: Value = serde_json::from_str(json)?;
    match root["type"].as_str() {
        Some("FeatureCollection") => {}
        other => return Err(AssetError::NotACollection(other.unwrap_or("no type").to_string())),
    }
    match root["features"].take() {
        Value::Array(features) => Ok(features),
        _ => Err(AssetError::NotACollection("FeatureCollection without features".into())),
    }
}

/// `properties.id` wins over the feature's own id
fn feature_id(feature: &Value) -> Option<FeatureId> {
    FeatureId::from_value(&feature["properties"]["id"]).or_else(|| FeatureId::from_value(&feature["id"]))
}

fn parse_line(value: &Value) -> Option<Vec<LngLat>> {
    let points = value.as_array()?;
    let mut coords = Vec::with_capacity(points.len());
    for point in points {
        let lng = point[0].as_f64()?;
        let lat = point[1].as_f64()?;
        if !lng.is_finite() || !lat.is_finite() {
            return None;
        }
        coords.push([lng, lat]);
    }
    Some(coords)
}
