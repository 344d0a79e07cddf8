//! Animation tuning, loadable from JSON
//!
//! Keys are camelCase so the same file can be shared with the page that
//! embeds the WASM build. Missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use super::error::AssetError;
use super::parser::read_asset;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationConfig {
    /// Minimum wall-clock gap between regenerated frames (ms)
    pub throttle_ms: f64,
    /// Below this zoom level nothing is regenerated
    pub min_zoom: f64,
    /// Flow particles seeded per corridor segment
    pub particles_per_segment: usize,
    /// Progress added to a flow particle per frame, before per-particle variation
    pub particle_speed: f64,
    /// Particles walking each highlighted building perimeter
    pub perimeter_particles: usize,
    /// Particles walking each rendered road
    pub road_particles: usize,
    /// Halo particles around each green building
    pub halo_particles: usize,
    /// Radius for cogent neighbour highlighting (degrees)
    pub cogent_radius: f64,
    pub cogent_cap: usize,
    /// Radius for hover highlighting (degrees)
    pub hover_radius: f64,
    pub hover_cap: usize,
    /// Radius of the substation grid check (degrees)
    pub substation_radius: f64,
    /// Base road-glow reach around a green building (degrees, scaled by size)
    pub total_scale: f64,
    /// Fixed RNG seed for reproducible frames
    pub seed: Option<u64>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 25.0,
            min_zoom: 13.0,
            particles_per_segment: 50,
            particle_speed: 0.02,
            perimeter_particles: 30,
            road_particles: 10,
            halo_particles: 150,
            cogent_radius: 0.003,
            cogent_cap: 10,
            hover_radius: 0.005,
            hover_cap: 3,
            substation_radius: 0.002,
            total_scale: 0.006,
            seed: None,
        }
    }
}

impl AnimationConfig {
    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let text = read_asset(path)?;
        let config = Self::from_json(&text)?;
        debug!(path = %path.display(), ?config, "Loaded animation config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        let non_negative = [
            ("throttleMs", self.throttle_ms),
            ("particleSpeed", self.particle_speed),
            ("cogentRadius", self.cogent_radius),
            ("hoverRadius", self.hover_radius),
            ("substationRadius", self.substation_radius),
            ("totalScale", self.total_scale),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(AssetError::Config(format!("{} must be a non-negative number, got {}", name, value)));
            }
        }
        if !self.min_zoom.is_finite() {
            return Err(AssetError::Config("minZoom must be finite".into()));
        }
        if self.particle_speed >= 1.0 {
            return Err(AssetError::Config(format!(
                "particleSpeed must be below 1.0 (fraction of a segment per frame), got {}",
                self.particle_speed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AnimationConfig::from_json(r#"{"throttleMs": 50, "seed": 7}"#).unwrap();
        assert_eq!(config.throttle_ms, 50.0);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.min_zoom, 13.0);
        assert_eq!(config.cogent_cap, 10);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AnimationConfig::from_json(r#"{"throttleMs": -1}"#),
            Err(AssetError::Config(_))
        ));
        assert!(matches!(
            AnimationConfig::from_json(r#"{"particleSpeed": 2.0}"#),
            Err(AssetError::Config(_))
        ));
        assert!(matches!(AnimationConfig::from_json("not json"), Err(AssetError::Json(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = AnimationConfig::from_path("/nonexistent/atlas.json").unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }
}
