//! Error types for asset loading and frame generation

use thiserror::Error;

/// Failure loading GeoJSON or configuration from disk or a string.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a GeoJSON FeatureCollection, found {0}")]
    NotACollection(String),
    #[error("invalid config: {0}")]
    Config(String),
}

/// Failure producing or publishing one animation frame.
///
/// Never fatal: the driver logs it and tries again on the next tick.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("no geometry to animate")]
    EmptyGeometry,
    #[error("renderer rejected source {source_id}: {reason}")]
    SinkRejected { source_id: String, reason: String },
    #[error("failed to serialize frame: {0}")]
    Serialize(#[from] serde_json::Error),
}
