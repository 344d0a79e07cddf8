//! Platform-agnostic core - shared between the WASM animator, CLI and viewer

pub mod buildings;
pub mod config;
pub mod constants;
pub mod driver;
pub mod error;
pub mod features;
pub mod generators;
pub mod geo;
pub mod parser;
pub mod proximity;
pub mod scene;

pub use buildings::{nearest_buildings, BuildingProxy, BuildingState, BuildingStates, HighlightTier, RoadProxy};
pub use config::AnimationConfig;
pub use driver::{AnimationDriver, DriverState, FrameContext, LayerFrame, MemorySink, ParticleScene, ParticleSink, TickOutcome};
pub use error::{AssetError, FrameError};
pub use features::{Feature, FeatureCollection, FeatureId, Geometry, ParticleStyle};
pub use geo::{interpolate, FadeRamp, LngLat};
pub use parser::{load_buildings, load_roads, parse_buildings, parse_roads};
pub use proximity::{nearest_k, nearest_within, ProximityQuery};
pub use scene::{MapScene, ParticleLayer};
