//! Atlas particles - animated particle overlays for a map dashboard
//!
//! Turns road polylines and building footprints into per-frame GeoJSON
//! particle layers:
//! - Flow particles travelling along road segments
//! - Perimeter walkers tracing building outlines
//! - Jittered glow around "green" buildings, fading with distance
//! - Cogent links between a focused building and its nearest neighbours
//!
//! The platform-agnostic [`core`] is shared by the browser animator
//! (`wasm` feature), the headless CLI (`cli`) and the native viewer (`viewer`).

pub mod core;
pub mod time;

#[cfg(all(target_arch = "wasm32", feature = "wasm"))]
mod wasm;

#[cfg(feature = "viewer")]
pub mod theme;
#[cfg(feature = "viewer")]
pub mod viewer;
