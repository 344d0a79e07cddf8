//! Native preview window for the particle overlays
//!
//! Run with: cargo run --features viewer --bin atlas-viewer -- --buildings buildings.geojson

use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use atlas_particles::core::constants::DC_CORRIDORS;
use atlas_particles::core::{load_buildings, load_roads, AnimationConfig, MapScene};
use atlas_particles::viewer::ViewerApp;

#[derive(Parser, Debug)]
#[command(name = "atlas-viewer", version, about = "Preview map particle overlays in a native window")]
struct Args {
    /// Road GeoJSON. Uses the DC corridors when omitted
    #[arg(long)]
    roads: Option<PathBuf>,

    /// Building GeoJSON
    #[arg(long)]
    buildings: Option<PathBuf>,

    /// Animation config JSON
    #[arg(long, env = "ATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Initial camera zoom
    #[arg(long, default_value_t = 15.0)]
    zoom: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlas_particles=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnimationConfig::from_path(path)?,
        None => AnimationConfig::default(),
    };

    let mut scene = MapScene::new(config);
    match &args.roads {
        Some(path) => scene.set_roads(load_roads(path)?),
        None => scene.set_corridors(DC_CORRIDORS),
    }
    if let Some(path) = &args.buildings {
        scene.set_buildings(load_buildings(path)?);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_title("Atlas particles"),
        ..Default::default()
    };

    info!("Opening viewer");
    let zoom = args.zoom;
    eframe::run_native(
        "atlas-viewer",
        options,
        Box::new(move |cc| Ok(Box::new(ViewerApp::new(cc, scene, zoom)))),
    )?;
    Ok(())
}
