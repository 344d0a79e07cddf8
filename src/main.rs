//! Headless particle generator for exercising the animation pipeline
//!
//! Run with: cargo run --features cli --bin atlas-cli -- --buildings buildings.geojson

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use atlas_particles::core::constants::DC_CORRIDORS;
use atlas_particles::core::{
    load_buildings, load_roads, AnimationConfig, AnimationDriver, MapScene, MemorySink, ParticleLayer,
    TickOutcome,
};
use atlas_particles::time::now_millis;

/// Display refresh the driver is ticked at (~60 Hz)
const REFRESH: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(name = "atlas-cli", version, about = "Generate map particle frames without a browser")]
struct Args {
    /// Road GeoJSON (LineString / MultiLineString). Uses the DC corridors when omitted
    #[arg(long)]
    roads: Option<PathBuf>,

    /// Building GeoJSON (Polygon / MultiPolygon)
    #[arg(long)]
    buildings: Option<PathBuf>,

    /// Animation config JSON
    #[arg(long, env = "ATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after this many rendered frames (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 200)]
    frames: u64,

    /// Camera zoom fed to every tick
    #[arg(long, default_value_t = 15.0)]
    zoom: f64,

    /// Extra layers to enable, by source id or name
    #[arg(long, value_delimiter = ',')]
    layers: Vec<String>,

    /// Focus the first green building to animate cogent links
    #[arg(long)]
    focus_green: bool,

    /// Write the last rendered frame as `{ sourceId: FeatureCollection }`
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlas_particles=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AnimationConfig::from_path(path)?,
        None => AnimationConfig::default(),
    };

    let mut scene = MapScene::new(config.clone());
    match &args.roads {
        Some(path) => scene.set_roads(load_roads(path)?),
        None => {
            info!(corridors = DC_CORRIDORS.len(), "No roads given, using DC corridors");
            scene.set_corridors(DC_CORRIDORS);
        }
    }
    if let Some(path) = &args.buildings {
        scene.set_buildings(load_buildings(path)?);
    }

    for name in &args.layers {
        match ParticleLayer::from_name(name) {
            Some(layer) => scene.set_layer(layer, true),
            None => warn!(layer = %name, "Unknown layer, ignored"),
        }
    }

    if args.focus_green {
        match scene.focus_first_green(now_millis()) {
            Some(id) => info!(%id, highlights = scene.highlights().len(), "Focused green building"),
            None => warn!("No green building to focus"),
        }
    }

    let mut driver = AnimationDriver::from_config(&config);
    let mut sink = MemorySink::new();
    driver.start();

    let mut refresh = tokio::time::interval(REFRESH);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats_interval = tokio::time::interval(Duration::from_secs(5));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut features_last_interval = 0usize;
    let mut frames_last_interval = 0u64;

    info!(
        roads = scene.roads().len(),
        buildings = scene.buildings().len(),
        green = scene.states().green_buildings(scene.buildings()).count(),
        "Animating"
    );

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                if let TickOutcome::Rendered { features } = driver.tick(now_millis(), args.zoom, &mut scene, &mut sink) {
                    features_last_interval += features;
                    frames_last_interval += 1;
                    if args.frames > 0 && driver.frames_rendered() >= args.frames {
                        break;
                    }
                }
            }
            _ = stats_interval.tick() => {
                info!(
                    frames = driver.frames_rendered(),
                    skipped = driver.frames_skipped(),
                    "/sec" = format!("{:.1}", frames_last_interval as f64 / 5.0),
                    avg_features = features_last_interval.checked_div(frames_last_interval as usize).unwrap_or(0),
                    "stats"
                );
                features_last_interval = 0;
                frames_last_interval = 0;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    driver.stop();

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&sink.sources)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), sources = sink.sources.len(), features = sink.feature_count(), "Wrote last frame");
    }

    scene.teardown();
    Ok(())
}
