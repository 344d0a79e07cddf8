//! Native preview of the particle overlays
//!
//! Plots roads, buildings and every enabled particle layer in lng/lat
//! space. The driver is ticked on each repaint exactly as the browser
//! animator ticks it on requestAnimationFrame.

mod header;

use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints, Points};
use std::collections::HashMap;
use tracing::info;

pub use header::FpsCounter;

use crate::core::{AnimationDriver, FeatureCollection, Geometry, MapScene, MemorySink, ParticleLayer};
use crate::theme::{colors, css_color, map_visuals};
use crate::time::now_millis;

pub struct ViewerApp {
    scene: MapScene,
    driver: AnimationDriver,
    sink: MemorySink,
    zoom: f64,
    fps_counter: FpsCounter,
}

impl ViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, scene: MapScene, zoom: f64) -> Self {
        cc.egui_ctx.set_visuals(map_visuals());

        let mut driver = AnimationDriver::from_config(scene.config());
        driver.start();
        info!(
            roads = scene.roads().len(),
            buildings = scene.buildings().len(),
            "Viewer started"
        );

        Self {
            scene,
            driver,
            sink: MemorySink::new(),
            zoom,
            fps_counter: FpsCounter::new(),
        }
    }

    fn render_layers(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Layers").color(colors::TEXT_MUTED).size(10.0));
        for &layer in ParticleLayer::ALL {
            let mut enabled = self.scene.is_enabled(layer);
            if ui.checkbox(&mut enabled, layer.label()).changed() {
                self.scene.set_layer(layer, enabled);
                if !enabled {
                    // Drop the stale source like an emptied setData would
                    self.sink.sources.remove(layer.source_id());
                }
            }
        }

        ui.add_space(10.0);
        ui.label(egui::RichText::new("Selection").color(colors::TEXT_MUTED).size(10.0));
        match self.scene.focused() {
            Some(id) => ui.label(format!("focus {}", id)),
            None => ui.label(egui::RichText::new("none").color(colors::TEXT_MUTED)),
        };
        for (id, tier) in self.scene.highlights() {
            let color = css_color(tier.color(), 1.0).unwrap_or(colors::PARTICLE);
            ui.colored_label(color, id.to_string());
        }
    }

    fn render_map(&mut self, ui: &mut egui::Ui) {
        let roads: Vec<Vec<[f64; 2]>> = self.scene.roads().iter().map(|r| r.coords.clone()).collect();
        let buildings: Vec<(Vec<[f64; 2]>, bool)> = self
            .scene
            .buildings()
            .iter()
            .map(|b| {
                let green = b.id.as_ref().is_some_and(|id| self.scene.states().is_green(id));
                (b.ring.clone(), green)
            })
            .collect();
        let substations: Vec<[f64; 2]> = self.scene.substations().iter().map(|s| s.coordinates).collect();
        let (particles, links) = particle_series(self.sink.sources.values());

        let pointer = Plot::new("map")
            .data_aspect(1.0)
            .show_axes([false, false])
            .show_grid(false)
            .show_background(false)
            .label_formatter(|_name, value| format!("{:.5}, {:.5}", value.x, value.y))
            .show(ui, |plot_ui| {
                for coords in roads {
                    plot_ui.line(Line::new(PlotPoints::from(coords)).color(colors::ROAD).width(1.0));
                }
                for (ring, green) in buildings {
                    let color = if green { colors::GREEN_BUILDING } else { colors::BUILDING };
                    plot_ui.line(Line::new(PlotPoints::from(ring)).color(color).width(1.0));
                }
                plot_ui.points(
                    Points::new(PlotPoints::from(substations))
                        .color(colors::SUBSTATION)
                        .radius(4.0)
                        .filled(true),
                );
                for (color, coords) in links {
                    plot_ui.line(Line::new(PlotPoints::from(coords)).color(color).width(2.0));
                }
                for ((color, radius_tenths), points) in particles {
                    plot_ui.points(
                        Points::new(PlotPoints::from(points))
                            .color(color)
                            .radius(radius_tenths as f32 / 10.0)
                            .filled(true),
                    );
                }
                plot_ui.pointer_coordinate()
            })
            .inner;

        if let Some(at) = pointer {
            self.scene.hover([at.x, at.y]);
        }
    }
}

type SeriesKey = (egui::Color32, u32);

/// Group point features by paint so each group is one plot item.
fn particle_series<'a>(
    collections: impl Iterator<Item = &'a FeatureCollection>,
) -> (HashMap<SeriesKey, Vec<[f64; 2]>>, Vec<(egui::Color32, Vec<[f64; 2]>)>) {
    let mut points: HashMap<SeriesKey, Vec<[f64; 2]>> = HashMap::new();
    let mut lines = Vec::new();

    for feature in collections.flat_map(|c| c.features.iter()) {
        let opacity = feature.number("opacity").unwrap_or(1.0);
        let color = feature
            .properties
            .get("color")
            .and_then(|c| c.as_str())
            .and_then(|c| css_color(c, opacity))
            .unwrap_or(colors::PARTICLE);

        match &feature.geometry {
            Geometry::Point { coordinates } => {
                let size = feature.number("particleSize").unwrap_or(2.0);
                let radius_tenths = ((size / 2.0).clamp(0.5, 8.0) * 10.0).round() as u32;
                points.entry((color, radius_tenths)).or_default().push(*coordinates);
            }
            Geometry::LineString { coordinates } => lines.push((color, coordinates.clone())),
            Geometry::Polygon { .. } => {}
        }
    }

    (points, lines)
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Request continuous repaint, the driver throttles itself
        ctx.request_repaint();

        self.driver.tick(now_millis(), self.zoom, &mut self.scene, &mut self.sink);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            self.render_header(ui);
        });

        egui::SidePanel::left("layers").resizable(false).show(ctx, |ui| {
            self.render_layers(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.render_map(ui);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ParticleStyle;

    #[test]
    fn test_particle_series_groups_by_paint() {
        let gold = ParticleStyle::new(14.0, 0.8, "#FFD700");
        let blue = ParticleStyle::new(3.0, 0.9, "#4169E1");
        let link = crate::core::Feature::line(vec![[0.0, 0.0], [1.0, 1.0]], gold.to_properties());
        let collection: FeatureCollection = vec![
            gold.particle([0.0, 0.0]),
            gold.particle([1.0, 0.0]),
            blue.particle([2.0, 0.0]),
            link,
        ]
        .into();

        let (points, lines) = particle_series(std::iter::once(&collection));
        assert_eq!(points.len(), 2);
        assert_eq!(lines.len(), 1);
        let gold_key = (css_color("#FFD700", 0.8).unwrap(), 70);
        assert_eq!(points[&gold_key].len(), 2);
    }
}
