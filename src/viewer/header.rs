//! Header bar with animation controls and status

use eframe::egui;

use super::ViewerApp;
use crate::core::DriverState;
use crate::theme::colors;
use crate::time::now_millis;

impl ViewerApp {
    pub(crate) fn render_header(&mut self, ui: &mut egui::Ui) {
        self.fps_counter.tick();

        ui.horizontal(|ui| {
            let running = self.driver.is_running();
            let label = if running { "Stop" } else { "Start" };
            if ui.button(label).clicked() {
                if running {
                    self.driver.stop();
                } else {
                    self.driver.start();
                }
            }

            ui.add_space(10.0);

            if ui.button("Focus green").clicked() {
                self.scene.focus_first_green(now_millis());
            }
            if ui.button("Clear").clicked() {
                self.scene.clear_focus();
                self.scene.clear_hover();
            }

            ui.add_space(10.0);
            ui.label(egui::RichText::new("zoom").color(colors::TEXT_MUTED));
            ui.add(egui::Slider::new(&mut self.zoom, 10.0..=20.0).step_by(0.5));

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let (status_text, status_color) = match self.driver.state() {
                    DriverState::Running if self.zoom < self.scene.config().min_zoom => {
                        ("Zoomed out", colors::TEXT_MUTED)
                    }
                    DriverState::Running => ("Running", colors::GREEN_BUILDING),
                    DriverState::Stopped => ("Stopped", colors::TEXT_SECONDARY),
                };
                ui.colored_label(status_color, egui::RichText::new(status_text));

                ui.add_space(10.0);
                ui.label(
                    egui::RichText::new(format!("{:.0} fps", self.fps_counter.fps()))
                        .color(colors::TEXT_SECONDARY),
                );
                ui.label(
                    egui::RichText::new(format!(
                        "{} frames | {} skipped | {} features",
                        self.driver.frames_rendered(),
                        self.driver.frames_skipped(),
                        self.sink.feature_count()
                    ))
                    .color(colors::TEXT_SECONDARY),
                );
            });
        });
    }
}

/// FPS counter over the last 60 repaints
pub struct FpsCounter {
    frames: Vec<f64>,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            frames: Vec::with_capacity(60),
        }
    }

    pub fn tick(&mut self) {
        self.record(now_millis());
    }

    fn record(&mut self, now_ms: f64) {
        self.frames.push(now_ms);
        if self.frames.len() > 60 {
            self.frames.remove(0);
        }
    }

    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frames.first(), self.frames.last()) else {
            return 0.0;
        };
        let elapsed = last - first;
        if self.frames.len() < 2 || elapsed == 0.0 {
            return 0.0;
        }
        (self.frames.len() as f64 - 1.0) / (elapsed / 1000.0)
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_counter() {
        let mut counter = FpsCounter::new();
        assert_eq!(counter.fps(), 0.0);
        for i in 0..11 {
            counter.record(i as f64 * 20.0);
        }
        assert!((counter.fps() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_fps_counter_window() {
        let mut counter = FpsCounter::new();
        for i in 0..100 {
            counter.record(i as f64 * 10.0);
        }
        assert_eq!(counter.frames.len(), 60);
        assert!((counter.fps() - 100.0).abs() < 1e-9);
    }
}
