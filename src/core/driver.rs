//! Throttled animation driver
//!
//! One driver serves every overlay: it is ticked on each display refresh,
//! decides whether a new frame is due, asks a [`ParticleScene`] to
//! regenerate and pushes the result into a [`ParticleSink`] (the renderer's
//! live GeoJSON sources). A failed frame is logged and skipped.

use std::collections::HashMap;
use tracing::{debug, trace, warn};

use super::config::AnimationConfig;
use super::error::FrameError;
use super::features::FeatureCollection;

/// Per-tick inputs handed to the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameContext {
    /// Wall-clock time (ms)
    pub now_ms: f64,
    /// Current camera zoom
    pub zoom: f64,
    /// Index of the frame being produced
    pub frame: u64,
}

/// Regenerated data for one renderer source.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerFrame {
    pub source_id: &'static str,
    pub data: FeatureCollection,
}

/// Anything that can regenerate the full particle set for a frame.
pub trait ParticleScene {
    fn regenerate(&mut self, ctx: &FrameContext) -> Result<Vec<LayerFrame>, FrameError>;
}

impl<F> ParticleScene for F
where
    F: FnMut(&FrameContext) -> Result<Vec<LayerFrame>, FrameError>,
{
    fn regenerate(&mut self, ctx: &FrameContext) -> Result<Vec<LayerFrame>, FrameError> {
        self(ctx)
    }
}

/// Receiver of regenerated frames, e.g. `map.getSource(id).setData(...)`.
pub trait ParticleSink {
    fn set_data(&mut self, source_id: &str, data: &FeatureCollection) -> Result<(), FrameError>;
}

/// Sink keeping the latest collection per source.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub sources: HashMap<String, FeatureCollection>,
    pub updates: u64,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_id: &str) -> Option<&FeatureCollection> {
        self.sources.get(source_id)
    }

    /// Total features across all sources
    pub fn feature_count(&self) -> usize {
        self.sources.values().map(FeatureCollection::len).sum()
    }
}

impl ParticleSink for MemorySink {
    fn set_data(&mut self, source_id: &str, data: &FeatureCollection) -> Result<(), FrameError> {
        self.sources.insert(source_id.to_string(), data.clone());
        self.updates += 1;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DriverState {
    Running,
    #[default]
    Stopped,
}

/// What a tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Stopped,
    /// Too soon after the previous update
    Throttled,
    /// Camera zoomed out past the minimum zoom
    BelowMinZoom,
    /// Regeneration or publishing failed; retried next tick
    Skipped(FrameError),
    Rendered { features: usize },
}

impl TickOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, TickOutcome::Rendered { .. })
    }
}

/// RUNNING/STOPPED state machine with a minimum-interval gate.
#[derive(Debug)]
pub struct AnimationDriver {
    state: DriverState,
    throttle_ms: f64,
    min_zoom: f64,
    last_update: Option<f64>,
    /// Stopped by the owner; visibility alone can't restart it
    held: bool,
    frames_rendered: u64,
    frames_skipped: u64,
}

impl AnimationDriver {
    pub fn new(throttle_ms: f64, min_zoom: f64) -> Self {
        Self {
            state: DriverState::Stopped,
            throttle_ms: throttle_ms.max(0.0),
            min_zoom,
            last_update: None,
            held: true,
            frames_rendered: 0,
            frames_skipped: 0,
        }
    }

    pub fn from_config(config: &AnimationConfig) -> Self {
        Self::new(config.throttle_ms, config.min_zoom)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == DriverState::Running
    }

    pub fn start(&mut self) {
        self.held = false;
        self.resume();
    }

    /// Stop until the next `start`, whatever the view's visibility.
    pub fn stop(&mut self) {
        self.held = true;
        self.halt();
    }

    /// Visibility of the owning view: hidden pauses, visible resumes a
    /// driver that has been started and not stopped since.
    pub fn set_visible(&mut self, visible: bool) {
        if !visible {
            self.halt();
        } else if !self.held {
            self.resume();
        }
    }

    fn resume(&mut self) {
        if self.state == DriverState::Running {
            return;
        }
        debug!("Animation started");
        self.state = DriverState::Running;
        // Render on the first tick after (re)starting
        self.last_update = None;
    }

    fn halt(&mut self) {
        if self.state == DriverState::Stopped {
            return;
        }
        debug!(rendered = self.frames_rendered, skipped = self.frames_skipped, "Animation stopped");
        self.state = DriverState::Stopped;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Advance one display refresh.
    pub fn tick<S, K>(&mut self, now_ms: f64, zoom: f64, scene: &mut S, sink: &mut K) -> TickOutcome
    where
        S: ParticleScene + ?Sized,
        K: ParticleSink + ?Sized,
    {
        if self.state == DriverState::Stopped {
            return TickOutcome::Stopped;
        }

        if let Some(last) = self.last_update {
            if now_ms - last < self.throttle_ms {
                return TickOutcome::Throttled;
            }
        }
        self.last_update = Some(now_ms);

        if zoom < self.min_zoom {
            trace!(zoom, min_zoom = self.min_zoom, "Below minimum zoom, frame skipped");
            return TickOutcome::BelowMinZoom;
        }

        let ctx = FrameContext {
            now_ms,
            zoom,
            frame: self.frames_rendered,
        };

        let layers = match scene.regenerate(&ctx) {
            Ok(layers) => layers,
            Err(e) => return self.skip(e),
        };

        let mut features = 0;
        for layer in &layers {
            if let Err(e) = sink.set_data(layer.source_id, &layer.data) {
                return self.skip(e);
            }
            features += layer.data.len();
        }

        self.frames_rendered += 1;
        trace!(frame = ctx.frame, layers = layers.len(), features, "Frame rendered");
        TickOutcome::Rendered { features }
    }

    fn skip(&mut self, error: FrameError) -> TickOutcome {
        self.frames_skipped += 1;
        warn!(error = %error, "Animation frame skipped");
        TickOutcome::Skipped(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::ParticleStyle;

    fn one_point_scene(ctx: &FrameContext) -> Result<Vec<LayerFrame>, FrameError> {
        let style = ParticleStyle::new(2.0, 0.5, "#FFFFFF");
        Ok(vec![LayerFrame {
            source_id: "particles",
            data: vec![style.particle([ctx.now_ms, ctx.zoom])].into(),
        }])
    }

    #[test]
    fn test_stopped_driver_does_nothing() {
        let mut driver = AnimationDriver::new(25.0, 13.0);
        let mut sink = MemorySink::new();
        assert!(matches!(
            driver.tick(0.0, 15.0, &mut one_point_scene, &mut sink),
            TickOutcome::Stopped
        ));
        assert_eq!(sink.updates, 0);
    }

    #[test]
    fn test_throttle_gate() {
        let mut driver = AnimationDriver::new(25.0, 13.0);
        let mut sink = MemorySink::new();
        driver.start();

        assert!(driver.tick(1000.0, 15.0, &mut one_point_scene, &mut sink).is_rendered());
        assert!(matches!(
            driver.tick(1010.0, 15.0, &mut one_point_scene, &mut sink),
            TickOutcome::Throttled
        ));
        assert!(matches!(
            driver.tick(1024.9, 15.0, &mut one_point_scene, &mut sink),
            TickOutcome::Throttled
        ));
        assert!(driver.tick(1025.0, 15.0, &mut one_point_scene, &mut sink).is_rendered());
        assert_eq!(driver.frames_rendered(), 2);
        assert_eq!(sink.get("particles").unwrap().len(), 1);
    }

    #[test]
    fn test_min_zoom_gate() {
        let mut driver = AnimationDriver::new(25.0, 13.0);
        let mut sink = MemorySink::new();
        driver.start();

        assert!(matches!(
            driver.tick(0.0, 12.5, &mut one_point_scene, &mut sink),
            TickOutcome::BelowMinZoom
        ));
        // Gate timestamp advanced even though nothing rendered
        assert!(matches!(
            driver.tick(10.0, 14.0, &mut one_point_scene, &mut sink),
            TickOutcome::Throttled
        ));
        assert!(driver.tick(30.0, 14.0, &mut one_point_scene, &mut sink).is_rendered());
    }

    #[test]
    fn test_failed_frame_is_skipped_then_retried() {
        let mut driver = AnimationDriver::new(0.0, 0.0);
        let mut sink = MemorySink::new();
        let mut fail_next = true;
        let mut scene = |ctx: &FrameContext| {
            if std::mem::take(&mut fail_next) {
                Err(FrameError::EmptyGeometry)
            } else {
                one_point_scene(ctx)
            }
        };
        driver.start();

        assert!(matches!(
            driver.tick(0.0, 14.0, &mut scene, &mut sink),
            TickOutcome::Skipped(FrameError::EmptyGeometry)
        ));
        assert!(driver.is_running());
        assert!(driver.tick(1.0, 14.0, &mut scene, &mut sink).is_rendered());
        assert_eq!(driver.frames_skipped(), 1);
        assert_eq!(driver.frames_rendered(), 1);
    }

    struct RejectingSink;

    impl ParticleSink for RejectingSink {
        fn set_data(&mut self, source_id: &str, _data: &FeatureCollection) -> Result<(), FrameError> {
            Err(FrameError::SinkRejected {
                source_id: source_id.to_string(),
                reason: "source missing".into(),
            })
        }
    }

    #[test]
    fn test_sink_failure_skips_frame() {
        let mut driver = AnimationDriver::new(0.0, 0.0);
        driver.start();
        let outcome = driver.tick(0.0, 14.0, &mut one_point_scene, &mut RejectingSink);
        assert!(matches!(outcome, TickOutcome::Skipped(FrameError::SinkRejected { .. })));
        assert_eq!(driver.frames_rendered(), 0);
    }

    #[test]
    fn test_visibility_transitions() {
        let mut driver = AnimationDriver::new(25.0, 13.0);
        let mut sink = MemorySink::new();
        assert_eq!(driver.state(), DriverState::Stopped);

        // Visibility doesn't start a driver that was never started
        driver.set_visible(true);
        assert!(!driver.is_running());

        driver.start();
        assert!(driver.is_running());
        assert!(driver.tick(0.0, 14.0, &mut one_point_scene, &mut sink).is_rendered());

        driver.set_visible(false);
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(matches!(
            driver.tick(100.0, 14.0, &mut one_point_scene, &mut sink),
            TickOutcome::Stopped
        ));

        // Restart renders immediately, ignoring the throttle window
        driver.set_visible(true);
        assert!(driver.tick(101.0, 14.0, &mut one_point_scene, &mut sink).is_rendered());
    }

    #[test]
    fn test_stop_holds_through_visibility_changes() {
        let mut driver = AnimationDriver::new(25.0, 13.0);
        let mut sink = MemorySink::new();
        driver.start();
        driver.stop();

        driver.set_visible(false);
        driver.set_visible(true);
        assert_eq!(driver.state(), DriverState::Stopped);
        assert!(matches!(
            driver.tick(0.0, 14.0, &mut one_point_scene, &mut sink),
            TickOutcome::Stopped
        ));

        driver.start();
        driver.set_visible(false);
        driver.set_visible(true);
        assert!(driver.is_running());
        assert!(driver.tick(1.0, 14.0, &mut one_point_scene, &mut sink).is_rendered());
    }
}
