//! Browser front-end: particle animator driven by requestAnimationFrame
//!
//! The page owns the Mapbox map. It hands the animator a callback
//! `(sourceId, geojson) => map.getSource(sourceId)?.setData(JSON.parse(geojson))`
//! and the animator keeps the overlay sources fed until stopped or the
//! observed map container scrolls out of view.
//!
//! The callback must not call back into the animator.

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, IntersectionObserver, IntersectionObserverEntry};

use crate::core::constants::DC_CORRIDORS;
use crate::core::{
    parse_buildings, parse_roads, AnimationConfig, AnimationDriver, FeatureCollection, FeatureId,
    FrameError, MapScene, MemorySink, ParticleLayer, ParticleSink,
};
use crate::time::now_millis;

#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();

    // Initialize tracing for browser console
    tracing_wasm::set_as_global_default();
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Forwards frames to the page's `setData` callback
struct JsSink {
    set_data: js_sys::Function,
}

impl ParticleSink for JsSink {
    fn set_data(&mut self, source_id: &str, data: &FeatureCollection) -> Result<(), FrameError> {
        let json = data.to_json()?;
        self.set_data
            .call2(&JsValue::NULL, &JsValue::from_str(source_id), &JsValue::from_str(&json))
            .map(|_| ())
            .map_err(|e| FrameError::SinkRejected {
                source_id: source_id.to_string(),
                reason: format!("{:?}", e),
            })
    }
}

struct Inner {
    driver: AnimationDriver,
    scene: MapScene,
    sink: Option<JsSink>,
    zoom: f64,
    /// Pending requestAnimationFrame handle
    frame_handle: Option<i32>,
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

fn schedule(inner: &Rc<RefCell<Inner>>, on_frame: &FrameCallback) -> Result<(), JsValue> {
    if inner.borrow().frame_handle.is_some() {
        return Ok(());
    }
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    if let Some(callback) = on_frame.borrow().as_ref() {
        let handle = window.request_animation_frame(callback.as_ref().unchecked_ref())?;
        inner.borrow_mut().frame_handle = Some(handle);
    }
    Ok(())
}

fn cancel(inner: &Rc<RefCell<Inner>>) {
    if let Some(handle) = inner.borrow_mut().frame_handle.take() {
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.cancel_animation_frame(handle) {
                error!(?e, "Failed to cancel animation frame");
            }
        }
    }
}

#[wasm_bindgen]
pub struct MapAnimator {
    inner: Rc<RefCell<Inner>>,
    on_frame: FrameCallback,
    observer: Option<IntersectionObserver>,
    #[allow(dead_code)]
    on_intersect: Option<Closure<dyn FnMut(js_sys::Array, JsValue)>>,
}

#[wasm_bindgen]
impl MapAnimator {
    /// Create an animator from an optional JSON config (camelCase keys).
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<MapAnimator, JsValue> {
        let config = match config_json {
            Some(json) => AnimationConfig::from_json(&json).map_err(to_js)?,
            None => AnimationConfig::default(),
        };
        info!(throttle_ms = config.throttle_ms, min_zoom = config.min_zoom, "Creating map animator");

        let inner = Inner {
            driver: AnimationDriver::from_config(&config),
            scene: MapScene::new(config),
            sink: None,
            zoom: 0.0,
            frame_handle: None,
        };
        Ok(Self {
            inner: Rc::new(RefCell::new(inner)),
            on_frame: Rc::new(RefCell::new(None)),
            observer: None,
            on_intersect: None,
        })
    }

    /// Load road GeoJSON; returns the number of roads kept.
    pub fn load_roads(&self, geojson: &str) -> Result<usize, JsValue> {
        let roads = parse_roads(geojson).map_err(to_js)?;
        let count = roads.len();
        self.inner.borrow_mut().scene.set_roads(roads);
        Ok(count)
    }

    /// Use the built-in DC corridors as roads.
    pub fn load_dc_corridors(&self) -> usize {
        self.inner.borrow_mut().scene.set_corridors(DC_CORRIDORS);
        DC_CORRIDORS.len()
    }

    /// Load building GeoJSON; returns the number of buildings kept.
    pub fn load_buildings(&self, geojson: &str) -> Result<usize, JsValue> {
        let buildings = parse_buildings(geojson).map_err(to_js)?;
        let count = buildings.len();
        self.inner.borrow_mut().scene.set_buildings(buildings);
        Ok(count)
    }

    /// Enable or disable a layer by source id or name.
    pub fn set_layer(&self, name: &str, enabled: bool) -> Result<(), JsValue> {
        let layer = ParticleLayer::from_name(name).ok_or_else(|| to_js(format!("unknown layer {}", name)))?;
        self.inner.borrow_mut().scene.set_layer(layer, enabled);
        Ok(())
    }

    /// Latest camera zoom, read on every frame.
    pub fn set_zoom(&self, zoom: f64) {
        self.inner.borrow_mut().zoom = zoom;
    }

    /// Cogent focus on a building id (integer or string).
    pub fn focus(&self, id: JsValue) -> usize {
        let id = match (id.as_f64(), id.as_string()) {
            (Some(n), _) => match FeatureId::from_f64(n) {
                Some(id) => id,
                None => {
                    debug!(id = n, "Ignoring focus on a non-integer id");
                    return 0;
                }
            },
            (_, Some(s)) if !s.is_empty() => FeatureId::Str(s),
            _ => return 0,
        };
        self.inner.borrow_mut().scene.focus(&id, now_millis())
    }

    pub fn focus_first_green(&self) -> Option<String> {
        self.inner
            .borrow_mut()
            .scene
            .focus_first_green(now_millis())
            .map(|id| id.to_string())
    }

    pub fn clear_focus(&self) {
        self.inner.borrow_mut().scene.clear_focus();
    }

    /// Highlight buildings near the pointer; returns how many were found.
    pub fn hover(&self, lng: f64, lat: f64) -> usize {
        self.inner.borrow_mut().scene.hover([lng, lat]).len()
    }

    pub fn cooling_points(&self) -> Result<String, JsValue> {
        self.inner.borrow_mut().scene.cooling_points().to_json().map_err(to_js)
    }

    pub fn is_running(&self) -> bool {
        self.inner.borrow().driver.is_running()
    }

    /// Start feeding `set_data(sourceId, geojson)` on every animation frame.
    pub fn start(&mut self, set_data: js_sys::Function) -> Result<(), JsValue> {
        {
            let mut inner = self.inner.borrow_mut();
            inner.sink = Some(JsSink { set_data });
            inner.driver.start();
        }

        if self.on_frame.borrow().is_none() {
            let inner = self.inner.clone();
            let on_frame = self.on_frame.clone();
            let callback = Closure::wrap(Box::new(move |timestamp: f64| {
                let keep_going = {
                    let mut guard = inner.borrow_mut();
                    let Inner {
                        driver,
                        scene,
                        sink,
                        zoom,
                        frame_handle,
                    } = &mut *guard;
                    *frame_handle = None;
                    match sink.as_mut() {
                        Some(sink) if driver.is_running() => {
                            driver.tick(timestamp, *zoom, scene, sink);
                            true
                        }
                        _ => false,
                    }
                };
                if keep_going {
                    if let Err(e) = schedule(&inner, &on_frame) {
                        error!(?e, "Failed to schedule animation frame");
                    }
                }
            }) as Box<dyn FnMut(f64)>);
            *self.on_frame.borrow_mut() = Some(callback);
        }

        schedule(&self.inner, &self.on_frame)
    }

    /// Stop animating. Loaded geometry, building states and the observer
    /// are kept, so a later `start` resumes where this left off.
    pub fn stop(&mut self) {
        self.inner.borrow_mut().driver.stop();
        cancel(&self.inner);
        debug!("Map animator stopped");
    }

    /// Pause while `element` is out of the viewport, resume when it returns.
    pub fn observe(&mut self, element: &Element) -> Result<(), JsValue> {
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }

        let inner = self.inner.clone();
        let on_frame = self.on_frame.clone();
        let callback = Closure::wrap(Box::new(move |entries: js_sys::Array, _observer: JsValue| {
            let visible = entries
                .iter()
                .filter_map(|e| e.dyn_into::<IntersectionObserverEntry>().ok())
                .any(|e| e.is_intersecting());
            debug!(visible, "Map container visibility changed");

            if visible {
                // A stopped animator stays stopped
                let resume = {
                    let mut inner = inner.borrow_mut();
                    inner.driver.set_visible(true);
                    inner.driver.is_running() && inner.sink.is_some()
                };
                if resume {
                    if let Err(e) = schedule(&inner, &on_frame) {
                        error!(?e, "Failed to resume animation");
                    }
                }
            } else {
                inner.borrow_mut().driver.set_visible(false);
                cancel(&inner);
            }
        }) as Box<dyn FnMut(js_sys::Array, JsValue)>);

        let observer = IntersectionObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe(element);
        self.observer = Some(observer);
        self.on_intersect = Some(callback);
        Ok(())
    }

    /// Drive one tick by hand and return the updated sources as
    /// `{ sourceId: FeatureCollection }`, or nothing if no frame was due.
    pub fn tick(&self, now_ms: f64, zoom: f64) -> Option<String> {
        let mut guard = self.inner.borrow_mut();
        let Inner { driver, scene, .. } = &mut *guard;
        let mut sink = MemorySink::new();
        if !driver.tick(now_ms, zoom, scene, &mut sink).is_rendered() {
            return None;
        }
        serde_json::to_string(&sink.sources)
            .map_err(|e| error!(error = %e, "Failed to serialize frame"))
            .ok()
    }
}

impl Drop for MapAnimator {
    fn drop(&mut self) {
        cancel(&self.inner);
        self.inner.borrow_mut().scene.teardown();
        if let Some(observer) = self.observer.take() {
            observer.disconnect();
        }
        self.on_frame.borrow_mut().take();
    }
}
