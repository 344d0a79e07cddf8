//! Particle generators
//!
//! Pure functions from geometry (+ injected randomness) to renderer
//! features. Every frame regenerates its particles from scratch; nothing
//! here keeps state except the flow particles, which carry their progress.

use rand::Rng;
use serde_json::{Map, Value};
use std::f64::consts::PI;

use super::buildings::{BuildingProxy, RoadProxy};
use super::features::{rgba, Feature, FeatureCollection, ParticleStyle};
use super::geo::{distance, interpolate, jittered_point, perpendicular_unit, point_along_path, FadeRamp, LngLat};

/// Upper bound on glow particles per road segment
const MAX_GLOW_PER_SEGMENT: usize = 400;

const GREEN: &str = "#51ff00";

// ============================================================================
// Flow particles - seeded once, advanced every frame
// ============================================================================

/// Particle travelling along a straight segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowParticle {
    pub start: LngLat,
    pub end: LngLat,
    /// Position along the segment [0..1]
    pub progress: f64,
    /// Progress added per frame
    pub speed: f64,
}

impl FlowParticle {
    pub fn position(&self) -> LngLat {
        interpolate(self.start, self.end, self.progress)
    }

    /// Step forward one frame; running off the end restarts at the segment start.
    pub fn advance(&mut self) {
        self.progress += self.speed;
        if self.progress > 1.0 {
            self.progress = 0.0;
        }
    }
}

/// Scatter `per_segment` particles at random progress along each segment.
/// Speeds vary between 0.5x and 1.5x `base_speed`.
pub fn seed_flow_particles<R: Rng + ?Sized>(
    segments: &[(LngLat, LngLat)],
    per_segment: usize,
    base_speed: f64,
    rng: &mut R,
) -> Vec<FlowParticle> {
    let mut particles = Vec::with_capacity(segments.len() * per_segment);
    for &(start, end) in segments {
        for _ in 0..per_segment {
            particles.push(FlowParticle {
                start,
                end,
                progress: rng.gen::<f64>(),
                speed: base_speed * (0.5 + rng.gen::<f64>()),
            });
        }
    }
    particles
}

pub fn flow_features(particles: &[FlowParticle], style: &ParticleStyle) -> Vec<Feature> {
    particles
        .iter()
        .map(|p| {
            let mut props = style.to_properties();
            props.insert("progress".into(), Value::from(p.progress));
            props.insert("speed".into(), Value::from(p.speed));
            Feature::point(p.position(), props)
        })
        .collect()
}

// ============================================================================
// Path walkers - roads and building perimeters
// ============================================================================

pub fn road_style() -> ParticleStyle {
    ParticleStyle::new(14.0, 0.8, "#FFD700")
}

pub fn perimeter_style() -> ParticleStyle {
    ParticleStyle::new(3.0, 0.9, "#4169E1")
}

/// Phase of a path walk at `now_ms` for a given speed (cycles per ms).
#[inline]
pub fn walk_phase(now_ms: f64, rate: f64) -> f64 {
    (now_ms * rate).rem_euclid(1.0)
}

/// `count` evenly spaced particles per path, shifted by `phase`.
pub fn path_particles<'a, I>(paths: I, count: usize, phase: f64, style: &ParticleStyle) -> Vec<Feature>
where
    I: IntoIterator<Item = &'a [LngLat]>,
{
    let mut features = Vec::new();
    if count == 0 {
        return features;
    }
    for path in paths {
        for i in 0..count {
            let offset = (i as f64 / count as f64 + phase).rem_euclid(1.0);
            if let Some(at) = point_along_path(path, offset) {
                features.push(style.particle(at));
            }
        }
    }
    features
}

// ============================================================================
// Green building road glow
// ============================================================================

/// Frame parameters for the road glow.
#[derive(Clone, Copy, Debug)]
pub struct GlowParams {
    pub zoom: f64,
    pub now_ms: f64,
    /// Base reach around a building before size scaling (degrees)
    pub total_scale: f64,
    pub fade: FadeRamp,
}

impl GlowParams {
    pub fn zoom_factor(&self) -> f64 {
        ((self.zoom - 13.0) / 5.0).max(0.2)
    }
}

/// Particles hugging the roads around green buildings.
///
/// Road vertices within reach of a building emit green particles jittered
/// along the segment normal, denser and brighter the closer they are.
/// Every third green particle gets a pair of white wave particles, one on
/// each side of the road.
pub fn green_road_particles<R: Rng + ?Sized>(
    greens: &[&BuildingProxy],
    roads: &[RoadProxy],
    params: GlowParams,
    rng: &mut R,
) -> Vec<Feature> {
    let mut features = Vec::new();
    let base_particles = (40.0 * params.zoom_factor()).floor();
    let t_sec = params.now_ms * 0.001;

    for building in greens {
        let Some(center) = building.centroid() else {
            continue;
        };
        let scale = building.size_scale();
        let reach = params.total_scale * scale;
        let ramp = params.fade.scaled(scale);

        for road in roads {
            for (from, to) in road.segments() {
                let dist = distance(from, center);
                if dist >= reach {
                    continue;
                }
                // Zero-length segments have no normal to spread along
                if perpendicular_unit(from, to).is_none() {
                    continue;
                }
                let fade = ramp.factor(dist);
                let seg_len = distance(from, to);
                let count = ((base_particles * seg_len * 1000.0 * (fade + 0.1)).floor() as usize)
                    .min(MAX_GLOW_PER_SEGMENT);

                let green = ParticleStyle::new(
                    1.2 * (fade + 0.1),
                    (0.9 * fade).clamp(0.1, 0.9),
                    rgba(80, 220, 80, fade.powf(1.2)),
                );
                let white = ParticleStyle::new(2.0 * (fade + 0.1), 0.2, rgba(255, 255, 255, fade.powf(1.1)));

                for i in 0..count {
                    let t = i as f64 / count as f64;

                    let offset = rng.gen::<f64>() * 0.0001 * fade.sqrt();
                    let scatter = (rng.gen::<f64>() - 0.5) * 0.00004 * fade;
                    let p = jittered_point(from, to, t, offset);
                    features.push(green.particle([p[0] + scatter, p[1] + scatter]));

                    if i % 3 == 0 {
                        let wave = 0.00005 * (t * PI * 4.0 + t_sec * 2.0).sin();
                        let drift = ((t + t_sec * 0.5) % 1.0 - 0.5) * 0.00002;
                        for side in [-1.0, 1.0] {
                            features.push(white.particle(jittered_point(from, to, t, side * wave + drift)));
                        }
                    }
                }
            }
        }
    }
    features
}

// ============================================================================
// Halo, cooling heatmap, links
// ============================================================================

/// Radial cloud around each anchor; every third particle adds a larger, fainter twin.
pub fn green_halo_particles<R: Rng + ?Sized>(anchors: &[LngLat], per_building: usize, rng: &mut R) -> Vec<Feature> {
    let mut features = Vec::with_capacity(anchors.len() * per_building * 4 / 3 + 1);
    for &[lng, lat] in anchors {
        for i in 0..per_building {
            let angle = rng.gen::<f64>() * PI * 2.0;
            let radius = rng.gen::<f64>() * 0.002;
            let (sin, cos) = angle.sin_cos();

            let small = ParticleStyle::new(rng.gen::<f64>() * 4.0 + 3.0, rng.gen::<f64>() * 0.5 + 0.4, GREEN);
            features.push(small.particle([lng + cos * radius, lat + sin * radius]));

            if i % 3 == 0 {
                let large = ParticleStyle::new(rng.gen::<f64>() * 6.0 + 5.0, rng.gen::<f64>() * 0.3 + 0.2, GREEN);
                features.push(large.particle([lng + cos * radius * 0.8, lat + sin * radius * 0.8]));
            }
        }
    }
    features
}

const COOLING_CORE_RADIUS: f64 = 0.00375;
const COOLING_OUTER_RADIUS: f64 = 0.00625;

fn cooling_point(at: LngLat, efficiency: f64, intensity: f64) -> Feature {
    let mut props = Map::with_capacity(2);
    props.insert("efficiency".into(), Value::from(efficiency));
    props.insert("intensity".into(), Value::from(intensity));
    Feature::point(at, props)
}

/// Heatmap points around buildings taller than 10: 30 core points whose
/// intensity falls off with radius and 25 diffuse outer points.
pub fn cooling_points<R: Rng + ?Sized>(buildings: &[BuildingProxy], rng: &mut R) -> FeatureCollection {
    let mut points = FeatureCollection::new();
    for building in buildings.iter().filter(|b| b.height.unwrap_or(0.0) > 10.0) {
        let Some([lng, lat]) = building.centroid() else {
            continue;
        };
        let positive = rng.gen::<f64>() > 0.5;

        for _ in 0..30 {
            let angle = rng.gen::<f64>() * PI * 2.0;
            let radius = rng.gen::<f64>() * COOLING_CORE_RADIUS;
            points.push(cooling_point(
                [lng + angle.cos() * radius, lat + angle.sin() * radius],
                if positive { 0.9 } else { 0.1 },
                1.0 - radius / COOLING_CORE_RADIUS,
            ));
        }

        for _ in 0..25 {
            let angle = rng.gen::<f64>() * PI * 2.0;
            let radius = COOLING_CORE_RADIUS + rng.gen::<f64>() * COOLING_OUTER_RADIUS;
            let efficiency = if positive {
                0.3 + rng.gen::<f64>() * 0.3
            } else {
                0.1 + rng.gen::<f64>() * 0.2
            };
            points.push(cooling_point(
                [lng + angle.cos() * radius, lat + angle.sin() * radius],
                efficiency,
                0.4 - rng.gen::<f64>() * 0.2,
            ));
        }
    }
    points
}

/// Line from a green building to a highlighted neighbour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CogentLink {
    pub from: LngLat,
    pub to: LngLat,
    /// Cycle length in seconds [1..3]
    pub duration: f64,
}

pub fn cogent_links<R: Rng + ?Sized>(source: LngLat, targets: &[LngLat], rng: &mut R) -> Vec<CogentLink> {
    targets
        .iter()
        .map(|&to| CogentLink {
            from: source,
            to,
            duration: rng.gen::<f64>() * 2.0 + 1.0,
        })
        .collect()
}

/// Cogent links with a cycling `line-progress` for the gradient layer.
pub fn animate_cogent_links(links: &[CogentLink], elapsed_ms: f64) -> Vec<Feature> {
    let progress = elapsed_ms.max(0.0) / 250.0;
    links
        .iter()
        .map(|link| {
            let cycle = link.duration * 0.25;
            let line_progress = (progress % cycle) / cycle;
            let mut props = Map::with_capacity(2);
            props.insert("duration".into(), Value::from(link.duration));
            props.insert("line-progress".into(), Value::from(line_progress));
            Feature::line(vec![link.from, link.to], props)
        })
        .collect()
}

/// One line between every pair of green anchors.
pub fn green_links(anchors: &[LngLat]) -> Vec<Feature> {
    let mut features = Vec::new();
    for (i, a) in anchors.iter().enumerate() {
        for b in &anchors[i + 1..] {
            features.push(Feature::line(vec![*a, *b], Map::new()));
        }
    }
    features
}
