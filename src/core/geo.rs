//! Coordinate math for particle placement
//!
//! Everything works in raw longitude/latitude degrees. Distances are plain
//! Euclidean distances in degree space, which is what the map overlays
//! were tuned against at city scale.

/// Longitude/latitude pair, laid out like a GeoJSON position.
pub type LngLat = [f64; 2];

/// Linear interpolation between `a` and `b`.
///
/// `t` is clamped to [0, 1], so the result always lies on segment AB.
#[inline]
pub fn interpolate(a: LngLat, b: LngLat, t: f64) -> LngLat {
    let t = t.clamp(0.0, 1.0);
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

#[inline]
pub fn distance_sq(a: LngLat, b: LngLat) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    dx * dx + dy * dy
}

#[inline]
pub fn distance(a: LngLat, b: LngLat) -> f64 {
    distance_sq(a, b).sqrt()
}

/// Unit normal of segment AB, or `None` for a zero-length segment.
pub fn perpendicular_unit(a: LngLat, b: LngLat) -> Option<LngLat> {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 || !len.is_finite() {
        return None;
    }
    Some([-dy / len, dx / len])
}

/// Point at `t` along AB, pushed `offset` degrees along the segment normal.
///
/// A degenerate segment returns `a` untouched.
pub fn jittered_point(a: LngLat, b: LngLat, t: f64, offset: f64) -> LngLat {
    let Some(normal) = perpendicular_unit(a, b) else {
        return a;
    };
    let p = interpolate(a, b, t);
    [p[0] + normal[0] * offset, p[1] + normal[1] * offset]
}

/// Shortest distance from `p` to segment AB.
pub fn distance_to_segment(p: LngLat, a: LngLat, b: LngLat) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0);
    distance(p, [a[0] + t * dx, a[1] + t * dy])
}

/// Vertex average of a ring. Empty rings have no centroid.
pub fn ring_centroid(ring: &[LngLat]) -> Option<LngLat> {
    if ring.is_empty() {
        return None;
    }
    let n = ring.len() as f64;
    let (sx, sy) = ring
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
    Some([sx / n, sy / n])
}

/// Walk a polyline or perimeter by a normalized offset.
///
/// The offset picks a vertex (`floor(offset * (len - 1))`) and the particle
/// is interpolated towards the following vertex by the same offset, which
/// is how the overlay particles have always been distributed.
pub fn point_along_path(path: &[LngLat], offset: f64) -> Option<LngLat> {
    if path.len() < 2 {
        return None;
    }
    let offset = offset.rem_euclid(1.0);
    let index = ((offset * (path.len() - 1) as f64).floor() as usize).min(path.len() - 1);
    let next = (index + 1) % path.len();
    Some(interpolate(path[index], path[next], offset))
}

/// Distance-based fade between two radii.
///
/// `factor` is 1 up to `start` and decays exponentially past it, so it is
/// bounded to (0, 1] and never increases with distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeRamp {
    pub start: f64,
    pub end: f64,
}

impl FadeRamp {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Ramp scaled by a building's size factor.
    pub fn scaled(&self, scale: f64) -> Self {
        Self {
            start: self.start * scale,
            end: self.end * scale,
        }
    }

    /// Normalized position of `distance` within the ramp (unclamped).
    pub fn raw(&self, distance: f64) -> f64 {
        let span = self.end - self.start;
        if span <= 0.0 {
            return if distance <= self.start { 0.0 } else { f64::INFINITY };
        }
        (distance - self.start) / span
    }

    pub fn factor(&self, distance: f64) -> f64 {
        let raw = self.raw(distance);
        if raw.is_nan() {
            return 0.0;
        }
        (-2.0 * raw.max(0.0)).exp()
    }
}

impl Default for FadeRamp {
    fn default() -> Self {
        Self::new(0.0002, 0.006)
    }
}
