//! Building and road proxies plus the per-building state controller
//!
//! - BuildingProxy / RoadProxy: read-only views of renderer features
//! - BuildingStates: feature id → computed flags, owned in one place
//! - HighlightTier: color tier for cogent neighbours by rank

use rand::Rng;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::constants::Substation;
use super::features::FeatureId;
use super::geo::{distance, ring_centroid, LngLat};
use super::proximity::{nearest_k, nearest_within, Neighbor, ProximityQuery};

// ============================================================================
// Proxies
// ============================================================================

/// Building footprint as queried from the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingProxy {
    pub id: Option<FeatureId>,
    /// Outer ring of the footprint
    pub ring: Vec<LngLat>,
    pub height: Option<f64>,
    pub area: Option<f64>,
    pub properties: Map<String, Value>,
}

impl BuildingProxy {
    pub fn new(id: Option<FeatureId>, ring: Vec<LngLat>) -> Self {
        Self {
            id,
            ring,
            height: None,
            area: None,
            properties: Map::new(),
        }
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_area(mut self, area: f64) -> Self {
        self.area = Some(area);
        self
    }

    /// First vertex of the outer ring; distances between buildings are measured here.
    pub fn anchor(&self) -> Option<LngLat> {
        self.ring.first().copied()
    }

    pub fn centroid(&self) -> Option<LngLat> {
        ring_centroid(&self.ring)
    }

    /// Size factor in [1, 6] from height and footprint area.
    ///
    /// Taller and larger buildings throw a wider road glow.
    pub fn size_scale(&self) -> f64 {
        let height = self.height.filter(|h| *h > 0.0).unwrap_or(20.0);
        let area = self.area.filter(|a| *a > 0.0).unwrap_or(1000.0);
        let height_scale = (height / 20.0).powf(1.5);
        let area_scale = (area / 1000.0).powf(1.3);
        (height_scale + area_scale).clamp(1.0, 6.0)
    }
}

/// Road polyline as queried from the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadProxy {
    pub id: Option<FeatureId>,
    pub coords: Vec<LngLat>,
}

impl RoadProxy {
    pub fn new(coords: Vec<LngLat>) -> Self {
        Self { id: None, coords }
    }

    /// Consecutive vertex pairs
    pub fn segments(&self) -> impl Iterator<Item = (LngLat, LngLat)> + '_ {
        self.coords.windows(2).map(|w| (w[0], w[1]))
    }
}

// ============================================================================
// BuildingStates
// ============================================================================

/// Flags computed once per building and reused by every overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BuildingState {
    pub is_green: bool,
    pub in_power_grid: bool,
    pub is_negative: bool,
    /// Brightness of a grid building, higher when close to a green building [0..1]
    pub yellow_intensity: f64,
}

/// Substations and radius used by the grid-membership check.
#[derive(Clone, Copy, Debug)]
pub struct GridCheck<'a> {
    pub substations: &'a [Substation],
    pub radius: f64,
}

/// Keyed lookup of building flags. Dropping or clearing it is the teardown.
#[derive(Debug, Default)]
pub struct BuildingStates {
    states: HashMap<FeatureId, BuildingState>,
}

impl BuildingStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Green buildings are taller than 10 with a height that is a multiple of 4.
    #[inline]
    pub fn is_green_height(height: f64) -> bool {
        height > 10.0 && height % 4.0 == 0.0
    }

    /// Classify a building, or return the cached state if it was seen before.
    ///
    /// Returns None for buildings without an id or without geometry.
    pub fn classify<R: Rng + ?Sized>(
        &mut self,
        building: &BuildingProxy,
        green_anchors: &[LngLat],
        grid: GridCheck<'_>,
        rng: &mut R,
    ) -> Option<BuildingState> {
        let id = building.id.as_ref()?;
        if let Some(state) = self.states.get(id) {
            return Some(*state);
        }
        let anchor = building.anchor()?;

        let height = building.height.unwrap_or(0.0);
        let area = building.area.unwrap_or(0.0);
        let mut state = BuildingState {
            is_green: Self::is_green_height(height),
            ..BuildingState::default()
        };

        if !state.is_green {
            let check_grid = rng.gen::<f64>() > 0.55
                || (height > 30.0 && area > 1000.0 && rng.gen::<f64>() > 0.3);

            if check_grid {
                let near_substation = grid
                    .substations
                    .iter()
                    .any(|s| distance(anchor, s.coordinates) < grid.radius);
                if near_substation {
                    state.in_power_grid = true;
                    if let Some(min_dist) = green_anchors
                        .iter()
                        .map(|g| distance(anchor, *g))
                        .min_by(f64::total_cmp)
                    {
                        state.yellow_intensity = (1.0 - min_dist * 500.0).max(0.0);
                    }
                }
            }

            if !state.in_power_grid {
                state.is_negative = rng.gen::<f64>() < 0.15;
            }
        }

        trace!(%id, ?state, "Building classified");
        self.states.insert(id.clone(), state);
        Some(state)
    }

    /// Classify every building. Green anchors are resolved first so grid
    /// intensity sees all of them. Returns the number of newly classified buildings.
    pub fn classify_all<R: Rng + ?Sized>(
        &mut self,
        buildings: &[BuildingProxy],
        grid: GridCheck<'_>,
        rng: &mut R,
    ) -> usize {
        let green_anchors: Vec<LngLat> = buildings
            .iter()
            .filter(|b| {
                b.id.as_ref()
                    .and_then(|id| self.states.get(id))
                    .map(|s| s.is_green)
                    .unwrap_or_else(|| Self::is_green_height(b.height.unwrap_or(0.0)))
            })
            .filter_map(BuildingProxy::anchor)
            .collect();

        let before = self.states.len();
        for building in buildings {
            self.classify(building, &green_anchors, grid, rng);
        }
        let added = self.states.len() - before;
        if added > 0 {
            debug!(added, total = self.states.len(), greens = green_anchors.len(), "Buildings classified");
        }
        added
    }

    pub fn get(&self, id: &FeatureId) -> Option<&BuildingState> {
        self.states.get(id)
    }

    pub fn is_green(&self, id: &FeatureId) -> bool {
        self.states.get(id).map(|s| s.is_green).unwrap_or(false)
    }

    /// Buildings from `buildings` currently flagged green
    pub fn green_buildings<'a>(&'a self, buildings: &'a [BuildingProxy]) -> impl Iterator<Item = &'a BuildingProxy> + 'a {
        buildings
            .iter()
            .filter(move |b| b.id.as_ref().map(|id| self.is_green(id)).unwrap_or(false))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

// ============================================================================
// Cogent highlighting
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HighlightTier {
    Yellow,
    Orange,
    Purple,
}

impl HighlightTier {
    /// Ranks 0-3 yellow, 4-6 orange, the rest purple
    pub fn for_rank(rank: usize) -> Self {
        match rank {
            0..=3 => HighlightTier::Yellow,
            4..=6 => HighlightTier::Orange,
            _ => HighlightTier::Purple,
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            HighlightTier::Yellow => "#f7db05",
            HighlightTier::Orange => "#ff9f1c",
            HighlightTier::Purple => "#7048e8",
        }
    }
}

/// Neighbours of `source` by anchor distance, excluding `source` itself.
pub fn neighbors_of<'a>(
    source: &BuildingProxy,
    buildings: &'a [BuildingProxy],
    query: ProximityQuery,
) -> Vec<Neighbor<'a, BuildingProxy>> {
    let Some(anchor) = source.anchor() else {
        return Vec::new();
    };
    nearest_within(
        anchor,
        buildings,
        |b| {
            if b.id.is_some() && b.id == source.id {
                None
            } else {
                b.anchor()
            }
        },
        query,
    )
}

/// The `k` buildings whose anchors are closest to `center`, nearest first.
pub fn nearest_buildings(center: LngLat, buildings: &[BuildingProxy], k: usize) -> Vec<&BuildingProxy> {
    nearest_k(center, buildings, BuildingProxy::anchor, k)
        .into_iter()
        .map(|n| n.item)
        .collect()
}

/// Neighbours ranked and tiered for cogent highlighting.
pub fn cogent_highlights<'a>(
    source: &BuildingProxy,
    buildings: &'a [BuildingProxy],
    query: ProximityQuery,
) -> Vec<(&'a BuildingProxy, HighlightTier)> {
    neighbors_of(source, buildings, query)
        .into_iter()
        .enumerate()
        .map(|(rank, n)| (n.item, HighlightTier::for_rank(rank)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::DC_SUBSTATIONS;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn square(id: u64, at: LngLat) -> BuildingProxy {
        let d = 0.0001;
        BuildingProxy::new(
            Some(FeatureId::Num(id)),
            vec![at, [at[0] + d, at[1]], [at[0] + d, at[1] + d], [at[0], at[1] + d], at],
        )
    }

    fn grid() -> GridCheck<'static> {
        GridCheck {
            substations: DC_SUBSTATIONS,
            radius: 0.002,
        }
    }

    #[test]
    fn test_green_height_rule() {
        assert!(BuildingStates::is_green_height(12.0));
        assert!(BuildingStates::is_green_height(40.0));
        assert!(!BuildingStates::is_green_height(8.0));
        assert!(!BuildingStates::is_green_height(14.0));
        assert!(!BuildingStates::is_green_height(12.5));
    }

    #[test]
    fn test_classify_is_cached() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut states = BuildingStates::new();
        let b = square(1, [-77.0303, 38.8980]).with_height(13.0);

        let first = states.classify(&b, &[], grid(), &mut rng).unwrap();
        for _ in 0..20 {
            assert_eq!(states.classify(&b, &[], grid(), &mut rng), Some(first));
        }
        assert_eq!(states.len(), 1);
    }

    #[test]
    fn test_green_never_grid_or_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut states = BuildingStates::new();
        for i in 0..50 {
            let b = square(i, [-77.0303, 38.8980]).with_height(16.0);
            let s = states.classify(&b, &[], grid(), &mut rng).unwrap();
            assert!(s.is_green && !s.in_power_grid && !s.is_negative);
        }
    }

    #[test]
    fn test_grid_and_negative_exclusive() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut states = BuildingStates::new();
        let green = [-77.0303, 38.8981];
        let mut grid_count = 0;
        for i in 0..200 {
            let b = square(i, [-77.0303, 38.8980]).with_height(33.0).with_area(1500.0);
            let s = states.classify(&b, &[green], grid(), &mut rng).unwrap();
            assert!(!(s.in_power_grid && s.is_negative));
            if s.in_power_grid {
                grid_count += 1;
                // 0.0001 degrees from a green building
                assert!((s.yellow_intensity - 0.95).abs() < 1e-6);
            }
        }
        // Large buildings next to a substation are checked most of the time
        assert!(grid_count > 100, "only {} in grid", grid_count);
    }

    #[test]
    fn test_grid_check_rates() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut states = BuildingStates::new();
        let at = [-77.0303, 38.8980];
        let n = 2000;
        let rate = |states: &mut BuildingStates, rng: &mut ChaCha8Rng, first_id: u64, height: f64, area: f64| {
            let hits = (0..n)
                .filter(|i| {
                    let b = square(first_id + i, at).with_height(height).with_area(area);
                    states.classify(&b, &[], grid(), rng).is_some_and(|s| s.in_power_grid)
                })
                .count();
            hits as f64 / n as f64
        };

        // r1 > 0.55
        let small = rate(&mut states, &mut rng, 0, 13.0, 500.0);
        assert!((0.40..0.50).contains(&small), "small rate {}", small);
        // r1 > 0.55 || r2 > 0.3, about 0.835
        let tall = rate(&mut states, &mut rng, 10_000, 33.0, 1500.0);
        assert!((0.78..0.89).contains(&tall), "tall rate {}", tall);
    }

    #[test]
    fn test_far_from_substations_never_grid() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut states = BuildingStates::new();
        for i in 0..100 {
            let b = square(i, [-76.5, 39.5]).with_height(35.0).with_area(5000.0);
            let s = states.classify(&b, &[], grid(), &mut rng).unwrap();
            assert!(!s.in_power_grid);
        }
    }

    #[test]
    fn test_classify_requires_id() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut states = BuildingStates::new();
        let b = BuildingProxy::new(None, vec![[-77.03, 38.90]]).with_height(12.0);
        assert_eq!(states.classify(&b, &[], grid(), &mut rng), None);
        assert!(states.is_empty());
    }

    #[test]
    fn test_classify_all_and_clear() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let mut states = BuildingStates::new();
        let buildings = vec![
            square(1, [-77.0303, 38.8980]).with_height(12.0),
            square(2, [-77.0304, 38.8981]).with_height(9.0),
            square(3, [-77.0305, 38.8982]).with_height(24.0),
        ];
        assert_eq!(states.classify_all(&buildings, grid(), &mut rng), 3);
        assert_eq!(states.classify_all(&buildings, grid(), &mut rng), 0);

        let greens: Vec<_> = states.green_buildings(&buildings).filter_map(|b| b.id.clone()).collect();
        assert_eq!(greens, vec![FeatureId::Num(1), FeatureId::Num(3)]);

        states.clear();
        assert!(states.is_empty());
        assert!(!states.is_green(&FeatureId::Num(1)));
    }

    #[test]
    fn test_cogent_highlights_tiers() {
        let source = square(0, [0.0, 0.0]);
        let mut buildings = vec![source.clone()];
        for i in 1..=12 {
            buildings.push(square(i, [i as f64 * 0.0002, 0.0]));
        }
        let hits = cogent_highlights(&source, &buildings, ProximityQuery::within(0.003, 10));
        assert_eq!(hits.len(), 10);
        assert_eq!(hits[0].0.id, Some(FeatureId::Num(1)));
        assert!(hits.iter().all(|(b, _)| b.id != source.id));
        let tiers: Vec<_> = hits.iter().map(|(_, t)| *t).collect();
        assert_eq!(&tiers[..4], &[HighlightTier::Yellow; 4]);
        assert_eq!(&tiers[4..7], &[HighlightTier::Orange; 3]);
        assert_eq!(&tiers[7..], &[HighlightTier::Purple; 3]);
    }

    #[test]
    fn test_size_scale_bounds() {
        let b = square(1, [0.0, 0.0]);
        assert_eq!(b.size_scale(), 2.0);
        assert_eq!(b.clone().with_height(400.0).size_scale(), 6.0);
        assert_eq!(b.with_height(1.0).with_area(10.0).size_scale(), 1.0);
    }

    #[test]
    fn test_nearest_buildings_k3_of_5() {
        let center = [-77.0300, 38.9000];
        let buildings = vec![
            square(1, [-77.0340, 38.9000]),
            square(2, [-77.0301, 38.9000]),
            square(3, [-77.0300, 38.9020]),
            square(4, [-77.0250, 38.9050]),
            square(5, [-77.0300, 38.9005]),
        ];
        let ids: Vec<_> = nearest_buildings(center, &buildings, 3)
            .iter()
            .map(|b| b.id.clone())
            .collect();
        assert_eq!(
            ids,
            vec![Some(FeatureId::Num(2)), Some(FeatureId::Num(5)), Some(FeatureId::Num(3))]
        );
        assert!(nearest_buildings(center, &buildings, 0).is_empty());
        assert_eq!(nearest_buildings(center, &buildings, 10).len(), 5);
    }
}
