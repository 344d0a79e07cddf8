//! Nearest-feature selection around a reference point
//!
//! Linear scan with squared-distance comparison. The overlays only ever see
//! a few dozen rendered features, so no spatial index.

use super::geo::{distance_sq, LngLat};

/// Radius and result cap for a proximity lookup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityQuery {
    /// Maximum distance in degrees (exclusive). `None` = unbounded.
    pub max_distance: Option<f64>,
    /// Maximum number of results
    pub cap: usize,
}

impl ProximityQuery {
    pub fn within(max_distance: f64, cap: usize) -> Self {
        Self {
            max_distance: Some(max_distance),
            cap,
        }
    }

    pub fn nearest(cap: usize) -> Self {
        Self {
            max_distance: None,
            cap,
        }
    }
}

/// A selected candidate with its distance to the reference point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor<'a, T> {
    pub item: &'a T,
    pub distance_sq: f64,
}

impl<T> Neighbor<'_, T> {
    pub fn distance(&self) -> f64 {
        self.distance_sq.sqrt()
    }
}

/// Candidates within the query radius, closest first, at most `query.cap`.
///
/// Ties keep their input order. Candidates whose anchor is `None` or
/// produces a non-finite distance are ignored.
pub fn nearest_within<'a, T, F>(
    reference: LngLat,
    candidates: &'a [T],
    anchor: F,
    query: ProximityQuery,
) -> Vec<Neighbor<'a, T>>
where
    F: Fn(&T) -> Option<LngLat>,
{
    if query.cap == 0 {
        return Vec::new();
    }
    let limit_sq = query.max_distance.map(|d| d * d);

    let mut hits: Vec<Neighbor<'a, T>> = candidates
        .iter()
        .filter_map(|item| {
            let d = distance_sq(reference, anchor(item)?);
            if !d.is_finite() {
                return None;
            }
            match limit_sq {
                Some(limit) if d >= limit => None,
                _ => Some(Neighbor { item, distance_sq: d }),
            }
        })
        .collect();

    hits.sort_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq));
    hits.truncate(query.cap);
    hits
}

/// The `k` closest candidates regardless of distance.
pub fn nearest_k<'a, T, F>(reference: LngLat, candidates: &'a [T], anchor: F, k: usize) -> Vec<Neighbor<'a, T>>
where
    F: Fn(&T) -> Option<LngLat>,
{
    nearest_within(reference, candidates, anchor, ProximityQuery::nearest(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Site {
        name: &'static str,
        at: LngLat,
    }

    fn sites() -> Vec<Site> {
        vec![
            Site { name: "far", at: [0.05, 0.0] },
            Site { name: "near", at: [0.001, 0.0] },
            Site { name: "mid", at: [0.0, 0.003] },
            Site { name: "nearest", at: [0.0005, 0.0] },
            Site { name: "edge", at: [0.004, 0.0] },
        ]
    }

    fn names(hits: &[Neighbor<'_, Site>]) -> Vec<&'static str> {
        hits.iter().map(|n| n.item.name).collect()
    }

    #[test]
    fn test_nearest_k_of_five() {
        let s = sites();
        let hits = nearest_k([0.0, 0.0], &s, |s| Some(s.at), 3);
        assert_eq!(names(&hits), vec!["nearest", "near", "mid"]);
        assert!(hits.windows(2).all(|w| w[0].distance_sq <= w[1].distance_sq));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let s = sites();
        let hits = nearest_within([0.0, 0.0], &s, |s| Some(s.at), ProximityQuery::within(0.004, 10));
        assert_eq!(names(&hits), vec!["nearest", "near", "mid"]);
    }

    #[test]
    fn test_cap_is_respected() {
        let s = sites();
        for cap in 0..7 {
            let hits = nearest_within([0.0, 0.0], &s, |s| Some(s.at), ProximityQuery::nearest(cap));
            assert_eq!(hits.len(), cap.min(s.len()));
        }
    }

    #[test]
    fn test_missing_anchor_skipped() {
        let s = sites();
        let hits = nearest_k(
            [0.0, 0.0],
            &s,
            |s| if s.name == "nearest" { None } else { Some(s.at) },
            1,
        );
        assert_eq!(names(&hits), vec!["near"]);
        assert!((hits[0].distance() - 0.001).abs() < 1e-12);
    }
}
