//! Via points for round trips.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::geo::destination;
use crate::snap::{Snap, SpatialIndex};
use crate::weighting::Weighting;

use super::RoundTripParams;

/// Roads run longer than the circle they approximate
const ROAD_DETOUR_FACTOR: f64 = 1.3;

/// Snapped via points on a circle through `start`, in travel order.
///
/// The circle's direction comes from the seed, so equal seeds give equal
/// trips. Points that cannot be snapped are dropped.
pub(crate) fn via_points(index: &SpatialIndex, w: &Weighting, start: &Snap, params: &RoundTripParams) -> Vec<Snap> {
    let mut rng = StdRng::seed_from_u64(params.seed);
    let heading: f64 = rng.random_range(0.0..360.0);
    let radius = params.length / (2.0 * PI * ROAD_DETOUR_FACTOR);
    let center = destination(start.location, heading, radius);

    let count = params.points.saturating_sub(1).max(1);
    let step = 360.0 / (count + 1) as f64;
    let mut vias: Vec<Snap> = Vec::with_capacity(count);
    for k in 1..=count {
        // Walk the circle starting from the side facing `start`
        let angle = heading + 180.0 + step * k as f64;
        let target = destination(center, angle, radius);
        let Some(snap) = index.snap(target, radius, |e| w.accessible_any(e)) else {
            tracing::debug!(k, "round trip point could not be snapped");
            continue;
        };
        let repeated = vias.last().map_or(snap.edge == start.edge, |l| l.edge == snap.edge);
        if !repeated {
            vias.push(snap);
        }
    }
    vias
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RouteGraph;
    use crate::parse::OsmData;
    use crate::profiles::Profile;

    fn ring() -> RouteGraph {
        let mut data = OsmData::default();
        data.add_node(1, 8.000, 49.000);
        data.add_node(2, 8.010, 49.000);
        data.add_node(3, 8.010, 49.007);
        data.add_node(4, 8.000, 49.007);
        data.add_way(1, &[1, 2, 3, 4, 1], &[("highway", "residential")]);
        RouteGraph::from_osm(&data, &[Profile::FootWalking]).unwrap()
    }

    #[test]
    fn test_same_seed_same_points() {
        let g = ring();
        let idx = SpatialIndex::build(&g);
        let w = Weighting::fastest(&g, Profile::FootWalking).unwrap();
        let start = idx.snap([8.005, 49.0], 50.0, |_| true).unwrap();
        let params = RoundTripParams {
            length: 3000.0,
            points: 3,
            seed: 7,
        };
        let a = via_points(&idx, &w, &start, &params);
        let b = via_points(&idx, &w, &start, &params);
        assert_eq!(a, b);
        assert!(a.first().map_or(true, |s| s.edge != start.edge));
    }
}
