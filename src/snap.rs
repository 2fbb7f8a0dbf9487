//! Spatial index for snapping coordinates onto graph edges

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::geo::{haversine_distance, project_on_segment, METRES_PER_DEGREE};
use crate::graph::RouteGraph;

/// Edge segment with its id for the R-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedSegment {
    pub a: [f64; 2], // [lon, lat]
    pub b: [f64; 2],
    pub edge: u32,
}

impl RTreeObject for IndexedSegment {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

impl PointDistance for IndexedSegment {
    // Planar, in degrees. Only used for candidate ordering.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let (dx, dy) = (self.b[0] - self.a[0], self.b[1] - self.a[1]);
        let len2 = dx * dx + dy * dy;
        let t = if len2 == 0.0 {
            0.0
        } else {
            (((point[0] - self.a[0]) * dx + (point[1] - self.a[1]) * dy) / len2).clamp(0.0, 1.0)
        };
        let px = self.a[0] + dx * t - point[0];
        let py = self.a[1] + dy * t - point[1];
        px * px + py * py
    }
}

/// Point projected onto an edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    pub edge: u32,
    /// Position along the edge's stored orientation, 0..=1
    pub fraction: f64,
    pub location: [f64; 2],
    /// Metres from the query point
    pub distance: f64,
}

pub struct SpatialIndex {
    tree: RTree<IndexedSegment>,
}

impl SpatialIndex {
    pub fn build(graph: &RouteGraph) -> Self {
        let segments: Vec<IndexedSegment> = graph
            .edges
            .iter()
            .enumerate()
            .map(|(id, e)| IndexedSegment {
                a: graph.coord(e.from),
                b: graph.coord(e.to),
                edge: id as u32,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(segments),
        }
    }

    /// Nearest point on an edge accepted by `usable`, within `radius` metres.
    ///
    /// A negative radius means unlimited.
    pub fn snap<F>(&self, point: [f64; 2], radius: f64, usable: F) -> Option<Snap>
    where
        F: Fn(u32) -> bool,
    {
        // Degrees of longitude shrink towards the poles; bound with the
        // slightly larger latitude so the cutoff never rejects a closer edge.
        let lat_bound = (point[1].abs() + 1.0).min(89.9);
        let metres_per_degree_min = METRES_PER_DEGREE * lat_bound.to_radians().cos();
        let limit = if radius < 0.0 { f64::INFINITY } else { radius };

        let mut best: Option<Snap> = None;
        for (seg, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&point) {
            let lower_bound = d2.sqrt() * metres_per_degree_min;
            let cutoff = best.map_or(limit, |b| b.distance.min(limit));
            if lower_bound > cutoff {
                break;
            }
            if !usable(seg.edge) {
                continue;
            }
            let (fraction, location) = project_on_segment(point, seg.a, seg.b);
            let distance = haversine_distance(point, location);
            if distance <= limit && best.map_or(true, |b| distance < b.distance) {
                best = Some(Snap {
                    edge: seg.edge,
                    fraction,
                    location,
                    distance,
                });
            }
        }
        best
    }

    /// Ids of edges whose bounding box intersects `[min, max]`.
    pub fn edges_in_envelope(&self, min: [f64; 2], max: [f64; 2]) -> Vec<u32> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_corners(min, max))
            .map(|s| s.edge)
            .collect()
    }
}
