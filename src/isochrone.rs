//! Reachability polygons from a bounded shortest path tree.
//!
//! Reached nodes plus the cut points on frontier edges are wrapped in a
//! concave hull per range value.

use geo::{ConcaveHull, Coord, MultiPoint, Polygon};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::IsochroneLimits;
use crate::directions::request::{parse_coordinate, round_to};
use crate::directions::Units;
use crate::error::{ApiError, EngineError, ErrorKind, Service};
use crate::geo::{interpolate, polygon_area_m2};
use crate::graph::RouteGraph;
use crate::profiles::Profile;
use crate::route::{shortest_path_tree, SearchLimits, ShortestPathTree};
use crate::snap::SpatialIndex;
use crate::weighting::{EdgeFilter, Preference, Weighting};

const SERVICE: Service = Service::Isochrones;
const DEFAULT_SMOOTHING: f64 = 25.0;
/// Half size in degrees of the box used when too few points are reached
const MIN_POLYGON_HALF_SIZE: f64 = 0.0001;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    #[default]
    Time,
    Distance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    #[default]
    Start,
    Destination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IsochroneAttribute {
    Area,
    Reachfactor,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct IsochronesRequest {
    #[schema(example = json!([[8.681495, 49.41461]]))]
    pub locations: Vec<Vec<f64>>,
    /// Seconds for time, `units` for distance
    #[schema(example = json!([300, 600]))]
    pub range: Vec<f64>,
    #[serde(default)]
    pub range_type: RangeType,
    /// Split a single range into steps of this size
    pub interval: Option<f64>,
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub area_units: Units,
    #[serde(default)]
    pub attributes: Vec<IsochroneAttribute>,
    #[serde(default)]
    pub location_type: LocationType,
    /// 0 follows the roads closely, 100 is close to convex
    pub smoothing: Option<f64>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsochroneQuery {
    pub profile: Profile,
    pub locations: Vec<[f64; 2]>,
    /// Ascending; seconds or metres
    pub ranges: Vec<f64>,
    pub range_type: RangeType,
    pub units: Units,
    pub area_units: Units,
    pub area: bool,
    pub reachfactor: bool,
    pub location_type: LocationType,
    pub concavity: f64,
    pub radius: f64,
}

pub fn validate(req: &IsochronesRequest, profile: Profile, limits: &IsochroneLimits) -> Result<IsochroneQuery, ApiError> {
    if req.locations.is_empty() {
        return Err(ApiError::new(SERVICE, ErrorKind::EmptyElement, "Parameter 'locations' must not be empty."));
    }
    if req.locations.len() > limits.maximum_locations {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!("Only {} locations are allowed.", limits.maximum_locations),
        ));
    }
    let locations = req
        .locations
        .iter()
        .map(|c| parse_coordinate(SERVICE, "locations", c))
        .collect::<Result<Vec<_>, _>>()?;

    if req.range.is_empty() {
        return Err(ApiError::new(SERVICE, ErrorKind::EmptyElement, "Parameter 'range' must not be empty."));
    }
    if let Some(bad) = req.range.iter().find(|r| **r <= 0.0 || !r.is_finite()) {
        return Err(ApiError::invalid_value(SERVICE, "range", bad));
    }
    // Distances are given in `units`
    let to_base = |v: f64| match req.range_type {
        RangeType::Time => v,
        RangeType::Distance => v / req.units.factor(),
    };
    let mut ranges: Vec<f64> = match req.interval {
        Some(interval) if req.range.len() == 1 => {
            if interval <= 0.0 {
                return Err(ApiError::invalid_value(SERVICE, "interval", interval));
            }
            let max = req.range[0];
            let mut out = Vec::new();
            let mut v = interval;
            while v < max && out.len() <= limits.maximum_intervals {
                out.push(v);
                v += interval;
            }
            out.push(max);
            out
        }
        Some(_) => return Err(ApiError::incompatible(SERVICE, "interval", "range")),
        None => req.range.clone(),
    };
    ranges.sort_by(f64::total_cmp);
    ranges.dedup();
    if ranges.len() > limits.maximum_intervals {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!("Only {} intervals are allowed.", limits.maximum_intervals),
        ));
    }
    let ranges: Vec<f64> = ranges.into_iter().map(to_base).collect();
    let max = ranges.last().copied().unwrap_or(0.0);
    let limit = match req.range_type {
        RangeType::Time => limits.maximum_range_time,
        RangeType::Distance => limits.maximum_range_distance,
    };
    if max > limit {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!("The maximum range must not exceed {limit}."),
        ));
    }

    let smoothing = req.smoothing.unwrap_or(DEFAULT_SMOOTHING);
    if !(0.0..=100.0).contains(&smoothing) {
        return Err(ApiError::invalid_value(SERVICE, "smoothing", smoothing));
    }

    Ok(IsochroneQuery {
        profile,
        locations,
        ranges,
        range_type: req.range_type,
        units: req.units,
        area_units: req.area_units,
        area: req.attributes.contains(&IsochroneAttribute::Area),
        reachfactor: req.attributes.contains(&IsochroneAttribute::Reachfactor),
        location_type: req.location_type,
        concavity: 1.0 + smoothing / 100.0 * 4.0,
        radius: limits.search_radius,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct IsochroneProperties {
    pub group_index: usize,
    /// Range value in seconds or `units`
    pub value: f64,
    #[schema(value_type = Vec<f64>)]
    pub center: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachfactor: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Isochrone {
    pub polygon: Polygon<f64>,
    pub properties: IsochroneProperties,
}

/// Points inside `range` of the tree: reached nodes and frontier cut points.
fn reach_points(w: &Weighting, tree: &ShortestPathTree, range: f64) -> Vec<Coord<f64>> {
    let graph = w.graph;
    let origin = &tree.origin;
    let mut points = vec![Coord {
        x: origin.location[0],
        y: origin.location[1],
    }];
    // Along the origin edge, both ways
    let e0 = &graph.edges[origin.edge as usize];
    for (reverse, end, share) in [(false, e0.to, 1.0 - origin.fraction), (true, e0.from, origin.fraction)] {
        let reverse = reverse != tree.backward;
        let per_metre = w.weight(origin.edge, reverse, 1.0);
        if !w.accessible(origin.edge, reverse) || per_metre <= 0.0 {
            continue;
        }
        let metres = share * e0.distance;
        if metres <= 0.0 {
            continue;
        }
        let t = (range / per_metre / metres).min(1.0);
        let cut = interpolate(origin.location, graph.coord(end), t);
        points.push(Coord { x: cut[0], y: cut[1] });
    }
    for (&node, label) in &tree.labels {
        if label.weight > range {
            continue;
        }
        let here = graph.coord(node);
        points.push(Coord { x: here[0], y: here[1] });
        for &edge in graph.incident(node) {
            let e = &graph.edges[edge as usize];
            let other = if e.from == node { e.to } else { e.from };
            // Direction the edge is travelled in by the search
            let leaving_reverse = e.to == node;
            let reverse = if tree.backward { !leaving_reverse } else { leaving_reverse };
            if !w.accessible(edge, reverse) {
                continue;
            }
            let cost = w.weight(edge, reverse, e.distance);
            let left = range - label.weight;
            if cost > left && cost > 0.0 {
                let cut = interpolate(here, graph.coord(other), left / cost);
                points.push(Coord { x: cut[0], y: cut[1] });
            }
        }
    }
    points
}

fn hull(points: Vec<Coord<f64>>, concavity: f64) -> Polygon<f64> {
    if points.len() < 3 {
        let c = points.first().copied().unwrap_or(Coord { x: 0.0, y: 0.0 });
        let d = MIN_POLYGON_HALF_SIZE;
        return crate::geo::polygon_from_ring(&[
            [c.x - d, c.y - d],
            [c.x + d, c.y - d],
            [c.x + d, c.y + d],
            [c.x - d, c.y + d],
            [c.x - d, c.y - d],
        ]);
    }
    let multi_point: MultiPoint<f64> = points.into_iter().collect();
    multi_point.concave_hull(concavity)
}

fn area_in(units: Units, square_metres: f64) -> f64 {
    let f = units.factor();
    square_metres * f * f
}

pub fn compute(graph: &RouteGraph, index: &SpatialIndex, query: &IsochroneQuery) -> Result<Vec<Isochrone>, EngineError> {
    let preference = match query.range_type {
        RangeType::Time => Preference::Fastest,
        RangeType::Distance => Preference::Shortest,
    };
    let w = Weighting::new(graph, query.profile, preference, EdgeFilter::default(), None)?;
    let max_range = query.ranges.last().copied().unwrap_or(0.0);
    let backward = query.location_type == LocationType::Destination;

    let mut out = Vec::with_capacity(query.locations.len() * query.ranges.len());
    for (group_index, location) in query.locations.iter().enumerate() {
        let origin = index
            .snap(*location, query.radius, |e| w.accessible_any(e))
            .ok_or(EngineError::PointNotFound {
                index: group_index,
                lon: location[0],
                lat: location[1],
                radius: query.radius,
            })?;
        let tree = shortest_path_tree(&w, &origin, max_range, backward, SearchLimits::default());
        tracing::debug!(group_index, reached = tree.labels.len(), "isochrone tree built");

        for &range in &query.ranges {
            let polygon = hull(reach_points(&w, &tree, range), query.concavity);
            let area_m2 = polygon_area_m2(&polygon);
            let reach_radius = match query.range_type {
                RangeType::Time => range * w.data.max_speed / 3.6,
                RangeType::Distance => range,
            };
            let value = match query.range_type {
                RangeType::Time => range,
                RangeType::Distance => round_to(range * query.units.factor(), 6),
            };
            out.push(Isochrone {
                properties: IsochroneProperties {
                    group_index,
                    value,
                    center: origin.location,
                    area: query.area.then(|| round_to(area_in(query.area_units, area_m2), 4)),
                    reachfactor: query.reachfactor.then(|| {
                        let circle = std::f64::consts::PI * reach_radius * reach_radius;
                        if circle > 0.0 {
                            round_to((area_m2 / circle).min(1.0), 4)
                        } else {
                            0.0
                        }
                    }),
                },
                polygon,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::OsmData;

    fn grid() -> RouteGraph {
        let mut data = OsmData::default();
        let mut id = 1;
        for row in 0..5 {
            for col in 0..5 {
                data.add_node(id, 8.0 + col as f64 * 0.002, 49.0 + row as f64 * 0.002);
                id += 1;
            }
        }
        let node = |row: i64, col: i64| row * 5 + col + 1;
        let mut way = 1;
        for row in 0..5 {
            let nodes: Vec<i64> = (0..5).map(|c| node(row, c)).collect();
            data.add_way(way, &nodes, &[("highway", "residential")]);
            way += 1;
        }
        for col in 0..5 {
            let nodes: Vec<i64> = (0..5).map(|r| node(r, col)).collect();
            data.add_way(way, &nodes, &[("highway", "residential")]);
            way += 1;
        }
        RouteGraph::from_osm(&data, &[Profile::FootWalking]).unwrap()
    }

    fn query(body: serde_json::Value) -> IsochroneQuery {
        let req: IsochronesRequest = serde_json::from_value(body).unwrap();
        validate(&req, Profile::FootWalking, &IsochroneLimits::default()).unwrap()
    }

    #[test]
    fn test_interval_expansion() {
        let q = query(serde_json::json!({"locations": [[8.004, 49.004]], "range": [600], "interval": 200}));
        assert_eq!(q.ranges, vec![200.0, 400.0, 600.0]);
    }

    #[test]
    fn test_distance_units() {
        let q = query(serde_json::json!({
            "locations": [[8.004, 49.004]], "range": [1.5], "range_type": "distance", "units": "km"
        }));
        assert!((q.ranges[0] - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_limits() {
        let req: IsochronesRequest =
            serde_json::from_value(serde_json::json!({"locations": [[8.0, 49.0]], "range": [7200]})).unwrap();
        let err = validate(&req, Profile::FootWalking, &IsochroneLimits::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequestExceedsServerLimit);
        assert_eq!(err.code(), 3004);

        let req: IsochronesRequest = serde_json::from_value(serde_json::json!({
            "locations": [[8.0, 49.0], [8.1, 49.0], [8.2, 49.0]], "range": [60]
        }))
        .unwrap();
        assert!(validate(&req, Profile::FootWalking, &IsochroneLimits::default()).is_err());
    }

    #[test]
    fn test_larger_range_covers_more() {
        let g = grid();
        let idx = SpatialIndex::build(&g);
        let q = query(serde_json::json!({
            "locations": [[8.004, 49.004]], "range": [120, 300], "attributes": ["area", "reachfactor"]
        }));
        let isos = compute(&g, &idx, &q).unwrap();
        assert_eq!(isos.len(), 2);
        let small = isos[0].properties.area.unwrap();
        let large = isos[1].properties.area.unwrap();
        assert!(large > small, "{large} <= {small}");
        let rf = isos[1].properties.reachfactor.unwrap();
        assert!(rf > 0.0 && rf <= 1.0);
        assert_eq!(isos[0].properties.center, [8.004, 49.004]);
    }

    #[test]
    fn test_destination_tree_on_symmetric_grid() {
        let g = grid();
        let idx = SpatialIndex::build(&g);
        let start = query(serde_json::json!({"locations": [[8.004, 49.004]], "range": [200], "attributes": ["area"]}));
        let dest = query(serde_json::json!({
            "locations": [[8.004, 49.004]], "range": [200], "attributes": ["area"], "location_type": "destination"
        }));
        let a = compute(&g, &idx, &start).unwrap()[0].properties.area.unwrap();
        let b = compute(&g, &idx, &dest).unwrap()[0].properties.area.unwrap();
        assert!((a - b).abs() / a < 0.01);
    }
}
