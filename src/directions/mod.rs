//! Directions: snapping the waypoints, searching each leg and assembling
//! the legs into routes with segments, steps, extras and warnings.

mod alternatives;
pub mod extras;
pub mod instructions;
pub mod request;
mod round_trip;

use chrono::{NaiveDateTime, TimeDelta};
use geo::{Coord, LineString, Polygon, SimplifyIdx};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::geo::{bearing, bearing_delta, haversine_distance};
use crate::graph::RouteGraph;
use crate::profiles::Profile;
use crate::route::{find_path, Departure, Path, PathPiece, SearchLimits};
use crate::snap::{Snap, SpatialIndex};
use crate::weighting::{EdgeFilter, Preference, VehicleRestrictions, VehicleType, Weighting, WheelchairRestrictions};

pub use extras::{ExtraInfo, ExtraInfoResult, Warning};
pub use instructions::{Maneuver, Step};
pub use request::{DirectionsRequest, InstructionsFormat, Language, RouteAttribute, Units};

use extras::ExtraContext;
use instructions::InstructionOptions;
use request::round_to;

/// Output format of departure and arrival times
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Douglas-Peucker tolerance in degrees
const SIMPLIFY_EPSILON: f64 = 0.00005;

/// A validated directions request
#[derive(Debug, Clone)]
pub struct RouteQuery {
    pub profile: Profile,
    pub coordinates: Vec<[f64; 2]>,
    pub preference: Preference,
    pub units: Units,
    pub language: Language,
    pub geometry: bool,
    pub instructions: bool,
    pub instructions_format: InstructionsFormat,
    pub roundabout_exits: bool,
    pub maneuvers: bool,
    pub elevation: bool,
    pub simplify: bool,
    pub extra_info: Vec<ExtraInfo>,
    pub attributes: Vec<RouteAttribute>,
    /// Metres per coordinate, -1 for unlimited
    pub radiuses: Vec<f64>,
    /// `(bearing, deviation)` per coordinate
    pub bearings: Vec<Option<(f64, f64)>>,
    pub continue_straight: bool,
    /// 1-based segment numbers
    pub skip_segments: Vec<usize>,
    pub suppress_warnings: bool,
    pub avoid_flags: u8,
    pub avoid_polygons: Vec<Polygon<f64>>,
    pub restrictions: Option<VehicleRestrictions>,
    pub wheelchair: Option<WheelchairRestrictions>,
    pub vehicle_type: Option<VehicleType>,
    pub maximum_speed: Option<f64>,
    pub departure: Option<NaiveDateTime>,
    pub arrival: Option<NaiveDateTime>,
    pub alternatives: Option<AlternativeParams>,
    pub round_trip: Option<RoundTripParams>,
    pub max_visited_nodes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlternativeParams {
    pub target_count: usize,
    pub weight_factor: f64,
    pub share_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundTripParams {
    pub length: f64,
    pub points: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RouteSummary {
    pub distance: f64,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Segment {
    pub distance: f64,
    pub duration: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detourfactor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avgspeed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descent: Option<f64>,
}

/// One computed route. Geometry is written by the response formats.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteResult {
    pub summary: RouteSummary,
    pub segments: Vec<Segment>,
    /// `[min_lon, min_lat, (min_ele,) max_lon, max_lat (, max_ele)]`
    pub bbox: Vec<f64>,
    pub way_points: Vec<usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, ExtraInfoResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival: Option<String>,
    /// `[lon, lat]` or `[lon, lat, ele]`
    #[serde(skip)]
    pub geometry: Vec<Vec<f64>>,
}

impl RouteResult {
    pub fn has_elevation(&self) -> bool {
        self.geometry.first().is_some_and(|p| p.len() == 3)
    }
}

/// Traversal between two consecutive track points
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Span {
    /// `None` for straight lines over skipped segments
    pub edge: Option<u32>,
    pub reverse: bool,
    pub distance: f64,
    pub duration: f64,
}

/// Points of a route with one span between each consecutive pair.
#[derive(Debug, Clone, Default)]
pub(crate) struct Track {
    pub points: Vec<[f64; 2]>,
    pub elevations: Vec<Option<f64>>,
    pub spans: Vec<Span>,
    /// Index of the point each leg ends at, starting with 0
    pub way_points: Vec<usize>,
}

impl Track {
    fn begin(&mut self, point: [f64; 2], ele: Option<f64>) {
        if self.points.is_empty() {
            self.points.push(point);
            self.elevations.push(ele);
            self.way_points.push(0);
        }
    }

    fn append_path(&mut self, w: &Weighting, path: &Path, start: [f64; 2]) {
        let graph = w.graph;
        let start_ele = path
            .pieces
            .first()
            .and_then(|p| graph.elevation_on_edge(p.edge, p.start));
        self.begin(start, start_ele);
        for p in &path.pieces {
            let len = crate::route::piece_length(w, p);
            self.spans.push(Span {
                edge: Some(p.edge),
                reverse: p.reverse,
                distance: len,
                duration: w.duration(p.edge, p.reverse, len),
            });
            self.points.push(graph.point_on_edge(p.edge, p.end));
            self.elevations.push(graph.elevation_on_edge(p.edge, p.end));
        }
        self.way_points.push(self.points.len() - 1);
    }

    fn append_straight(&mut self, a: [f64; 2], b: [f64; 2]) {
        self.begin(a, None);
        self.spans.push(Span {
            edge: None,
            reverse: false,
            distance: haversine_distance(a, b),
            duration: 0.0,
        });
        self.points.push(b);
        self.elevations.push(None);
        self.way_points.push(self.points.len() - 1);
    }

    /// Elevation for every point; gaps take the nearest earlier value,
    /// leading gaps the first known one.
    fn filled_elevations(&self) -> Vec<f64> {
        let mut last = self.elevations.iter().flatten().next().copied().unwrap_or(0.0);
        self.elevations
            .iter()
            .map(|e| {
                if let Some(v) = e {
                    last = *v;
                }
                last
            })
            .collect()
    }

    fn distance(&self, from: usize, to: usize) -> f64 {
        self.spans[from..to].iter().map(|s| s.distance).sum()
    }

    fn duration(&self, from: usize, to: usize) -> f64 {
        self.spans[from..to].iter().map(|s| s.duration).sum()
    }
}

/// Allowed departure directions on the start edge of a leg.
fn departure_for(
    graph: &RouteGraph,
    from: &Snap,
    heading: Option<(f64, f64)>,
    arrived_on: Option<PathPiece>,
) -> Departure {
    let mut d = Departure::default();
    if let Some((value, deviation)) = heading {
        let e = &graph.edges[from.edge as usize];
        let along = bearing(graph.coord(e.from), graph.coord(e.to));
        d.forward = bearing_delta(along, value) <= deviation;
        d.reverse = bearing_delta((along + 180.0) % 360.0, value) <= deviation;
    }
    if let Some(piece) = arrived_on {
        if piece.edge == from.edge {
            if piece.reverse {
                d.forward = false;
            } else {
                d.reverse = false;
            }
        }
    }
    d
}

/// Compute the routes for `query`. Alternatives yield several routes.
pub fn compute(graph: &RouteGraph, index: &SpatialIndex, query: &RouteQuery) -> Result<Vec<RouteResult>, EngineError> {
    let mut filter = EdgeFilter {
        avoid_flags: query.avoid_flags,
        restrictions: query.restrictions,
        wheelchair: query.wheelchair,
        vehicle_type: query.vehicle_type,
        hgv: query.profile == Profile::DrivingHgv,
        ..Default::default()
    };
    if !query.avoid_polygons.is_empty() {
        filter.block_polygons(graph, index, &query.avoid_polygons);
    }
    let w = Weighting::new(graph, query.profile, query.preference, filter, query.maximum_speed)?;
    let limits = SearchLimits {
        max_visited_nodes: query.max_visited_nodes,
    };
    let n = query.coordinates.len();

    let snap_at = |i: usize| index.snap(query.coordinates[i], query.radiuses[i], |e| w.accessible_any(e));
    let not_found = |i: usize| EngineError::PointNotFound {
        index: i,
        lon: query.coordinates[i][0],
        lat: query.coordinates[i][1],
        radius: query.radiuses[i],
    };

    if let Some(rt) = &query.round_trip {
        let start = snap_at(0).ok_or_else(|| not_found(0))?;
        let mut stops = vec![start];
        stops.extend(round_trip::via_points(index, &w, &start, rt));
        stops.push(start);
        let mut track = Track::default();
        for (k, pair) in stops.windows(2).enumerate() {
            let path = find_path(&w, &pair[0], &pair[1], Departure::default(), None, limits)
                .ok_or(EngineError::RouteNotFound { from: k, to: k + 1 })?;
            track.append_path(&w, &path, pair[0].location);
        }
        let bounds = [0, track.points.len() - 1];
        return Ok(vec![assemble(&w, query, &track, &bounds, false)]);
    }

    let skipped = |segment: usize| query.skip_segments.contains(&(segment + 1));
    let mut snaps: Vec<Option<Snap>> = Vec::with_capacity(n);
    for i in 0..n {
        let required = (i > 0 && !skipped(i - 1)) || (i + 1 < n && !skipped(i));
        match snap_at(i) {
            Some(s) => snaps.push(Some(s)),
            None if required => return Err(not_found(i)),
            None => snaps.push(None),
        }
    }
    let locations: Vec<[f64; 2]> = snaps
        .iter()
        .zip(&query.coordinates)
        .map(|(s, c)| s.map_or(*c, |s| s.location))
        .collect();

    if let (Some(params), [Some(from), Some(to)]) = (&query.alternatives, snaps.as_slice()) {
        if query.skip_segments.is_empty() {
            let paths = alternatives::find_alternatives(&w, from, to, params, limits)
                .ok_or(EngineError::RouteNotFound { from: 0, to: 1 })?;
            return Ok(paths
                .iter()
                .map(|p| {
                    let mut track = Track::default();
                    track.append_path(&w, p, from.location);
                    let bounds = track.way_points.clone();
                    assemble(&w, query, &track, &bounds, false)
                })
                .collect());
        }
    }

    let mut track = Track::default();
    let mut arrived_on: Option<PathPiece> = None;
    for segment in 0..n - 1 {
        if skipped(segment) {
            track.append_straight(locations[segment], locations[segment + 1]);
            arrived_on = None;
            continue;
        }
        let (Some(from), Some(to)) = (snaps[segment], snaps[segment + 1]) else {
            return Err(not_found(segment));
        };
        let heading = query.bearings.get(segment).copied().flatten();
        let strict = departure_for(graph, &from, heading, arrived_on.filter(|_| query.continue_straight));
        let relaxed = departure_for(graph, &from, heading, None);
        let path = find_path(&w, &from, &to, strict, None, limits)
            .or_else(|| (strict != relaxed).then(|| find_path(&w, &from, &to, relaxed, None, limits)).flatten())
            .ok_or(EngineError::RouteNotFound {
                from: segment,
                to: segment + 1,
            })?;
        track.append_path(&w, &path, from.location);
        arrived_on = path.pieces.last().copied();
    }
    let bounds = track.way_points.clone();
    Ok(vec![assemble(&w, query, &track, &bounds, !query.skip_segments.is_empty())])
}

/// Total ascent and descent over an elevation profile
fn climb(elevations: &[f64]) -> (f64, f64) {
    elevations.windows(2).fold((0.0, 0.0), |(up, down), pair| {
        let d = pair[1] - pair[0];
        if d > 0.0 {
            (up + d, down)
        } else {
            (up, down - d)
        }
    })
}

fn bbox(geometry: &[Vec<f64>]) -> Vec<f64> {
    let dims = geometry.first().map_or(2, Vec::len);
    let mut min = vec![f64::INFINITY; dims];
    let mut max = vec![f64::NEG_INFINITY; dims];
    for p in geometry {
        for (d, v) in p.iter().enumerate().take(dims) {
            min[d] = min[d].min(*v);
            max[d] = max[d].max(*v);
        }
    }
    if geometry.is_empty() {
        return Vec::new();
    }
    min.into_iter().chain(max).collect()
}

/// Drop points within tolerance of the line, keeping every index in
/// `protected`. Returns the kept points and the old-to-new index map.
fn simplify_geometry(points: &[Vec<f64>], mut protected: Vec<usize>) -> (Vec<Vec<f64>>, Vec<usize>) {
    let n = points.len();
    protected.push(0);
    protected.push(n - 1);
    protected.sort_unstable();
    protected.dedup();

    let mut keep = vec![false; n];
    for &i in &protected {
        keep[i] = true;
    }
    for pair in protected.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let line: LineString<f64> = points[a..=b].iter().map(|p| Coord { x: p[0], y: p[1] }).collect();
        for idx in line.simplify_idx(&SIMPLIFY_EPSILON) {
            keep[a + idx] = true;
        }
    }

    let mut out = Vec::with_capacity(n);
    let mut map = Vec::with_capacity(n);
    for (i, p) in points.iter().enumerate() {
        if keep[i] {
            out.push(p.clone());
        }
        map.push(out.len().saturating_sub(1));
    }
    (out, map)
}

fn assemble(w: &Weighting, query: &RouteQuery, track: &Track, bounds: &[usize], has_skipped: bool) -> RouteResult {
    let graph = w.graph;
    let units = query.units;
    let elevations = track.filled_elevations();
    let total_distance = track.distance(0, track.spans.len());
    let total_duration = track.duration(0, track.spans.len());

    let opts = InstructionOptions {
        language: query.language,
        format: query.instructions_format,
        units,
        maneuvers: query.maneuvers,
        roundabout_exits: query.roundabout_exits,
    };
    let wants = |attr: RouteAttribute| query.attributes.contains(&attr);
    let mut segments: Vec<Segment> = bounds
        .windows(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let distance = track.distance(a, b);
            let duration = track.duration(a, b);
            let (ascent, descent) = climb(&elevations[a..=b]);
            let crow = haversine_distance(track.points[a], track.points[b]);
            Segment {
                distance: units.distance(distance),
                duration: round_to(duration, 1),
                steps: if query.instructions {
                    instructions::build_steps(graph, w, track, &opts, a, b)
                } else {
                    Vec::new()
                },
                detourfactor: wants(RouteAttribute::Detourfactor)
                    .then(|| if crow > 0.0 { round_to(distance / crow, 2) } else { 0.0 }),
                percentage: wants(RouteAttribute::Percentage).then(|| {
                    if total_distance > 0.0 {
                        round_to(distance / total_distance * 100.0, 2)
                    } else {
                        0.0
                    }
                }),
                avgspeed: wants(RouteAttribute::Avgspeed)
                    .then(|| if duration > 0.0 { units.speed(distance / duration) } else { 0.0 }),
                ascent: query.elevation.then_some(round_to(ascent, 1)),
                descent: query.elevation.then_some(round_to(descent, 1)),
            }
        })
        .collect();

    let detected = if query.suppress_warnings {
        Vec::new()
    } else {
        extras::detect_warnings(graph, query.profile, track, has_skipped)
    };
    let implied: Vec<ExtraInfo> = detected.iter().filter_map(|(_, e)| *e).collect();
    let ctx = ExtraContext {
        graph,
        profile: query.profile,
        units,
        elevations: &elevations,
    };
    let extras = extras::collect(&ctx, track, &query.extra_info, &implied);
    let warnings: Vec<Warning> = detected.into_iter().map(|(warning, _)| warning).collect();

    let mut geometry: Vec<Vec<f64>> = track
        .points
        .iter()
        .zip(&elevations)
        .map(|(p, e)| {
            if query.elevation {
                vec![p[0], p[1], round_to(*e, 1)]
            } else {
                vec![p[0], p[1]]
            }
        })
        .collect();
    let mut way_points = bounds.to_vec();

    if query.simplify && geometry.len() > 2 {
        let mut protected = way_points.clone();
        for step in segments.iter().flat_map(|s| &s.steps) {
            protected.extend(step.way_points);
        }
        let (simplified, map) = simplify_geometry(&geometry, protected);
        geometry = simplified;
        for wp in &mut way_points {
            *wp = map[*wp];
        }
        for step in segments.iter_mut().flat_map(|s| &mut s.steps) {
            step.way_points = [map[step.way_points[0]], map[step.way_points[1]]];
        }
    }

    let (ascent, descent) = climb(&elevations);
    let travel = TimeDelta::milliseconds((total_duration * 1000.0).round() as i64);
    let (departure, arrival) = match (query.departure, query.arrival) {
        (Some(d), _) => (Some(d), d.checked_add_signed(travel)),
        (None, Some(a)) => (a.checked_sub_signed(travel), Some(a)),
        (None, None) => (None, None),
    };

    RouteResult {
        summary: RouteSummary {
            distance: units.distance(total_distance),
            duration: round_to(total_duration, 1),
            ascent: query.elevation.then_some(round_to(ascent, 1)),
            descent: query.elevation.then_some(round_to(descent, 1)),
        },
        segments,
        bbox: bbox(&geometry),
        way_points,
        extras,
        warnings,
        departure: departure.map(|t| t.format(TIME_FORMAT).to_string()),
        arrival: arrival.map(|t| t.format(TIME_FORMAT).to_string()),
        geometry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingLimits;
    use crate::formats::ResponseFormat;
    use crate::parse::OsmData;

    /// Main Street east, then Side Street north, plus a dead end footway.
    fn corner() -> RouteGraph {
        let mut data = OsmData::default();
        data.add_node_with_ele(1, 8.000, 49.000, 100.0);
        data.add_node_with_ele(2, 8.005, 49.000, 105.0);
        data.add_node_with_ele(3, 8.010, 49.000, 110.0);
        data.add_node_with_ele(4, 8.010, 49.010, 90.0);
        data.add_node(5, 8.010, 48.995);
        data.add_way(1, &[1, 2, 3], &[("highway", "residential"), ("name", "Main Street")]);
        data.add_way(2, &[3, 4], &[("highway", "residential"), ("name", "Side Street")]);
        data.add_way(3, &[3, 5], &[("highway", "footway")]);
        RouteGraph::from_osm(&data, &[Profile::DrivingCar, Profile::FootWalking]).unwrap()
    }

    fn query(body: serde_json::Value, profile: Profile) -> RouteQuery {
        let req: DirectionsRequest = serde_json::from_value(body).unwrap();
        request::validate(&req, profile, ResponseFormat::Json, &RoutingLimits::default()).unwrap()
    }

    #[test]
    fn test_route_with_turn() {
        let g = corner();
        let idx = SpatialIndex::build(&g);
        let q = query(
            serde_json::json!({"coordinates": [[8.001, 49.0], [8.010, 49.008]]}),
            Profile::DrivingCar,
        );
        let routes = compute(&g, &idx, &q).unwrap();
        assert_eq!(routes.len(), 1);
        let r = &routes[0];
        assert_eq!(r.segments.len(), 1);
        let types: Vec<u8> = r.segments[0].steps.iter().map(|s| s.step_type).collect();
        assert_eq!(types, vec![instructions::DEPART, instructions::TURN_LEFT, instructions::GOAL]);
        assert_eq!(r.segments[0].steps[1].name, "Side Street");
        assert_eq!(r.way_points, vec![0, r.geometry.len() - 1]);
        let last = r.segments[0].steps.last().unwrap();
        assert_eq!(last.way_points, [r.geometry.len() - 1, r.geometry.len() - 1]);
        assert!((r.summary.distance - 1543.0).abs() < 10.0, "got {}", r.summary.distance);
    }

    #[test]
    fn test_segments_per_waypoint_pair() {
        let g = corner();
        let idx = SpatialIndex::build(&g);
        let q = query(
            serde_json::json!({"coordinates": [[8.001, 49.0], [8.008, 49.0], [8.010, 49.008]]}),
            Profile::DrivingCar,
        );
        let r = &compute(&g, &idx, &q).unwrap()[0];
        assert_eq!(r.segments.len(), 2);
        assert_eq!(r.way_points.len(), 3);
        let sum: f64 = r.segments.iter().map(|s| s.distance).sum();
        assert!((sum - r.summary.distance).abs() < 0.5);
    }

    #[test]
    fn test_skip_segments_straight_line() {
        let g = corner();
        let idx = SpatialIndex::build(&g);
        let q = query(
            serde_json::json!({"coordinates": [[8.001, 49.0], [8.010, 49.008], [7.9, 48.9]], "skip_segments": [2]}),
            Profile::DrivingCar,
        );
        let r = &compute(&g, &idx, &q).unwrap()[0];
        assert_eq!(r.segments.len(), 2);
        assert_eq!(r.segments[1].duration, 0.0);
        assert!(r.warnings.iter().any(|w| w.code == extras::WARNING_SKIPPED_SEGMENTS));
        assert_eq!(r.geometry.last().unwrap(), &vec![7.9, 48.9]);
    }

    #[test]
    fn test_point_not_found() {
        let g = corner();
        let idx = SpatialIndex::build(&g);
        let q = query(
            serde_json::json!({"coordinates": [[8.001, 49.0], [9.0, 50.0]]}),
            Profile::DrivingCar,
        );
        let err = compute(&g, &idx, &q).unwrap_err();
        assert!(matches!(err, EngineError::PointNotFound { index: 1, .. }));
    }

    #[test]
    fn test_elevation_and_bbox() {
        let g = corner();
        let idx = SpatialIndex::build(&g);
        let q = query(
            serde_json::json!({"coordinates": [[8.0, 49.0], [8.010, 49.010]], "elevation": true}),
            Profile::DrivingCar,
        );
        let r = &compute(&g, &idx, &q).unwrap()[0];
        assert!(r.has_elevation());
        assert_eq!(r.bbox.len(), 6);
        assert_eq!(r.summary.ascent, Some(10.0));
        assert_eq!(r.summary.descent, Some(20.0));
    }

    #[test]
    fn test_departure_gives_arrival() {
        let g = corner();
        let idx = SpatialIndex::build(&g);
        let q = query(
            serde_json::json!({"coordinates": [[8.0, 49.0], [8.010, 49.0]], "departure": "2024-05-01T08:00:00"}),
            Profile::FootWalking,
        );
        let r = &compute(&g, &idx, &q).unwrap()[0];
        assert_eq!(r.departure.as_deref(), Some("2024-05-01T08:00:00"));
        // ~730 m on foot
        let arrival = r.arrival.as_deref().unwrap();
        assert!(arrival > "2024-05-01T08:05:00" && arrival < "2024-05-01T08:15:00", "got {arrival}");
    }

    #[test]
    fn test_simplify_keeps_way_points() {
        let points: Vec<Vec<f64>> = (0..10).map(|i| vec![8.0 + i as f64 * 0.001, 49.0]).collect();
        let (out, map) = simplify_geometry(&points, vec![4]);
        assert_eq!(out.len(), 3);
        assert_eq!(map[0], 0);
        assert_eq!(map[4], 1);
        assert_eq!(map[9], 2);
    }

    #[test]
    fn test_filled_elevations() {
        let track = Track {
            elevations: vec![None, Some(5.0), None, Some(7.0)],
            ..Default::default()
        };
        assert_eq!(track.filled_elevations(), vec![5.0, 5.0, 5.0, 7.0]);
    }

    #[test]
    fn test_departure_for_bearing() {
        let g = corner();
        let idx = SpatialIndex::build(&g);
        let s = idx.snap([8.002, 49.0], 50.0, |_| true).unwrap();
        let east = departure_for(&g, &s, Some((90.0, 30.0)), None);
        let e = &g.edges[s.edge as usize];
        let stored_east = g.coord(e.to)[0] > g.coord(e.from)[0];
        assert_eq!(east.forward, stored_east);
        assert_eq!(east.reverse, !stored_east);
    }
}
