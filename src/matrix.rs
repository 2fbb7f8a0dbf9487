//! Many-to-many duration and distance tables.
//!
//! One Dijkstra per source that stops once every destination is settled;
//! rows are computed in parallel.

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::config::MatrixLimits;
use crate::directions::request::{parse_coordinate, round_to};
use crate::directions::Units;
use crate::error::{ApiError, EngineError, ErrorKind, Service};
use crate::graph::RouteGraph;
use crate::profiles::Profile;
use crate::route::{shortest_path_tree_to, SearchLimits, ShortestPathTree};
use crate::snap::{Snap, SpatialIndex};
use crate::weighting::{EdgeFilter, Preference, Weighting};

const SERVICE: Service = Service::Matrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatrixMetric {
    Duration,
    Distance,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MatrixRequest {
    #[schema(example = json!([[8.681495, 49.41461], [8.686507, 49.41943], [8.687872, 49.420318]]))]
    pub locations: Vec<Vec<f64>>,
    /// Indices into `locations`, or `["all"]`
    #[schema(value_type = Option<Vec<String>>)]
    pub sources: Option<Vec<Value>>,
    #[schema(value_type = Option<Vec<String>>)]
    pub destinations: Option<Vec<Value>>,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MatrixMetric>,
    #[serde(default)]
    pub resolve_locations: bool,
    #[serde(default)]
    pub units: Units,
    pub id: Option<String>,
}

fn default_metrics() -> Vec<MatrixMetric> {
    vec![MatrixMetric::Duration]
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixQuery {
    pub profile: Profile,
    pub locations: Vec<[f64; 2]>,
    pub sources: Vec<usize>,
    pub destinations: Vec<usize>,
    pub durations: bool,
    pub distances: bool,
    pub resolve_locations: bool,
    pub units: Units,
    pub radius: f64,
    pub max_visited_nodes: usize,
}

fn parse_indices(param: &str, values: Option<&[Value]>, count: usize) -> Result<Vec<usize>, ApiError> {
    let Some(values) = values else {
        return Ok((0..count).collect());
    };
    if values.is_empty() {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::EmptyElement,
            format!("Parameter '{param}' must not be empty."),
        ));
    }
    if values.len() == 1 && values[0].as_str() == Some("all") {
        return Ok((0..count).collect());
    }
    values
        .iter()
        .map(|v| {
            let index = match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse::<u64>().ok(),
                _ => None,
            };
            match index {
                Some(i) if (i as usize) < count => Ok(i as usize),
                _ => Err(ApiError::invalid_value(SERVICE, param, v)),
            }
        })
        .collect()
}

pub fn validate(req: &MatrixRequest, profile: Profile, limits: &MatrixLimits) -> Result<MatrixQuery, ApiError> {
    let locations = req
        .locations
        .iter()
        .map(|c| parse_coordinate(SERVICE, "locations", c))
        .collect::<Result<Vec<_>, _>>()?;
    if locations.len() < 2 {
        return Err(ApiError::invalid_value(SERVICE, "locations", format!("{} location(s)", locations.len())));
    }
    let sources = parse_indices("sources", req.sources.as_deref(), locations.len())?;
    let destinations = parse_indices("destinations", req.destinations.as_deref(), locations.len())?;
    if req.metrics.is_empty() {
        return Err(ApiError::new(SERVICE, ErrorKind::EmptyElement, "Parameter 'metrics' must not be empty."));
    }
    let routes = sources.len() * destinations.len();
    if routes > limits.maximum_routes {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!(
                "Only a total of {} routes are allowed, the request asks for {routes}.",
                limits.maximum_routes
            ),
        ));
    }
    Ok(MatrixQuery {
        profile,
        locations,
        sources,
        destinations,
        durations: req.metrics.contains(&MatrixMetric::Duration),
        distances: req.metrics.contains(&MatrixMetric::Distance),
        resolve_locations: req.resolve_locations,
        units: req.units,
        radius: limits.maximum_search_radius,
        max_visited_nodes: limits.maximum_visited_nodes,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResolvedLocation {
    #[schema(value_type = Vec<f64>)]
    pub location: [f64; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub snapped_distance: f64,
}

impl ResolvedLocation {
    pub fn from_snap(graph: &RouteGraph, snap: &Snap, with_name: bool) -> Self {
        Self {
            location: snap.location,
            name: with_name
                .then(|| graph.way_of(snap.edge).display_name().map(str::to_string))
                .flatten(),
            snapped_distance: round_to(snap.distance, 2),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct MatrixResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub durations: Option<Vec<Vec<Option<f64>>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distances: Option<Vec<Vec<Option<f64>>>>,
    pub destinations: Vec<Option<ResolvedLocation>>,
    pub sources: Vec<Option<ResolvedLocation>>,
}

/// Every location must snap to the network; unreachable pairs are `None`.
pub fn compute(graph: &RouteGraph, index: &SpatialIndex, query: &MatrixQuery) -> Result<MatrixResult, EngineError> {
    // Distance-only tables follow the shortest paths
    let preference = if query.durations {
        Preference::Fastest
    } else {
        Preference::Shortest
    };
    let w = Weighting::new(graph, query.profile, preference, EdgeFilter::default(), None)?;
    let limits = SearchLimits {
        max_visited_nodes: query.max_visited_nodes,
    };

    let snap = |i: usize| {
        index
            .snap(query.locations[i], query.radius, |e| w.accessible_any(e))
            .ok_or_else(|| EngineError::PointNotFound {
                index: i,
                lon: query.locations[i][0],
                lat: query.locations[i][1],
                radius: query.radius,
            })
    };
    let source_snaps = query.sources.iter().map(|&i| snap(i)).collect::<Result<Vec<Snap>, _>>()?;
    let dest_snaps = query.destinations.iter().map(|&i| snap(i)).collect::<Result<Vec<Snap>, _>>()?;
    let targets: FxHashSet<u32> = dest_snaps
        .iter()
        .flat_map(|d| ShortestPathTree::entry_nodes(graph, d))
        .collect();

    let started = std::time::Instant::now();
    let rows: Vec<Vec<Option<(f64, f64)>>> = source_snaps
        .par_iter()
        .map(|source| {
            let tree = shortest_path_tree_to(&w, source, &targets, false, limits);
            if tree.truncated {
                return Err(EngineError::LimitExceeded(format!(
                    "Search exceeds the limit of visited nodes ({}).",
                    query.max_visited_nodes
                )));
            }
            Ok(dest_snaps
                .iter()
                .map(|dest| {
                    if dest.edge == source.edge && dest.fraction == source.fraction {
                        return Some((0.0, 0.0));
                    }
                    tree.cost_to(&w, dest).map(|l| (l.duration, l.distance))
                })
                .collect())
        })
        .collect::<Result<_, _>>()?;
    tracing::debug!(
        sources = query.sources.len(),
        destinations = query.destinations.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "matrix computed"
    );

    let table = |pick: fn(&(f64, f64), Units) -> f64| -> Vec<Vec<Option<f64>>> {
        rows.iter()
            .map(|row| row.iter().map(|c| c.as_ref().map(|c| pick(c, query.units))).collect())
            .collect()
    };
    let resolve = |snaps: &[Snap]| -> Vec<Option<ResolvedLocation>> {
        snaps
            .iter()
            .map(|s| Some(ResolvedLocation::from_snap(graph, s, query.resolve_locations)))
            .collect()
    };

    Ok(MatrixResult {
        durations: query
            .durations
            .then(|| table(|c, _| round_to(c.0, 2))),
        distances: query
            .distances
            .then(|| table(|c, units| round_to(c.1 * units.factor(), 2))),
        destinations: resolve(&dest_snaps),
        sources: resolve(&source_snaps),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::OsmData;

    fn line() -> RouteGraph {
        let mut data = OsmData::default();
        data.add_node(1, 8.000, 49.000);
        data.add_node(2, 8.010, 49.000);
        data.add_node(3, 8.020, 49.000);
        data.add_node(4, 9.000, 50.000);
        data.add_node(5, 9.001, 50.000);
        data.add_way(1, &[1, 2, 3], &[("highway", "residential"), ("name", "Long Lane")]);
        data.add_way(2, &[4, 5], &[("highway", "residential")]);
        RouteGraph::from_osm(&data, &[Profile::DrivingCar]).unwrap()
    }

    fn query(body: serde_json::Value) -> MatrixQuery {
        let req: MatrixRequest = serde_json::from_value(body).unwrap();
        validate(&req, Profile::DrivingCar, &MatrixLimits::default()).unwrap()
    }

    #[test]
    fn test_symmetric_line() {
        let g = line();
        let idx = SpatialIndex::build(&g);
        let q = query(serde_json::json!({
            "locations": [[8.0, 49.0], [8.02, 49.0]],
            "metrics": ["duration", "distance"],
            "resolve_locations": true
        }));
        let r = compute(&g, &idx, &q).unwrap();
        let d = r.distances.unwrap();
        assert_eq!(d[0][0], Some(0.0));
        let ab = d[0][1].unwrap();
        assert!((ab - 1459.0).abs() < 5.0, "got {ab}");
        assert_eq!(d[1][0], d[0][1]);
        assert!(r.durations.unwrap()[0][1].unwrap() > 0.0);
        assert_eq!(r.sources[0].as_ref().unwrap().name.as_deref(), Some("Long Lane"));
    }

    #[test]
    fn test_unreachable_is_null() {
        let g = line();
        let idx = SpatialIndex::build(&g);
        let q = query(serde_json::json!({"locations": [[8.0, 49.0], [9.0005, 50.0]]}));
        let r = compute(&g, &idx, &q).unwrap();
        let t = r.durations.unwrap();
        assert_eq!(t[0][1], None);
        assert_eq!(t[1][0], None);
        assert_eq!(t[1][1], Some(0.0));
        assert!(r.sources[1].is_some());
        assert!(r.distances.is_none());
    }

    #[test]
    fn test_unsnappable_location_is_not_found() {
        let g = line();
        let idx = SpatialIndex::build(&g);
        let q = query(serde_json::json!({"locations": [[8.0, 49.0], [40.0, 10.0]]}));
        let err = compute(&g, &idx, &q).unwrap_err();
        assert!(matches!(err, EngineError::PointNotFound { index: 1, .. }), "{err:?}");
        assert_eq!(ApiError::from_engine(SERVICE, err).code(), 6010);
    }

    #[test]
    fn test_visited_node_cap_is_an_error() {
        let g = line();
        let idx = SpatialIndex::build(&g);
        let mut q = query(serde_json::json!({"locations": [[8.0, 49.0], [8.02, 49.0]]}));
        q.max_visited_nodes = 1;
        let err = compute(&g, &idx, &q).unwrap_err();
        assert!(matches!(err, EngineError::LimitExceeded(_)));
        assert_eq!(ApiError::from_engine(SERVICE, err).code(), 6004);
    }

    #[test]
    fn test_sources_and_destinations() {
        let q = query(serde_json::json!({
            "locations": [[8.0, 49.0], [8.01, 49.0], [8.02, 49.0]],
            "sources": [0],
            "destinations": ["all"]
        }));
        assert_eq!(q.sources, vec![0]);
        assert_eq!(q.destinations, vec![0, 1, 2]);

        let req: MatrixRequest =
            serde_json::from_value(serde_json::json!({"locations": [[8.0, 49.0], [8.01, 49.0]], "sources": [5]})).unwrap();
        let err = validate(&req, Profile::DrivingCar, &MatrixLimits::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidParameterValue);
    }

    #[test]
    fn test_route_limit() {
        let limits = MatrixLimits {
            maximum_routes: 3,
            ..Default::default()
        };
        let req: MatrixRequest =
            serde_json::from_value(serde_json::json!({"locations": [[8.0, 49.0], [8.01, 49.0]]})).unwrap();
        let err = validate(&req, Profile::DrivingCar, &limits).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequestExceedsServerLimit);
        assert_eq!(err.code(), 6004);
    }
}
