//! Matching GeoJSON features onto graph edge ids.

use geo::{BoundingRect, Coord, Intersects, Line, LineString, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::config::MatchingLimits;
use crate::directions::request::parse_coordinate;
use crate::error::{ApiError, ErrorKind, Service};
use crate::graph::RouteGraph;
use crate::profiles::Profile;
use crate::route::{find_path, Departure, SearchLimits};
use crate::snap::SpatialIndex;
use crate::weighting::{EdgeFilter, Preference, Weighting};

const SERVICE: Service = Service::Matching;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct MatchingRequest {
    /// GeoJSON FeatureCollection, or a bare array of features
    #[schema(value_type = Object)]
    pub features: Value,
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum InputGeometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

#[derive(Debug, Deserialize)]
struct InputFeature {
    geometry: InputGeometry,
}

/// Validated geometry of one feature
#[derive(Debug, Clone, PartialEq)]
pub enum MatchGeometry {
    Point([f64; 2]),
    Line(Vec<[f64; 2]>),
    Area(Vec<Polygon<f64>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchQuery {
    pub profile: Profile,
    pub features: Vec<MatchGeometry>,
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MatchResult {
    pub graph_timestamp: String,
    /// Matched edge ids per input feature, ascending
    pub edge_ids: Vec<Vec<u32>>,
}

fn coords(values: &[Vec<f64>]) -> Result<Vec<[f64; 2]>, ApiError> {
    values.iter().map(|c| parse_coordinate(SERVICE, "features", c)).collect()
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, ApiError> {
    let to_line = |ring: &Vec<Vec<f64>>| -> Result<LineString<f64>, ApiError> {
        let pts = coords(ring)?;
        if pts.len() < 4 {
            return Err(ApiError::invalid_value(SERVICE, "features", "polygon ring with fewer than 4 positions"));
        }
        Ok(pts.iter().map(|p| Coord { x: p[0], y: p[1] }).collect())
    };
    let (outer, holes) = rings
        .split_first()
        .ok_or_else(|| ApiError::new(SERVICE, ErrorKind::EmptyElement, "Polygon has no rings."))?;
    Ok(Polygon::new(
        to_line(outer)?,
        holes.iter().map(to_line).collect::<Result<_, _>>()?,
    ))
}

fn parse_feature(index: usize, value: &Value) -> Result<MatchGeometry, ApiError> {
    let feature: InputFeature = serde_json::from_value(value.clone()).map_err(|e| {
        ApiError::new(
            SERVICE,
            ErrorKind::InvalidParameterFormat,
            format!("Feature at index {index} is not a supported GeoJSON feature: {e}"),
        )
    })?;
    let empty = || ApiError::new(SERVICE, ErrorKind::EmptyElement, format!("Geometry at index {index} is empty."));
    match feature.geometry {
        InputGeometry::Point { coordinates } => Ok(MatchGeometry::Point(parse_coordinate(SERVICE, "features", &coordinates)?)),
        InputGeometry::LineString { coordinates } => {
            if coordinates.is_empty() {
                return Err(empty());
            }
            Ok(MatchGeometry::Line(coords(&coordinates)?))
        }
        InputGeometry::Polygon { coordinates } => Ok(MatchGeometry::Area(vec![polygon(&coordinates)?])),
        InputGeometry::MultiPolygon { coordinates } => {
            if coordinates.is_empty() {
                return Err(empty());
            }
            Ok(MatchGeometry::Area(
                coordinates.iter().map(|p| polygon(p)).collect::<Result<_, _>>()?,
            ))
        }
    }
}

pub fn validate(req: &MatchingRequest, profile: Profile, limits: &MatchingLimits) -> Result<MatchQuery, ApiError> {
    let features = match &req.features {
        Value::Array(list) => list.as_slice(),
        Value::Object(obj) => match obj.get("features") {
            Some(Value::Array(list)) => list.as_slice(),
            _ => return Err(ApiError::missing(SERVICE, "features")),
        },
        other => return Err(ApiError::invalid_value(SERVICE, "features", other)),
    };
    if features.is_empty() {
        return Err(ApiError::new(SERVICE, ErrorKind::EmptyElement, "Parameter 'features' must not be empty."));
    }
    if features.len() > limits.maximum_features {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!("Only {} features are allowed.", limits.maximum_features),
        ));
    }
    Ok(MatchQuery {
        profile,
        features: features
            .iter()
            .enumerate()
            .map(|(i, f)| parse_feature(i, f))
            .collect::<Result<_, _>>()?,
        radius: limits.search_radius,
    })
}

fn match_line(w: &Weighting, index: &SpatialIndex, line: &[[f64; 2]], radius: f64, out: &mut Vec<u32>) {
    let snaps: Vec<_> = line
        .iter()
        .filter_map(|p| index.snap(*p, radius, |e| w.accessible_any(e)))
        .collect();
    if let [only] = snaps.as_slice() {
        out.push(only.edge);
    }
    for pair in snaps.windows(2) {
        out.push(pair[0].edge);
        out.push(pair[1].edge);
        if pair[0].edge == pair[1].edge {
            continue;
        }
        match find_path(w, &pair[0], &pair[1], Departure::default(), None, SearchLimits::default()) {
            Some(path) => out.extend(path.pieces.iter().map(|p| p.edge)),
            None => tracing::debug!(from = pair[0].edge, to = pair[1].edge, "no path between line vertices"),
        }
    }
}

fn match_area(w: &Weighting, index: &SpatialIndex, polygons: &[Polygon<f64>], out: &mut Vec<u32>) {
    let graph = w.graph;
    for polygon in polygons {
        let Some(rect) = polygon.bounding_rect() else {
            continue;
        };
        for edge in index.edges_in_envelope([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]) {
            if !w.accessible_any(edge) {
                continue;
            }
            let e = &graph.edges[edge as usize];
            let (a, b) = (graph.coord(e.from), graph.coord(e.to));
            if Line::new(Coord { x: a[0], y: a[1] }, Coord { x: b[0], y: b[1] }).intersects(polygon) {
                out.push(edge);
            }
        }
    }
}

pub fn compute(graph: &RouteGraph, index: &SpatialIndex, query: &MatchQuery) -> Result<MatchResult, crate::error::EngineError> {
    let w = Weighting::new(graph, query.profile, Preference::Recommended, EdgeFilter::default(), None)?;
    let edge_ids = query
        .features
        .iter()
        .map(|feature| {
            let mut ids = Vec::new();
            match feature {
                MatchGeometry::Point(p) => match index.snap(*p, query.radius, |e| w.accessible_any(e)) {
                    Some(s) => ids.push(s.edge),
                    None => tracing::warn!(lon = p[0], lat = p[1], "no edge found for point"),
                },
                MatchGeometry::Line(line) => match_line(&w, index, line, query.radius, &mut ids),
                MatchGeometry::Area(polygons) => match_area(&w, index, polygons, &mut ids),
            }
            ids.sort_unstable();
            ids.dedup();
            ids
        })
        .collect();
    Ok(MatchResult {
        graph_timestamp: graph.timestamp_rfc3339(),
        edge_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::OsmData;

    fn graph() -> RouteGraph {
        let mut data = OsmData::default();
        data.add_node(1, 8.000, 49.000);
        data.add_node(2, 8.001, 49.000);
        data.add_node(3, 8.002, 49.000);
        data.add_node(4, 8.002, 49.001);
        data.add_way(1, &[1, 2, 3], &[("highway", "residential")]);
        data.add_way(2, &[3, 4], &[("highway", "residential")]);
        RouteGraph::from_osm(&data, &[Profile::DrivingCar]).unwrap()
    }

    fn query(features: Value) -> MatchQuery {
        let req = MatchingRequest {
            features,
            id: None,
        };
        validate(&req, Profile::DrivingCar, &MatchingLimits::default()).unwrap()
    }

    #[test]
    fn test_point_line_and_polygon() {
        let g = graph();
        let idx = SpatialIndex::build(&g);
        let q = query(serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [8.0005, 49.00001]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[8.0002, 49.0], [8.002, 49.0008]]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon", "coordinates": [[[7.9, 48.9], [8.0015, 48.9], [8.0015, 49.1], [7.9, 49.1], [7.9, 48.9]]]}}
            ]
        }));
        let r = compute(&g, &idx, &q).unwrap();
        assert_eq!(r.edge_ids.len(), 3);
        assert_eq!(r.edge_ids[0].len(), 1);
        assert_eq!(r.edge_ids[1], vec![0, 1, 2]);
        assert_eq!(r.edge_ids[2], vec![0, 1]);
        assert_eq!(r.graph_timestamp, g.timestamp_rfc3339());
    }

    #[test]
    fn test_unsupported_geometry() {
        let req = MatchingRequest {
            features: serde_json::json!([{"type": "Feature", "geometry": {"type": "GeometryCollection", "geometries": []}}]),
            id: None,
        };
        let err = validate(&req, Profile::DrivingCar, &MatchingLimits::default()).unwrap_err();
        assert_eq!(err.code(), 9002);
    }

    #[test]
    fn test_dynamic_data_key_is_unknown() {
        let body = serde_json::json!({"features": [], "key": "logie_borders"});
        let err = serde_json::from_value::<MatchingRequest>(body).unwrap_err();
        assert!(err.to_string().starts_with("unknown field `key`"), "{err}");
    }

    #[test]
    fn test_feature_limit() {
        let limits = MatchingLimits {
            maximum_features: 1,
            ..Default::default()
        };
        let point = serde_json::json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [8.0, 49.0]}});
        let req = MatchingRequest {
            features: serde_json::json!([point.clone(), point]),
            id: None,
        };
        let err = validate(&req, Profile::DrivingCar, &limits).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RequestExceedsServerLimit);
    }
}
