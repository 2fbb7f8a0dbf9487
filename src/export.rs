//! Graph excerpt inside a bounding box.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::ExportLimits;
use crate::directions::request::{parse_coordinate, round_to};
use crate::error::{ApiError, EngineError, ErrorKind, Service};
use crate::graph::RouteGraph;
use crate::profiles::Profile;
use crate::snap::SpatialIndex;
use crate::weighting::{EdgeFilter, Preference, Weighting};

const SERVICE: Service = Service::Export;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ExportRequest {
    /// `[[minlon, minlat], [maxlon, maxlat]]`
    #[schema(example = json!([[8.681495, 49.41461], [8.686507, 49.41943]]))]
    pub bbox: Vec<Vec<f64>>,
    /// Attach `osm_id` and `ors_id` to each edge
    #[serde(default)]
    pub additional_info: bool,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportQuery {
    pub profile: Profile,
    pub min: [f64; 2],
    pub max: [f64; 2],
    pub additional_info: bool,
}

pub fn validate(req: &ExportRequest, profile: Profile, limits: &ExportLimits) -> Result<ExportQuery, ApiError> {
    if req.bbox.len() != 2 {
        return Err(ApiError::invalid_value(SERVICE, "bbox", format!("{} corner(s)", req.bbox.len())));
    }
    let a = parse_coordinate(SERVICE, "bbox", &req.bbox[0])?;
    let b = parse_coordinate(SERVICE, "bbox", &req.bbox[1])?;
    let min = [a[0].min(b[0]), a[1].min(b[1])];
    let max = [a[0].max(b[0]), a[1].max(b[1])];
    let area = (max[0] - min[0]) * (max[1] - min[1]);
    if area > limits.maximum_bbox_area {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!(
                "The bounding box covers {area:.4} square degrees, only {} are allowed.",
                limits.maximum_bbox_area
            ),
        ));
    }
    Ok(ExportQuery {
        profile,
        min,
        max,
        additional_info: req.additional_info,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExportNode {
    #[serde(rename = "nodeId")]
    pub node_id: u32,
    #[schema(value_type = Vec<f64>)]
    pub location: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EdgeExtra {
    pub osm_id: i64,
    pub ors_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExportEdge {
    #[serde(rename = "fromId")]
    pub from_id: u32,
    #[serde(rename = "toId")]
    pub to_id: u32,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<EdgeExtra>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ExportResult {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
    pub nodes_count: usize,
    pub edges_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

fn inside(p: [f64; 2], min: [f64; 2], max: [f64; 2]) -> bool {
    p[0] >= min[0] && p[0] <= max[0] && p[1] >= min[1] && p[1] <= max[1]
}

/// Directed usable edges with both ends inside the box, weighted by the
/// `recommended` preference.
pub fn compute(graph: &RouteGraph, index: &SpatialIndex, query: &ExportQuery) -> Result<ExportResult, EngineError> {
    let w = Weighting::new(graph, query.profile, Preference::Recommended, EdgeFilter::default(), None)?;
    let mut candidates = index.edges_in_envelope(query.min, query.max);
    candidates.sort_unstable();

    let mut node_ids: FxHashSet<u32> = FxHashSet::default();
    let mut edges = Vec::new();
    for edge in candidates {
        let e = &graph.edges[edge as usize];
        if !inside(graph.coord(e.from), query.min, query.max) || !inside(graph.coord(e.to), query.min, query.max) {
            continue;
        }
        for reverse in [false, true] {
            if !w.accessible(edge, reverse) {
                continue;
            }
            let (from_id, to_id) = graph.endpoints(edge, reverse);
            node_ids.insert(from_id);
            node_ids.insert(to_id);
            edges.push(ExportEdge {
                from_id,
                to_id,
                weight: round_to(w.weight(edge, reverse, e.distance), 3),
                extra: query.additional_info.then(|| EdgeExtra {
                    osm_id: graph.way_of(edge).osm_id,
                    ors_id: edge,
                }),
            });
        }
    }

    let mut node_ids: Vec<u32> = node_ids.into_iter().collect();
    node_ids.sort_unstable();
    let nodes: Vec<ExportNode> = node_ids
        .into_iter()
        .map(|id| ExportNode {
            node_id: id,
            location: graph.coord(id),
        })
        .collect();
    tracing::debug!(nodes = nodes.len(), edges = edges.len(), "graph export");

    Ok(ExportResult {
        nodes_count: nodes.len(),
        edges_count: edges.len(),
        warning: nodes.is_empty().then(|| "The bounding box contains no graph nodes.".to_string()),
        nodes,
        edges,
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
        data.add_node(4, 8.003, 49.000);
        data.add_way(1, &[1, 2, 3], &[("highway", "residential")]);
        data.add_way(2, &[3, 4], &[("highway", "residential"), ("oneway", "yes")]);
        RouteGraph::from_osm(&data, &[Profile::DrivingCar]).unwrap()
    }

    fn query(bbox: serde_json::Value) -> Result<ExportQuery, ApiError> {
        let req: ExportRequest = serde_json::from_value(serde_json::json!({ "bbox": bbox })).unwrap();
        validate(&req, Profile::DrivingCar, &ExportLimits::default())
    }

    #[test]
    fn test_edges_inside_box() {
        let g = graph();
        let idx = SpatialIndex::build(&g);
        let q = query(serde_json::json!([[7.999, 48.999], [8.0025, 49.001]])).unwrap();
        let r = compute(&g, &idx, &q).unwrap();
        // Two two-way segments; the oneway one leaves the box
        assert_eq!(r.edges_count, 4);
        assert_eq!(r.nodes_count, 3);
        assert!(r.edges.iter().all(|e| e.weight > 0.0));

        let q = query(serde_json::json!([[7.999, 48.999], [8.004, 49.001]])).unwrap();
        let r = compute(&g, &idx, &q).unwrap();
        assert_eq!(r.edges_count, 5);
    }

    #[test]
    fn test_empty_box_warns() {
        let g = graph();
        let idx = SpatialIndex::build(&g);
        let q = query(serde_json::json!([[9.0, 50.0], [9.1, 50.1]])).unwrap();
        let r = compute(&g, &idx, &q).unwrap();
        assert_eq!(r.nodes_count, 0);
        assert!(r.warning.is_some());
    }

    #[test]
    fn test_box_limit() {
        let err = query(serde_json::json!([[7.0, 48.0], [9.0, 50.0]])).unwrap_err();
        assert_eq!(err.code(), 7004);
    }
}
