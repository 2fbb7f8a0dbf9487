//! Plain JSON directions response with encoded polyline geometry.

use serde::Serialize;

use super::{union_bbox, Metadata};
use crate::directions::RouteResult;
use crate::polyline;

#[derive(Debug, Serialize)]
pub struct JsonRoute<'a> {
    #[serde(flatten)]
    pub route: &'a RouteResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DirectionsJson<'a> {
    pub bbox: Vec<f64>,
    pub routes: Vec<JsonRoute<'a>>,
    pub metadata: &'a Metadata,
}

pub fn directions<'a>(routes: &'a [RouteResult], metadata: &'a Metadata, with_geometry: bool) -> DirectionsJson<'a> {
    DirectionsJson {
        bbox: union_bbox(routes.iter().map(|r| r.bbox.as_slice())),
        routes: routes
            .iter()
            .map(|route| JsonRoute {
                route,
                geometry: with_geometry.then(|| polyline::encode(&route.geometry, route.has_elevation())),
            })
            .collect(),
        metadata,
    }
}

/// Any service result with the `metadata` block appended
#[derive(Debug, Serialize)]
pub struct WithMetadata<'a, T> {
    #[serde(flatten)]
    pub body: &'a T,
    pub metadata: &'a Metadata,
}
