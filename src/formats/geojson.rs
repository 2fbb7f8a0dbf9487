//! GeoJSON feature types and the GeoJSON directions response.

use geo::BoundingRect;
use serde::Serialize;
use utoipa::ToSchema;

use super::{union_bbox, Metadata};
use crate::directions::RouteResult;
use crate::isochrone::{Isochrone, IsochroneProperties};
use crate::snapping::{SnapProperties, SnapResult};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature<P> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: P,
    pub geometry: Geometry,
}

impl<P> Feature<P> {
    pub fn new(geometry: Geometry, properties: P) -> Self {
        Self {
            bbox: None,
            kind: "Feature",
            properties,
            geometry,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection<'a, P> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub bbox: Vec<f64>,
    pub features: Vec<Feature<P>>,
    pub metadata: &'a Metadata,
}

impl<'a, P> FeatureCollection<'a, P> {
    pub fn new(features: Vec<Feature<P>>, bbox: Vec<f64>, metadata: &'a Metadata) -> Self {
        Self {
            kind: "FeatureCollection",
            bbox,
            features,
            metadata,
        }
    }
}

pub fn directions<'a>(routes: &'a [RouteResult], metadata: &'a Metadata) -> FeatureCollection<'a, &'a RouteResult> {
    let features = routes
        .iter()
        .map(|route| Feature {
            bbox: Some(route.bbox.clone()),
            ..Feature::new(
                Geometry::LineString {
                    coordinates: route.geometry.clone(),
                },
                route,
            )
        })
        .collect();
    FeatureCollection::new(features, union_bbox(routes.iter().map(|r| r.bbox.as_slice())), metadata)
}

pub fn isochrones<'a>(isochrones: &[Isochrone], metadata: &'a Metadata) -> FeatureCollection<'a, IsochroneProperties> {
    let mut boxes = Vec::with_capacity(isochrones.len());
    let features = isochrones
        .iter()
        .map(|iso| {
            let ring: Vec<Vec<f64>> = iso.polygon.exterior().coords().map(|c| vec![c.x, c.y]).collect();
            if let Some(r) = iso.polygon.bounding_rect() {
                boxes.push(vec![r.min().x, r.min().y, r.max().x, r.max().y]);
            }
            Feature::new(Geometry::Polygon { coordinates: vec![ring] }, iso.properties.clone())
        })
        .collect();
    FeatureCollection::new(features, union_bbox(boxes.iter().map(Vec::as_slice)), metadata)
}

/// Snapped points only; `source_id` refers back to the request.
pub fn snapping<'a>(result: &SnapResult, metadata: &'a Metadata) -> FeatureCollection<'a, SnapProperties> {
    let features: Vec<Feature<SnapProperties>> = result
        .locations
        .iter()
        .enumerate()
        .filter_map(|(source_id, loc)| {
            let loc = loc.as_ref()?;
            Some(Feature::new(
                Geometry::Point {
                    coordinates: loc.location.to_vec(),
                },
                SnapProperties {
                    name: loc.name.clone(),
                    snapped_distance: loc.snapped_distance,
                    source_id,
                },
            ))
        })
        .collect();
    let boxes: Vec<Vec<f64>> = result
        .locations
        .iter()
        .flatten()
        .map(|l| vec![l.location[0], l.location[1], l.location[0], l.location[1]])
        .collect();
    FeatureCollection::new(features, union_bbox(boxes.iter().map(Vec::as_slice)), metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_tagging() {
        let g = Geometry::Point {
            coordinates: vec![8.0, 49.0],
        };
        let v = serde_json::to_value(&g).unwrap();
        assert_eq!(v["type"], "Point");
        assert_eq!(v["coordinates"][1], 49.0);
    }

    #[test]
    fn test_snapping_skips_unsnapped_points() {
        use crate::formats::EngineInfo;
        use crate::matrix::ResolvedLocation;

        let metadata = Metadata {
            attribution: "test".to_string(),
            service: "snap".to_string(),
            timestamp: 0,
            query: serde_json::json!({}),
            engine: EngineInfo {
                version: "0".to_string(),
                build_date: "unknown".to_string(),
                graph_date: "unknown".to_string(),
            },
            id: None,
        };
        let result = SnapResult {
            locations: vec![
                None,
                Some(ResolvedLocation {
                    location: [8.0, 49.0],
                    name: None,
                    snapped_distance: 3.5,
                }),
            ],
        };
        let v = serde_json::to_value(snapping(&result, &metadata)).unwrap();
        let features = v["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["properties"]["source_id"], 1);
        assert_eq!(v["bbox"], serde_json::json!([8.0, 49.0, 8.0, 49.0]));
    }
}
