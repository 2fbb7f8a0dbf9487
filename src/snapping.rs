//! Snapping arbitrary coordinates onto the nearest usable edge.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::SnapLimits;
use crate::directions::request::parse_coordinate;
use crate::error::{ApiError, EngineError, ErrorKind, Service};
use crate::graph::RouteGraph;
use crate::matrix::ResolvedLocation;
use crate::profiles::Profile;
use crate::snap::SpatialIndex;
use crate::weighting::Weighting;

const SERVICE: Service = Service::Snapping;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct SnapRequest {
    #[schema(example = json!([[8.681495, 49.41461], [8.686507, 49.41943]]))]
    pub locations: Vec<Vec<f64>>,
    /// Search radius in metres; `-1` means unlimited
    #[schema(example = 350.0)]
    pub radius: Option<f64>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapQuery {
    pub profile: Profile,
    pub locations: Vec<[f64; 2]>,
    pub radius: f64,
}

pub fn validate(req: &SnapRequest, profile: Profile, limits: &SnapLimits) -> Result<SnapQuery, ApiError> {
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
    let radius = req.radius.ok_or_else(|| ApiError::missing(SERVICE, "radius"))?;
    let radius = if radius == -1.0 {
        limits.maximum_radius
    } else if radius < 0.0 || !radius.is_finite() {
        return Err(ApiError::invalid_value(SERVICE, "radius", radius));
    } else if radius > limits.maximum_radius {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!("The radius must not exceed {} metres.", limits.maximum_radius),
        ));
    } else {
        radius
    };
    Ok(SnapQuery {
        profile,
        locations: req
            .locations
            .iter()
            .map(|c| parse_coordinate(SERVICE, "locations", c))
            .collect::<Result<_, _>>()?,
        radius,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SnapResult {
    /// One entry per input location, `null` when nothing is in range
    pub locations: Vec<Option<ResolvedLocation>>,
}

pub fn compute(graph: &RouteGraph, index: &SpatialIndex, query: &SnapQuery) -> Result<SnapResult, EngineError> {
    let w = Weighting::fastest(graph, query.profile)?;
    let locations: Vec<Option<ResolvedLocation>> = query
        .locations
        .iter()
        .map(|p| {
            index
                .snap(*p, query.radius, |e| w.accessible_any(e))
                .map(|s| ResolvedLocation::from_snap(graph, &s, true))
        })
        .collect();
    tracing::debug!(
        requested = query.locations.len(),
        snapped = locations.iter().filter(|l| l.is_some()).count(),
        "snapped locations"
    );
    Ok(SnapResult { locations })
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SnapProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub snapped_distance: f64,
    /// Index into the request's `locations`
    pub source_id: usize,
}
