//! Directions request body and its validation into a [`RouteQuery`].

use chrono::NaiveDateTime;
use geo::Polygon;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::extras::ExtraInfo;
use super::{AlternativeParams, RoundTripParams, RouteQuery};
use crate::config::RoutingLimits;
use crate::error::{ApiError, ErrorKind, Service};
use crate::formats::ResponseFormat;
use crate::geo::{haversine_distance, polygon_area_m2, polygon_extent_m, polygon_from_ring};
use crate::profiles::Profile;
use crate::weighting::{
    AvoidFeature, Preference, VehicleRestrictions, VehicleType, WheelchairRestrictions, WheelchairRestrictionsRequest,
};

const SERVICE: Service = Service::Routing;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Units {
    #[default]
    #[serde(rename = "m")]
    Metres,
    #[serde(rename = "km")]
    Kilometres,
    #[serde(rename = "mi")]
    Miles,
}

impl Units {
    /// Multiplier from metres
    pub fn factor(self) -> f64 {
        match self {
            Units::Metres => 1.0,
            Units::Kilometres => 0.001,
            Units::Miles => 1.0 / 1609.344,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Units::Metres => "m",
            Units::Kilometres => "km",
            Units::Miles => "mi",
        }
    }

    /// Convert and round for output
    pub fn distance(self, metres: f64) -> f64 {
        let v = metres * self.factor();
        match self {
            Units::Metres => round_to(v, 1),
            _ => round_to(v, 3),
        }
    }

    /// Speed unit per hour (km/h or mph) from m/s
    pub fn speed(self, metres_per_second: f64) -> f64 {
        let per_hour = metres_per_second * 3600.0;
        match self {
            Units::Miles => round_to(per_hour / 1609.344, 2),
            _ => round_to(per_hour / 1000.0, 2),
        }
    }
}

pub fn round_to(v: f64, decimals: i32) -> f64 {
    let m = 10f64.powi(decimals);
    (v * m).round() / m
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    De,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::De];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::De => "de",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstructionsFormat {
    #[default]
    Text,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RouteAttribute {
    Avgspeed,
    Detourfactor,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AvoidBorders {
    All,
    Controlled,
    None,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RoundTripRequest {
    /// Target length in metres
    pub length: Option<f64>,
    /// Number of points the round trip is built from
    pub points: Option<u32>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AlternativeRoutesRequest {
    pub target_count: Option<usize>,
    pub weight_factor: Option<f64>,
    pub share_factor: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProfileParams {
    /// `driving-hgv`: vehicle dimensions, `wheelchair`: accessibility limits
    #[schema(value_type = Option<Object>)]
    pub restrictions: Option<Value>,
    /// `wheelchair` only: skip ways without surface or smoothness tags
    pub surface_quality_known: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RouteRequestOptions {
    #[serde(default)]
    pub avoid_features: Vec<AvoidFeature>,
    pub avoid_borders: Option<AvoidBorders>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub avoid_countries: Vec<Value>,
    pub vehicle_type: Option<VehicleType>,
    pub profile_params: Option<ProfileParams>,
    /// GeoJSON Polygon or MultiPolygon
    #[schema(value_type = Option<Object>)]
    pub avoid_polygons: Option<Value>,
    pub round_trip: Option<RoundTripRequest>,
    pub alternative_routes: Option<AlternativeRoutesRequest>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct DirectionsRequest {
    /// Must match the profile in the path when present
    pub profile: Option<Profile>,
    /// Waypoints as `[lon, lat]`
    #[schema(example = json!([[8.681495, 49.41461], [8.687872, 49.420318]]))]
    pub coordinates: Vec<Vec<f64>>,
    pub id: Option<String>,
    #[serde(default)]
    pub preference: Preference,
    #[serde(default)]
    pub units: Units,
    #[serde(default)]
    pub language: Language,
    #[serde(default = "default_true")]
    pub geometry: bool,
    #[serde(default = "default_true")]
    pub instructions: bool,
    #[serde(default)]
    pub instructions_format: InstructionsFormat,
    #[serde(default)]
    pub roundabout_exits: bool,
    #[serde(default)]
    pub attributes: Vec<RouteAttribute>,
    #[serde(default)]
    pub maneuvers: bool,
    pub radiuses: Option<Vec<f64>>,
    pub bearings: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub continue_straight: bool,
    #[serde(default)]
    pub elevation: bool,
    /// Array or pipe-delimited string
    #[serde(default, deserialize_with = "list_or_pipes")]
    #[schema(value_type = Vec<String>)]
    pub extra_info: Vec<String>,
    #[serde(default)]
    pub geometry_simplify: bool,
    pub skip_segments: Option<Vec<i64>>,
    #[serde(default)]
    pub suppress_warnings: bool,
    pub options: Option<RouteRequestOptions>,
    pub alternative_routes: Option<AlternativeRoutesRequest>,
    pub maximum_speed: Option<f64>,
    /// Local date-time, `YYYY-MM-DDTHH:MM[:SS]`
    pub departure: Option<String>,
    pub arrival: Option<String>,
}

fn default_true() -> bool {
    true
}

fn list_or_pipes<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        Pipes(String),
    }
    Ok(match ListOrString::deserialize(deserializer)? {
        ListOrString::List(v) => v,
        ListOrString::Pipes(s) => s
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

impl DirectionsRequest {
    /// Two-point request used by the GET endpoint
    pub fn from_points(start: [f64; 2], end: [f64; 2]) -> Self {
        Self {
            profile: None,
            coordinates: vec![start.to_vec(), end.to_vec()],
            id: None,
            preference: Preference::default(),
            units: Units::default(),
            language: Language::default(),
            geometry: true,
            instructions: true,
            instructions_format: InstructionsFormat::default(),
            roundabout_exits: false,
            attributes: Vec::new(),
            maneuvers: false,
            radiuses: None,
            bearings: None,
            continue_straight: false,
            elevation: false,
            extra_info: Vec::new(),
            geometry_simplify: false,
            skip_segments: None,
            suppress_warnings: false,
            options: None,
            alternative_routes: None,
            maximum_speed: None,
            departure: None,
            arrival: None,
        }
    }
}

pub fn parse_lon_lat(s: &str) -> Option<[f64; 2]> {
    let (lon, lat) = s.split_once(',')?;
    Some([lon.trim().parse().ok()?, lat.trim().parse().ok()?])
}

fn parse_time(param: &str, value: &str) -> Result<NaiveDateTime, ApiError> {
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .ok_or_else(|| {
            ApiError::new(
                SERVICE,
                ErrorKind::InvalidParameterFormat,
                format!("Parameter '{param}' has incorrect format: '{value}'."),
            )
        })
}

pub(crate) fn parse_coordinate(service: Service, param: &str, c: &[f64]) -> Result<[f64; 2], ApiError> {
    if c.len() != 2 && c.len() != 3 {
        return Err(ApiError::new(
            service,
            ErrorKind::InvalidParameterFormat,
            format!("Each element of '{param}' must contain longitude and latitude."),
        ));
    }
    let (lon, lat) = (c[0], c[1]);
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::invalid_value(service, param, format!("{lon},{lat}")));
    }
    Ok([lon, lat])
}

/// Polygons from a GeoJSON `Polygon` / `MultiPolygon` geometry
pub(crate) fn parse_polygons(service: Service, value: &Value) -> Result<Vec<Polygon<f64>>, ApiError> {
    let bad = || {
        ApiError::new(
            service,
            ErrorKind::InvalidParameterFormat,
            "Parameter 'avoid_polygons' must be a GeoJSON Polygon or MultiPolygon.",
        )
    };
    let ring = |v: &Value| -> Option<Vec<[f64; 2]>> {
        let pts: Vec<Vec<f64>> = serde_json::from_value(v.clone()).ok()?;
        if pts.len() < 4 || pts.iter().any(|p| p.len() < 2) {
            return None;
        }
        Some(pts.iter().map(|p| [p[0], p[1]]).collect())
    };
    let polygon = |v: &Value| -> Option<Polygon<f64>> {
        // Holes are ignored; an avoid area blocks its whole outline
        let rings = v.as_array()?;
        Some(polygon_from_ring(&ring(rings.first()?)?))
    };

    let coords = value.get("coordinates").ok_or_else(bad)?;
    match value.get("type").and_then(Value::as_str) {
        Some("Polygon") => Ok(vec![polygon(coords).ok_or_else(bad)?]),
        Some("MultiPolygon") => coords
            .as_array()
            .ok_or_else(bad)?
            .iter()
            .map(|p| polygon(p).ok_or_else(bad))
            .collect(),
        _ => Err(bad()),
    }
}

fn unsupported_param(param: &str, profile: Profile) -> ApiError {
    ApiError::new(
        SERVICE,
        ErrorKind::UnknownParameter,
        format!("Parameter '{param}' is not supported for profile {profile}."),
    )
}

fn restrictions_from<T: serde::de::DeserializeOwned>(raw: Value) -> Result<T, ApiError> {
    serde_json::from_value::<T>(raw).map_err(|e| {
        let kind = if e.to_string().starts_with("unknown field") {
            ErrorKind::UnknownParameter
        } else {
            ErrorKind::InvalidParameterFormat
        };
        ApiError::new(SERVICE, kind, format!("Invalid restrictions: {e}"))
    })
}

fn validate_country(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_u64().is_some(),
        Value::String(s) => {
            s.parse::<u32>().is_ok()
                || ((2..=3).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic()))
        }
        _ => false,
    }
}

/// Validate a request for `profile` answered in `format`.
pub fn validate(
    req: &DirectionsRequest,
    profile: Profile,
    format: ResponseFormat,
    limits: &RoutingLimits,
) -> Result<RouteQuery, ApiError> {
    if let Some(body_profile) = req.profile {
        if body_profile != profile {
            return Err(ApiError::invalid_value(SERVICE, "profile", body_profile));
        }
    }
    let options = req.options.clone().unwrap_or_default();

    let coordinates = req
        .coordinates
        .iter()
        .map(|c| parse_coordinate(SERVICE, "coordinates", c))
        .collect::<Result<Vec<_>, _>>()?;
    let n = coordinates.len();

    let round_trip = match &options.round_trip {
        Some(rt) => {
            if n != 1 {
                return Err(ApiError::incompatible(SERVICE, "round_trip", "coordinates"));
            }
            let length = rt.length.ok_or_else(|| ApiError::missing(SERVICE, "round_trip.length"))?;
            if length <= 0.0 {
                return Err(ApiError::invalid_value(SERVICE, "round_trip.length", length));
            }
            if length > limits.maximum_distance_round_trip_routes {
                return Err(ApiError::new(
                    SERVICE,
                    ErrorKind::RequestExceedsServerLimit,
                    format!(
                        "The specified round trip length exceeds the server limit of {} meters.",
                        limits.maximum_distance_round_trip_routes
                    ),
                ));
            }
            let points = rt.points.unwrap_or(2);
            if points < 2 {
                return Err(ApiError::invalid_value(SERVICE, "round_trip.points", points));
            }
            Some(RoundTripParams {
                length,
                points: points as usize,
                seed: rt.seed.unwrap_or(0),
            })
        }
        None => {
            if n < 2 {
                return Err(ApiError::invalid_value(SERVICE, "coordinates", format!("{n} coordinate(s)")));
            }
            None
        }
    };
    if n > limits.maximum_waypoints {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!(
                "Only a total of {} waypoints are allowed.",
                limits.maximum_waypoints
            ),
        ));
    }

    if req.departure.is_some() && req.arrival.is_some() {
        return Err(ApiError::incompatible(SERVICE, "departure", "arrival"));
    }
    let departure = req.departure.as_deref().map(|v| parse_time("departure", v)).transpose()?;
    let arrival = req.arrival.as_deref().map(|v| parse_time("arrival", v)).transpose()?;

    if !req.geometry && matches!(format, ResponseFormat::GeoJson | ResponseFormat::Gpx) {
        return Err(ApiError::invalid_value(SERVICE, "geometry", "false"));
    }

    let extra_info = req
        .extra_info
        .iter()
        .map(|name| {
            ExtraInfo::from_name(name).ok_or_else(|| ApiError::invalid_value(SERVICE, "extra_info", name))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if req.geometry_simplify && !extra_info.is_empty() {
        return Err(ApiError::incompatible(SERVICE, "geometry_simplify", "extra_info"));
    }

    let bearings = match &req.bearings {
        None => vec![None; n],
        Some(list) => {
            if round_trip.is_none() && list.len() != n && list.len() != n - 1 {
                return Err(ApiError::invalid_value(
                    SERVICE,
                    "bearings",
                    format!("{} bearings for {n} coordinates", list.len()),
                ));
            }
            let mut out = vec![None; n.max(list.len())];
            for (i, b) in list.iter().enumerate() {
                out[i] = match b.as_slice() {
                    [] => None,
                    [value] | [value, _] if !(0.0..=360.0).contains(value) => {
                        return Err(ApiError::invalid_value(SERVICE, "bearings", value));
                    }
                    [_, deviation] if !(0.0..=180.0).contains(deviation) => {
                        return Err(ApiError::invalid_value(SERVICE, "bearings", deviation));
                    }
                    [value] => Some((*value, 100.0)),
                    [value, deviation] => Some((*value, *deviation)),
                    _ => {
                        return Err(ApiError::new(
                            SERVICE,
                            ErrorKind::InvalidParameterFormat,
                            "Each bearing must be [value] or [value, deviation].",
                        ));
                    }
                };
            }
            out.truncate(n);
            out
        }
    };

    let radiuses = match &req.radiuses {
        None => vec![limits.default_search_radius; n],
        Some(list) => {
            if list.len() != 1 && list.len() != n {
                return Err(ApiError::invalid_value(
                    SERVICE,
                    "radiuses",
                    format!("{} radiuses for {n} coordinates", list.len()),
                ));
            }
            if let Some(r) = list.iter().find(|r| **r < 0.0 && **r != -1.0) {
                return Err(ApiError::invalid_value(SERVICE, "radiuses", r));
            }
            if list.len() == 1 {
                vec![list[0]; n]
            } else {
                list.clone()
            }
        }
    };

    let skip_segments = match &req.skip_segments {
        None => Vec::new(),
        Some(list) if list.is_empty() => {
            return Err(ApiError::new(
                SERVICE,
                ErrorKind::EmptyElement,
                "Parameter 'skip_segments' must not be empty.",
            ));
        }
        Some(list) => {
            if list.len() > n.saturating_sub(1) {
                return Err(ApiError::invalid_value(
                    SERVICE,
                    "skip_segments",
                    format!("{} values for {} segments", list.len(), n.saturating_sub(1)),
                ));
            }
            let mut out = Vec::with_capacity(list.len());
            for &s in list {
                if s <= 0 || s as usize >= n {
                    return Err(ApiError::invalid_value(SERVICE, "skip_segments", s));
                }
                out.push(s as usize);
            }
            out.sort_unstable();
            out.dedup();
            out
        }
    };

    let alternatives_req = req.alternative_routes.clone().or(options.alternative_routes.clone());
    let alternatives = match alternatives_req {
        None => None,
        Some(alt) => {
            if n > 2 {
                return Err(ApiError::incompatible(SERVICE, "alternative_routes", "coordinates"));
            }
            if !skip_segments.is_empty() {
                return Err(ApiError::incompatible(SERVICE, "alternative_routes", "skip_segments"));
            }
            let target_count = alt.target_count.unwrap_or(2);
            if target_count == 0 || target_count > limits.maximum_alternative_routes {
                return Err(ApiError::invalid_value(
                    SERVICE,
                    "alternative_routes.target_count",
                    target_count,
                ));
            }
            let weight_factor = alt.weight_factor.unwrap_or(1.4);
            if weight_factor < 1.0 {
                return Err(ApiError::invalid_value(SERVICE, "alternative_routes.weight_factor", weight_factor));
            }
            let share_factor = alt.share_factor.unwrap_or(0.6);
            if !(0.0..=1.0).contains(&share_factor) {
                return Err(ApiError::invalid_value(SERVICE, "alternative_routes.share_factor", share_factor));
            }
            Some(AlternativeParams {
                target_count,
                weight_factor,
                share_factor,
            })
        }
    };

    if let Some(speed) = req.maximum_speed {
        if !profile.is_driving() {
            return Err(ApiError::incompatible(SERVICE, "maximum_speed", "profile"));
        }
        if speed < limits.maximum_speed_lower_bound {
            return Err(ApiError::invalid_value(SERVICE, "maximum_speed", speed));
        }
    }

    let mut avoid_flags = 0u8;
    for feature in &options.avoid_features {
        if !feature.valid_for(profile.category()) {
            return Err(ApiError::invalid_value(SERVICE, "avoid_features", feature.name()));
        }
        avoid_flags |= feature.flag();
    }
    if let Some(bad) = options.avoid_countries.iter().find(|c| !validate_country(c)) {
        return Err(ApiError::invalid_value(SERVICE, "avoid_countries", bad));
    }

    if options.vehicle_type.is_some() && profile != Profile::DrivingHgv {
        return Err(ApiError::incompatible(SERVICE, "vehicle_type", "profile"));
    }
    let params = options.profile_params.clone().unwrap_or_default();
    if params.surface_quality_known.is_some() && profile != Profile::Wheelchair {
        return Err(unsupported_param("surface_quality_known", profile));
    }
    let (restrictions, wheelchair) = match params.restrictions {
        None if profile == Profile::Wheelchair => {
            let known = params.surface_quality_known.unwrap_or(false);
            let wheelchair = WheelchairRestrictions {
                surface_quality_known: true,
                ..Default::default()
            };
            (None, known.then_some(wheelchair))
        }
        None => (None, None),
        Some(raw) if profile == Profile::DrivingHgv => (Some(restrictions_from::<VehicleRestrictions>(raw)?), None),
        Some(raw) if profile == Profile::Wheelchair => {
            let req = restrictions_from::<WheelchairRestrictionsRequest>(raw)?;
            let resolved = WheelchairRestrictions::resolve(&req, params.surface_quality_known.unwrap_or(false))
                .map_err(|(param, value)| ApiError::invalid_value(SERVICE, param, value))?;
            (None, Some(resolved))
        }
        Some(_) => return Err(unsupported_param("restrictions", profile)),
    };

    let avoid_polygons = match &options.avoid_polygons {
        None => Vec::new(),
        Some(v) => {
            let polygons = parse_polygons(SERVICE, v)?;
            for p in &polygons {
                if polygon_area_m2(p) > limits.maximum_avoid_polygon_area {
                    return Err(ApiError::new(
                        SERVICE,
                        ErrorKind::RequestExceedsServerLimit,
                        format!(
                            "The area of a polygon to avoid must not exceed {} square meters.",
                            limits.maximum_avoid_polygon_area
                        ),
                    ));
                }
                if polygon_extent_m(p) > limits.maximum_avoid_polygon_extent {
                    return Err(ApiError::new(
                        SERVICE,
                        ErrorKind::RequestExceedsServerLimit,
                        format!(
                            "The extent of a polygon to avoid must not exceed {} meters.",
                            limits.maximum_avoid_polygon_extent
                        ),
                    ));
                }
            }
            polygons
        }
    };

    let approx_distance: f64 = coordinates
        .windows(2)
        .enumerate()
        .filter(|(i, _)| !skip_segments.contains(&(i + 1)))
        .map(|(_, w)| haversine_distance(w[0], w[1]))
        .sum();
    let (limit, reason) = if !avoid_polygons.is_empty() {
        (limits.maximum_distance_avoid_areas, " when using avoid areas")
    } else if alternatives.is_some() {
        (limits.maximum_distance_alternative_routes, " when computing alternative routes")
    } else {
        (limits.maximum_distance, "")
    };
    if approx_distance > limit {
        return Err(ApiError::new(
            SERVICE,
            ErrorKind::RequestExceedsServerLimit,
            format!("Request parameters exceed the server configuration limits. The approximated route distance must not be greater than {limit} meters{reason}."),
        ));
    }

    Ok(RouteQuery {
        profile,
        coordinates,
        preference: req.preference,
        units: req.units,
        language: req.language,
        geometry: req.geometry,
        instructions: req.instructions,
        instructions_format: req.instructions_format,
        roundabout_exits: req.roundabout_exits,
        maneuvers: req.maneuvers,
        elevation: req.elevation,
        simplify: req.geometry_simplify,
        extra_info,
        attributes: req.attributes.clone(),
        radiuses,
        bearings,
        continue_straight: req.continue_straight,
        skip_segments,
        suppress_warnings: req.suppress_warnings,
        avoid_flags,
        avoid_polygons,
        restrictions,
        wheelchair,
        vehicle_type: options.vehicle_type,
        maximum_speed: req.maximum_speed,
        departure,
        arrival,
        alternatives,
        round_trip,
        max_visited_nodes: limits.maximum_visited_nodes,
    })
}
