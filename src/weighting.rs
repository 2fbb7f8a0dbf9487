//! Edge weights and edge filters for a single query.

use geo::{BoundingRect, Coord, Intersects, Line, Polygon};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::EngineError;
use crate::graph::{
    flags, smoothness_rank, surface_code, surface_rank, track_type_rank, vehicle, HgvLimits, ProfileData, RouteGraph,
    WayAttributes, WheelchairAttributes,
};
use crate::profiles::{Category, Profile, PRIORITY_UNCHANGED};
use crate::snap::SpatialIndex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Preference {
    #[default]
    Recommended,
    Fastest,
    Shortest,
}

impl Preference {
    pub fn name(self) -> &'static str {
        match self {
            Preference::Recommended => "recommended",
            Preference::Fastest => "fastest",
            Preference::Shortest => "shortest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AvoidFeature {
    Highways,
    Tollways,
    Ferries,
    Fords,
    Steps,
}

impl AvoidFeature {
    pub fn flag(self) -> u8 {
        match self {
            AvoidFeature::Highways => flags::HIGHWAYS,
            AvoidFeature::Tollways => flags::TOLLWAYS,
            AvoidFeature::Ferries => flags::FERRIES,
            AvoidFeature::Fords => flags::FORDS,
            AvoidFeature::Steps => flags::STEPS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AvoidFeature::Highways => "highways",
            AvoidFeature::Tollways => "tollways",
            AvoidFeature::Ferries => "ferries",
            AvoidFeature::Fords => "fords",
            AvoidFeature::Steps => "steps",
        }
    }

    pub fn valid_for(self, category: Category) -> bool {
        use AvoidFeature::*;
        match category {
            Category::Driving => matches!(self, Highways | Tollways | Ferries),
            Category::Cycling => matches!(self, Ferries | Steps | Fords),
            Category::Walking => matches!(self, Ferries | Fords | Steps),
            Category::Wheelchair => matches!(self, Ferries | Steps),
        }
    }
}

/// Vehicle dimensions for `driving-hgv`. Metres and tonnes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct VehicleRestrictions {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub axleload: Option<f64>,
    #[serde(default)]
    pub hazmat: bool,
}

impl VehicleRestrictions {
    pub fn permits(&self, limits: &HgvLimits) -> bool {
        fn fits(value: Option<f64>, limit: Option<f32>) -> bool {
            match (value, limit) {
                (Some(v), Some(l)) => v <= f64::from(l),
                _ => true,
            }
        }
        fits(self.length, limits.max_length)
            && fits(self.width, limits.max_width)
            && fits(self.height, limits.max_height)
            && fits(self.weight, limits.max_weight)
            && fits(self.axleload, limits.max_axle_load)
            && !(self.hazmat && limits.hazmat_forbidden)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Hgv,
    Bus,
    Agricultural,
    Delivery,
    Forestry,
    Goods,
}

impl VehicleType {
    pub fn bit(self) -> u8 {
        match self {
            VehicleType::Hgv => vehicle::HGV,
            VehicleType::Bus => vehicle::BUS,
            VehicleType::Agricultural => vehicle::AGRICULTURAL,
            VehicleType::Delivery => vehicle::DELIVERY,
            VehicleType::Forestry => vehicle::FORESTRY,
            VehicleType::Goods => vehicle::GOODS,
        }
    }
}

/// `wheelchair` restrictions as sent by clients. Type names are OSM values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct WheelchairRestrictionsRequest {
    /// Roughest acceptable `surface`, e.g. `cobblestone:flattened`
    pub surface_type: Option<String>,
    /// Roughest acceptable `tracktype`, `grade1` to `grade5`
    pub track_type: Option<String>,
    /// Roughest acceptable `smoothness`
    pub smoothness_type: Option<String>,
    /// Metres
    pub maximum_sloped_kerb: Option<f64>,
    /// Percent
    pub maximum_incline: Option<f64>,
    /// Metres
    pub minimum_width: Option<f64>,
}

/// Wheelchair limits with type names resolved to ranks. Untagged ways pass
/// unless `surface_quality_known` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelchairRestrictions {
    pub surface: Option<u8>,
    pub track_type: Option<u8>,
    pub smoothness: Option<u8>,
    pub max_kerb: Option<f64>,
    pub max_incline: Option<f64>,
    pub min_width: Option<f64>,
    pub surface_quality_known: bool,
}

impl WheelchairRestrictions {
    /// Resolve OSM type names; the error carries the offending parameter and value.
    pub fn resolve(
        req: &WheelchairRestrictionsRequest,
        surface_quality_known: bool,
    ) -> Result<Self, (&'static str, String)> {
        fn rank(
            name: &'static str,
            value: &Option<String>,
            f: impl Fn(&str) -> Option<u8>,
        ) -> Result<Option<u8>, (&'static str, String)> {
            match value {
                None => Ok(None),
                Some(v) => f(v).map(Some).ok_or((name, v.clone())),
            }
        }
        Ok(Self {
            surface: rank("surface_type", &req.surface_type, |v| match v {
                "cobblestone:flattened" => Some(4),
                other => Some(surface_rank(surface_code(Some(other)))).filter(|r| *r > 0),
            })?,
            track_type: rank("track_type", &req.track_type, track_type_rank)?,
            smoothness: rank("smoothness_type", &req.smoothness_type, smoothness_rank)?,
            max_kerb: req.maximum_sloped_kerb,
            max_incline: req.maximum_incline,
            min_width: req.minimum_width,
            surface_quality_known,
        })
    }

    pub fn permits(&self, attrs: &WayAttributes) -> bool {
        fn within(value: u8, limit: Option<u8>) -> bool {
            value == 0 || !limit.is_some_and(|l| value > l)
        }
        let w: &WheelchairAttributes = &attrs.wheelchair;
        let surface = surface_rank(attrs.surface);
        if self.surface_quality_known && surface == 0 && w.smoothness == 0 {
            return false;
        }
        within(surface, self.surface)
            && within(w.track_type, self.track_type)
            && within(w.smoothness, self.smoothness)
            && match (w.kerb_height, self.max_kerb) {
                (Some(h), Some(max)) => f64::from(h) <= max,
                _ => true,
            }
            && match (w.incline, self.max_incline) {
                (Some(i), Some(max)) => f64::from(i) <= max,
                _ => true,
            }
            && match (w.width, self.min_width) {
                (Some(width), Some(min)) => f64::from(width) >= min,
                _ => true,
            }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub avoid_flags: u8,
    pub blocked: FxHashSet<u32>,
    pub restrictions: Option<VehicleRestrictions>,
    pub wheelchair: Option<WheelchairRestrictions>,
    /// `driving-hgv` vehicle type; ways tagged `<type>=no` are closed to it
    pub vehicle_type: Option<VehicleType>,
    /// Count `toll:hgv` as a tollway
    pub hgv: bool,
}

impl EdgeFilter {
    pub fn allows(&self, graph: &RouteGraph, edge: u32) -> bool {
        if self.blocked.contains(&edge) {
            return false;
        }
        if self.avoid_flags == 0
            && self.restrictions.is_none()
            && self.wheelchair.is_none()
            && self.vehicle_type.is_none()
        {
            return true;
        }
        let attrs = &graph.way_of(edge).attrs;
        let mut way_flags = attrs.avoid_flags;
        if self.hgv && attrs.toll_hgv {
            way_flags |= flags::TOLLWAYS;
        }
        if way_flags & self.avoid_flags != 0 {
            return false;
        }
        if self.vehicle_type.is_some_and(|v| attrs.vehicle_denied & v.bit() != 0) {
            return false;
        }
        if self.wheelchair.is_some_and(|w| !w.permits(attrs)) {
            return false;
        }
        match &self.restrictions {
            Some(r) => r.permits(&attrs.hgv),
            None => true,
        }
    }

    /// Block every edge whose segment touches one of `polygons`.
    pub fn block_polygons(&mut self, graph: &RouteGraph, index: &SpatialIndex, polygons: &[Polygon<f64>]) {
        for polygon in polygons {
            let Some(rect) = polygon.bounding_rect() else {
                continue;
            };
            let candidates = index.edges_in_envelope(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            );
            for edge in candidates {
                let e = &graph.edges[edge as usize];
                let a = graph.coord(e.from);
                let b = graph.coord(e.to);
                let line = Line::new(Coord { x: a[0], y: a[1] }, Coord { x: b[0], y: b[1] });
                if line.intersects(polygon) {
                    self.blocked.insert(edge);
                }
            }
        }
    }
}

pub struct Weighting<'a> {
    pub graph: &'a RouteGraph,
    pub data: &'a ProfileData,
    pub profile: Profile,
    pub preference: Preference,
    pub max_speed: Option<f64>,
    pub filter: EdgeFilter,
    /// Lower bound of weight per metre
    heuristic_factor: f64,
}

impl<'a> Weighting<'a> {
    pub fn new(
        graph: &'a RouteGraph,
        profile: Profile,
        preference: Preference,
        filter: EdgeFilter,
        max_speed: Option<f64>,
    ) -> Result<Self, EngineError> {
        let data = graph
            .slot(profile)
            .ok_or_else(|| EngineError::ProfileNotLoaded(profile.name().to_string()))?;
        // For cars the recommended weighting is the fastest one
        let preference = match (profile, preference) {
            (Profile::DrivingCar, Preference::Recommended) => Preference::Fastest,
            (_, p) => p,
        };

        let top_speed = match max_speed {
            Some(cap) => data.max_speed.min(cap),
            None => data.max_speed,
        };
        let heuristic_factor = if top_speed <= 0.0 {
            0.0
        } else {
            match preference {
                Preference::Shortest => 1.0,
                Preference::Fastest => 3.6 / top_speed,
                Preference::Recommended => 3.6 / top_speed / priority_factor(10),
            }
        };

        Ok(Self {
            graph,
            data,
            profile,
            preference,
            max_speed,
            filter,
            heuristic_factor,
        })
    }

    /// Fastest weighting without filters.
    pub fn fastest(graph: &'a RouteGraph, profile: Profile) -> Result<Self, EngineError> {
        Self::new(graph, profile, Preference::Fastest, EdgeFilter::default(), None)
    }

    /// km/h, 0 when not traversable in this direction
    pub fn speed(&self, edge: u32, reverse: bool) -> f64 {
        let speed = self.data.speed(edge, reverse);
        match self.max_speed {
            Some(cap) => speed.min(cap),
            None => speed,
        }
    }

    pub fn accessible(&self, edge: u32, reverse: bool) -> bool {
        self.speed(edge, reverse) > 0.0 && self.filter.allows(self.graph, edge)
    }

    pub fn accessible_any(&self, edge: u32) -> bool {
        self.accessible(edge, false) || self.accessible(edge, true)
    }

    /// Seconds to travel `length` metres of `edge`
    pub fn duration(&self, edge: u32, reverse: bool, length: f64) -> f64 {
        let speed = self.speed(edge, reverse);
        if speed <= 0.0 {
            return f64::INFINITY;
        }
        length * 3.6 / speed
    }

    pub fn weight(&self, edge: u32, reverse: bool, length: f64) -> f64 {
        match self.preference {
            Preference::Shortest => length,
            Preference::Fastest => self.duration(edge, reverse, length),
            Preference::Recommended => {
                self.duration(edge, reverse, length) / priority_factor(self.data.priority(edge))
            }
        }
    }

    /// Admissible estimate of the weight to cover `metres` of straight-line distance
    pub fn heuristic(&self, metres: f64) -> f64 {
        metres * self.heuristic_factor
    }
}

/// 0.5 for priority 0, 1.0 for unchanged, 1.5 for best
fn priority_factor(priority: u8) -> f64 {
    0.5 + f64::from(priority) / (2.0 * f64::from(PRIORITY_UNCHANGED))
}
