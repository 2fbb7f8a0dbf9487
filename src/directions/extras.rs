//! Per-edge attribute intervals ("extras") and route warnings.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::request::{round_to, Units};
use super::Track;
use crate::graph::{flags, RouteGraph};
use crate::profiles::{Category, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExtraInfo {
    Steepness,
    Suitability,
    Surface,
    WayCategory,
    WayType,
    Tollways,
    TrailDifficulty,
    OsmId,
    RoadAccessRestrictions,
    AvgSpeed,
}

impl ExtraInfo {
    pub const ALL: [ExtraInfo; 10] = [
        ExtraInfo::Steepness,
        ExtraInfo::Suitability,
        ExtraInfo::Surface,
        ExtraInfo::WayCategory,
        ExtraInfo::WayType,
        ExtraInfo::Tollways,
        ExtraInfo::TrailDifficulty,
        ExtraInfo::OsmId,
        ExtraInfo::RoadAccessRestrictions,
        ExtraInfo::AvgSpeed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExtraInfo::Steepness => "steepness",
            ExtraInfo::Suitability => "suitability",
            ExtraInfo::Surface => "surface",
            ExtraInfo::WayCategory => "waycategory",
            ExtraInfo::WayType => "waytype",
            ExtraInfo::Tollways => "tollways",
            ExtraInfo::TrailDifficulty => "traildifficulty",
            ExtraInfo::OsmId => "osmid",
            ExtraInfo::RoadAccessRestrictions => "roadaccessrestrictions",
            ExtraInfo::AvgSpeed => "avgspeed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

/// Numeric extra value, written as an integer when it has no fraction
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ExtraValue(pub f64);

impl Serialize for ExtraValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.fract() == 0.0 && self.0.abs() < 9.0e15 {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExtraSummary {
    #[schema(value_type = f64)]
    pub value: ExtraValue,
    pub distance: f64,
    /// Percentage of the route distance
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExtraInfoResult {
    /// `[from_vertex, to_vertex, value]`
    #[schema(value_type = Vec<Vec<f64>>)]
    pub values: Vec<(usize, usize, ExtraValue)>,
    pub summary: Vec<ExtraSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Warning {
    pub code: u32,
    pub message: String,
}

pub const WARNING_ACCESS_RESTRICTIONS: u32 = 1;
pub const WARNING_TOLLWAYS: u32 = 2;
pub const WARNING_SKIPPED_SEGMENTS: u32 = 3;

/// Slot in `WayAttributes::access_restriction`
fn access_slot(category: Category) -> usize {
    match category {
        Category::Driving => 0,
        Category::Cycling => 1,
        Category::Walking | Category::Wheelchair => 2,
    }
}

fn is_tollway(graph: &RouteGraph, profile: Profile, edge: u32) -> bool {
    if !profile.is_driving() {
        return false;
    }
    let attrs = &graph.way_of(edge).attrs;
    attrs.avoid_flags & flags::TOLLWAYS != 0 || (profile == Profile::DrivingHgv && attrs.toll_hgv)
}

/// Gradient class: sign gives the direction, 0 is flat, 5 is 16% or more
fn steepness_class(rise: f64, run: f64) -> f64 {
    if run <= 0.0 {
        return 0.0;
    }
    let grade = rise / run * 100.0;
    let class = match grade.abs() {
        g if g < 1.0 => 0.0,
        g if g < 4.0 => 1.0,
        g if g < 7.0 => 2.0,
        g if g < 10.0 => 3.0,
        g if g < 16.0 => 4.0,
        _ => 5.0,
    };
    class * grade.signum()
}

pub(crate) struct ExtraContext<'a> {
    pub graph: &'a RouteGraph,
    pub profile: Profile,
    pub units: Units,
    pub elevations: &'a [f64],
}

impl ExtraContext<'_> {
    fn span_value(&self, kind: ExtraInfo, track: &Track, i: usize) -> f64 {
        let span = &track.spans[i];
        let Some(edge) = span.edge else {
            return 0.0;
        };
        let way = self.graph.way_of(edge);
        let attrs = &way.attrs;
        match kind {
            ExtraInfo::Steepness => {
                let rise = self.elevations.get(i + 1).copied().unwrap_or(0.0)
                    - self.elevations.get(i).copied().unwrap_or(0.0);
                steepness_class(rise, span.distance)
            }
            ExtraInfo::Suitability => self
                .graph
                .slot(self.profile)
                .map_or(0.0, |d| f64::from(d.priority(edge))),
            ExtraInfo::Surface => f64::from(attrs.surface),
            ExtraInfo::WayCategory => {
                let mut f = attrs.avoid_flags;
                if self.profile == Profile::DrivingHgv && attrs.toll_hgv {
                    f |= flags::TOLLWAYS;
                }
                f64::from(f)
            }
            ExtraInfo::WayType => f64::from(attrs.way_type),
            ExtraInfo::Tollways => f64::from(u8::from(is_tollway(self.graph, self.profile, edge))),
            ExtraInfo::TrailDifficulty => match self.profile.category() {
                Category::Walking => f64::from(attrs.sac_scale),
                Category::Cycling => f64::from(attrs.mtb_scale),
                _ => 0.0,
            },
            ExtraInfo::OsmId => way.osm_id as f64,
            ExtraInfo::RoadAccessRestrictions => {
                f64::from(attrs.access_restriction[access_slot(self.profile.category())])
            }
            ExtraInfo::AvgSpeed => {
                if span.duration > 0.0 && span.duration.is_finite() {
                    round_to(self.units.speed(span.distance / span.duration), 1)
                } else {
                    0.0
                }
            }
        }
    }

    /// Contiguous value intervals over the track's vertices plus a
    /// per-value summary whose amounts add up to 100.
    pub fn compute(&self, kind: ExtraInfo, track: &Track) -> ExtraInfoResult {
        let mut values: Vec<(usize, usize, ExtraValue)> = Vec::new();
        let mut totals: Vec<(f64, f64)> = Vec::new();
        for i in 0..track.spans.len() {
            let v = self.span_value(kind, track, i);
            match values.last_mut() {
                Some(last) if last.2 .0 == v => last.1 = i + 1,
                _ => values.push((i, i + 1, ExtraValue(v))),
            }
            let d = track.spans[i].distance;
            match totals.iter_mut().find(|(value, _)| *value == v) {
                Some(t) => t.1 += d,
                None => totals.push((v, d)),
            }
        }

        let total: f64 = totals.iter().map(|(_, d)| d).sum();
        let mut summary: Vec<ExtraSummary> = totals
            .into_iter()
            .map(|(value, d)| ExtraSummary {
                value: ExtraValue(value),
                distance: self.units.distance(d),
                amount: 0.0,
            })
            .collect();
        if total > 0.0 {
            let raw: Vec<f64> = summary.iter().map(|s| s.distance).collect();
            let raw_total: f64 = raw.iter().sum();
            for (s, d) in summary.iter_mut().zip(raw) {
                s.amount = if raw_total > 0.0 { round_to(d / raw_total * 100.0, 2) } else { 0.0 };
            }
        } else if let Some(first) = summary.first_mut() {
            first.amount = 100.0;
        }
        summary.sort_by(|a, b| b.amount.total_cmp(&a.amount));

        ExtraInfoResult { values, summary }
    }
}

/// Warnings for a finished route and the extras each one brings along.
pub(crate) fn detect_warnings(
    graph: &RouteGraph,
    profile: Profile,
    track: &Track,
    has_skipped: bool,
) -> Vec<(Warning, Option<ExtraInfo>)> {
    let slot = access_slot(profile.category());
    let edges = || track.spans.iter().filter_map(|s| s.edge);
    let mut out = Vec::new();
    if edges().any(|e| graph.way_of(e).attrs.access_restriction[slot] != 0) {
        out.push((
            Warning {
                code: WARNING_ACCESS_RESTRICTIONS,
                message: "There may be restrictions on some roads".to_string(),
            },
            Some(ExtraInfo::RoadAccessRestrictions),
        ));
    }
    if edges().any(|e| is_tollway(graph, profile, e)) {
        out.push((
            Warning {
                code: WARNING_TOLLWAYS,
                message: "There are tollways along the route".to_string(),
            },
            Some(ExtraInfo::Tollways),
        ));
    }
    if has_skipped {
        out.push((
            Warning {
                code: WARNING_SKIPPED_SEGMENTS,
                message: "Some segments were skipped; straight lines are used for them".to_string(),
            },
            None,
        ));
    }
    out
}

/// Requested extras plus those added by warnings, keyed by name.
pub(crate) fn collect(
    ctx: &ExtraContext,
    track: &Track,
    requested: &[ExtraInfo],
    implied: &[ExtraInfo],
) -> BTreeMap<String, ExtraInfoResult> {
    let mut kinds: Vec<ExtraInfo> = requested.iter().chain(implied).copied().collect();
    kinds.sort();
    kinds.dedup();
    kinds
        .into_iter()
        .map(|k| (k.name().to_string(), ctx.compute(k, track)))
        .collect()
}
