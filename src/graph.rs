//! Routable graph built from OSM ways.
//!
//! One edge per consecutive node pair of a way. Edges are stored once with a
//! fixed orientation (`from` -> `to` follows the way's node order); traversal
//! direction is carried separately as `reverse`. Per-profile speeds and
//! priorities live in parallel arrays indexed by edge id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::GraphError;
use crate::geo::haversine_distance;
use crate::parse::{is_routable, OsmData, Tags};
use crate::profiles::tags::TagLookup;
use crate::profiles::{foot, Profile, WayOutput};

/// Avoid-feature bits stored on each way, also reported by the `waycategory` extra.
pub mod flags {
    pub const HIGHWAYS: u8 = 1;
    pub const TOLLWAYS: u8 = 2;
    pub const STEPS: u8 = 4;
    pub const FERRIES: u8 = 8;
    pub const FORDS: u8 = 16;
}

/// Road access restriction bits (`roadaccessrestrictions` extra).
pub mod access {
    pub const NO: u8 = 1;
    pub const CUSTOMERS: u8 = 2;
    pub const DESTINATION: u8 = 4;
    pub const DELIVERY: u8 = 8;
    pub const PRIVATE: u8 = 16;
    pub const PERMISSIVE: u8 = 32;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub lon: f64,
    pub lat: f64,
    pub ele: Option<f32>,
    pub osm_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: u32,
    pub to: u32,
    pub way: u32,
    /// Metres
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HgvLimits {
    /// Metres
    pub max_width: Option<f32>,
    pub max_height: Option<f32>,
    pub max_length: Option<f32>,
    /// Tonnes
    pub max_weight: Option<f32>,
    pub max_axle_load: Option<f32>,
    pub hazmat_forbidden: bool,
}

impl HgvLimits {
    pub fn is_empty(&self) -> bool {
        *self == HgvLimits::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WayAttributes {
    pub way_type: u8,
    pub surface: u8,
    /// `flags::*` bits
    pub avoid_flags: u8,
    pub toll_hgv: bool,
    pub sac_scale: u8,
    pub mtb_scale: u8,
    /// `access::*` bits for [driving, cycling, walking]
    pub access_restriction: [u8; 3],
    pub roundabout: bool,
    pub hgv: HgvLimits,
    /// `vehicle::*` bits of heavy vehicle types tagged `no` on this way
    pub vehicle_denied: u8,
    pub wheelchair: WheelchairAttributes,
}

/// Heavy vehicle type bits, matched against the request `vehicle_type`.
pub mod vehicle {
    pub const HGV: u8 = 1;
    pub const BUS: u8 = 2;
    pub const AGRICULTURAL: u8 = 4;
    pub const DELIVERY: u8 = 8;
    pub const FORESTRY: u8 = 16;
    pub const GOODS: u8 = 32;

    pub(crate) const KEYS: [(&str, u8); 6] = [
        ("hgv", HGV),
        ("bus", BUS),
        ("agricultural", AGRICULTURAL),
        ("delivery", DELIVERY),
        ("forestry", FORESTRY),
        ("goods", GOODS),
    ];
}

/// Accessibility details checked against wheelchair restrictions.
/// Ranks are 1-based with 0 for untagged; higher is rougher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelchairAttributes {
    pub smoothness: u8,
    pub track_type: u8,
    /// Absolute slope, percent
    pub incline: Option<f32>,
    /// Metres
    pub kerb_height: Option<f32>,
    /// Metres
    pub width: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub osm_id: i64,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub attrs: WayAttributes,
}

impl Way {
    /// Name used in instructions: `name`, else `ref`
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.reference.as_deref())
    }
}

/// Per-profile edge data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    pub profile: Profile,
    /// km/h per edge, `[forward, reverse]`, 0 = no access
    pub speed: Vec<[f32; 2]>,
    pub priority: Vec<u8>,
    /// Fastest speed on any edge, km/h
    pub max_speed: f64,
}

impl ProfileData {
    pub fn speed(&self, edge: u32, reverse: bool) -> f64 {
        f64::from(self.speed[edge as usize][usize::from(reverse)])
    }

    pub fn accessible(&self, edge: u32, reverse: bool) -> bool {
        self.speed(edge, reverse) > 0.0
    }

    pub fn accessible_any(&self, edge: u32) -> bool {
        self.accessible(edge, false) || self.accessible(edge, true)
    }

    pub fn priority(&self, edge: u32) -> u8 {
        self.priority[edge as usize]
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RouteGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub ways: Vec<Way>,
    pub profiles: Vec<ProfileData>,
    /// Unix seconds of the build
    pub timestamp: i64,
    #[serde(skip)]
    adj_offsets: Vec<u32>,
    #[serde(skip)]
    adj_edges: Vec<u32>,
}

impl RouteGraph {
    pub fn from_osm(data: &OsmData, profiles: &[Profile]) -> Result<Self, GraphError> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut node_map: HashMap<i64, u32> = HashMap::new();
        let mut edges = Vec::new();
        let mut ways = Vec::new();
        let mut slots: Vec<ProfileData> = profiles
            .iter()
            .map(|&profile| ProfileData {
                profile,
                speed: Vec::new(),
                priority: Vec::new(),
                max_speed: 0.0,
            })
            .collect();

        for osm_way in &data.ways {
            if !is_routable(&osm_way.tags) {
                continue;
            }
            let outputs: Vec<WayOutput> =
                profiles.iter().map(|p| p.process_way(&osm_way.tags)).collect();
            if !outputs.iter().any(WayOutput::is_accessible) {
                continue;
            }

            let way_idx = ways.len() as u32;
            let mut added = 0usize;

            for pair in osm_way.nodes.windows(2) {
                let (Some(a), Some(b)) = (data.nodes.get(&pair[0]), data.nodes.get(&pair[1]))
                else {
                    continue;
                };
                if pair[0] == pair[1] {
                    continue;
                }
                let distance = haversine_distance([a.lon, a.lat], [b.lon, b.lat]);
                if distance <= 0.0 {
                    continue;
                }

                let mut intern = |id: i64, n: &crate::parse::OsmNode| -> u32 {
                    *node_map.entry(id).or_insert_with(|| {
                        nodes.push(Node {
                            lon: n.lon,
                            lat: n.lat,
                            ele: n.ele.map(|e| e as f32),
                            osm_id: id,
                        });
                        (nodes.len() - 1) as u32
                    })
                };
                let from = intern(pair[0], a);
                let to = intern(pair[1], b);

                edges.push(Edge {
                    from,
                    to,
                    way: way_idx,
                    distance,
                });
                for (slot, out) in slots.iter_mut().zip(&outputs) {
                    let fwd = if out.access_fwd { out.speed_fwd } else { 0.0 };
                    let rev = if out.access_rev { out.speed_rev } else { 0.0 };
                    slot.speed.push([fwd as f32, rev as f32]);
                    slot.priority.push(out.priority);
                    slot.max_speed = slot.max_speed.max(fwd).max(rev);
                }
                added += 1;
            }

            if added > 0 {
                ways.push(way_from_tags(osm_way.id, &osm_way.tags));
            }
        }

        if edges.is_empty() {
            return Err(GraphError::Empty);
        }

        let mut graph = RouteGraph {
            nodes,
            edges,
            ways,
            profiles: slots,
            timestamp: chrono::Utc::now().timestamp(),
            adj_offsets: Vec::new(),
            adj_edges: Vec::new(),
        };
        graph.rebuild_adjacency();

        tracing::info!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            ways = graph.ways.len(),
            profiles = graph.profiles.len(),
            "built routing graph"
        );

        Ok(graph)
    }

    /// CSR of incident edges per node; both endpoints list the edge.
    pub(crate) fn rebuild_adjacency(&mut self) {
        let n = self.nodes.len();
        let mut degree = vec![0u32; n + 1];
        for e in &self.edges {
            degree[e.from as usize] += 1;
            degree[e.to as usize] += 1;
        }
        let mut offsets = vec![0u32; n + 1];
        for i in 0..n {
            offsets[i + 1] = offsets[i] + degree[i];
        }
        let mut cursor = offsets.clone();
        let mut adj = vec![0u32; offsets[n] as usize];
        for (id, e) in self.edges.iter().enumerate() {
            for node in [e.from, e.to] {
                let slot = &mut cursor[node as usize];
                adj[*slot as usize] = id as u32;
                *slot += 1;
            }
        }
        self.adj_offsets = offsets;
        self.adj_edges = adj;
    }

    pub fn incident(&self, node: u32) -> &[u32] {
        let start = self.adj_offsets[node as usize] as usize;
        let end = self.adj_offsets[node as usize + 1] as usize;
        &self.adj_edges[start..end]
    }

    pub fn coord(&self, node: u32) -> [f64; 2] {
        let n = &self.nodes[node as usize];
        [n.lon, n.lat]
    }

    /// Start and end node of `edge` when traversed in the given direction.
    pub fn endpoints(&self, edge: u32, reverse: bool) -> (u32, u32) {
        let e = &self.edges[edge as usize];
        if reverse {
            (e.to, e.from)
        } else {
            (e.from, e.to)
        }
    }

    /// Point at `fraction` along the stored orientation of `edge`.
    pub fn point_on_edge(&self, edge: u32, fraction: f64) -> [f64; 2] {
        let e = &self.edges[edge as usize];
        crate::geo::interpolate(self.coord(e.from), self.coord(e.to), fraction)
    }

    /// Elevation at `fraction` along `edge`, if both ends carry one.
    pub fn elevation_on_edge(&self, edge: u32, fraction: f64) -> Option<f64> {
        let e = &self.edges[edge as usize];
        let a = f64::from(self.nodes[e.from as usize].ele?);
        let b = f64::from(self.nodes[e.to as usize].ele?);
        Some(a + (b - a) * fraction)
    }

    pub fn way_of(&self, edge: u32) -> &Way {
        &self.ways[self.edges[edge as usize].way as usize]
    }

    pub fn slot(&self, profile: Profile) -> Option<&ProfileData> {
        self.profiles.iter().find(|p| p.profile == profile)
    }

    pub fn profile_list(&self) -> Vec<Profile> {
        self.profiles.iter().map(|p| p.profile).collect()
    }

    pub fn has_elevation(&self) -> bool {
        self.nodes.iter().any(|n| n.ele.is_some())
    }

    pub fn timestamp_rfc3339(&self) -> String {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .unwrap_or_default()
    }
}

fn way_type(tags: &TagLookup) -> u8 {
    if tags.is("route", "ferry") {
        return 9;
    }
    match tags.get_str("highway") {
        Some(
            "motorway" | "motorway_link" | "trunk" | "trunk_link" | "primary" | "primary_link",
        ) => 1,
        Some("secondary" | "secondary_link" | "tertiary" | "tertiary_link" | "unclassified") => 2,
        Some("residential" | "living_street" | "service" | "road") => 3,
        Some("path" | "bridleway") => 4,
        Some("track") => 5,
        Some("cycleway") => 6,
        Some("footway" | "pedestrian" | "platform" | "corridor") => 7,
        Some("steps") => 8,
        Some("construction") => 10,
        _ => 0,
    }
}

pub fn surface_code(surface: Option<&str>) -> u8 {
    match surface {
        Some("paved") => 1,
        Some("unpaved") => 2,
        Some("asphalt") => 3,
        Some("concrete" | "concrete:plates" | "concrete:lanes") => 4,
        Some("cobblestone" | "sett" | "unhewn_cobblestone") => 5,
        Some("metal") => 6,
        Some("wood") => 7,
        Some("compacted") => 8,
        Some("fine_gravel") => 9,
        Some("gravel" | "pebblestone") => 10,
        Some("dirt" | "earth") => 11,
        Some("ground" | "mud") => 12,
        Some("ice" | "snow") => 13,
        Some("paving_stones") => 14,
        Some("sand") => 15,
        Some("woodchips") => 16,
        Some("grass") => 17,
        Some("grass_paver") => 18,
        _ => 0,
    }
}

/// Wheelchair rank of an OSM `smoothness` value, `excellent` = 1 to `impassable` = 8.
pub fn smoothness_rank(value: &str) -> Option<u8> {
    let rank = match value {
        "excellent" => 1,
        "good" => 2,
        "intermediate" => 3,
        "bad" => 4,
        "very_bad" => 5,
        "horrible" => 6,
        "very_horrible" => 7,
        "impassable" => 8,
        _ => return None,
    };
    Some(rank)
}

/// `grade1` = 1 to `grade5` = 5
pub fn track_type_rank(value: &str) -> Option<u8> {
    value
        .strip_prefix("grade")
        .and_then(|g| g.parse::<u8>().ok())
        .filter(|g| (1..=5).contains(g))
}

/// Roughness order of surface codes for wheelchair users; 0 for unknown.
pub fn surface_rank(code: u8) -> u8 {
    match code {
        1 | 3 => 1,
        4 => 2,
        14 => 3,
        6 | 7 | 18 => 4,
        5 => 5,
        8 => 6,
        9 => 7,
        10 => 8,
        11 | 12 | 16 => 9,
        15 | 17 | 2 => 10,
        13 => 11,
        _ => 0,
    }
}

/// Absolute incline in percent from `incline=8%` style values; `up`/`down` are unknown.
pub fn parse_incline(value: &str) -> Option<f64> {
    value
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .map(f64::abs)
}

fn wheelchair_attributes(tags: &TagLookup) -> WheelchairAttributes {
    WheelchairAttributes {
        smoothness: tags.get_str("smoothness").and_then(smoothness_rank).unwrap_or(0),
        track_type: tags.get_str("tracktype").and_then(track_type_rank).unwrap_or(0),
        incline: tags.get_str("incline").and_then(parse_incline).map(|v| v as f32),
        kerb_height: tags
            .number("kerb:height")
            .or(tags.number("sloped_curb"))
            .map(|v| v as f32),
        width: tags.number("width").or(tags.number("footway:width")).map(|v| v as f32),
    }
}

fn access_bits(tags: &TagLookup, keys: &[&str]) -> u8 {
    keys.iter()
        .filter_map(|k| tags.get_str(k))
        .fold(0u8, |acc, v| {
            acc | match v {
                "no" => access::NO,
                "customers" => access::CUSTOMERS,
                "destination" => access::DESTINATION,
                "delivery" => access::DELIVERY,
                "private" => access::PRIVATE,
                "permissive" => access::PERMISSIVE,
                _ => 0,
            }
        })
}

fn mtb_scale(tags: &TagLookup) -> u8 {
    tags.get_str("mtb:scale")
        .and_then(|v| v.trim_end_matches(['+', '-']).parse::<u8>().ok())
        .map(|v| (v + 1).min(7))
        .unwrap_or(0)
}

fn way_from_tags(osm_id: i64, raw: &Tags) -> Way {
    let tags = TagLookup::new(raw);
    let highway = tags.get_str("highway");

    let mut avoid_flags = 0u8;
    if matches!(highway, Some("motorway" | "motorway_link" | "trunk" | "trunk_link")) {
        avoid_flags |= flags::HIGHWAYS;
    }
    if tags.is("toll", "yes") {
        avoid_flags |= flags::TOLLWAYS;
    }
    if highway == Some("steps") {
        avoid_flags |= flags::STEPS;
    }
    if tags.is("route", "ferry") {
        avoid_flags |= flags::FERRIES;
    }
    if tags.is("ford", "yes") {
        avoid_flags |= flags::FORDS;
    }

    let hgv = HgvLimits {
        max_width: tags.number("maxwidth").map(|v| v as f32),
        max_height: tags.number("maxheight").map(|v| v as f32),
        max_length: tags.number("maxlength").map(|v| v as f32),
        max_weight: tags.number("maxweight").map(|v| v as f32),
        max_axle_load: tags.number("maxaxleload").map(|v| v as f32),
        hazmat_forbidden: tags.is("hazmat", "no"),
    };

    Way {
        osm_id,
        name: tags.get_str("name").map(str::to_string),
        reference: tags.get_str("ref").map(str::to_string),
        attrs: WayAttributes {
            way_type: way_type(&tags),
            surface: surface_code(tags.get_str("surface")),
            avoid_flags,
            toll_hgv: tags.is("toll", "yes") || tags.is("toll:hgv", "yes"),
            sac_scale: foot::sac_scale(&tags),
            mtb_scale: mtb_scale(&tags),
            access_restriction: [
                access_bits(&tags, &["access", "vehicle", "motor_vehicle", "motorcar"]),
                access_bits(&tags, &["access", "vehicle", "bicycle"]),
                access_bits(&tags, &["access", "foot"]),
            ],
            roundabout: tags.is("junction", "roundabout"),
            hgv,
            vehicle_denied: vehicle::KEYS
                .iter()
                .filter(|(key, _)| tags.is(key, "no"))
                .fold(0, |acc, (_, bit)| acc | bit),
            wheelchair: wheelchair_attributes(&tags),
        },
    }
}
