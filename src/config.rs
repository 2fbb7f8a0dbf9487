//! Service configuration loaded from TOML.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a
//! working configuration. CLI flags override individual values after load.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::profiles::Profile;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub endpoints: EndpointsConfig,
    pub info: InfoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Maximum number of requests processed concurrently
    pub concurrency_limit: usize,
    /// Maximum request body size in bytes
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            request_timeout_secs: 120,
            concurrency_limit: 64,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Prebuilt graph file produced by `ors-route build`
    pub graph_path: PathBuf,
    /// OSM extract the graph is built from when `graph_path` does not exist
    pub source_file: Option<PathBuf>,
    /// Profiles to encode when building from `source_file`
    pub profiles: Vec<Profile>,
    pub attribution: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            graph_path: PathBuf::from("graph.bin"),
            source_file: None,
            profiles: Profile::ALL.to_vec(),
            attribution: "openrouteservice.org | OpenStreetMap contributors".to_string(),
        }
    }
}

/// Service identity written into GPX metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoConfig {
    pub routing_name: String,
    pub routing_description: String,
    pub author_tag: String,
    /// `id@domain`
    pub support_mail: String,
    pub base_url: String,
    pub content_licence: String,
    /// Notice echoed as `system-message`, empty when unset
    pub system_message: String,
}

impl Default for InfoConfig {
    fn default() -> Self {
        Self {
            routing_name: "ORSRouting".to_string(),
            routing_description: "This is a directions instructions file as GPX, generated from openrouteservice"
                .to_string(),
            author_tag: "openrouteservice".to_string(),
            support_mail: "support@openrouteservice.org".to_string(),
            base_url: "https://openrouteservice.org/".to_string(),
            content_licence: "LGPL 3.0".to_string(),
            system_message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub routing: RoutingLimits,
    pub matrix: MatrixLimits,
    pub isochrones: IsochroneLimits,
    pub snap: SnapLimits,
    pub matching: MatchingLimits,
    pub export: ExportLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingLimits {
    pub enabled: bool,
    pub maximum_waypoints: usize,
    /// Sum of straight-line distances between consecutive waypoints, metres
    pub maximum_distance: f64,
    pub maximum_distance_avoid_areas: f64,
    pub maximum_distance_alternative_routes: f64,
    pub maximum_distance_round_trip_routes: f64,
    pub maximum_alternative_routes: usize,
    /// Square metres
    pub maximum_avoid_polygon_area: f64,
    /// Metres
    pub maximum_avoid_polygon_extent: f64,
    pub maximum_speed_lower_bound: f64,
    pub default_search_radius: f64,
    pub maximum_visited_nodes: usize,
}

impl Default for RoutingLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            maximum_waypoints: 50,
            maximum_distance: 6_000_000.0,
            maximum_distance_avoid_areas: 6_000_000.0,
            maximum_distance_alternative_routes: 6_000_000.0,
            maximum_distance_round_trip_routes: 100_000.0,
            maximum_alternative_routes: 3,
            maximum_avoid_polygon_area: 200_000_000.0,
            maximum_avoid_polygon_extent: 20_000.0,
            maximum_speed_lower_bound: 80.0,
            default_search_radius: 350.0,
            maximum_visited_nodes: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixLimits {
    pub enabled: bool,
    /// sources x destinations
    pub maximum_routes: usize,
    pub maximum_search_radius: f64,
    pub maximum_visited_nodes: usize,
}

impl Default for MatrixLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            maximum_routes: 2500,
            maximum_search_radius: 2000.0,
            maximum_visited_nodes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsochroneLimits {
    pub enabled: bool,
    pub maximum_locations: usize,
    pub maximum_intervals: usize,
    /// Seconds
    pub maximum_range_time: f64,
    /// Metres
    pub maximum_range_distance: f64,
    pub search_radius: f64,
}

impl Default for IsochroneLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            maximum_locations: 2,
            maximum_intervals: 10,
            maximum_range_time: 3600.0,
            maximum_range_distance: 120_000.0,
            search_radius: 350.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapLimits {
    pub enabled: bool,
    pub maximum_locations: usize,
    pub maximum_radius: f64,
}

impl Default for SnapLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            maximum_locations: 5000,
            maximum_radius: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingLimits {
    pub enabled: bool,
    pub maximum_features: usize,
    pub search_radius: f64,
}

impl Default for MatchingLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            maximum_features: 1000,
            search_radius: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportLimits {
    pub enabled: bool,
    /// Square degrees
    pub maximum_bbox_area: f64,
}

impl Default for ExportLimits {
    fn default() -> Self {
        Self {
            enabled: true,
            maximum_bbox_area: 1.0,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse configuration")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
