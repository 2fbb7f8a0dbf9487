//! ors-route: OpenStreetMap routing engine with an openrouteservice-compatible
//! `/v2` HTTP API.
//!
//! The engine side builds a routable graph from OSM data for a set of
//! profiles and answers directions, matrix, isochrone, snapping, matching and
//! export queries. The `server` module exposes those queries over axum.

pub mod config;
pub mod directions;
pub mod error;
pub mod export;
pub mod formats;
pub mod geo;
pub mod graph;
pub mod isochrone;
pub mod logging;
pub mod matching;
pub mod matrix;
pub mod parse;
pub mod polyline;
pub mod profiles;
pub mod route;
pub mod server;
pub mod snap;
pub mod snapping;
pub mod storage;
pub mod weighting;

pub use error::{ApiError, EngineError, ErrorKind, GraphError, Service};
pub use graph::RouteGraph;
pub use profiles::Profile;
pub use snap::{Snap, SpatialIndex};

/// Engine version reported in responses and the status endpoint.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date reported next to the engine version.
pub fn build_date() -> &'static str {
    option_env!("ORS_ROUTE_BUILD_DATE").unwrap_or("unknown")
}
