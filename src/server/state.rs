//! Shared, read-only state behind every handler.

use std::str::FromStr;

use crate::config::AppConfig;
use crate::error::{ApiError, Service};
use crate::graph::RouteGraph;
use crate::profiles::Profile;
use crate::snap::SpatialIndex;

pub struct ServiceState {
    pub graph: RouteGraph,
    pub index: SpatialIndex,
    pub config: AppConfig,
}

impl ServiceState {
    pub fn new(graph: RouteGraph, config: AppConfig) -> Self {
        let started = std::time::Instant::now();
        let index = SpatialIndex::build(&graph);
        tracing::info!(
            edges = graph.edges.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "spatial index built"
        );
        Self { graph, index, config }
    }

    /// Profiles that are both configured and present in the graph
    pub fn profiles(&self) -> Vec<Profile> {
        self.graph
            .profile_list()
            .into_iter()
            .filter(|p| self.config.engine.profiles.contains(p))
            .collect()
    }

    /// Resolve a `{profile}` path segment.
    pub fn profile(&self, service: Service, name: &str) -> Result<Profile, ApiError> {
        let profile = Profile::from_str(name).map_err(|_| ApiError::invalid_value(service, "profile", name))?;
        if !self.config.engine.profiles.contains(&profile) || self.graph.slot(profile).is_none() {
            return Err(ApiError::invalid_value(service, "profile", name));
        }
        Ok(profile)
    }
}
