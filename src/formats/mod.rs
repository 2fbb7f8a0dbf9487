//! Response encodings shared by the services.

pub mod geojson;
pub mod gpx;
pub mod json;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::Service;
use crate::graph::RouteGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    GeoJson,
    Gpx,
}

impl ResponseFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "json" => Some(ResponseFormat::Json),
            "geojson" => Some(ResponseFormat::GeoJson),
            "gpx" => Some(ResponseFormat::Gpx),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::GeoJson => "geojson",
            ResponseFormat::Gpx => "gpx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ResponseFormat::Json => "application/json;charset=UTF-8",
            ResponseFormat::GeoJson => "application/geo+json;charset=UTF-8",
            ResponseFormat::Gpx => "application/gpx+xml;charset=UTF-8",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EngineInfo {
    pub version: String,
    pub build_date: String,
    pub graph_date: String,
}

/// `metadata` block of every JSON response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Metadata {
    pub attribution: String,
    pub service: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    /// The request as received, with profile and format added
    #[schema(value_type = Object)]
    pub query: Value,
    pub engine: EngineInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Metadata {
    pub fn new(attribution: &str, service: Service, query: Value, graph: &RouteGraph) -> Self {
        let id = query.get("id").and_then(Value::as_str).map(str::to_string);
        Self {
            attribution: attribution.to_string(),
            service: service.name().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            query,
            engine: EngineInfo {
                version: crate::ENGINE_VERSION.to_string(),
                build_date: crate::build_date().to_string(),
                graph_date: graph.timestamp_rfc3339(),
            },
            id,
        }
    }
}

/// Smallest box around all of `boxes`; each is `[min.., max..]` with 2 or 3 dimensions.
pub fn union_bbox<'a>(boxes: impl IntoIterator<Item = &'a [f64]>) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for b in boxes {
        if b.is_empty() {
            continue;
        }
        if out.is_empty() {
            out = b.to_vec();
            continue;
        }
        let dims = out.len().min(b.len()) / 2;
        let (out_dims, b_dims) = (out.len() / 2, b.len() / 2);
        for d in 0..dims {
            out[d] = out[d].min(b[d]);
            out[out_dims + d] = out[out_dims + d].max(b[b_dims + d]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(ResponseFormat::parse("gpx"), Some(ResponseFormat::Gpx));
        assert_eq!(ResponseFormat::parse("topojson"), None);
    }

    #[test]
    fn test_union_bbox() {
        let a = [8.0, 49.0, 8.1, 49.1];
        let b = [7.9, 49.05, 8.05, 49.2];
        let u = union_bbox([&a[..], &b[..]]);
        assert_eq!(u, vec![7.9, 49.0, 8.1, 49.2]);
        assert!(union_bbox(std::iter::empty()).is_empty());
    }
}
