use osmpbf::{Element, ElementReader};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::GraphError;

pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OsmNode {
    pub lon: f64,
    pub lat: f64,
    /// From the `ele` tag when present
    pub ele: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct OsmWay {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub tags: Tags,
}

#[derive(Debug, Default)]
pub struct OsmData {
    pub nodes: HashMap<i64, OsmNode>,
    pub ways: Vec<OsmWay>,
}

impl OsmData {
    pub fn add_node(&mut self, id: i64, lon: f64, lat: f64) {
        self.nodes.insert(id, OsmNode { lon, lat, ele: None });
    }

    pub fn add_node_with_ele(&mut self, id: i64, lon: f64, lat: f64, ele: f64) {
        self.nodes.insert(
            id,
            OsmNode {
                lon,
                lat,
                ele: Some(ele),
            },
        );
    }

    pub fn add_way(&mut self, id: i64, nodes: &[i64], tags: &[(&str, &str)]) {
        self.ways.push(OsmWay {
            id,
            nodes: nodes.to_vec(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
    }
}

/// Ways that can carry traffic for at least one profile.
pub fn is_routable(tags: &Tags) -> bool {
    tags.contains_key("highway") || tags.get("route").map(String::as_str) == Some("ferry")
}

fn parse_ele(value: &str) -> Option<f64> {
    value
        .trim()
        .trim_end_matches('m')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub fn parse_pbf<P: AsRef<Path>>(path: P) -> Result<OsmData, GraphError> {
    let reader = ElementReader::from_path(path)?;

    let mut data = OsmData::default();

    reader.for_each(|element| match element {
        Element::Node(node) => {
            let ele = node.tags().find(|t| t.0 == "ele").and_then(|t| parse_ele(t.1));
            data.nodes.insert(
                node.id(),
                OsmNode {
                    lon: node.lon(),
                    lat: node.lat(),
                    ele,
                },
            );
        }
        Element::DenseNode(node) => {
            let ele = node.tags().find(|t| t.0 == "ele").and_then(|t| parse_ele(t.1));
            data.nodes.insert(
                node.id(),
                OsmNode {
                    lon: node.lon(),
                    lat: node.lat(),
                    ele,
                },
            );
        }
        Element::Way(way) => {
            let tags: Tags = way
                .tags()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            if is_routable(&tags) {
                data.ways.push(OsmWay {
                    id: way.id(),
                    nodes: way.refs().collect(),
                    tags,
                });
            }
        }
        Element::Relation(_) => {}
    })?;

    tracing::info!(
        nodes = data.nodes.len(),
        ways = data.ways.len(),
        "parsed PBF"
    );

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ele_variants() {
        assert_eq!(parse_ele("123"), Some(123.0));
        assert_eq!(parse_ele("12.5 m"), Some(12.5));
        assert_eq!(parse_ele("high"), None);
    }

    #[test]
    fn test_routable_ways() {
        let mut data = OsmData::default();
        data.add_way(1, &[1, 2], &[("highway", "residential")]);
        data.add_way(2, &[1, 2], &[("route", "ferry")]);
        data.add_way(3, &[1, 2], &[("building", "yes")]);
        let routable: Vec<i64> = data
            .ways
            .iter()
            .filter(|w| is_routable(&w.tags))
            .map(|w| w.id)
            .collect();
        assert_eq!(routable, vec![1, 2]);
    }
}
