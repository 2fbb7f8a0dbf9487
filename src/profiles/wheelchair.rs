//! Wheelchair profile: pedestrian network without steps, rough surfaces or
//! mountain trails.

use super::tags::TagLookup;
use super::{ferry, is_unpaved, WayOutput, WayProcessor};
use crate::graph::{parse_incline, smoothness_rank};

pub struct WheelchairProfile;

const WHEELCHAIR_ACCESS_KEYS: &[&str] = &["wheelchair", "foot", "access"];
const WHEELCHAIR_SPEED: f64 = 4.0;

impl WayProcessor for WheelchairProfile {
    fn process_way(&self, tags: &TagLookup) -> WayOutput {
        if let Some(out) = ferry(tags, &["wheelchair", "foot"], 15.0) {
            return out;
        }

        let Some(highway) = tags.get_str("highway") else {
            return WayOutput::default();
        };

        let priority = match highway {
            "footway" | "pedestrian" | "living_street" => 8,
            "residential" | "service" => 6,
            "path" | "cycleway" | "unclassified" | "road" => 5,
            "tertiary" | "tertiary_link" => 4,
            "secondary" | "secondary_link" => 3,
            "primary" | "primary_link" => 2,
            "track" if tags.is("tracktype", "grade1") => 4,
            _ => return WayOutput::default(),
        };

        if tags.access_denied(WHEELCHAIR_ACCESS_KEYS) {
            return WayOutput::default();
        }
        if tags.has("sac_scale") || is_unpaved(tags.get_str("surface")) {
            return WayOutput::default();
        }
        if tags.get_str("smoothness").and_then(smoothness_rank).is_some_and(|r| r >= 4) {
            return WayOutput::default();
        }
        if tags.get_str("incline").and_then(parse_incline).is_some_and(|i| i > 6.0) {
            return WayOutput::default();
        }

        WayOutput::both_ways(WHEELCHAIR_SPEED, priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Tags;

    fn run(kv: &[(&str, &str)]) -> WayOutput {
        let t: Tags = kv.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        WheelchairProfile.process_way(&TagLookup::new(&t))
    }

    #[test]
    fn test_no_steps_or_gravel() {
        assert!(!run(&[("highway", "steps")]).is_accessible());
        assert!(!run(&[("highway", "footway"), ("surface", "gravel")]).is_accessible());
        assert!(run(&[("highway", "footway"), ("surface", "asphalt")]).is_accessible());
    }

    #[test]
    fn test_steep_incline() {
        assert!(!run(&[("highway", "footway"), ("incline", "-10%")]).is_accessible());
        assert!(run(&[("highway", "footway"), ("incline", "3%")]).is_accessible());
    }

    #[test]
    fn test_wheelchair_tag_overrides() {
        assert!(!run(&[("highway", "footway"), ("wheelchair", "no")]).is_accessible());
    }
}
