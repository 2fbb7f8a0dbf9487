//! Bicycle routing profiles
//!
//! Four variants share the access rules and differ in cruising speed, surface
//! sensitivity and which way types they prefer.

use super::tags::{Oneway, TagLookup};
use super::{ferry, is_unpaved, WayOutput, WayProcessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BikeVariant {
    Regular,
    Road,
    Mountain,
    Electric,
}

pub struct BikeProfile(pub BikeVariant);

const BIKE_ACCESS_KEYS: &[&str] = &["bicycle", "vehicle", "access"];
const PUSHING_SPEED: f64 = 4.0;

impl BikeVariant {
    fn cruise_speed(self) -> f64 {
        match self {
            BikeVariant::Regular => 18.0,
            BikeVariant::Road => 25.0,
            BikeVariant::Mountain => 14.0,
            BikeVariant::Electric => 25.0,
        }
    }

    /// Speed multiplier on unpaved surfaces
    fn unpaved_factor(self) -> f64 {
        match self {
            BikeVariant::Regular => 0.75,
            BikeVariant::Road => 0.4,
            BikeVariant::Mountain => 1.0,
            BikeVariant::Electric => 0.8,
        }
    }

    fn priority(self, highway: &str, tags: &TagLookup) -> u8 {
        let designated = tags.is("bicycle", "designated");
        let base: i32 = match highway {
            "cycleway" => 8,
            "path" | "track" => match self {
                BikeVariant::Mountain => 8,
                BikeVariant::Road => 2,
                _ => 6,
            },
            "living_street" | "residential" => 6,
            "service" | "unclassified" | "road" => 5,
            "tertiary" | "tertiary_link" => 5,
            "secondary" | "secondary_link" => match self {
                BikeVariant::Road => 6,
                _ => 4,
            },
            "primary" | "primary_link" => match self {
                BikeVariant::Road => 5,
                _ => 3,
            },
            "footway" | "pedestrian" | "bridleway" => 2,
            "steps" => 1,
            _ => 5,
        };
        let lane = tags.is_any("cycleway", &["lane", "track", "shared_lane"])
            || tags.is_any("cycleway:both", &["lane", "track"])
            || tags.is_any("cycleway:right", &["lane", "track"]);
        let bonus = i32::from(designated) + i32::from(lane);
        (base + bonus).clamp(0, 10) as u8
    }
}

impl WayProcessor for BikeProfile {
    fn process_way(&self, tags: &TagLookup) -> WayOutput {
        let variant = self.0;
        if let Some(out) = ferry(tags, &["bicycle"], 15.0) {
            return out;
        }

        let Some(highway) = tags.get_str("highway") else {
            return WayOutput::default();
        };
        if tags.access_denied(BIKE_ACCESS_KEYS) {
            return WayOutput::default();
        }

        let riding_allowed = tags.is_any("bicycle", &["yes", "designated", "permissive"]);
        let (mut speed, pushing) = match highway {
            "motorway" | "motorway_link" | "trunk" | "trunk_link" => {
                return WayOutput::default();
            }
            "construction" | "proposed" | "platform" | "corridor" => {
                return WayOutput::default();
            }
            "steps" => (2.0, true),
            "footway" | "pedestrian" | "bridleway" if !riding_allowed => (PUSHING_SPEED, true),
            "living_street" => (10.0, false),
            "track" => (variant.cruise_speed() * 0.8, false),
            "path" => (variant.cruise_speed() * 0.8, false),
            "cycleway" | "primary" | "primary_link" | "secondary" | "secondary_link"
            | "tertiary" | "tertiary_link" | "unclassified" | "residential" | "service"
            | "road" | "footway" | "pedestrian" | "bridleway" => (variant.cruise_speed(), false),
            _ => return WayOutput::default(),
        };

        let unpaved = is_unpaved(tags.get_str("surface"))
            || (highway == "track" && !tags.is("tracktype", "grade1"));
        if unpaved && !pushing {
            speed *= variant.unpaved_factor();
        }
        if !pushing {
            if let Some(limit) = tags.speed_kmh("maxspeed") {
                speed = speed.min(limit);
            }
        }

        let mut output = WayOutput::both_ways(speed, variant.priority(highway, tags));
        if !pushing {
            let contraflow = tags
                .get_str("cycleway")
                .is_some_and(|c| c.starts_with("opposite"));
            let oneway = if contraflow {
                Oneway::No
            } else {
                let o = tags.oneway(&["oneway:bicycle", "oneway"]);
                if o == Oneway::No
                    && !tags.is("oneway:bicycle", "no")
                    && tags.is("junction", "roundabout")
                {
                    Oneway::Forward
                } else {
                    o
                }
            };
            output.apply_oneway(oneway);
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Tags;

    fn run(variant: BikeVariant, kv: &[(&str, &str)]) -> WayOutput {
        let t: Tags = kv.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        BikeProfile(variant).process_way(&TagLookup::new(&t))
    }

    #[test]
    fn test_no_bikes_on_motorways() {
        assert!(!run(BikeVariant::Regular, &[("highway", "motorway")]).is_accessible());
        assert!(!run(BikeVariant::Road, &[("highway", "trunk")]).is_accessible());
    }

    #[test]
    fn test_footway_is_pushed_unless_allowed() {
        let pushed = run(BikeVariant::Regular, &[("highway", "footway")]);
        assert_eq!(pushed.speed_fwd, PUSHING_SPEED);
        let ridden = run(BikeVariant::Regular, &[("highway", "footway"), ("bicycle", "yes")]);
        assert_eq!(ridden.speed_fwd, 18.0);
    }

    #[test]
    fn test_surface_penalty_depends_on_variant() {
        let road = run(BikeVariant::Road, &[("highway", "residential"), ("surface", "gravel")]);
        let mtb = run(BikeVariant::Mountain, &[("highway", "residential"), ("surface", "gravel")]);
        assert_eq!(road.speed_fwd, 10.0);
        assert_eq!(mtb.speed_fwd, 14.0);
    }

    #[test]
    fn test_contraflow_cycleway() {
        let out = run(
            BikeVariant::Regular,
            &[("highway", "residential"), ("oneway", "yes"), ("cycleway", "opposite_lane")],
        );
        assert!(out.access_fwd && out.access_rev);
        let out = run(BikeVariant::Regular, &[("highway", "residential"), ("oneway", "yes")]);
        assert!(!out.access_rev);
    }

    #[test]
    fn test_priorities() {
        let cycleway = run(BikeVariant::Regular, &[("highway", "cycleway")]);
        let primary = run(BikeVariant::Regular, &[("highway", "primary")]);
        assert!(cycleway.priority > primary.priority);
        let mtb_track = run(BikeVariant::Mountain, &[("highway", "track")]);
        let road_track = run(BikeVariant::Road, &[("highway", "track")]);
        assert!(mtb_track.priority > road_track.priority);
    }
}
