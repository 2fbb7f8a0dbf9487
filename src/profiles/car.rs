//! Car routing profile - Tag semantics for automobile routing
//!
//! Implements access rules, speed limits, and oneway handling for cars.

use super::tags::{Oneway, TagLookup};
use super::{ferry, WayOutput, WayProcessor, PRIORITY_UNCHANGED};

pub struct CarProfile;

const CAR_ACCESS_KEYS: &[&str] = &["motorcar", "motor_vehicle", "vehicle", "access"];

/// Default speed for a highway class, km/h. `None` = not drivable.
pub(crate) fn road_speed(highway: &str, tags: &TagLookup) -> Option<f64> {
    let speed = match highway {
        "motorway" => 100.0,
        "motorway_link" => 60.0,
        "trunk" => 85.0,
        "trunk_link" => 60.0,
        "primary" => 65.0,
        "primary_link" => 50.0,
        "secondary" => 60.0,
        "secondary_link" => 50.0,
        "tertiary" => 50.0,
        "tertiary_link" => 40.0,
        "unclassified" => 30.0,
        "residential" => 30.0,
        "road" => 20.0,
        "service" => 20.0,
        "living_street" => 5.0,
        // Only well-built tracks are drivable
        "track" if tags.is_any("tracktype", &["grade1"]) => 15.0,
        _ => return None,
    };
    Some(speed)
}

/// Combine the class default with an explicit limit. Cars rarely travel
/// exactly at the posted limit, so the limit is discounted.
pub(crate) fn effective_speed(base: f64, maxspeed: Option<f64>, cap: f64) -> f64 {
    let speed = match maxspeed {
        Some(limit) => (limit * 0.9).max(5.0),
        None => base,
    };
    speed.min(cap)
}

pub(crate) fn implied_oneway(highway: &str, tags: &TagLookup) -> Oneway {
    let explicit = tags.oneway(&["oneway"]);
    if explicit != Oneway::No || tags.is("oneway", "no") {
        return explicit;
    }
    if highway == "motorway" || highway == "motorway_link" || tags.is("junction", "roundabout") {
        return Oneway::Forward;
    }
    Oneway::No
}

impl WayProcessor for CarProfile {
    fn process_way(&self, tags: &TagLookup) -> WayOutput {
        if let Some(out) = ferry(tags, &["motorcar", "motor_vehicle"], 15.0) {
            return out;
        }

        let Some(highway) = tags.get_str("highway") else {
            return WayOutput::default();
        };
        let Some(base) = road_speed(highway, tags) else {
            return WayOutput::default();
        };
        if tags.access_denied(CAR_ACCESS_KEYS) {
            return WayOutput::default();
        }

        let fwd = effective_speed(base, tags.speed_kmh("maxspeed:forward").or(tags.speed_kmh("maxspeed")), 140.0);
        let rev = effective_speed(base, tags.speed_kmh("maxspeed:backward").or(tags.speed_kmh("maxspeed")), 140.0);

        let mut output = WayOutput {
            access_fwd: true,
            access_rev: true,
            speed_fwd: fwd,
            speed_rev: rev,
            priority: PRIORITY_UNCHANGED,
        };
        output.apply_oneway(implied_oneway(highway, tags));
        output
    }
}
