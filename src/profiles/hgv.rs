//! Heavy goods vehicle profile
//!
//! Car road network with HGV access tags and a lower speed ceiling.
//! Physical limits (maxheight, maxweight, ...) are stored per way and checked
//! against request restrictions at query time, not here.

use super::car::{effective_speed, implied_oneway, road_speed};
use super::tags::TagLookup;
use super::{ferry, WayOutput, WayProcessor, PRIORITY_UNCHANGED};

pub struct HgvProfile;

const HGV_ACCESS_KEYS: &[&str] = &["hgv", "goods", "motor_vehicle", "vehicle", "access"];
const HGV_MAX_SPEED: f64 = 80.0;

impl WayProcessor for HgvProfile {
    fn process_way(&self, tags: &TagLookup) -> WayOutput {
        if let Some(out) = ferry(tags, &["hgv", "motor_vehicle"], 15.0) {
            return out;
        }

        let Some(highway) = tags.get_str("highway") else {
            return WayOutput::default();
        };
        if highway == "living_street" {
            return WayOutput::default();
        }
        let Some(base) = road_speed(highway, tags) else {
            return WayOutput::default();
        };
        if tags.access_denied(HGV_ACCESS_KEYS) {
            return WayOutput::default();
        }

        let limit = tags.speed_kmh("maxspeed:hgv").or(tags.speed_kmh("maxspeed"));
        let speed = effective_speed(base, limit, HGV_MAX_SPEED);

        let mut output = WayOutput::both_ways(speed, PRIORITY_UNCHANGED);
        output.apply_oneway(implied_oneway(highway, tags));
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Tags;

    fn run(kv: &[(&str, &str)]) -> WayOutput {
        let t: Tags = kv.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        HgvProfile.process_way(&TagLookup::new(&t))
    }

    #[test]
    fn test_speed_capped() {
        let out = run(&[("highway", "motorway")]);
        assert_eq!(out.speed_fwd, HGV_MAX_SPEED);
    }

    #[test]
    fn test_hgv_access_tag() {
        assert!(!run(&[("highway", "primary"), ("hgv", "no")]).is_accessible());
        assert!(run(&[("highway", "primary"), ("access", "no"), ("hgv", "designated")]).is_accessible());
    }

    #[test]
    fn test_hgv_maxspeed_preferred() {
        let out = run(&[("highway", "primary"), ("maxspeed", "100"), ("maxspeed:hgv", "60")]);
        assert_eq!(out.speed_fwd, 54.0);
    }
}
