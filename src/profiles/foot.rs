//! Pedestrian routing profiles - Tag semantics for walking and hiking

use super::tags::TagLookup;
use super::{ferry, WayOutput, WayProcessor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootVariant {
    Walking,
    Hiking,
}

pub struct FootProfile(pub FootVariant);

const FOOT_ACCESS_KEYS: &[&str] = &["foot", "access"];
pub(crate) const WALKING_SPEED: f64 = 5.0;

/// SAC hiking scale grade, 0 when absent
pub fn sac_scale(tags: &TagLookup) -> u8 {
    match tags.get_str("sac_scale") {
        Some("hiking") => 1,
        Some("mountain_hiking") => 2,
        Some("demanding_mountain_hiking") => 3,
        Some("alpine_hiking") => 4,
        Some("demanding_alpine_hiking") => 5,
        Some("difficult_alpine_hiking") => 6,
        _ => 0,
    }
}

impl FootVariant {
    fn max_sac_scale(self) -> u8 {
        match self {
            FootVariant::Walking => 1,
            FootVariant::Hiking => 6,
        }
    }

    fn priority(self, highway: &str) -> u8 {
        match (self, highway) {
            (_, "footway" | "pedestrian" | "living_street") => 8,
            (FootVariant::Hiking, "path" | "track" | "bridleway") => 9,
            (FootVariant::Walking, "path" | "track" | "bridleway") => 7,
            (_, "steps") => 6,
            (_, "residential" | "service") => 6,
            (_, "cycleway" | "unclassified" | "road") => 5,
            (_, "tertiary" | "tertiary_link") => 4,
            (_, "secondary" | "secondary_link") => 3,
            (_, "primary" | "primary_link") => 2,
            (_, "trunk" | "trunk_link") => 1,
            _ => 5,
        }
    }
}

impl WayProcessor for FootProfile {
    fn process_way(&self, tags: &TagLookup) -> WayOutput {
        let variant = self.0;
        if let Some(out) = ferry(tags, &["foot"], 15.0) {
            return out;
        }

        let Some(highway) = tags.get_str("highway") else {
            return WayOutput::default();
        };
        let explicitly_allowed = tags.is_any("foot", &["yes", "designated", "permissive"]);

        let speed = match highway {
            "motorway" | "motorway_link" => return WayOutput::default(),
            "trunk" | "trunk_link" if !explicitly_allowed && !tags.has("sidewalk") => {
                return WayOutput::default();
            }
            "construction" | "proposed" => return WayOutput::default(),
            "steps" => 3.0,
            "footway" | "pedestrian" | "path" | "track" | "bridleway" | "cycleway"
            | "living_street" | "residential" | "service" | "unclassified" | "road"
            | "tertiary" | "tertiary_link" | "secondary" | "secondary_link" | "primary"
            | "primary_link" | "trunk" | "trunk_link" | "platform" | "corridor" => WALKING_SPEED,
            _ => return WayOutput::default(),
        };

        if tags.access_denied(FOOT_ACCESS_KEYS) {
            return WayOutput::default();
        }
        if sac_scale(tags) > variant.max_sac_scale() {
            return WayOutput::default();
        }

        // Oneway tags do not apply to pedestrians
        WayOutput::both_ways(speed, variant.priority(highway))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::Tags;

    fn run(variant: FootVariant, kv: &[(&str, &str)]) -> WayOutput {
        let t: Tags = kv.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        FootProfile(variant).process_way(&TagLookup::new(&t))
    }

    #[test]
    fn test_oneway_ignored() {
        let out = run(FootVariant::Walking, &[("highway", "residential"), ("oneway", "yes")]);
        assert!(out.access_fwd && out.access_rev);
        assert_eq!(out.speed_fwd, WALKING_SPEED);
    }

    #[test]
    fn test_sac_scale_limits() {
        let tags = [("highway", "path"), ("sac_scale", "alpine_hiking")];
        assert!(!run(FootVariant::Walking, &tags).is_accessible());
        assert!(run(FootVariant::Hiking, &tags).is_accessible());
    }

    #[test]
    fn test_foot_no() {
        assert!(!run(FootVariant::Walking, &[("highway", "cycleway"), ("foot", "no")]).is_accessible());
        assert!(!run(FootVariant::Walking, &[("highway", "motorway")]).is_accessible());
    }

    #[test]
    fn test_hiking_prefers_paths() {
        let h = run(FootVariant::Hiking, &[("highway", "path")]);
        let w = run(FootVariant::Walking, &[("highway", "path")]);
        assert!(h.priority > w.priority);
    }
}
