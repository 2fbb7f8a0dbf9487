//! Built-in routing profiles for different travel modes
//!
//! Each profile turns a way's tags into per-direction access, speed and a
//! priority used by the `recommended` weighting and the `suitability` extra.

pub mod bike;
pub mod car;
pub mod foot;
pub mod hgv;
pub mod tags;
pub mod wheelchair;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::parse::Tags;
pub use bike::{BikeProfile, BikeVariant};
pub use car::CarProfile;
pub use foot::{FootProfile, FootVariant};
pub use hgv::HgvProfile;
use tags::TagLookup;
pub use wheelchair::WheelchairProfile;

/// Priority of an ordinary way
pub const PRIORITY_UNCHANGED: u8 = 5;
pub const PRIORITY_BEST: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WayOutput {
    /// Can traverse along way direction
    pub access_fwd: bool,
    /// Can traverse against way direction
    pub access_rev: bool,
    /// km/h
    pub speed_fwd: f64,
    /// km/h
    pub speed_rev: f64,
    /// 0 (avoid) ..= 10 (best)
    pub priority: u8,
}

impl Default for WayOutput {
    fn default() -> Self {
        Self {
            access_fwd: false,
            access_rev: false,
            speed_fwd: 0.0,
            speed_rev: 0.0,
            priority: PRIORITY_UNCHANGED,
        }
    }
}

impl WayOutput {
    pub fn both_ways(speed: f64, priority: u8) -> Self {
        Self {
            access_fwd: true,
            access_rev: true,
            speed_fwd: speed,
            speed_rev: speed,
            priority,
        }
    }

    pub fn is_accessible(&self) -> bool {
        (self.access_fwd && self.speed_fwd > 0.0) || (self.access_rev && self.speed_rev > 0.0)
    }

    pub(crate) fn apply_oneway(&mut self, oneway: tags::Oneway) {
        match oneway {
            tags::Oneway::Forward => {
                self.access_rev = false;
                self.speed_rev = 0.0;
            }
            tags::Oneway::Backward => {
                self.access_fwd = false;
                self.speed_fwd = 0.0;
            }
            tags::Oneway::No => {}
        }
    }
}

pub trait WayProcessor {
    fn process_way(&self, tags: &TagLookup) -> WayOutput;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Driving,
    Cycling,
    Walking,
    Wheelchair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Profile {
    #[serde(rename = "driving-car")]
    DrivingCar,
    #[serde(rename = "driving-hgv")]
    DrivingHgv,
    #[serde(rename = "cycling-regular")]
    CyclingRegular,
    #[serde(rename = "cycling-road")]
    CyclingRoad,
    #[serde(rename = "cycling-mountain")]
    CyclingMountain,
    #[serde(rename = "cycling-electric")]
    CyclingElectric,
    #[serde(rename = "foot-walking")]
    FootWalking,
    #[serde(rename = "foot-hiking")]
    FootHiking,
    #[serde(rename = "wheelchair")]
    Wheelchair,
}

impl Profile {
    pub const ALL: [Profile; 9] = [
        Profile::DrivingCar,
        Profile::DrivingHgv,
        Profile::CyclingRegular,
        Profile::CyclingRoad,
        Profile::CyclingMountain,
        Profile::CyclingElectric,
        Profile::FootWalking,
        Profile::FootHiking,
        Profile::Wheelchair,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Profile::DrivingCar => "driving-car",
            Profile::DrivingHgv => "driving-hgv",
            Profile::CyclingRegular => "cycling-regular",
            Profile::CyclingRoad => "cycling-road",
            Profile::CyclingMountain => "cycling-mountain",
            Profile::CyclingElectric => "cycling-electric",
            Profile::FootWalking => "foot-walking",
            Profile::FootHiking => "foot-hiking",
            Profile::Wheelchair => "wheelchair",
        }
    }

    /// Encoder name reported by the status endpoint
    pub fn encoder_name(self) -> &'static str {
        match self {
            Profile::DrivingCar => "car-ors",
            Profile::DrivingHgv => "heavyvehicle",
            Profile::CyclingRegular => "bike-ors",
            Profile::CyclingRoad => "roadbike-ors",
            Profile::CyclingMountain => "mtb-ors",
            Profile::CyclingElectric => "electricbikes",
            Profile::FootWalking => "foot-ors",
            Profile::FootHiking => "hiking-ors",
            Profile::Wheelchair => "wheelchair",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Profile::DrivingCar | Profile::DrivingHgv => Category::Driving,
            Profile::CyclingRegular
            | Profile::CyclingRoad
            | Profile::CyclingMountain
            | Profile::CyclingElectric => Category::Cycling,
            Profile::FootWalking | Profile::FootHiking => Category::Walking,
            Profile::Wheelchair => Category::Wheelchair,
        }
    }

    pub fn is_driving(self) -> bool {
        self.category() == Category::Driving
    }

    pub fn process_way(self, tags: &Tags) -> WayOutput {
        let lookup = TagLookup::new(tags);
        match self {
            Profile::DrivingCar => CarProfile.process_way(&lookup),
            Profile::DrivingHgv => HgvProfile.process_way(&lookup),
            Profile::CyclingRegular => BikeProfile(BikeVariant::Regular).process_way(&lookup),
            Profile::CyclingRoad => BikeProfile(BikeVariant::Road).process_way(&lookup),
            Profile::CyclingMountain => BikeProfile(BikeVariant::Mountain).process_way(&lookup),
            Profile::CyclingElectric => BikeProfile(BikeVariant::Electric).process_way(&lookup),
            Profile::FootWalking => FootProfile(FootVariant::Walking).process_way(&lookup),
            Profile::FootHiking => FootProfile(FootVariant::Hiking).process_way(&lookup),
            Profile::Wheelchair => WheelchairProfile.process_way(&lookup),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("unknown profile '{s}'"))
    }
}

/// Ferry handling shared by all profiles.
pub(crate) fn ferry(tags: &TagLookup, deny_keys: &[&str], speed_kmh: f64) -> Option<WayOutput> {
    if !tags.is("route", "ferry") {
        return None;
    }
    if tags.access_denied(deny_keys) {
        return Some(WayOutput::default());
    }
    Some(WayOutput::both_ways(speed_kmh, PRIORITY_UNCHANGED))
}

/// Surfaces slow enough to matter for bikes and wheelchairs.
pub(crate) fn is_unpaved(surface: Option<&str>) -> bool {
    matches!(
        surface,
        Some(
            "unpaved"
                | "gravel"
                | "fine_gravel"
                | "compacted"
                | "dirt"
                | "earth"
                | "ground"
                | "grass"
                | "sand"
                | "mud"
                | "pebblestone"
                | "woodchips"
                | "grass_paver"
        )
    )
}
