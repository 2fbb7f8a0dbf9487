//! Tag lookup utility for profiles
//!
//! Thin accessor over a way's tag map with the parsing helpers the profiles
//! share (oneway, maxspeed, access values).

use crate::parse::Tags;

pub struct TagLookup<'a> {
    tags: &'a Tags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oneway {
    No,
    Forward,
    Backward,
}

impl<'a> TagLookup<'a> {
    pub fn new(tags: &'a Tags) -> Self {
        Self { tags }
    }

    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn is(&self, key: &str, value: &str) -> bool {
        self.get_str(key) == Some(value)
    }

    pub fn is_any(&self, key: &str, values: &[&str]) -> bool {
        self.get_str(key).is_some_and(|v| values.contains(&v))
    }

    /// First denied value among `keys`, most specific key first.
    ///
    /// A more specific key that grants access overrides a generic denial,
    /// e.g. `access=no` + `foot=yes`.
    pub fn access_denied(&self, keys: &[&str]) -> bool {
        for key in keys {
            match self.get_str(key) {
                Some(v) if is_denied(Some(v)) => return true,
                Some(v) if is_granted(v) => return false,
                _ => {}
            }
        }
        false
    }

    pub fn oneway(&self, keys: &[&str]) -> Oneway {
        for key in keys {
            match self.get_str(key) {
                Some("yes" | "1" | "true") => return Oneway::Forward,
                Some("-1" | "reverse") => return Oneway::Backward,
                Some("no" | "0" | "false") => return Oneway::No,
                _ => {}
            }
        }
        Oneway::No
    }

    /// `maxspeed`-style value in km/h.
    pub fn speed_kmh(&self, key: &str) -> Option<f64> {
        parse_speed(self.get_str(key)?)
    }

    /// Dimension/weight tags such as `maxheight=3.5` or `maxweight=7.5 t`.
    pub fn number(&self, key: &str) -> Option<f64> {
        let raw = self.get_str(key)?.trim();
        let numeric: String = raw
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        numeric.parse::<f64>().ok().filter(|v| *v > 0.0)
    }
}

pub fn is_denied(value: Option<&str>) -> bool {
    matches!(value, Some("no") | Some("private") | Some("agricultural") | Some("forestry"))
}

fn is_granted(value: &str) -> bool {
    matches!(value, "yes" | "designated" | "permissive" | "destination" | "delivery" | "customers")
}

pub fn parse_speed(value: &str) -> Option<f64> {
    let v = value.trim();
    match v {
        "walk" => return Some(6.0),
        "none" | "signals" | "variable" => return None,
        _ => {}
    }
    if let Some((_, zone)) = v.split_once(':') {
        return match zone {
            "zone30" => Some(30.0),
            "urban" => Some(50.0),
            "rural" => Some(90.0),
            "motorway" => Some(130.0),
            "living_street" => Some(7.0),
            _ => None,
        };
    }
    if let Some(mph) = v.strip_suffix("mph") {
        return mph.trim().parse::<f64>().ok().map(|s| s * 1.609_344);
    }
    v.trim_end_matches("km/h")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| *s > 0.0)
}
