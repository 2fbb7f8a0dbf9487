//! Geodesic helpers. Coordinates are `[lon, lat]` in degrees throughout.

use geo::{Area, ChamberlainDuquetteArea, Coord, HaversineDistance, LineString, Point, Polygon};

pub const METRES_PER_DEGREE: f64 = 111_319.49;

pub fn haversine_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    Point::new(a[0], a[1]).haversine_distance(&Point::new(b[0], b[1]))
}

/// Initial bearing from `a` to `b`, degrees clockwise from north in [0, 360).
pub fn bearing(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lat1, lat2) = (a[1].to_radians(), b[1].to_radians());
    let dlon = (b[0] - a[0]).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Smallest absolute difference between two bearings, in [0, 180].
pub fn bearing_delta(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// Linear interpolation between two points.
pub fn interpolate(a: [f64; 2], b: [f64; 2], t: f64) -> [f64; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

/// Project `p` onto segment `a`-`b` in a local equirectangular frame.
///
/// Returns the clamped fraction along the segment and the projected point.
pub fn project_on_segment(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> (f64, [f64; 2]) {
    let k = p[1].to_radians().cos();
    let (ax, ay) = (a[0] * k, a[1]);
    let (bx, by) = (b[0] * k, b[1]);
    let (px, py) = (p[0] * k, p[1]);
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (0.0, a);
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
    (t, interpolate(a, b, t))
}

/// Point at `distance` metres from `origin` along `bearing_deg`.
pub fn destination(origin: [f64; 2], bearing_deg: f64, distance: f64) -> [f64; 2] {
    let r = 6_371_008.8;
    let delta = distance / r;
    let theta = bearing_deg.to_radians();
    let lat1 = origin[1].to_radians();
    let lon1 = origin[0].to_radians();
    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());
    [lon2.to_degrees(), lat2.to_degrees()]
}

/// Polygon from a `[lon, lat]` ring (closed or not).
pub fn polygon_from_ring(ring: &[[f64; 2]]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|c| Coord { x: c[0], y: c[1] }).collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Geodesic area of a polygon in square metres.
pub fn polygon_area_m2(polygon: &Polygon<f64>) -> f64 {
    polygon.chamberlain_duquette_unsigned_area()
}

/// Planar area in square degrees, used for cheap bbox limits.
pub fn planar_area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Largest haversine distance between two bbox corners of a polygon, metres.
pub fn polygon_extent_m(polygon: &Polygon<f64>) -> f64 {
    use geo::BoundingRect;
    match polygon.bounding_rect() {
        Some(r) => haversine_distance([r.min().x, r.min().y], [r.max().x, r.max().y]),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance([8.0, 49.0], [8.0, 50.0]);
        assert!((d - 111_195.0).abs() < 100.0, "got {d}");
    }

    #[test]
    fn test_bearing_cardinal() {
        assert!(bearing([0.0, 0.0], [0.0, 1.0]).abs() < 1e-6);
        assert!((bearing([0.0, 0.0], [1.0, 0.0]) - 90.0).abs() < 1e-6);
        assert!((bearing([0.0, 0.0], [0.0, -1.0]) - 180.0).abs() < 1e-6);
        assert!((bearing([0.0, 0.0], [-1.0, 0.0]) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_bearing_delta_wraps() {
        assert_eq!(bearing_delta(350.0, 10.0), 20.0);
        assert_eq!(bearing_delta(10.0, 350.0), 20.0);
        assert_eq!(bearing_delta(0.0, 180.0), 180.0);
    }

    #[test]
    fn test_project_clamps_to_segment() {
        let (t, p) = project_on_segment([8.005, 49.001], [8.0, 49.0], [8.01, 49.0]);
        assert!((t - 0.5).abs() < 1e-9);
        assert!((p[0] - 8.005).abs() < 1e-9);
        assert_eq!(p[1], 49.0);

        let (t, _) = project_on_segment([7.9, 49.0], [8.0, 49.0], [8.01, 49.0]);
        assert_eq!(t, 0.0);
    }

    #[test]
    fn test_destination_round_trip() {
        let origin = [8.68, 49.41];
        let p = destination(origin, 45.0, 1000.0);
        assert!((haversine_distance(origin, p) - 1000.0).abs() < 1.0);
        assert!((bearing(origin, p) - 45.0).abs() < 0.1);
    }

    #[test]
    fn test_polygon_area_square_km() {
        let a = [8.0, 49.0];
        let b = destination(a, 90.0, 1000.0);
        let c = destination(b, 0.0, 1000.0);
        let d = destination(a, 0.0, 1000.0);
        let poly = polygon_from_ring(&[a, b, c, d, a]);
        let area = polygon_area_m2(&poly);
        assert!((area - 1_000_000.0).abs() < 20_000.0, "got {area}");
    }
}
