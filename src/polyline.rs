//! Encoded polyline geometry (Google algorithm, 1e5 precision).
//!
//! Points are written latitude first. With elevation a third value per point
//! is encoded with a factor of 100.

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

/// Encode `[lon, lat]` or `[lon, lat, ele]` points.
pub fn encode(points: &[Vec<f64>], with_elevation: bool) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let (mut prev_lat, mut prev_lon, mut prev_ele) = (0i64, 0i64, 0i64);
    for p in points {
        let lat = (p[1] * 1e5).round() as i64;
        let lon = (p[0] * 1e5).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
        if with_elevation {
            let ele = (p.get(2).copied().unwrap_or(0.0) * 100.0).round() as i64;
            encode_value(ele - prev_ele, &mut out);
            prev_ele = ele;
        }
    }
    out
}

fn decode_value(bytes: &[u8], idx: &mut usize) -> Option<i64> {
    let mut result = 0i64;
    let mut shift = 0;
    loop {
        let b = i64::from(*bytes.get(*idx)?) - 63;
        *idx += 1;
        result |= (b & 0x1f) << shift;
        shift += 5;
        if b < 0x20 {
            break;
        }
    }
    Some(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

/// Decode into `[lon, lat]` or `[lon, lat, ele]` points.
pub fn decode(encoded: &str, with_elevation: bool) -> Option<Vec<Vec<f64>>> {
    let bytes = encoded.as_bytes();
    let mut idx = 0;
    let mut points = Vec::new();
    let (mut lat, mut lon, mut ele) = (0i64, 0i64, 0i64);
    while idx < bytes.len() {
        lat += decode_value(bytes, &mut idx)?;
        lon += decode_value(bytes, &mut idx)?;
        if with_elevation {
            ele += decode_value(bytes, &mut idx)?;
            points.push(vec![lon as f64 / 1e5, lat as f64 / 1e5, ele as f64 / 100.0]);
        } else {
            points.push(vec![lon as f64 / 1e5, lat as f64 / 1e5]);
        }
    }
    Some(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_example() {
        // Example from the Google polyline documentation
        let points = vec![
            vec![-120.2, 38.5],
            vec![-120.95, 40.7],
            vec![-126.453, 43.252],
        ];
        assert_eq!(encode(&points, false), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
    }

    #[test]
    fn test_elevation_dimension() {
        let points = vec![vec![8.68, 49.41, 110.5], vec![8.69, 49.42, 112.25]];
        let encoded = encode(&points, true);
        let decoded = decode(&encoded, true).unwrap();
        assert_eq!(decoded.len(), 2);
        assert!((decoded[1][2] - 112.25).abs() < 1e-9);
        assert!((decoded[1][0] - 8.69).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_input() {
        assert!(decode("_p~iF~ps|U_", false).is_none());
    }
}
