//! `/v2` API tests over the synthetic town graph.

mod common;

use axum::http::StatusCode;
use common::{app, app_with, get, post, post_raw};
use ors_route::config::AppConfig;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{json, Value};

const WEST: [f64; 2] = [8.000, 49.000];
const MIDDLE: [f64; 2] = [8.010, 49.000];
const EAST: [f64; 2] = [8.020, 49.000];
const ISLAND: [f64; 2] = [9.0005, 50.000];

// ============ Directions ============

#[tokio::test]
async fn two_coordinates_give_one_route_with_one_segment() {
    let r = post(app(), "/v2/directions/driving-car", json!({"coordinates": [WEST, EAST]})).await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    let v = r.json();
    let routes = v["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0]["segments"].as_array().unwrap().len(), 1);
    assert!(routes[0]["geometry"].is_string());
    let distance = routes[0]["summary"]["distance"].as_f64().unwrap();
    assert!((distance - 1459.0).abs() < 10.0, "{distance}");
    assert_eq!(v["metadata"]["query"]["profile"], "driving-car");
    assert_eq!(v["metadata"]["service"], "routing");
    assert_eq!(v["bbox"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn segments_follow_waypoints() {
    let r = post(
        app(),
        "/v2/directions/driving-car/geojson",
        json!({"coordinates": [WEST, MIDDLE, EAST]}),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    assert!(r.content_type.starts_with("application/geo+json"));
    let v = r.json();
    let feature = &v["features"][0];
    assert_eq!(feature["properties"]["segments"].as_array().unwrap().len(), 2);
    assert_eq!(feature["properties"]["way_points"].as_array().unwrap().len(), 3);
    assert_eq!(feature["geometry"]["type"], "LineString");
}

#[tokio::test]
async fn extras_cover_the_route() {
    let r = post(
        app(),
        "/v2/directions/driving-car/geojson",
        json!({
            "coordinates": [WEST, [8.015, 49.0049]],
            "extra_info": ["waytype", "surface", "waycategory", "steepness"]
        }),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    let v = r.json();
    let feature = &v["features"][0];
    let last_vertex = feature["geometry"]["coordinates"].as_array().unwrap().len() as u64 - 1;
    let route_distance = feature["properties"]["summary"]["distance"].as_f64().unwrap();
    let extras = feature["properties"]["extras"].as_object().unwrap();
    assert_eq!(extras.len(), 4);

    for (name, extra) in extras {
        let values = extra["values"].as_array().unwrap();
        assert_eq!(values[0][0], 0, "{name}");
        for pair in values.windows(2) {
            assert_eq!(pair[0][1], pair[1][0], "{name} intervals must touch");
            assert!(pair[0][0].as_u64() < pair[0][1].as_u64());
        }
        assert_eq!(values.last().unwrap()[1], last_vertex, "{name}");

        let summary = extra["summary"].as_array().unwrap();
        let distance: f64 = summary.iter().map(|s| s["distance"].as_f64().unwrap()).sum();
        let amount: f64 = summary.iter().map(|s| s["amount"].as_f64().unwrap()).sum();
        assert!((distance - route_distance).abs() <= 0.5, "{name}: {distance} vs {route_distance}");
        assert!((amount - 100.0).abs() <= 0.1, "{name}: {amount}");
    }
}

#[tokio::test]
async fn gpx_keeps_the_schema_layout_with_and_without_instructions() {
    for instructions in [true, false] {
        let r = post(
            app(),
            "/v2/directions/driving-car/gpx",
            json!({"coordinates": [WEST, EAST], "instructions": instructions}),
        )
        .await;
        assert_eq!(r.status, StatusCode::OK, "{}", r.body);
        assert!(r.content_type.starts_with("application/gpx+xml"));

        // (depth, name) of every element in document order
        let mut reader = Reader::from_str(&r.body);
        let mut buf = Vec::new();
        let mut elements: Vec<(usize, String)> = Vec::new();
        let mut namespace = None;
        let mut depth = 0usize;
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) => {
                    if depth == 0 {
                        namespace = e
                            .try_get_attribute("xmlns")
                            .unwrap()
                            .map(|a| String::from_utf8_lossy(&a.value).into_owned());
                    }
                    elements.push((depth, String::from_utf8_lossy(e.name().as_ref()).into_owned()));
                    depth += 1;
                }
                Event::Empty(e) => elements.push((depth, String::from_utf8_lossy(e.name().as_ref()).into_owned())),
                Event::End(_) => depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        assert_eq!(depth, 0);
        assert_eq!(namespace.as_deref(), Some(ors_route::formats::gpx::NAMESPACE));

        let at = |level: usize| -> Vec<&str> {
            elements.iter().filter(|(d, _)| *d == level).map(|(_, n)| n.as_str()).collect()
        };
        assert_eq!(at(1), ["metadata", "rte", "extensions"]);
        let metadata_children: Vec<&str> = elements
            .iter()
            .skip(2)
            .take_while(|(d, n)| !(*d == 1 && n == "rte"))
            .filter(|(d, _)| *d == 2)
            .map(|(_, n)| n.as_str())
            .collect();
        assert_eq!(
            metadata_children,
            ["name", "desc", "author", "copyright", "time", "bounds", "extensions"]
        );
        let rte = elements.iter().position(|(d, n)| *d == 1 && n == "rte").unwrap();
        assert_eq!(elements[rte + 1].1, "rtept", "rte must start with its points");
        assert!(elements.iter().all(|(_, n)| n != "graph_date"));
        assert!(elements.iter().any(|(d, n)| *d == 3 && n == "system-message"));
    }
}

#[tokio::test]
async fn tighter_hgv_restrictions_never_shorten_the_route() {
    let route = |restrictions: Value| {
        post(
            app(),
            "/v2/directions/driving-hgv",
            json!({
                "coordinates": [WEST, EAST],
                "options": {"profile_params": {"restrictions": restrictions}}
            }),
        )
    };
    let loose = route(json!({"height": 2.5})).await;
    let tight = route(json!({"height": 4.0})).await;
    assert_eq!(loose.status, StatusCode::OK, "{}", loose.body);
    assert_eq!(tight.status, StatusCode::OK, "{}", tight.body);
    let d = |v: Value| v["routes"][0]["summary"]["distance"].as_f64().unwrap();
    let (loose, tight) = (d(loose.json()), d(tight.json()));
    assert!(tight >= loose, "{tight} < {loose}");
    assert!(tight > loose + 500.0);

    let infeasible = route(json!({"height": 4.0, "weight": 10.0})).await;
    assert_eq!(infeasible.status, StatusCode::NOT_FOUND);
    assert_eq!(infeasible.code(), 2009);
}

#[tokio::test]
async fn incompatible_parameters() {
    let r = post(
        app(),
        "/v2/directions/driving-car",
        json!({"coordinates": [WEST, EAST], "departure": "2024-05-01T08:00", "arrival": "2024-05-01T09:00"}),
    )
    .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.code(), 2011);

    let r = post(
        app(),
        "/v2/directions/driving-car",
        json!({"coordinates": [WEST, EAST], "options": {"round_trip": {"length": 1000}}}),
    )
    .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.code(), 2011);
}

#[tokio::test]
async fn body_profile_is_checked_against_the_path() {
    let body = |profile: &str| json!({"coordinates": [WEST, EAST], "profile": profile});
    let same = post(app(), "/v2/directions/driving-car", body("driving-car")).await;
    assert_eq!(same.status, StatusCode::OK, "{}", same.body);
    let other = post(app(), "/v2/directions/driving-car", body("foot-walking")).await;
    assert_eq!(other.status, StatusCode::BAD_REQUEST);
    assert_eq!(other.code(), 2003);
}

#[tokio::test]
async fn alternatives_cannot_skip_segments() {
    let r = post(
        app(),
        "/v2/directions/driving-car",
        json!({
            "coordinates": [WEST, EAST],
            "skip_segments": [1],
            "alternative_routes": {"target_count": 2}
        }),
    )
    .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.code(), 2011);
}

#[tokio::test]
async fn profile_params_without_graph_support_are_unknown() {
    let r = post(
        app(),
        "/v2/directions/foot-walking",
        json!({
            "coordinates": [WEST, EAST],
            "options": {"profile_params": {"weightings": {"green": 0.5}}}
        }),
    )
    .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.code(), 2012);
}

#[tokio::test]
async fn request_errors_use_routing_codes() {
    let r = post_raw(app(), "/v2/directions/driving-car", "{\"coordinates\": [").await;
    assert_eq!(r.code(), 2000);

    let r = post(app(), "/v2/directions/driving-car", json!({"instructions": true})).await;
    assert_eq!(r.code(), 2001);

    let r = post(app(), "/v2/directions/driving-car", json!({"coordinates": [WEST, EAST], "foo": 1})).await;
    assert_eq!(r.code(), 2012);

    let r = post(app(), "/v2/directions/cycling-road", json!({"coordinates": [WEST, EAST]})).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.code(), 2003);

    let r = post(app(), "/v2/directions/driving-car/kml", json!({"coordinates": [WEST, EAST]})).await;
    assert_eq!(r.status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(r.code(), 2007);

    let r = post(app(), "/v2/directions", json!({"coordinates": [WEST, EAST]})).await;
    assert_eq!(r.code(), 2001);
}

#[tokio::test]
async fn unreachable_points_are_not_found() {
    let r = post(app(), "/v2/directions/driving-car", json!({"coordinates": [WEST, [8.5, 49.5]]})).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
    assert_eq!(r.code(), 2010);

    let r = post(app(), "/v2/directions/driving-car", json!({"coordinates": [WEST, ISLAND]})).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);
    assert_eq!(r.code(), 2009);
}

#[tokio::test]
async fn get_directions_returns_geojson() {
    let r = get(app(), "/v2/directions/driving-car?start=8.0,49.0&end=8.02,49.0").await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    assert_eq!(r.json()["type"], "FeatureCollection");

    let r = get(app(), "/v2/directions/driving-car?start=8.0,49.0").await;
    assert_eq!(r.code(), 2001);
}

// ============ Other services ============

#[tokio::test]
async fn matrix_with_metadata() {
    let r = post(
        app(),
        "/v2/matrix/driving-car",
        json!({"locations": [WEST, EAST, ISLAND], "metrics": ["distance", "duration"]}),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    let v = r.json();
    assert_eq!(v["distances"][0][0], 0.0);
    assert!(v["distances"][0][1].as_f64().unwrap() > 1400.0);
    assert!(v["durations"][0][2].is_null());
    assert_eq!(v["metadata"]["service"], "matrix");

    let r = post(app(), "/v2/matrix/driving-car/csv", json!({"locations": [WEST, EAST]})).await;
    assert_eq!(r.code(), 6007);
}

#[tokio::test]
async fn matrix_location_off_the_network_is_not_found() {
    let r = post(app(), "/v2/matrix/driving-car", json!({"locations": [[8, 49], [40, 10]]})).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND, "{}", r.body);
    assert_eq!(r.code(), 6010);
}

#[tokio::test]
async fn isochrones_are_polygons() {
    let r = post(
        app(),
        "/v2/isochrones/foot-walking",
        json!({"locations": [MIDDLE], "range": [300, 600], "attributes": ["area"]}),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    let v = r.json();
    let features = v["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["geometry"]["type"], "Polygon");
    assert_eq!(features[1]["properties"]["value"], 600.0);
    assert_eq!(features[0]["properties"]["group_index"], 0);

    let r = post(app(), "/v2/isochrones/foot-walking", json!({"locations": [MIDDLE], "range": [9000]})).await;
    assert_eq!(r.code(), 3004);
}

#[tokio::test]
async fn snap_json_and_geojson() {
    let body = json!({"locations": [[8.005, 49.0003], [8.5, 49.5]], "radius": 100});
    let r = post(app(), "/v2/snap/driving-car", body.clone()).await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    let v = r.json();
    assert_eq!(v["locations"][0]["name"], "Low Bridge Road");
    assert!(v["locations"][1].is_null());

    let r = post(app(), "/v2/snap/driving-car/geojson", body).await;
    let v = r.json();
    assert_eq!(v["features"].as_array().unwrap().len(), 1);
    assert_eq!(v["features"][0]["properties"]["source_id"], 0);
}

#[tokio::test]
async fn match_reports_graph_timestamp_and_edges() {
    let r = get(app(), "/v2/match/driving-car").await;
    assert_eq!(r.status, StatusCode::OK);
    let timestamp = r.json()["graph_timestamp"].as_str().unwrap().to_string();

    let r = post(
        app(),
        "/v2/match/driving-car",
        json!({"features": {"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [8.005, 49.0]}}
        ]}}),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    let v = r.json();
    assert_eq!(v["graph_timestamp"], timestamp.as_str());
    assert_eq!(v["edge_ids"][0].as_array().unwrap().len(), 1);

    let r = post(app(), "/v2/match/driving-car", json!({"features": [], "key": "logie_borders"})).await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
    assert_eq!(r.code(), 9012);
}

#[tokio::test]
async fn export_only_speaks_json() {
    let body = json!({"bbox": [[7.999, 48.999], [8.021, 49.001]]});
    let r = post(app(), "/v2/export/driving-car", body.clone()).await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.body);
    let v = r.json();
    assert_eq!(v["nodes_count"], 3);
    assert_eq!(v["edges_count"], 4);

    let r = post(app(), "/v2/export/driving-car/topojson", body).await;
    assert_eq!(r.status, StatusCode::NOT_ACCEPTABLE);
    assert_eq!(r.code(), 7007);
}

#[tokio::test]
async fn status_lists_services_and_profiles() {
    let r = get(app(), "/v2/status").await;
    assert_eq!(r.status, StatusCode::OK);
    let v = r.json();
    assert!(v["services"].as_array().unwrap().iter().any(|s| s == "routing"));
    assert_eq!(v["profiles"]["driving-hgv"]["encoder_name"], "heavyvehicle");
    assert!(v["profiles"].get("cycling-road").is_none());

    let r = get(app(), "/v2/health").await;
    assert_eq!(r.json()["status"], "ready");
}

#[tokio::test]
async fn disabled_service_is_not_mounted() {
    let mut config = AppConfig::default();
    config.endpoints.export.enabled = false;
    let r = post(app_with(config), "/v2/export/driving-car", json!({"bbox": [WEST, EAST]})).await;
    assert_eq!(r.status, StatusCode::NOT_FOUND);

    let r = get(app(), "/v2/api-docs").await;
    assert_eq!(r.status, StatusCode::OK);
    assert!(r.json()["paths"].get("/v2/directions/{profile}").is_some());
}
