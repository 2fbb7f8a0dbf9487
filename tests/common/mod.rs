//! Synthetic town graph and request helpers shared by the API tests.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use ors_route::config::AppConfig;
use ors_route::parse::OsmData;
use ors_route::server::{build_router, ServiceState};
use ors_route::{Profile, RouteGraph};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// West (8.000, 49.000) to east (8.020, 49.000) along a low bridge road,
/// or around it on a ring road through (8.000, 49.005) and (8.020, 49.005).
/// A separate island lies at (9.000, 50.000).
pub fn town() -> RouteGraph {
    let mut data = OsmData::default();
    data.add_node(1, 8.000, 49.000);
    data.add_node(2, 8.010, 49.000);
    data.add_node(3, 8.020, 49.000);
    data.add_node(4, 8.000, 49.005);
    data.add_node(5, 8.020, 49.005);
    data.add_node(6, 9.000, 50.000);
    data.add_node(7, 9.001, 50.000);

    data.add_way(
        10,
        &[1, 2, 3],
        &[("highway", "secondary"), ("name", "Low Bridge Road"), ("maxheight", "3.0"), ("surface", "asphalt")],
    );
    data.add_way(
        11,
        &[1, 4, 5, 3],
        &[("highway", "secondary"), ("name", "Ring Road"), ("maxweight", "7.5"), ("surface", "asphalt")],
    );
    data.add_way(12, &[6, 7], &[("highway", "residential"), ("name", "Island Lane")]);
    RouteGraph::from_osm(&data, &[Profile::DrivingCar, Profile::DrivingHgv, Profile::FootWalking]).unwrap()
}

pub fn app_with(config: AppConfig) -> Router {
    build_router(Arc::new(ServiceState::new(town(), config)))
}

pub fn app() -> Router {
    app_with(AppConfig::default())
}

pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// `error.code` of an error response
    pub fn code(&self) -> u64 {
        self.json()["error"]["code"].as_u64().unwrap()
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Reply {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        content_type,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn post_raw(app: Router, uri: &str, body: &str) -> Reply {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post(app: Router, uri: &str, body: Value) -> Reply {
    post_raw(app, uri, &body.to_string()).await
}

pub async fn get(app: Router, uri: &str) -> Reply {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}
