//! `/v2` HTTP API handlers with Axum and Utoipa

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::body;
use super::state::ServiceState;
use crate::directions::{self, DirectionsRequest, RouteQuery, RouteResult};
use crate::error::{ApiError, ErrorKind, Service};
use crate::export::{self, ExportRequest, ExportResult};
use crate::formats::{self, gpx::GpxInfo, json::WithMetadata, Metadata, ResponseFormat};
use crate::isochrone::{self, IsochronesRequest};
use crate::matching::{self, MatchResult, MatchingRequest};
use crate::matrix::{self, MatrixRequest, MatrixResult};
use crate::profiles::Profile;
use crate::snapping::{self, SnapRequest, SnapResult};

type Shared = Arc<ServiceState>;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        directions_json,
        directions_format,
        directions_get,
        matrix_json,
        isochrones_geojson,
        snap_json,
        snap_format,
        match_get,
        match_post,
        export_json,
        status,
        health
    ),
    components(schemas(
        DirectionsRequest,
        RouteResult,
        MatrixRequest,
        MatrixResult,
        IsochronesRequest,
        SnapRequest,
        SnapResult,
        MatchingRequest,
        MatchResult,
        ExportRequest,
        ExportResult,
        Metadata
    )),
    info(
        title = "ors-route API",
        description = "Directions, matrix, isochrones, snapping, matching and export over OpenStreetMap data"
    )
)]
pub struct ApiDoc;

/// Build the Axum router
pub fn build_router(state: Shared) -> Router {
    let cfg = &state.config;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut v2 = Router::new()
        .route("/v2/status", get(status))
        .route("/v2/health", get(health));

    let endpoints = &cfg.endpoints;
    if endpoints.routing.enabled {
        v2 = v2.merge(service_routes(
            Service::Routing,
            Router::new()
                .route("/v2/directions", get(missing_profile_routing).post(missing_profile_routing))
                .route("/v2/directions/{profile}", get(directions_get).post(directions_json))
                .route("/v2/directions/{profile}/{format}", post(directions_format)),
        ));
    }
    if endpoints.matrix.enabled {
        v2 = v2.merge(service_routes(
            Service::Matrix,
            Router::new()
                .route("/v2/matrix", post(missing_profile_matrix))
                .route("/v2/matrix/{profile}", post(matrix_json))
                .route("/v2/matrix/{profile}/{format}", post(matrix_format)),
        ));
    }
    if endpoints.isochrones.enabled {
        v2 = v2.merge(service_routes(
            Service::Isochrones,
            Router::new()
                .route("/v2/isochrones", post(missing_profile_isochrones))
                .route("/v2/isochrones/{profile}", post(isochrones_geojson))
                .route("/v2/isochrones/{profile}/{format}", post(isochrones_format)),
        ));
    }
    if endpoints.snap.enabled {
        v2 = v2.merge(service_routes(
            Service::Snapping,
            Router::new()
                .route("/v2/snap", post(missing_profile_snap))
                .route("/v2/snap/{profile}", post(snap_json))
                .route("/v2/snap/{profile}/{format}", post(snap_format)),
        ));
    }
    if endpoints.matching.enabled {
        v2 = v2.merge(service_routes(
            Service::Matching,
            Router::new()
                .route("/v2/match", get(missing_profile_match).post(missing_profile_match))
                .route("/v2/match/{profile}", get(match_get).post(match_post))
                .route("/v2/match/{profile}/{format}", post(match_format)),
        ));
    }
    if endpoints.export.enabled {
        v2 = v2.merge(service_routes(
            Service::Export,
            Router::new()
                .route("/v2/export", post(missing_profile_export))
                .route("/v2/export/{profile}", post(export_json))
                .route("/v2/export/{profile}/{format}", post(export_format)),
        ));
    }

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/v2/api-docs", ApiDoc::openapi()))
        .merge(v2)
        .layer(DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(cfg.server.request_timeout_secs)))
        .layer(CompressionLayer::new())
        .layer(ConcurrencyLimitLayer::new(cfg.server.concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Panics inside a service's handlers render as that service's UNKNOWN error.
fn service_routes(service: Service, router: Router<Shared>) -> Router<Shared> {
    router.layer(CatchPanicLayer::custom(move |err: Box<dyn std::any::Any + Send + 'static>| {
        let detail = err
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| err.downcast_ref::<&str>().copied())
            .unwrap_or("no detail");
        tracing::error!(service = service.name(), detail, "handler panicked");
        ApiError::unknown(service, "Unknown internal error.").into_response()
    }))
}

// ============ Shared helpers ============

/// Run engine work off the async runtime.
async fn blocking<T, F>(service: Service, f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::unknown(service, format!("Worker task failed: {e}")))?
}

fn respond<T: Serialize>(service: Service, format: ResponseFormat, body: &T) -> Result<Response, ApiError> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| ApiError::new(service, ErrorKind::ExportHandlerError, format!("Unable to write response: {e}")))?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], bytes).into_response())
}

/// Request echo for `metadata.query`
fn echo(mut raw: Value, profile: Profile, format: ResponseFormat) -> Value {
    if let Value::Object(map) = &mut raw {
        map.insert("profile".into(), json!(profile.name()));
        map.insert("format".into(), json!(format.name()));
    }
    raw
}

fn metadata(state: &ServiceState, service: Service, query: Value) -> Metadata {
    Metadata::new(&state.config.engine.attribution, service, query, &state.graph)
}

/// Only the listed formats are served; anything else is 406.
fn format_of(service: Service, name: &str, allowed: &[ResponseFormat]) -> Result<ResponseFormat, ApiError> {
    ResponseFormat::parse(name)
        .filter(|f| allowed.contains(f))
        .ok_or_else(|| ApiError::unsupported_format(service, name))
}

async fn missing_profile_routing() -> ApiError {
    ApiError::missing(Service::Routing, "profile")
}

async fn missing_profile_matrix() -> ApiError {
    ApiError::missing(Service::Matrix, "profile")
}

async fn missing_profile_isochrones() -> ApiError {
    ApiError::missing(Service::Isochrones, "profile")
}

async fn missing_profile_snap() -> ApiError {
    ApiError::missing(Service::Snapping, "profile")
}

async fn missing_profile_match() -> ApiError {
    ApiError::missing(Service::Matching, "profile")
}

async fn missing_profile_export() -> ApiError {
    ApiError::missing(Service::Export, "profile")
}

// ============ Directions ============

async fn run_directions(
    state: Shared,
    profile: Profile,
    format: ResponseFormat,
    req: DirectionsRequest,
    raw: Value,
) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Routing;
    let query = directions::request::validate(&req, profile, format, &state.config.endpoints.routing)?;
    let started = Instant::now();
    let worker = state.clone();
    let (routes, query) = blocking(SERVICE, move || {
        let routes = directions::compute(&worker.graph, &worker.index, &query)
            .map_err(|e| ApiError::from_engine(SERVICE, e))?;
        Ok((routes, query))
    })
    .await?;
    tracing::info!(
        profile = %profile,
        format = format.name(),
        routes = routes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "directions"
    );
    render_directions(&state, &routes, &query, format, raw)
}

fn render_directions(
    state: &ServiceState,
    routes: &[RouteResult],
    query: &RouteQuery,
    format: ResponseFormat,
    raw: Value,
) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Routing;
    let metadata = metadata(state, SERVICE, echo(raw, query.profile, format));
    match format {
        ResponseFormat::Json => respond(SERVICE, format, &formats::json::directions(routes, &metadata, query.geometry)),
        ResponseFormat::GeoJson => respond(SERVICE, format, &formats::geojson::directions(routes, &metadata)),
        ResponseFormat::Gpx => {
            let info = GpxInfo {
                attribution: &state.config.engine.attribution,
                info: &state.config.info,
            };
            let xml = formats::gpx::directions(routes, query, &info).map_err(|e| {
                ApiError::new(SERVICE, ErrorKind::ExportHandlerError, format!("Unable to write GPX: {e}"))
            })?;
            Ok(([(header::CONTENT_TYPE, format.content_type())], xml).into_response())
        }
    }
}

/// Directions between two or more coordinates, JSON response
#[utoipa::path(
    post,
    path = "/v2/directions/{profile}",
    params(("profile" = String, Path, description = "Routing profile", example = "driving-car")),
    request_body = DirectionsRequest,
    responses(
        (status = 200, description = "Routes with encoded polyline geometry"),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Point or route not found"),
    ),
    tag = "directions"
)]
async fn directions_json(
    State(state): State<Shared>,
    Path(profile): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    let profile = state.profile(Service::Routing, &profile)?;
    let (req, raw) = body::parse(Service::Routing, &bytes)?;
    run_directions(state, profile, ResponseFormat::Json, req, raw).await
}

/// Directions in a chosen format: `json`, `geojson` or `gpx`
#[utoipa::path(
    post,
    path = "/v2/directions/{profile}/{format}",
    params(
        ("profile" = String, Path, description = "Routing profile", example = "driving-car"),
        ("format" = String, Path, description = "json, geojson or gpx"),
    ),
    request_body = DirectionsRequest,
    responses(
        (status = 200, description = "Routes in the requested format"),
        (status = 406, description = "Unsupported format"),
    ),
    tag = "directions"
)]
async fn directions_format(
    State(state): State<Shared>,
    Path((profile, format)): Path<(String, String)>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    let format = format_of(
        Service::Routing,
        &format,
        &[ResponseFormat::Json, ResponseFormat::GeoJson, ResponseFormat::Gpx],
    )?;
    let profile = state.profile(Service::Routing, &profile)?;
    let (req, raw) = body::parse(Service::Routing, &bytes)?;
    run_directions(state, profile, format, req, raw).await
}

/// Route between `start` and `end` as GeoJSON
#[utoipa::path(
    get,
    path = "/v2/directions/{profile}",
    params(
        ("profile" = String, Path, description = "Routing profile", example = "driving-car"),
        ("start" = String, Query, description = "lon,lat", example = "8.681495,49.41461"),
        ("end" = String, Query, description = "lon,lat", example = "8.687872,49.420318"),
    ),
    responses((status = 200, description = "GeoJSON FeatureCollection with one route")),
    tag = "directions"
)]
async fn directions_get(
    State(state): State<Shared>,
    Path(profile): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Routing;
    let profile = state.profile(SERVICE, &profile)?;
    let point = |name: &str| -> Result<[f64; 2], ApiError> {
        let value = params.get(name).ok_or_else(|| ApiError::missing(SERVICE, name))?;
        directions::request::parse_lon_lat(value).ok_or_else(|| {
            ApiError::new(
                SERVICE,
                ErrorKind::InvalidParameterFormat,
                format!("Parameter '{name}' has incorrect format."),
            )
        })
    };
    let (start, end) = (point("start")?, point("end")?);
    let raw = json!({ "coordinates": [start, end] });
    run_directions(state, profile, ResponseFormat::GeoJson, DirectionsRequest::from_points(start, end), raw).await
}

// ============ Matrix ============

async fn run_matrix(state: Shared, profile: String, bytes: Bytes) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Matrix;
    let profile = state.profile(SERVICE, &profile)?;
    let (req, raw): (MatrixRequest, Value) = body::parse(SERVICE, &bytes)?;
    let query = matrix::validate(&req, profile, &state.config.endpoints.matrix)?;
    let worker = state.clone();
    let result = blocking(SERVICE, move || {
        matrix::compute(&worker.graph, &worker.index, &query).map_err(|e| ApiError::from_engine(SERVICE, e))
    })
    .await?;
    let metadata = metadata(&state, SERVICE, echo(raw, profile, ResponseFormat::Json));
    respond(
        SERVICE,
        ResponseFormat::Json,
        &WithMetadata {
            body: &result,
            metadata: &metadata,
        },
    )
}

/// Duration and distance tables between locations
#[utoipa::path(
    post,
    path = "/v2/matrix/{profile}",
    params(("profile" = String, Path, description = "Routing profile", example = "driving-car")),
    request_body = MatrixRequest,
    responses((status = 200, description = "Matrix", body = MatrixResult)),
    tag = "matrix"
)]
async fn matrix_json(
    State(state): State<Shared>,
    Path(profile): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    run_matrix(state, profile, bytes).await
}

async fn matrix_format(
    State(state): State<Shared>,
    Path((profile, format)): Path<(String, String)>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    format_of(Service::Matrix, &format, &[ResponseFormat::Json])?;
    run_matrix(state, profile, bytes).await
}

// ============ Isochrones ============

async fn run_isochrones(state: Shared, profile: String, bytes: Bytes) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Isochrones;
    let profile = state.profile(SERVICE, &profile)?;
    let (req, raw): (IsochronesRequest, Value) = body::parse(SERVICE, &bytes)?;
    let query = isochrone::validate(&req, profile, &state.config.endpoints.isochrones)?;
    let worker = state.clone();
    let isochrones = blocking(SERVICE, move || {
        isochrone::compute(&worker.graph, &worker.index, &query).map_err(|e| ApiError::from_engine(SERVICE, e))
    })
    .await?;
    let metadata = metadata(&state, SERVICE, echo(raw, profile, ResponseFormat::GeoJson));
    respond(
        SERVICE,
        ResponseFormat::GeoJson,
        &formats::geojson::isochrones(&isochrones, &metadata),
    )
}

/// Reachability polygons around locations
#[utoipa::path(
    post,
    path = "/v2/isochrones/{profile}",
    params(("profile" = String, Path, description = "Routing profile", example = "foot-walking")),
    request_body = IsochronesRequest,
    responses((status = 200, description = "GeoJSON FeatureCollection of polygons")),
    tag = "isochrones"
)]
async fn isochrones_geojson(
    State(state): State<Shared>,
    Path(profile): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    run_isochrones(state, profile, bytes).await
}

async fn isochrones_format(
    State(state): State<Shared>,
    Path((profile, format)): Path<(String, String)>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    format_of(Service::Isochrones, &format, &[ResponseFormat::GeoJson])?;
    run_isochrones(state, profile, bytes).await
}

// ============ Snap ============

async fn run_snap(state: Shared, profile: String, format: ResponseFormat, bytes: Bytes) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Snapping;
    let profile = state.profile(SERVICE, &profile)?;
    let (req, raw): (SnapRequest, Value) = body::parse(SERVICE, &bytes)?;
    let query = snapping::validate(&req, profile, &state.config.endpoints.snap)?;
    let worker = state.clone();
    let result = blocking(SERVICE, move || {
        snapping::compute(&worker.graph, &worker.index, &query).map_err(|e| ApiError::from_engine(SERVICE, e))
    })
    .await?;
    let metadata = metadata(&state, SERVICE, echo(raw, profile, format));
    match format {
        ResponseFormat::GeoJson => respond(SERVICE, format, &formats::geojson::snapping(&result, &metadata)),
        _ => respond(
            SERVICE,
            format,
            &WithMetadata {
                body: &result,
                metadata: &metadata,
            },
        ),
    }
}

/// Snap locations onto the nearest usable road
#[utoipa::path(
    post,
    path = "/v2/snap/{profile}",
    params(("profile" = String, Path, description = "Routing profile", example = "driving-car")),
    request_body = SnapRequest,
    responses((status = 200, description = "Snapped locations", body = SnapResult)),
    tag = "snap"
)]
async fn snap_json(
    State(state): State<Shared>,
    Path(profile): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    run_snap(state, profile, ResponseFormat::Json, bytes).await
}

/// Snapped locations as `json` or `geojson`
#[utoipa::path(
    post,
    path = "/v2/snap/{profile}/{format}",
    params(
        ("profile" = String, Path, description = "Routing profile", example = "driving-car"),
        ("format" = String, Path, description = "json or geojson"),
    ),
    request_body = SnapRequest,
    responses((status = 200, description = "Snapped locations")),
    tag = "snap"
)]
async fn snap_format(
    State(state): State<Shared>,
    Path((profile, format)): Path<(String, String)>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    let format = format_of(Service::Snapping, &format, &[ResponseFormat::Json, ResponseFormat::GeoJson])?;
    run_snap(state, profile, format, bytes).await
}

// ============ Match ============

/// Timestamp of the loaded graph
#[utoipa::path(
    get,
    path = "/v2/match/{profile}",
    params(("profile" = String, Path, description = "Routing profile", example = "driving-car")),
    responses((status = 200, description = "`{graph_timestamp}`")),
    tag = "match"
)]
async fn match_get(State(state): State<Shared>, Path(profile): Path<String>) -> Result<Response, ApiError> {
    state.profile(Service::Matching, &profile)?;
    Ok(Json(json!({ "graph_timestamp": state.graph.timestamp_rfc3339() })).into_response())
}

/// Match GeoJSON features to graph edge ids
#[utoipa::path(
    post,
    path = "/v2/match/{profile}",
    params(("profile" = String, Path, description = "Routing profile", example = "driving-car")),
    request_body = MatchingRequest,
    responses((status = 200, description = "Matched edge ids per feature", body = MatchResult)),
    tag = "match"
)]
async fn match_post(
    State(state): State<Shared>,
    Path(profile): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Matching;
    let profile = state.profile(SERVICE, &profile)?;
    let (req, _raw): (MatchingRequest, Value) = body::parse(SERVICE, &bytes)?;
    let query = matching::validate(&req, profile, &state.config.endpoints.matching)?;
    let worker = state.clone();
    let result = blocking(SERVICE, move || {
        matching::compute(&worker.graph, &worker.index, &query).map_err(|e| ApiError::from_engine(SERVICE, e))
    })
    .await?;
    respond(SERVICE, ResponseFormat::Json, &result)
}

async fn match_format(Path((_profile, format)): Path<(String, String)>) -> ApiError {
    ApiError::unsupported_format(Service::Matching, &format)
}

// ============ Export ============

async fn run_export(state: Shared, profile: String, bytes: Bytes) -> Result<Response, ApiError> {
    const SERVICE: Service = Service::Export;
    let profile = state.profile(SERVICE, &profile)?;
    let (req, _raw): (ExportRequest, Value) = body::parse(SERVICE, &bytes)?;
    let query = export::validate(&req, profile, &state.config.endpoints.export)?;
    let worker = state.clone();
    let result = blocking(SERVICE, move || {
        export::compute(&worker.graph, &worker.index, &query).map_err(|e| ApiError::from_engine(SERVICE, e))
    })
    .await?;
    respond(SERVICE, ResponseFormat::Json, &result)
}

/// Graph nodes and weighted edges inside a bounding box
#[utoipa::path(
    post,
    path = "/v2/export/{profile}",
    params(("profile" = String, Path, description = "Routing profile", example = "driving-car")),
    request_body = ExportRequest,
    responses((status = 200, description = "Nodes and edges", body = ExportResult)),
    tag = "export"
)]
async fn export_json(
    State(state): State<Shared>,
    Path(profile): Path<String>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    run_export(state, profile, bytes).await
}

async fn export_format(
    State(state): State<Shared>,
    Path((profile, format)): Path<(String, String)>,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    format_of(Service::Export, &format, &[ResponseFormat::Json])?;
    run_export(state, profile, bytes).await
}

// ============ Status & Health ============

/// Engine information, enabled services and per-profile limits
#[utoipa::path(
    get,
    path = "/v2/status",
    responses((status = 200, description = "Service status")),
    tag = "status"
)]
async fn status(State(state): State<Shared>) -> Json<Value> {
    let cfg = &state.config;
    let endpoints = &cfg.endpoints;
    let services: Vec<&str> = [
        (endpoints.routing.enabled, Service::Routing),
        (endpoints.isochrones.enabled, Service::Isochrones),
        (endpoints.matrix.enabled, Service::Matrix),
        (endpoints.snap.enabled, Service::Snapping),
        (endpoints.export.enabled, Service::Export),
        (endpoints.matching.enabled, Service::Matching),
    ]
    .into_iter()
    .filter(|(on, _)| *on)
    .map(|(_, s)| s.name())
    .collect();

    let storages: serde_json::Map<String, Value> = directions::ExtraInfo::ALL
        .iter()
        .map(|e| (e.name().to_string(), json!({})))
        .collect();
    let routing = &endpoints.routing;
    let profiles: serde_json::Map<String, Value> = state
        .profiles()
        .into_iter()
        .map(|p| {
            (
                p.name().to_string(),
                json!({
                    "encoder_name": p.encoder_name(),
                    "creation_date": state.graph.timestamp_rfc3339(),
                    "storages": storages,
                    "limits": {
                        "maximum_distance": routing.maximum_distance,
                        "maximum_waypoints": routing.maximum_waypoints,
                        "maximum_distance_alternative_routes": routing.maximum_distance_alternative_routes,
                        "maximum_distance_avoid_areas": routing.maximum_distance_avoid_areas,
                        "maximum_distance_round_trip_routes": routing.maximum_distance_round_trip_routes,
                    }
                }),
            )
        })
        .collect();

    Json(json!({
        "languages": directions::Language::ALL.iter().map(|l| l.code()).collect::<Vec<_>>(),
        "engine": {
            "version": crate::ENGINE_VERSION,
            "build_date": crate::build_date(),
            "graph_date": state.graph.timestamp_rfc3339(),
        },
        "services": services,
        "profiles": profiles,
    }))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/v2/health",
    responses((status = 200, description = "Service is ready")),
    tag = "status"
)]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
