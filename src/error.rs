//! Error types.
//!
//! `GraphError` covers graph building and persistence, `EngineError` covers
//! query failures inside the engine, and `ApiError` is what the HTTP layer
//! renders: a service-specific numeric code plus an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("graph serialization failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error("corrupt graph file: {0}")]
    Corrupt(String),

    #[error("failed to read PBF: {0}")]
    Pbf(#[from] osmpbf::Error),

    #[error("no routable ways in input")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Could not find routable point within a radius of {radius} meters of specified coordinate {index}: {lon:.7} {lat:.7}.")]
    PointNotFound {
        index: usize,
        lon: f64,
        lat: f64,
        radius: f64,
    },

    #[error("Route could not be found between locations {from} and {to}.")]
    RouteNotFound { from: usize, to: usize },

    #[error("{0}")]
    LimitExceeded(String),

    #[error("{0}")]
    InvalidValue(String),

    #[error("Profile '{0}' is not loaded.")]
    ProfileNotLoaded(String),
}

/// Service an error originates from. Each service owns a block of codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Routing,
    Isochrones,
    Matrix,
    Export,
    Snapping,
    Matching,
}

impl Service {
    pub fn base_code(self) -> u32 {
        match self {
            Service::Routing => 2000,
            Service::Isochrones => 3000,
            Service::Matrix => 6000,
            Service::Export => 7000,
            Service::Snapping => 8000,
            Service::Matching => 9000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Service::Routing => "routing",
            Service::Isochrones => "isochrones",
            Service::Matrix => "matrix",
            Service::Export => "export",
            Service::Snapping => "snap",
            Service::Matching => "match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidJsonFormat,
    MissingParameter,
    InvalidParameterFormat,
    InvalidParameterValue,
    RequestExceedsServerLimit,
    ExportHandlerError,
    UnsupportedExportFormat,
    EmptyElement,
    RouteNotFound,
    PointNotFound,
    IncompatibleParameters,
    UnknownParameter,
    Unknown,
}

impl ErrorKind {
    fn offset(self) -> u32 {
        match self {
            ErrorKind::InvalidJsonFormat => 0,
            ErrorKind::MissingParameter => 1,
            ErrorKind::InvalidParameterFormat => 2,
            ErrorKind::InvalidParameterValue => 3,
            ErrorKind::RequestExceedsServerLimit => 4,
            ErrorKind::ExportHandlerError => 6,
            ErrorKind::UnsupportedExportFormat => 7,
            ErrorKind::EmptyElement => 8,
            ErrorKind::RouteNotFound => 9,
            ErrorKind::PointNotFound => 10,
            ErrorKind::IncompatibleParameters => 11,
            ErrorKind::UnknownParameter => 12,
            ErrorKind::Unknown => 99,
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::RouteNotFound | ErrorKind::PointNotFound => StatusCode::NOT_FOUND,
            ErrorKind::UnsupportedExportFormat => StatusCode::NOT_ACCEPTABLE,
            ErrorKind::ExportHandlerError | ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ApiError {
    pub service: Service,
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(service: Service, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> u32 {
        self.service.base_code() + self.kind.offset()
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    pub fn missing(service: Service, param: &str) -> Self {
        Self::new(
            service,
            ErrorKind::MissingParameter,
            format!("Parameter '{param}' is missing."),
        )
    }

    pub fn invalid_value(service: Service, param: &str, value: impl std::fmt::Display) -> Self {
        Self::new(
            service,
            ErrorKind::InvalidParameterValue,
            format!("Parameter '{param}' has incorrect value of '{value}'."),
        )
    }

    pub fn incompatible(service: Service, a: &str, b: &str) -> Self {
        Self::new(
            service,
            ErrorKind::IncompatibleParameters,
            format!("Parameters '{a}' and '{b}' are incompatible with each other."),
        )
    }

    pub fn unsupported_format(service: Service, format: &str) -> Self {
        Self::new(
            service,
            ErrorKind::UnsupportedExportFormat,
            format!("The response format {format} is not supported"),
        )
    }

    pub fn from_engine(service: Service, err: EngineError) -> Self {
        let kind = match &err {
            EngineError::PointNotFound { .. } => ErrorKind::PointNotFound,
            EngineError::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            EngineError::LimitExceeded(_) => ErrorKind::RequestExceedsServerLimit,
            EngineError::InvalidValue(_) | EngineError::ProfileNotLoaded(_) => {
                ErrorKind::InvalidParameterValue
            }
        };
        Self::new(service, kind, err.to_string())
    }

    pub fn unknown(service: Service, message: impl Into<String>) -> Self {
        Self::new(service, ErrorKind::Unknown, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), service = self.service.name(), "{}", self.message);
        } else {
            tracing::debug!(code = self.code(), service = self.service.name(), "{}", self.message);
        }
        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.message,
            },
            "info": {
                "engine": {
                    "version": crate::ENGINE_VERSION,
                    "build_date": crate::build_date(),
                },
                "timestamp": chrono::Utc::now().timestamp_millis(),
            }
        });
        (status, Json(body)).into_response()
    }
}
