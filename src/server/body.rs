//! Request body decoding with service-specific error codes.

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, ErrorKind, Service};

/// Name between the first pair of backticks in a serde message
fn quoted(message: &str) -> Option<&str> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(&message[start..start + len])
}

fn classify(service: Service, err: &serde_json::Error) -> ApiError {
    use serde_json::error::Category;

    let message = err.to_string();
    match err.classify() {
        Category::Syntax | Category::Eof | Category::Io => ApiError::new(
            service,
            ErrorKind::InvalidJsonFormat,
            "Unable to parse JSON request.",
        ),
        Category::Data => {
            let name = quoted(&message).unwrap_or("unknown");
            if message.starts_with("unknown field") {
                ApiError::new(
                    service,
                    ErrorKind::UnknownParameter,
                    format!("Unknown parameter '{name}'."),
                )
            } else if message.starts_with("missing field") {
                ApiError::missing(service, name)
            } else if message.starts_with("unknown variant") {
                ApiError::invalid_value(service, "value", name)
            } else {
                ApiError::new(service, ErrorKind::InvalidParameterFormat, message)
            }
        }
    }
}

/// Decode `bytes` into `T`, also returning the raw JSON for the response metadata.
pub fn parse<T: DeserializeOwned>(service: Service, bytes: &Bytes) -> Result<(T, Value), ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::new(
            service,
            ErrorKind::MissingParameter,
            "Request body could not be read.",
        ));
    }
    let raw: Value = serde_json::from_slice(bytes).map_err(|e| classify(service, &e))?;
    let parsed = serde_json::from_value(raw.clone()).map_err(|e| classify(service, &e))?;
    Ok((parsed, raw))
}
