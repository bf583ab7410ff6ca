//! HTTP helpers for Lambda functions.

use lambda_http::http::response::Builder;
use lambda_http::{Body, Request, RequestExt, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::Error;

const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Origin, X-Requested-With, Content-Type, Accept, Authorization";

/// Standard API response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(rename = "missingFields", skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: Some(data),
            error: None,
            kind: None,
            missing_fields: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data: None,
            error: None,
            kind: None,
            missing_fields: None,
        }
    }

    pub fn from_error(err: &Error) -> Self {
        let (message, detail, missing_fields) = match err {
            Error::MissingFields(fields) => (err.public_message(), None, Some(fields.clone())),
            Error::Upstream(_) | Error::UpstreamAuth(_) | Error::Timeout(_) | Error::Upload(_) => {
                (headline(err).to_string(), Some(err.to_string()), None)
            }
            _ => (err.public_message(), None, None),
        };

        Self {
            status: "error",
            message,
            data: None,
            error: detail,
            kind: Some(err.kind()),
            missing_fields,
        }
    }
}

fn headline(err: &Error) -> &'static str {
    match err {
        Error::UpstreamAuth(_) => "Calendar authorization is no longer valid; re-authorization required",
        Error::Timeout(_) => "Upstream request timed out",
        Error::Upload(_) => "Failed to upload image",
        _ => "Upstream service error",
    }
}

fn with_cors(builder: Builder) -> Builder {
    builder
        .header("access-control-allow-origin", "*")
        .header("access-control-allow-methods", ALLOW_METHODS)
        .header("access-control-allow-headers", ALLOW_HEADERS)
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    let response = with_cors(Response::builder())
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))
        .map_err(Box::new)?;

    Ok(response)
}

/// Wrap `data` in a success envelope.
pub fn success_response<T: Serialize>(
    status: u16,
    message: impl Into<String>,
    data: T,
) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, &ApiResponse::success(message, data))
}

/// Render a domain error as an error envelope, logging it on the way out.
pub fn error_response(err: &Error) -> Result<Response<Body>, lambda_http::Error> {
    let status = err.status_code();
    if status >= 500 {
        error!(kind = err.kind(), "Request failed: {}", err);
    } else {
        warn!(kind = err.kind(), "Request rejected: {}", err);
    }
    json_response(status, &ApiResponse::from_error(err))
}

/// Render a workflow result: `data` in a success envelope, or the error.
pub fn reply<T: Serialize>(
    status: u16,
    message: &str,
    result: crate::Result<T>,
) -> Result<Response<Body>, lambda_http::Error> {
    match result {
        Ok(data) => success_response(status, message, data),
        Err(err) => error_response(&err),
    }
}

/// Empty 204 response for CORS preflight requests.
pub fn preflight_response() -> Result<Response<Body>, lambda_http::Error> {
    let response = with_cors(Response::builder())
        .status(204)
        .body(Body::Empty)
        .map_err(Box::new)?;

    Ok(response)
}

/// HTML response (used by the OAuth callback page).
pub fn html_response(status: u16, html: &str) -> Result<Response<Body>, lambda_http::Error> {
    let response = with_cors(Response::builder())
        .status(status)
        .header("content-type", "text/html; charset=utf-8")
        .body(Body::from(html.to_string()))
        .map_err(Box::new)?;

    Ok(response)
}

/// Request path with the API Gateway `/api` stage prefix removed.
pub fn route_path(event: &Request) -> String {
    let raw_path = event.uri().path();
    let path = raw_path.strip_prefix("/api").unwrap_or(raw_path);
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// First value of a query string parameter, ignoring empty values.
pub fn query_param(event: &Request, name: &str) -> Option<String> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Query string parameter that must be present.
pub fn require_query_param(event: &Request, name: &str) -> crate::Result<String> {
    query_param(event, name).ok_or_else(|| Error::Validation(format!("{} is required", name)))
}

/// Parse request body as JSON.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> crate::Result<T> {
    serde_json::from_slice(body.as_ref())
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))
}
