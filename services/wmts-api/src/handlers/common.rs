//! Shared helpers for WMTS handlers: exception reports and parameter errors.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use thiserror::Error;
use tracing::{error, warn};

use crate::resolver::ResolveError;

// ============================================================================
// Request Errors
// ============================================================================

/// A tile request that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WmtsRequestError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid parameter value for '{param}': '{value}' is not an integer")]
    InvalidParameter { param: &'static str, value: String },
}

impl WmtsRequestError {
    pub fn ows_exception_code(&self) -> &'static str {
        match self {
            WmtsRequestError::MissingParameter(_) => "MissingParameterValue",
            WmtsRequestError::InvalidParameter { .. } => "InvalidParameterValue",
        }
    }
}

impl IntoResponse for WmtsRequestError {
    fn into_response(self) -> Response {
        warn!(error = %self, "Rejected tile request");
        wmts_exception(
            self.ows_exception_code(),
            &self.to_string(),
            StatusCode::BAD_REQUEST,
        )
    }
}

impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Tile request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "Tile request rejected");
        }
        wmts_exception(self.ows_exception_code(), &self.to_string(), status)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// Generate a WMTS-formatted exception response
pub fn wmts_exception(code: &str, msg: &str, status: StatusCode) -> Response {
    let xml = format!(
        r#"<?xml version="1.0"?><ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0"><ows:Exception exceptionCode="{}"><ows:ExceptionText>{}</ows:ExceptionText></ows:Exception></ows:ExceptionReport>"#,
        code,
        escape_xml(msg)
    );
    (status, [(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

/// A JPEG tile response
pub fn jpeg_response(tile: Bytes) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "max-age=3600"),
        ],
        tile,
    )
        .into_response()
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
