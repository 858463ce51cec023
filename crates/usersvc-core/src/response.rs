//! JSON response encoding.
//!
//! Every response produced by usersvc goes through this module, so every
//! response carries `Content-Type: application/json; charset=utf-8`.
//! Functions return a complete [`HttpResponse`] value and never write to a
//! transport themselves.
//!
//! # Example
//!
//! ```
//! use http::StatusCode;
//! use usersvc_core::{respond, respond_internal_error, User, CONTENT_TYPE_JSON};
//!
//! let ok = respond(&vec![User::new("1", "Ada", "ada@example.com")], StatusCode::OK);
//! assert_eq!(ok.status(), StatusCode::OK);
//! assert_eq!(ok.headers()["content-type"], CONTENT_TYPE_JSON);
//!
//! let failed = respond_internal_error();
//! assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
//! ```

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::error::{ApiError, ErrorBody};

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Content type of every response.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// Serializes `payload` as JSON with the given status.
///
/// If serialization fails the status is kept, the body is left empty and
/// the failure is reported as an error event.
pub fn respond<T: Serialize + ?Sized>(payload: &T, status: StatusCode) -> HttpResponse {
    let body = match serde_json::to_vec(payload) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            tracing::error!(
                error = %e,
                status = status.as_u16(),
                "Failed to encode response body"
            );
            Bytes::new()
        }
    };
    json_response(status, body)
}

/// Renders `error` with its own status and body shape.
///
/// Internal causes are logged here and never reach the client.
pub fn respond_error(error: &ApiError) -> HttpResponse {
    if let ApiError::Internal {
        source: Some(source),
    } = error
    {
        tracing::error!(error = ?source, "Internal error while handling request");
    }
    respond(&error.body(), error.status_code())
}

/// Shorthand for a bare 500 response.
pub fn respond_internal_error() -> HttpResponse {
    respond_error(&ApiError::internal())
}

/// Renders `{"status": .., "message": ..}` for conditions raised outside a
/// handler, such as a request timeout.
pub fn respond_message(status: StatusCode, message: &str) -> HttpResponse {
    respond(
        &ErrorBody::Message {
            status: status.as_u16(),
            message,
        },
        status,
    )
}

/// 204 with an empty body.
pub fn respond_no_content() -> HttpResponse {
    json_response(StatusCode::NO_CONTENT, Bytes::new())
}

fn json_response(status: StatusCode, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    response
}
