//! Error types for usersvc.
//!
//! This module provides [`ApiError`], the closed set of failures a request
//! handler can report to a client. Every variant knows its HTTP status code
//! and its JSON body shape:
//!
//! | Variant | Status | Body |
//! |---|---|---|
//! | `Validation` | 400 (or the declared status) | `{"status": 400, "errors": [..]}` |
//! | `NotFound` | 404 | `{"status": 404, "message": ".."}` |
//! | `Internal` | 500 | `{"status": 500, "message": "Internal server error"}` |
//!
//! Failures coming out of the repository are converted with
//! `ApiError::from(RepositoryError)`, which classifies them in a fixed order:
//! conflict, not-found, validation, then internal.
//!
//! # Example
//!
//! ```
//! use usersvc_core::{ApiError, ErrorList};
//!
//! let mut errors = ErrorList::new();
//! errors.push("name: invalid length");
//! errors.push("email: invalid format");
//!
//! let err = ApiError::validation(errors);
//! assert_eq!(err.status_code().as_u16(), 400);
//! assert_eq!(err.to_string(), "name: invalid length, email: invalid format");
//! ```

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::RepositoryError;

/// Result type alias using [`ApiError`].
pub type ApiResult<T> = Result<T, ApiError>;

/// Message sent to clients for every internal failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Ordered list of client-facing failure messages.
///
/// Serializes as a bare JSON array of strings and displays as the entries
/// joined with `", "`. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<String>);

impl ErrorList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends the rendered message of `error`.
    pub fn push(&mut self, error: impl fmt::Display) {
        self.0.push(error.to_string());
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Returns the entries as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(entry)?;
        }
        Ok(())
    }
}

impl<T: fmt::Display> FromIterator<T> for ErrorList {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(|e| e.to_string()).collect())
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A failure reported to an HTTP client.
///
/// The set of variants is closed: anything that is not a validation or
/// not-found condition is reported as [`ApiError::Internal`], whose cause is
/// kept for logs and never rendered to the client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request was rejected because of client-correctable problems.
    #[error("{errors}")]
    Validation {
        /// HTTP status, 400 unless declared otherwise.
        status: StatusCode,
        /// Every problem found, in the order it was detected.
        errors: ErrorList,
    },

    /// The addressed resource does not exist.
    #[error("{message}")]
    NotFound {
        /// Human-readable message.
        message: String,
    },

    /// Unexpected failure.
    #[error("Internal server error")]
    Internal {
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ApiError {
    /// Creates a 400 validation error from a list of problems.
    ///
    /// An empty list carries nothing a client could act on, so it becomes an
    /// [`ApiError::Internal`].
    #[must_use]
    pub fn validation(errors: ErrorList) -> Self {
        Self::validation_with_status(StatusCode::BAD_REQUEST, errors)
    }

    /// Creates a validation error with an explicit status code.
    #[must_use]
    pub fn validation_with_status(status: StatusCode, errors: ErrorList) -> Self {
        if errors.is_empty() {
            return Self::internal_with(anyhow::anyhow!("validation error without entries"));
        }
        Self::Validation { status, errors }
    }

    /// Creates a 400 validation error holding exactly one reason.
    #[must_use]
    pub fn simple(reason: impl fmt::Display) -> Self {
        let mut errors = ErrorList::new();
        errors.push(reason);
        Self::Validation {
            status: StatusCode::BAD_REQUEST,
            errors,
        }
    }

    /// Creates a 404 error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a 500 error without a recorded cause.
    #[must_use]
    pub fn internal() -> Self {
        Self::Internal { source: None }
    }

    /// Creates a 500 error recording `source` for diagnostics.
    #[must_use]
    pub fn internal_with(source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            source: Some(source.into()),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { status, .. } => *status,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the JSON body sent to the client.
    #[must_use]
    pub fn body(&self) -> ErrorBody<'_> {
        let status = self.status_code().as_u16();
        match self {
            Self::Validation { errors, .. } => ErrorBody::List { status, errors },
            Self::NotFound { message } => ErrorBody::Message { status, message },
            Self::Internal { .. } => ErrorBody::Message {
                status,
                message: INTERNAL_ERROR_MESSAGE,
            },
        }
    }

    /// Returns `true` for [`ApiError::Internal`].
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(conflict) => Self::simple(conflict.message()),
            RepositoryError::NotFound { entity, .. } => Self::not_found(format!("{entity} not found")),
            RepositoryError::Validation(errors) => Self::validation(errors),
            RepositoryError::Backend(source) => Self::internal_with(source),
        }
    }
}

/// Wire shape of an error (or transport message) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorBody<'a> {
    /// `{"status": .., "errors": [..]}`
    List {
        /// HTTP status code.
        status: u16,
        /// Client-facing problems.
        errors: &'a ErrorList,
    },
    /// `{"status": .., "message": ".."}`
    Message {
        /// HTTP status code.
        status: u16,
        /// Client-facing message.
        message: &'a str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ConflictError, StorageError};
    use proptest::prelude::*;
    use std::error::Error as _;

    #[test]
    fn test_error_list_display_joins_entries() {
        let list: ErrorList = ["first", "second", "third"].into_iter().collect();
        assert_eq!(list.to_string(), "first, second, third");
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_error_list_serializes_as_array() {
        let mut list = ErrorList::new();
        list.push("name: invalid length");
        list.push("email: invalid format");

        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(
            json,
            serde_json::json!(["name: invalid length", "email: invalid format"])
        );
    }

    #[test]
    fn test_validation_error_body() {
        let err = ApiError::validation(["name: invalid length", "email: invalid format"].into_iter().collect());

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": 400,
                "errors": ["name: invalid length", "email: invalid format"]
            })
        );
    }

    #[test]
    fn test_validation_with_declared_status() {
        let err = ApiError::validation_with_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            ["bad"].into_iter().collect(),
        );
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(serde_json::to_value(err.body()).unwrap()["status"], 422);
    }

    #[test]
    fn test_empty_validation_becomes_internal() {
        let err = ApiError::validation(ErrorList::new());
        assert!(err.is_internal());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_simple_error_wraps_one_reason() {
        let err = ApiError::simple("email already in use");
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": 400, "errors": ["email already in use"]})
        );
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let err = ApiError::internal_with(anyhow::anyhow!("connection refused"));

        assert_eq!(err.to_string(), INTERNAL_ERROR_MESSAGE);
        assert!(err.source().is_some());
        let json = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": 500, "message": "Internal server error"})
        );
    }

    #[test]
    fn test_not_found_body() {
        let err = ApiError::not_found("user not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            serde_json::to_value(err.body()).unwrap(),
            serde_json::json!({"status": 404, "message": "user not found"})
        );
    }

    #[test]
    fn test_classify_conflict() {
        let conflict = ConflictError::from_unique_violation(
            "Key (email)=(a@b.co) already exists.",
            StorageError::unique_violation("Key (email)=(a@b.co) already exists."),
        );
        let err = ApiError::from(RepositoryError::Conflict(conflict));

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "[email] already exists with this value (a@b.co)");
    }

    #[test]
    fn test_classify_not_found() {
        let err = ApiError::from(RepositoryError::not_found("user", "42"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "user not found");
    }

    #[test]
    fn test_classify_validation_and_backend() {
        let err = ApiError::from(RepositoryError::Validation(["bad"].into_iter().collect()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(RepositoryError::Backend(anyhow::anyhow!("disk full")));
        assert!(err.is_internal());
    }

    proptest! {
        #[test]
        fn prop_error_list_renders_every_entry_in_order(
            entries in proptest::collection::vec(".{0,16}", 1..8),
            status in 400u16..500,
        ) {
            let status = StatusCode::from_u16(status).unwrap();
            let err = ApiError::validation_with_status(status, entries.iter().collect());

            prop_assert_eq!(err.status_code(), status);
            let json = serde_json::to_value(err.body()).unwrap();
            prop_assert_eq!(json["status"].as_u64(), Some(u64::from(status.as_u16())));
            let rendered: Vec<String> = json["errors"]
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_str().unwrap().to_string())
                .collect();
            prop_assert_eq!(rendered, entries);
        }
    }
}
