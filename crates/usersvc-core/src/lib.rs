//! # usersvc Core
//!
//! Core types shared by every usersvc crate:
//!
//! - [`ApiError`] - closed error taxonomy with HTTP status mapping
//! - [`ErrorList`] - ordered list of client-facing failure messages
//! - [`respond`], [`respond_error`] - JSON response encoding
//! - [`User`], [`UserPayload`] - the user resource
//! - [`UserRepository`] - CRUD contract consumed by the request handlers

#![doc(html_root_url = "https://docs.rs/usersvc-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod model;
pub mod repository;
pub mod response;

pub use error::{ApiError, ApiResult, ErrorBody, ErrorList, INTERNAL_ERROR_MESSAGE};
pub use model::{User, UserPayload};
pub use repository::{
    ConflictError, InMemoryUserRepository, RepositoryError, RepositoryResult, StorageError,
    UserRepository,
};
pub use response::{
    respond, respond_error, respond_internal_error, respond_message, respond_no_content,
    HttpResponse, ResponseBody, CONTENT_TYPE_JSON,
};
