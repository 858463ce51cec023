//! Request handlers for the `/users` resource.
//!
//! Every handler returns an [`ApiResult`]; collaborator failures are
//! classified into [`ApiError`] exactly once, through `?` on a
//! [`RepositoryError`](usersvc_core::RepositoryError) or an explicit
//! constructor, and rendered by [`into_response`].

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use usersvc_core::{
    respond, respond_error, respond_no_content, ApiError, ApiResult, HttpResponse, UserPayload,
    UserRepository,
};

/// Message returned when the addressed user does not exist.
pub const USER_NOT_FOUND: &str = "user not found";

/// Reason returned when a create reuses a registered email.
pub const EMAIL_IN_USE: &str = "email already in use";

/// Reason returned when the body is not a JSON user payload.
pub const INVALID_BODY: &str = "invalid request body";

/// Renders a handler outcome.
pub fn into_response(result: ApiResult<HttpResponse>) -> HttpResponse {
    result.unwrap_or_else(|err| respond_error(&err))
}

/// Handlers over a shared [`UserRepository`].
#[derive(Debug)]
pub struct UsersHandler<R> {
    repository: Arc<R>,
}

impl<R> Clone for UsersHandler<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: UserRepository> UsersHandler<R> {
    /// Creates handlers backed by `repository`.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// `GET /users`: every user, `200`.
    pub async fn get(&self) -> ApiResult<HttpResponse> {
        let users = self.repository.get_all().await?;
        Ok(respond(&users, StatusCode::OK))
    }

    /// `GET /users/{id}`: one user, `200`, or `404`.
    pub async fn get_by_id(&self, id: &str) -> ApiResult<HttpResponse> {
        let user = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found(USER_NOT_FOUND))?;
        Ok(respond(&user, StatusCode::OK))
    }

    /// `POST /users`: the stored user, `201`.
    ///
    /// Rejects malformed bodies, invalid fields and an email already in use
    /// with `400`.
    pub async fn create(&self, body: &Bytes) -> ApiResult<HttpResponse> {
        let payload = parse_payload(body)?;

        if self.repository.find_by_email(&payload.email).await?.is_some() {
            return Err(ApiError::simple(EMAIL_IN_USE));
        }

        let user = self.repository.create(payload).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(respond(&user, StatusCode::CREATED))
    }

    /// `PUT /users/{id}`: the updated user, `200`.
    ///
    /// A uniqueness conflict answers `400` with the conflict message, an
    /// unknown id `404`.
    pub async fn update(&self, id: &str, body: &Bytes) -> ApiResult<HttpResponse> {
        let payload = parse_payload(body)?;
        let user = self.repository.update(id, payload).await?;
        Ok(respond(&user, StatusCode::OK))
    }

    /// `DELETE /users/{id}`: `204`, or `404`.
    pub async fn delete(&self, id: &str) -> ApiResult<HttpResponse> {
        self.repository.delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(respond_no_content())
    }
}

fn parse_payload(body: &Bytes) -> ApiResult<UserPayload> {
    let payload: UserPayload = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected request body");
        ApiError::simple(INVALID_BODY)
    })?;

    let errors = payload.validate();
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    Ok(payload)
}
