//! Route table for the users service.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request};
use usersvc_core::UserRepository;
use usersvc_server::{PathParams, Router};

use crate::handlers::{into_response, UsersHandler};

/// Builds the `/users` routes over `repository`.
///
/// | Method | Path          | Handler      |
/// |--------|---------------|--------------|
/// | GET    | `/users`      | `listUsers`  |
/// | POST   | `/users`      | `createUser` |
/// | GET    | `/users/{id}` | `getUser`    |
/// | PUT    | `/users/{id}` | `updateUser` |
/// | DELETE | `/users/{id}` | `deleteUser` |
pub fn routes<R: UserRepository>(repository: Arc<R>) -> Router {
    let users = UsersHandler::new(repository);
    let mut router = Router::new();

    let h = users.clone();
    router.route(Method::GET, "/users", "listUsers", move |_req: Request<Bytes>, _params: PathParams| {
        let h = h.clone();
        async move { into_response(h.get().await) }
    });

    let h = users.clone();
    router.route(Method::POST, "/users", "createUser", move |req: Request<Bytes>, _params: PathParams| {
        let h = h.clone();
        async move { into_response(h.create(req.body()).await) }
    });

    let h = users.clone();
    router.route(Method::GET, "/users/{id}", "getUser", move |_req: Request<Bytes>, params: PathParams| {
        let h = h.clone();
        let id = user_id(&params);
        async move { into_response(h.get_by_id(&id).await) }
    });

    let h = users.clone();
    router.route(Method::PUT, "/users/{id}", "updateUser", move |req: Request<Bytes>, params: PathParams| {
        let h = h.clone();
        let id = user_id(&params);
        async move { into_response(h.update(&id, req.body()).await) }
    });

    let h = users;
    router.route(Method::DELETE, "/users/{id}", "deleteUser", move |_req: Request<Bytes>, params: PathParams| {
        let h = h.clone();
        let id = user_id(&params);
        async move { into_response(h.delete(&id).await) }
    });

    router
}

// Only called for `{id}` templates, which always bind the parameter.
fn user_id(params: &PathParams) -> String {
    params.get("id").unwrap_or_default().to_string()
}
