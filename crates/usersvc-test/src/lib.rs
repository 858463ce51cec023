//! In-memory HTTP testing for usersvc.
//!
//! [`TestClient`] sends requests straight to any
//! [`Dispatcher`](usersvc_server::Dispatcher), such as a
//! [`Router`](usersvc_server::Router), without binding a port.
//! [`TestResponse`] collects the body and offers assertion helpers.
//!
//! ```ignore
//! let client = TestClient::new(routes(repository));
//! client
//!     .post("/users")
//!     .json(&json!({"name": "Ada", "email": "ada@example.com"}))
//!     .send()
//!     .await
//!     .assert_status(StatusCode::CREATED)
//!     .assert_json_field("name", &json!("Ada"));
//! ```

#![warn(missing_docs)]

mod client;
mod error;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use response::TestResponse;
