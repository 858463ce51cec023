//! # usersvc
//!
//! A users CRUD service: JSON handlers for `/users` over a
//! [`UserRepository`](usersvc_core::UserRepository), served by a
//! [`ServerLifecycle`](usersvc_server::ServerLifecycle) with bounded
//! graceful shutdown.
//!
//! - [`handlers`] - one handler per verb, classifying every failure once
//! - [`routes`] - the route table
//! - [`app`] - configuration wiring and [`run`]

#![doc(html_root_url = "https://docs.rs/usersvc/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod app;
pub mod handlers;
pub mod routes;

pub use app::{log_config, run, server_config};
pub use handlers::UsersHandler;
pub use routes::routes;
