//! # usersvc Server
//!
//! HTTP server lifecycle for usersvc.
//!
//! This crate provides:
//!
//! - [`ServerLifecycle`] - listener ownership, OS signal handling and
//!   bounded graceful shutdown
//! - Per-connection read, write and idle timeouts plus a per-request
//!   handler timeout
//! - [`Router`] - method and path template routing
//! - [`Dispatcher`] - the seam between the server and application code
//!
//! ## Example
//!
//! ```rust,ignore
//! use usersvc_server::{Router, ServerLifecycle, ServerLifecycleConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerLifecycleConfig::builder()
//!         .address("0.0.0.0:4000")
//!         .build();
//!
//!     let lifecycle = ServerLifecycle::new(config, Router::new());
//!     lifecycle.start().await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/usersvc-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod connection;
mod dispatch;
mod io;
mod lifecycle;
mod router;
mod shutdown;

pub use config::{
    ServerLifecycleConfig, ServerLifecycleConfigBuilder, DEFAULT_ADDRESS,
    DEFAULT_HANDLER_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_WRITE_TIMEOUT_SECS, HANDLER_TIMEOUT_MESSAGE,
};
pub use dispatch::{DispatchFuture, Dispatcher};
pub use lifecycle::{
    LifecycleError, LifecycleResult, LifecycleState, LifecycleStatus, ServerLifecycle,
};
pub use router::{PathParams, RouteMatch, Router};
pub use shutdown::ShutdownSignal;
