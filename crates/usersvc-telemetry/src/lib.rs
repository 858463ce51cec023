//! Logging setup for usersvc.
//!
//! Builds a `tracing-subscriber` registry from a [`LogConfig`]: an
//! `EnvFilter` for levels, and a JSON or pretty formatter writing to stdout.

#![warn(missing_docs)]

mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{build_filter, init_logging, LogConfig};
