//! Typed configuration for usersvc.
//!
//! Configuration is layered: defaults, then an optional TOML or JSON file,
//! then `USERSVC__SECTION__KEY` environment variables. Unknown fields are
//! rejected.
//!
//! # Example
//!
//! ```no_run
//! use usersvc_config::{ConfigLoader, ENV_PREFIX};
//!
//! # fn main() -> Result<(), usersvc_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("usersvc.toml")?
//!     .with_env_prefix(ENV_PREFIX)
//!     .load()?;
//!
//! println!("listening on {}", config.server.address);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! address = "localhost:4000"
//! handler_timeout_secs = 4
//! read_timeout_secs = 5
//! write_timeout_secs = 10
//! idle_timeout_secs = 20
//! shutdown_grace_secs = 5
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ansi_enabled = false
//! include_location = false
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::AppConfig;
pub use error::ConfigError;
pub use loader::{ConfigLoader, ENV_PREFIX};
pub use schema::{LogFormat, LoggingSection, ServerSection};
