//! Server lifecycle configuration.
//!
//! The configuration is fixed once the lifecycle starts; build it with
//! [`ServerLifecycleConfig::builder()`].
//!
//! # Example
//!
//! ```rust
//! use usersvc_server::ServerLifecycleConfig;
//! use std::time::Duration;
//!
//! let config = ServerLifecycleConfig::builder()
//!     .address("127.0.0.1:0")
//!     .handler_timeout(Duration::from_secs(2))
//!     .shutdown_grace(Duration::from_millis(500))
//!     .build();
//!
//! assert_eq!(config.address(), "127.0.0.1:0");
//! assert_eq!(config.read_timeout(), Duration::from_secs(5));
//! ```

use std::time::Duration;

/// Default bind address.
pub const DEFAULT_ADDRESS: &str = "localhost:4000";

/// Default per-request handler timeout in seconds, below the default grace period.
pub const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 4;

/// Default read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 5;

/// Default write timeout in seconds.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// Default keep-alive idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 20;

/// Default shutdown grace period in seconds.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Message returned to clients when a handler exceeds its deadline.
pub const HANDLER_TIMEOUT_MESSAGE: &str = "request timeout";

/// Lifecycle configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLifecycleConfig {
    /// Bind address, `host:port` or `:port`
    address: String,

    /// Upper bound for body collection plus handler execution
    handler_timeout: Duration,

    /// Upper bound for reading a request
    read_timeout: Duration,

    /// Upper bound for a stalled response write
    write_timeout: Duration,

    /// How long a kept-alive connection may wait for its next request
    idle_timeout: Duration,

    /// How long shutdown waits for in-flight requests
    shutdown_grace: Duration,
}

impl ServerLifecycleConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ServerLifecycleConfigBuilder {
        ServerLifecycleConfigBuilder::default()
    }

    /// Returns the configured address as written.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the address handed to the socket layer.
    ///
    /// A bare `:port` means every interface.
    ///
    /// ```rust
    /// use usersvc_server::ServerLifecycleConfig;
    ///
    /// let config = ServerLifecycleConfig::builder().address(":8080").build();
    /// assert_eq!(config.bind_address(), "0.0.0.0:8080");
    /// ```
    #[must_use]
    pub fn bind_address(&self) -> String {
        if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        }
    }

    /// Returns the handler timeout.
    #[must_use]
    pub fn handler_timeout(&self) -> Duration {
        self.handler_timeout
    }

    /// Returns the read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Returns the write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    /// Returns the idle timeout.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }
}

impl Default for ServerLifecycleConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerLifecycleConfig`].
#[derive(Debug, Clone)]
pub struct ServerLifecycleConfigBuilder {
    address: String,
    handler_timeout: Duration,
    read_timeout: Duration,
    write_timeout: Duration,
    idle_timeout: Duration,
    shutdown_grace: Duration,
}

impl ServerLifecycleConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            handler_timeout: Duration::from_secs(DEFAULT_HANDLER_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            write_timeout: Duration::from_secs(DEFAULT_WRITE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }

    /// Sets the bind address.
    ///
    /// # Arguments
    ///
    /// * `address` - `host:port` (e.g. "localhost:4000") or `:port`
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the per-request handler timeout.
    #[must_use]
    pub fn handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the keep-alive idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the shutdown grace period.
    ///
    /// This is the maximum time shutdown waits for in-flight requests
    /// before closing their connections.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerLifecycleConfig {
        ServerLifecycleConfig {
            address: self.address,
            handler_timeout: self.handler_timeout,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            idle_timeout: self.idle_timeout,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

impl Default for ServerLifecycleConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
