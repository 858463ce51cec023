//! Root configuration type.
//!
//! This module provides [`AppConfig`], its validation rules and the
//! development/production presets.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, LogFormat, LoggingSection, ServerSection};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Complete usersvc configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use usersvc_config::AppConfig;
///
/// let config = AppConfig::default();
/// assert_eq!(config.server.address, "localhost:4000");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl AppConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The server address is not `host:port` or `:port` with a numeric port
    /// - The handler, read, write or idle timeout is zero
    /// - The handler timeout is not shorter than a non-zero shutdown grace
    ///   period; a zero grace period closes connections without draining
    /// - The log level holds an unknown level or a malformed directive
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_address(&self.server.address)?;

        let timeouts = [
            ("server.handler_timeout_secs", self.server.handler_timeout_secs),
            ("server.read_timeout_secs", self.server.read_timeout_secs),
            ("server.write_timeout_secs", self.server.write_timeout_secs),
            ("server.idle_timeout_secs", self.server.idle_timeout_secs),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        let grace = self.server.shutdown_grace_secs;
        if grace > 0 && self.server.handler_timeout_secs >= grace {
            return Err(ConfigError::invalid_value(
                "server.handler_timeout_secs",
                format!("must be shorter than server.shutdown_grace_secs ({grace})"),
            ));
        }

        if self.logging.enabled {
            validate_level(&self.logging.level)?;
        }

        Ok(())
    }

    /// Development preset: pretty coloured debug logs with source locations.
    ///
    /// ```
    /// use usersvc_config::{AppConfig, LogFormat};
    ///
    /// let config = AppConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.ansi_enabled = true;
        config.logging.include_location = true;
        config
    }

    /// Production preset: JSON logs at info level, listening on all interfaces.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.server.address = ":4000".to_string();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.logging.ansi_enabled = false;
        config
    }
}

fn validate_address(address: &str) -> Result<(), ConfigError> {
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(ConfigError::invalid_value(
            "server.address",
            format!("expected host:port or :port, got {address:?}"),
        ));
    };

    if port.parse::<u16>().is_err() {
        return Err(ConfigError::invalid_value(
            "server.address",
            format!("invalid port {port:?}"),
        ));
    }

    // IPv6 literals keep their colons inside brackets.
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(ConfigError::invalid_value(
            "server.address",
            format!("invalid host {host:?}"),
        ));
    }

    Ok(())
}

fn validate_level(level: &str) -> Result<(), ConfigError> {
    for directive in level.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let level = match directive.rsplit_once('=') {
            Some((target, level)) if !target.is_empty() => level,
            Some(_) => {
                return Err(ConfigError::invalid_value(
                    "logging.level",
                    format!("directive {directive:?} has an empty target"),
                ));
            }
            // Either a bare level or a bare target.
            None => continue,
        };

        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!("unknown level {level:?} in directive {directive:?}"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_port_only_address_is_valid() {
        let mut config = AppConfig::default();
        config.server.address = ":8080".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ipv6_address_is_valid() {
        let mut config = AppConfig::default();
        config.server.address = "[::1]:8080".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_address_without_port_is_rejected() {
        let mut config = AppConfig::default();
        config.server.address = "localhost".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.address"));
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        let mut config = AppConfig::default();
        config.server.address = "localhost:http".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = AppConfig::default();
        config.server.read_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.read_timeout_secs"));
    }

    #[test]
    fn test_handler_timeout_must_be_shorter_than_grace() {
        let mut config = AppConfig::default();
        assert!(config.server.handler_timeout_secs < config.server.shutdown_grace_secs);

        config.server.handler_timeout_secs = config.server.shutdown_grace_secs;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.handler_timeout_secs"));
        assert!(err.to_string().contains("shutdown_grace_secs"));

        config.server.handler_timeout_secs = 30;
        assert!(config.validate().is_err());

        config.server.shutdown_grace_secs = 31;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_grace_is_allowed() {
        let mut config = AppConfig::default();
        config.server.shutdown_grace_secs = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_level_directives() {
        let mut config = AppConfig::default();
        config.logging.level = "usersvc=debug,hyper=warn,info".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "usersvc=loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "=debug".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_disabled_logging_skips_level_check() {
        let mut config = AppConfig::default();
        config.logging.enabled = false;
        config.logging.level = "a=b".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = AppConfig::development();
        assert!(dev.logging.ansi_enabled);
        assert!(dev.validate().is_ok());

        let prod = AppConfig::production();
        assert_eq!(prod.server.address, ":4000");
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(prod.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [server]
            address = "127.0.0.1:9000"
            shutdown_grace_secs = 2

            [logging]
            level = "warn"
            format = "pretty"
        "#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert_eq!(config.server.shutdown_grace_secs, 2);
        assert_eq!(config.server.idle_timeout_secs, 20);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }
}
