//! Wiring from loaded configuration to a running server.

use std::sync::Arc;

use anyhow::Context;
use usersvc_config::{AppConfig, LogFormat, LoggingSection, ServerSection};
use usersvc_core::InMemoryUserRepository;
use usersvc_server::{ServerLifecycle, ServerLifecycleConfig};
use usersvc_telemetry::LogConfig;

use crate::routes::routes;

/// Converts the `[server]` section into lifecycle settings.
#[must_use]
pub fn server_config(section: &ServerSection) -> ServerLifecycleConfig {
    ServerLifecycleConfig::builder()
        .address(section.address.clone())
        .handler_timeout(section.handler_timeout())
        .read_timeout(section.read_timeout())
        .write_timeout(section.write_timeout())
        .idle_timeout(section.idle_timeout())
        .shutdown_grace(section.shutdown_grace())
        .build()
}

/// Converts the `[logging]` section into subscriber settings.
#[must_use]
pub fn log_config(section: &LoggingSection) -> LogConfig {
    LogConfig {
        enabled: section.enabled,
        level: section.level.clone(),
        json_format: section.format == LogFormat::Json,
        ansi: section.ansi_enabled,
        file_line_info: section.include_location,
        ..LogConfig::production()
    }
}

/// Serves the users API over an in-memory repository until a termination
/// request arrives.
///
/// # Errors
///
/// Returns the lifecycle failure: a listener that could not bind or died,
/// or a shutdown that outlived its grace period.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let repository = Arc::new(InMemoryUserRepository::new());
    let lifecycle = ServerLifecycle::new(server_config(&config.server), routes(repository));

    tracing::info!(
        address = %config.server.address,
        grace = ?config.server.shutdown_grace(),
        "Starting usersvc"
    );

    lifecycle
        .start()
        .await
        .with_context(|| format!("server on {} failed", config.server.address))?;

    tracing::info!("usersvc stopped");
    Ok(())
}
