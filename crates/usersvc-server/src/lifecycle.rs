//! Server lifecycle management.
//!
//! [`ServerLifecycle`] owns the listening socket of the service and moves
//! through these states:
//!
//! ```text
//! Created --start()--> Running --signal/stop()--> ShuttingDown --> Stopped
//!                         |
//!                         +--listener failure--> Failed
//! ```
//!
//! While running, the accept loop runs as its own task and every
//! connection runs as a task owned by it. A termination request (SIGINT,
//! SIGTERM or [`ServerLifecycle::stop`]) stops accepting, asks every
//! connection to finish its current request, and waits up to the configured
//! grace period. Connections still open when the grace period ends are
//! closed and [`start`](ServerLifecycle::start) reports
//! [`LifecycleError::ShutdownTimedOut`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use usersvc_server::{Router, ServerLifecycle, ServerLifecycleConfig};
//!
//! let lifecycle = ServerLifecycle::new(ServerLifecycleConfig::default(), Router::new());
//! lifecycle.start().await?;
//! ```

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};

use crate::config::ServerLifecycleConfig;
use crate::connection::{serve_connection, ConnectionContext};
use crate::dispatch::Dispatcher;
use crate::shutdown::{OsSignals, ShutdownSignal};

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed, nothing bound.
    Created,
    /// Listener bound (or binding) and serving.
    Running,
    /// Termination requested; draining in-flight requests.
    ShuttingDown,
    /// Shut down; the listener is closed.
    Stopped,
    /// The listener failed without a termination request.
    Failed,
}

impl LifecycleState {
    /// Returns `true` for `Stopped` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        })
    }
}

/// Snapshot published to observers of a lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleStatus {
    /// Current state.
    pub state: LifecycleState,
    /// Bound address while the listener is open.
    pub local_addr: Option<SocketAddr>,
}

/// Error type for lifecycle failures.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// `start()` was called outside the `Created` state.
    #[error("Cannot start a lifecycle in state '{0}'")]
    InvalidState(LifecycleState),

    /// Binding or accepting failed.
    #[error("Listener failed: {0}")]
    ListenerFailed(#[source] io::Error),

    /// OS signal handlers could not be registered.
    #[error("Failed to register signal handlers: {0}")]
    Signal(#[source] io::Error),

    /// In-flight requests outlived the grace period and were closed.
    #[error("Shutdown grace period of {grace:?} elapsed with {open} connection(s) still open")]
    ShutdownTimedOut {
        /// Configured grace period.
        grace: Duration,
        /// Connections that had to be closed.
        open: usize,
    },
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// How the accept loop finished after a termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Complete,
    TimedOut { open: usize },
}

/// Owns the HTTP listener and coordinates graceful shutdown.
pub struct ServerLifecycle {
    config: ServerLifecycleConfig,
    dispatcher: Arc<dyn Dispatcher>,
    shutdown: ShutdownSignal,
    status: watch::Sender<LifecycleStatus>,
}

impl fmt::Debug for ServerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerLifecycle")
            .field("config", &self.config)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

impl ServerLifecycle {
    /// Creates a lifecycle in the `Created` state.
    ///
    /// # Arguments
    ///
    /// * `config` - Address and timeouts, fixed from here on
    /// * `dispatcher` - Receives every request read by the server
    pub fn new(config: ServerLifecycleConfig, dispatcher: impl Dispatcher) -> Self {
        let (status, _) = watch::channel(LifecycleStatus {
            state: LifecycleState::Created,
            local_addr: None,
        });
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
            shutdown: ShutdownSignal::new(),
            status,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerLifecycleConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.status.borrow().state
    }

    /// Returns the bound address while the listener is open.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.status.borrow().local_addr
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleStatus> {
        self.status.subscribe()
    }

    /// Waits until the listener is bound and returns its address.
    ///
    /// Returns `None` if the lifecycle ends without ever listening, or
    /// has already ended.
    pub async fn listening(&self) -> Option<SocketAddr> {
        let mut receiver = self.status.subscribe();
        let status = receiver
            .wait_for(|s| s.local_addr.is_some() || s.state.is_terminal())
            .await
            .ok()?;
        status.local_addr
    }

    /// Requests termination.
    ///
    /// Only a `Running` lifecycle reacts; in every other state this is a
    /// no-op, and repeated calls are harmless.
    pub fn stop(&self) {
        if self.begin_shutdown() {
            tracing::info!("Stop requested");
        }
    }

    /// Runs the server until it is stopped or the listener fails.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::InvalidState`] if called outside `Created`
    /// - [`LifecycleError::Signal`] if OS signal handlers cannot be registered
    /// - [`LifecycleError::ListenerFailed`] if binding or accepting fails;
    ///   no grace period applies
    /// - [`LifecycleError::ShutdownTimedOut`] if connections had to be
    ///   closed after the grace period; the lifecycle still ends `Stopped`
    pub async fn start(&self) -> LifecycleResult {
        self.begin()?;

        // Signal streams live for this call only.
        let mut signals = match OsSignals::register() {
            Ok(signals) => signals,
            Err(e) => {
                self.set_state(LifecycleState::Failed);
                return Err(LifecycleError::Signal(e));
            }
        };

        let bind_address = self.config.bind_address();
        let listener = match TcpListener::bind(bind_address.as_str()).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(address = %bind_address, error = %e, "Failed to bind listener");
                self.set_state(LifecycleState::Failed);
                return Err(LifecycleError::ListenerFailed(e));
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.set_state(LifecycleState::Failed);
                return Err(LifecycleError::ListenerFailed(e));
            }
        };
        self.status.send_modify(|s| s.local_addr = Some(local_addr));
        tracing::info!(address = %local_addr, "Server listening");

        let ctx = Arc::new(ConnectionContext::new(&self.config, Arc::clone(&self.dispatcher)));
        let mut accept = tokio::spawn(accept_loop(
            listener,
            ctx,
            self.shutdown.clone(),
            self.config.shutdown_grace(),
        ));

        let finished = tokio::select! {
            result = &mut accept => Some(result),
            () = self.shutdown.recv() => None,
            name = signals.recv() => {
                tracing::info!(signal = name, "Received termination signal");
                None
            }
        };
        drop(signals);

        let result = match finished {
            Some(result) => result,
            None => {
                self.begin_shutdown();
                tracing::info!(grace = ?self.config.shutdown_grace(), "Shutting down");
                accept.await
            }
        };

        self.finish(result)
    }

    /// `Created -> Running`, atomically.
    fn begin(&self) -> LifecycleResult {
        let mut previous = LifecycleState::Created;
        let started = self.status.send_if_modified(|s| {
            previous = s.state;
            if s.state == LifecycleState::Created {
                s.state = LifecycleState::Running;
                true
            } else {
                false
            }
        });
        if started {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState(previous))
        }
    }

    /// `Running -> ShuttingDown`, published before the accept loop and
    /// connections are told to stop.
    fn begin_shutdown(&self) -> bool {
        let stopping = self.status.send_if_modified(|s| {
            if s.state == LifecycleState::Running {
                s.state = LifecycleState::ShuttingDown;
                true
            } else {
                false
            }
        });
        if stopping {
            self.shutdown.trigger();
        }
        stopping
    }

    fn finish(&self, result: Result<io::Result<Drain>, JoinError>) -> LifecycleResult {
        let listener_error = match result {
            Ok(Ok(Drain::Complete)) => {
                self.set_state(LifecycleState::Stopped);
                tracing::info!("Server stopped");
                return Ok(());
            }
            Ok(Ok(Drain::TimedOut { open })) => {
                let grace = self.config.shutdown_grace();
                self.set_state(LifecycleState::Stopped);
                tracing::warn!(
                    grace = ?grace,
                    open,
                    "Shutdown grace period elapsed, closed remaining connections"
                );
                return Err(LifecycleError::ShutdownTimedOut { grace, open });
            }
            Ok(Err(e)) => e,
            Err(e) => io::Error::other(e),
        };

        tracing::error!(error = %listener_error, "Listener failed");
        self.set_state(LifecycleState::Failed);
        Err(LifecycleError::ListenerFailed(listener_error))
    }

    fn set_state(&self, state: LifecycleState) {
        self.status.send_modify(|s| {
            s.state = state;
            if state.is_terminal() {
                s.local_addr = None;
            }
        });
    }
}

/// Accepts connections until shutdown, then drains them within `grace`.
///
/// Returns an error only when the listener itself fails.
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    shutdown: ShutdownSignal,
    grace: Duration,
) -> io::Result<Drain> {
    let mut connections = JoinSet::new();
    let shutdown_requested = shutdown.recv();
    tokio::pin!(shutdown_requested);

    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, remote_addr)) => {
                    tracing::trace!(remote_addr = %remote_addr, "Accepted connection");
                    connections.spawn(serve_connection(
                        stream,
                        remote_addr,
                        Arc::clone(&ctx),
                        shutdown.clone(),
                    ));
                }
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(error = %e, "Connection failed before accept completed");
                }
                Err(e) => return Err(e),
            },
            Some(joined) = connections.join_next(), if !connections.is_empty() => {
                log_connection_exit(joined);
            }
            () = &mut shutdown_requested => break,
        }
    }

    drop(listener);
    tracing::info!(
        connections = connections.len(),
        "Stopped accepting, waiting for in-flight requests"
    );

    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = connections.join_next().await {
            log_connection_exit(joined);
        }
    })
    .await;

    match drained {
        Ok(()) => Ok(Drain::Complete),
        Err(_) => {
            let open = connections.len();
            connections.shutdown().await;
            Ok(Drain::TimedOut { open })
        }
    }
}

/// Reports a connection task that did not return normally.
fn log_connection_exit(joined: Result<(), JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            let panic = e.into_panic();
            tracing::error!(
                panic = crate::connection::panic_message(&*panic),
                "Connection task panicked"
            );
        }
        Err(e) => tracing::debug!(error = %e, "Connection task cancelled"),
    }
}

/// Errors that concern a single incoming connection, not the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
