//! TCP server implementation.

use crate::collaborator::Collaborators;
use crate::config::{Config, ConfigError, LimitsConfig};
use crate::dispatch::DispatchLoop;
use crate::error::{AcceptError, ServerError};
use crate::handler::CommandHandler;
use crate::listener::Listener;
use crate::shutdown::{Shutdown, ShutdownSignal};
use hermodr_protocol::DEFAULT_PORT;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest payload accepted or sent, in bytes.
    pub max_payload: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = LimitsConfig::default();
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            max_connections: limits.max_connections,
            max_payload: limits.max_payload_bytes,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Builds the server settings from a loaded [`Config`], resolving the
    /// configured host name.
    pub async fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            bind_addr: config.network.resolve().await?,
            max_connections: config.limits.max_connections,
            max_payload: config.limits.max_payload_bytes,
        })
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for hermodr.
pub struct Server {
    config: ServerConfig,
    handler: Arc<CommandHandler>,
    stats: Arc<ServerStats>,
    shutdown: Shutdown,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server answering requests from `collaborators`.
    pub fn new(config: ServerConfig, collaborators: Arc<dyn Collaborators>) -> Self {
        Self {
            config,
            handler: Arc::new(CommandHandler::new(collaborators)),
            stats: Arc::new(ServerStats::default()),
            shutdown: Shutdown::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<Listener, ServerError> {
        let listener = Listener::bind(self.config.bind_addr).await?;
        Ok(listener.with_max_payload(self.config.max_payload))
    }

    /// Binds and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until shutdown, then waits for
    /// every connection to finish.
    pub async fn serve(&self, listener: Listener) -> Result<(), ServerError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", listener.local_addr());

        let mut shutdown = self.shutdown.signal();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.triggered() => {
                    tracing::info!("Server shutting down");
                    listener.stop();
                    break;
                }
                result = listener.accept() => {
                    match result {
                        Ok(conn) => {
                            let addr = conn.peer();
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                self.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }

                            self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
                            self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

                            let handler = self.handler.clone();
                            let stats = self.stats.clone();
                            let conn_shutdown = self.shutdown.signal();

                            connections.spawn(async move {
                                let mut dispatch =
                                    DispatchLoop::new(conn, handler, conn_shutdown, stats.clone());
                                if dispatch.run().await.is_err() {
                                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                                }
                                stats.connections_active.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(AcceptError::Stopped) => break,
                        Err(AcceptError::Io(e)) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Connection task failed: {}", e);
                    }
                }
            }
        }

        if !connections.is_empty() {
            tracing::info!("Waiting for {} connection(s) to close", connections.len());
        }
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Connection task failed: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Returns a signal that fires when the server begins shutting down.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
