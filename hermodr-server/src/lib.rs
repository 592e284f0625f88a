//! # hermodr-server
//!
//! TCP server for hermodr.
//!
//! This crate provides:
//! - A stoppable TCP listener
//! - Framed connections with serialized concurrent sends
//! - The per-connection dispatch loop and op handlers
//! - Server configuration, statistics and graceful shutdown

pub mod collaborator;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod listener;
pub mod server;
pub mod shutdown;

pub use collaborator::{CollaboratorError, Collaborators, StaticWorld};
pub use config::{Config, ConfigError, LimitsConfig, NetworkConfig, WorldConfig};
pub use connection::{Connection, FrameReader, FrameSender};
pub use dispatch::{DispatchLoop, DispatchState};
pub use error::{AcceptError, HandlerError, ServerError};
pub use handler::CommandHandler;
pub use listener::Listener;
pub use server::{Server, ServerConfig, ServerStats};
pub use shutdown::{Shutdown, ShutdownSignal};
