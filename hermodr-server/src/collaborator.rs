//! Data sources the request handler queries.
//!
//! The server only knows how to frame and route requests; the answers come
//! from whatever application embeds it, through [`Collaborators`].

use hermodr_protocol::NetworkStats;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The data is not available right now (e.g. no world loaded).
    #[error("{0}")]
    Unavailable(String),

    /// The request was understood but refused.
    #[error("{0}")]
    Rejected(String),
}

/// Capabilities the request handler invokes by op code.
///
/// Calls are synchronous and run on tokio's blocking pool, one request at a
/// time per connection. A slow call delays only the connection that made it.
pub trait Collaborators: Send + Sync {
    /// Names of the users currently connected to the game server.
    fn connected_users(&self) -> Result<Vec<String>, CollaboratorError>;

    /// Name of the loaded world.
    fn world_name(&self) -> Result<String, CollaboratorError>;

    /// Current network quality figures.
    fn network_stats(&self) -> Result<NetworkStats, CollaboratorError>;

    /// Server start time, milliseconds since the Unix epoch.
    fn start_time_millis(&self) -> Result<i64, CollaboratorError>;

    /// Delivers a chat message to every connected user.
    fn broadcast(&self, message: &str) -> Result<(), CollaboratorError>;
}

/// In-memory collaborator with settable state.
#[derive(Debug)]
pub struct StaticWorld {
    world_name: RwLock<Option<String>>,
    users: RwLock<Vec<String>>,
    network_stats: RwLock<NetworkStats>,
    started_at_millis: i64,
    broadcasts: Mutex<Vec<String>>,
}

impl StaticWorld {
    /// Creates a world that is already loaded under `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let world = Self::unloaded();
        world.set_world_name(Some(name.into()));
        world
    }

    /// Creates a server with no world loaded yet.
    pub fn unloaded() -> Self {
        Self {
            world_name: RwLock::new(None),
            users: RwLock::new(Vec::new()),
            network_stats: RwLock::new(NetworkStats::default()),
            started_at_millis: chrono::Utc::now().timestamp_millis(),
            broadcasts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_world_name(&self, name: Option<String>) {
        *self.world_name.write() = name;
    }

    pub fn set_users(&self, users: Vec<String>) {
        *self.users.write() = users;
    }

    pub fn set_network_stats(&self, stats: NetworkStats) {
        *self.network_stats.write() = stats;
    }

    /// Returns and clears the messages broadcast so far.
    pub fn take_broadcasts(&self) -> Vec<String> {
        std::mem::take(&mut *self.broadcasts.lock())
    }

    fn loaded_world(&self) -> Result<String, CollaboratorError> {
        self.world_name
            .read()
            .clone()
            .ok_or_else(|| CollaboratorError::Unavailable("no world loaded".to_string()))
    }
}

impl Collaborators for StaticWorld {
    fn connected_users(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.users.read().clone())
    }

    fn world_name(&self) -> Result<String, CollaboratorError> {
        self.loaded_world()
    }

    fn network_stats(&self) -> Result<NetworkStats, CollaboratorError> {
        Ok(*self.network_stats.read())
    }

    fn start_time_millis(&self) -> Result<i64, CollaboratorError> {
        Ok(self.started_at_millis)
    }

    fn broadcast(&self, message: &str) -> Result<(), CollaboratorError> {
        self.loaded_world()?;
        if message.is_empty() {
            return Err(CollaboratorError::Rejected(
                "broadcast message is empty".to_string(),
            ));
        }
        self.broadcasts.lock().push(message.to_string());
        Ok(())
    }
}
