//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use bytes::Bytes;
use hermodr_protocol::payload::{decode_str, encode_str};
use hermodr_protocol::{Frame, NetworkStats, Op, PayloadReader};
use serde::Serialize;
use std::sync::Arc;

/// Answer to the `Status` op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldStatus {
    pub world_name: String,
    pub users: Vec<String>,
}

/// High-level client for hermodr.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection (for background read loop).
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Sends `op` and returns the payload of a matching, non-error response.
    async fn request(&self, op: Op, payload: Bytes) -> Result<Bytes, ClientError> {
        let response = self.conn.request(op.code(), payload).await?;

        if response.is_error() {
            return Err(ClientError::ServerError {
                message: response.error_message().unwrap_or_default(),
            });
        }
        if response.op != op.code() {
            return Err(ClientError::UnexpectedOp {
                expected: op.code(),
                actual: response.op,
            });
        }

        Ok(response.payload)
    }

    /// Pings the server.
    pub async fn ping(&self) -> Result<(), ClientError> {
        self.request(Op::Ping, Bytes::new()).await?;
        Ok(())
    }

    /// Lists the users connected to the game server.
    pub async fn connected_users(&self) -> Result<Vec<String>, ClientError> {
        let payload = self.request(Op::ListUsers, Bytes::new()).await?;
        let mut reader = PayloadReader::new(&payload);
        let users = reader.get_str_list()?;
        reader.finish()?;
        Ok(users)
    }

    /// Gets the world name.
    pub async fn world_name(&self) -> Result<String, ClientError> {
        let payload = self.request(Op::WorldName, Bytes::new()).await?;
        Ok(decode_str(&payload)?)
    }

    /// Gets network quality figures.
    pub async fn network_stats(&self) -> Result<NetworkStats, ClientError> {
        let payload = self.request(Op::NetworkStats, Bytes::new()).await?;
        let mut reader = PayloadReader::new(&payload);
        let stats = reader.get::<NetworkStats>()?;
        reader.finish()?;
        Ok(stats)
    }

    /// Gets the server start time in milliseconds since the Unix epoch.
    pub async fn start_time_millis(&self) -> Result<i64, ClientError> {
        let payload = self.request(Op::StartTime, Bytes::new()).await?;
        let mut reader = PayloadReader::new(&payload);
        let millis = reader.get::<i64>()?;
        reader.finish()?;
        Ok(millis)
    }

    /// Gets the world name and connected users in one round trip.
    pub async fn status(&self) -> Result<WorldStatus, ClientError> {
        let payload = self.request(Op::Status, Bytes::new()).await?;
        let mut reader = PayloadReader::new(&payload);
        let world_name = reader.get_str()?;
        let users = reader.get_str_list()?;
        reader.finish()?;
        Ok(WorldStatus { world_name, users })
    }

    /// Sends a chat message to every connected user.
    pub async fn broadcast(&self, message: &str) -> Result<(), ClientError> {
        self.request(Op::Broadcast, encode_str(message)?).await?;
        Ok(())
    }

    /// Sends an arbitrary op and returns the response frame as is.
    pub async fn raw(&self, op: i32, payload: Bytes) -> Result<Frame, ClientError> {
        self.conn.request(op, payload).await
    }
}
