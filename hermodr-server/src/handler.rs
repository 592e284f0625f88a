//! Op handlers.
//!
//! Each known op is answered from the [`Collaborators`]. Handlers only build
//! payloads; turning a failure into an error frame, and answering unknown ops,
//! is the dispatch loop's job.

use crate::collaborator::Collaborators;
use crate::error::HandlerError;
use bytes::Bytes;
use hermodr_protocol::payload::decode_str;
use hermodr_protocol::{BigEndian, Frame, NetworkStats, Op, PayloadWriter};
use std::sync::Arc;

/// Command handler.
pub struct CommandHandler {
    collaborators: Arc<dyn Collaborators>,
}

impl CommandHandler {
    pub fn new(collaborators: Arc<dyn Collaborators>) -> Self {
        Self { collaborators }
    }

    /// Builds the response payload for `request`.
    pub fn handle(&self, op: Op, request: &Frame) -> Result<Bytes, HandlerError> {
        match op {
            Op::Ping => Ok(Bytes::new()),
            Op::ListUsers => self.handle_list_users(),
            Op::WorldName => self.handle_world_name(),
            Op::NetworkStats => self.handle_network_stats(),
            Op::StartTime => self.handle_start_time(),
            Op::Status => self.handle_status(),
            Op::Broadcast => self.handle_broadcast(&request.payload),
        }
    }

    fn handle_list_users(&self) -> Result<Bytes, HandlerError> {
        let users = self.collaborators.connected_users()?;
        let mut writer = PayloadWriter::new();
        writer.put_str_list(&users).map_err(HandlerError::Encode)?;
        Ok(writer.finish())
    }

    fn handle_world_name(&self) -> Result<Bytes, HandlerError> {
        let name = self.collaborators.world_name()?;
        let mut writer = PayloadWriter::with_capacity(4 + name.len());
        writer.put_str(&name).map_err(HandlerError::Encode)?;
        Ok(writer.finish())
    }

    fn handle_network_stats(&self) -> Result<Bytes, HandlerError> {
        let stats = self.collaborators.network_stats()?;
        let mut writer = PayloadWriter::with_capacity(NetworkStats::WIDTH);
        writer.put(stats).map_err(HandlerError::Encode)?;
        Ok(writer.finish())
    }

    fn handle_start_time(&self) -> Result<Bytes, HandlerError> {
        let millis = self.collaborators.start_time_millis()?;
        let mut writer = PayloadWriter::with_capacity(8);
        writer.put(millis).map_err(HandlerError::Encode)?;
        Ok(writer.finish())
    }

    fn handle_status(&self) -> Result<Bytes, HandlerError> {
        let name = self.collaborators.world_name()?;
        let users = self.collaborators.connected_users()?;
        let mut writer = PayloadWriter::new();
        writer
            .put_str(&name)
            .and_then(|w| w.put_str_list(&users))
            .map_err(HandlerError::Encode)?;
        Ok(writer.finish())
    }

    fn handle_broadcast(&self, payload: &[u8]) -> Result<Bytes, HandlerError> {
        let message = decode_str(payload).map_err(HandlerError::BadRequest)?;
        self.collaborators.broadcast(&message)?;
        Ok(Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::{CollaboratorError, StaticWorld};
    use hermodr_protocol::payload::encode_str;
    use hermodr_protocol::PayloadReader;

    fn test_handler() -> (Arc<StaticWorld>, CommandHandler) {
        let world = Arc::new(StaticWorld::new("Midgard"));
        world.set_users(vec!["alice".into(), "bob".into()]);
        let handler = CommandHandler::new(world.clone());
        (world, handler)
    }

    fn request(op: Op) -> Frame {
        Frame::empty(1, op.code())
    }

    #[test]
    fn test_ping() {
        let (_, handler) = test_handler();
        assert!(handler.handle(Op::Ping, &request(Op::Ping)).unwrap().is_empty());
    }

    #[test]
    fn test_list_users() {
        let (_, handler) = test_handler();
        let payload = handler
            .handle(Op::ListUsers, &request(Op::ListUsers))
            .unwrap();

        let mut reader = PayloadReader::new(&payload);
        assert_eq!(reader.get_str_list().unwrap(), vec!["alice", "bob"]);
        reader.finish().unwrap();
    }

    #[test]
    fn test_world_name() {
        let (_, handler) = test_handler();
        let payload = handler
            .handle(Op::WorldName, &request(Op::WorldName))
            .unwrap();
        assert_eq!(decode_str(&payload).unwrap(), "Midgard");
    }

    #[test]
    fn test_network_stats() {
        let (world, handler) = test_handler();
        let stats = NetworkStats {
            local_quality: 1.0,
            remote_quality: 0.5,
            ping_ms: 42,
            out_bytes_per_sec: 100.0,
            in_bytes_per_sec: 200.0,
        };
        world.set_network_stats(stats);

        let payload = handler
            .handle(Op::NetworkStats, &request(Op::NetworkStats))
            .unwrap();
        assert_eq!(payload.len(), 20);

        let mut reader = PayloadReader::new(&payload);
        assert_eq!(reader.get::<NetworkStats>().unwrap(), stats);
    }

    #[test]
    fn test_start_time() {
        let (world, handler) = test_handler();
        let payload = handler
            .handle(Op::StartTime, &request(Op::StartTime))
            .unwrap();

        let mut reader = PayloadReader::new(&payload);
        assert_eq!(
            reader.get::<i64>().unwrap(),
            world.start_time_millis().unwrap()
        );
    }

    #[test]
    fn test_status() {
        let (_, handler) = test_handler();
        let payload = handler.handle(Op::Status, &request(Op::Status)).unwrap();

        let mut reader = PayloadReader::new(&payload);
        assert_eq!(reader.get_str().unwrap(), "Midgard");
        assert_eq!(reader.get_str_list().unwrap(), vec!["alice", "bob"]);
        reader.finish().unwrap();
    }

    #[test]
    fn test_broadcast() {
        let (world, handler) = test_handler();
        let frame = Frame::new(5, Op::Broadcast.code(), encode_str("hello vikings").unwrap());

        let payload = handler.handle(Op::Broadcast, &frame).unwrap();
        assert!(payload.is_empty());
        assert_eq!(world.take_broadcasts(), vec!["hello vikings"]);
    }

    #[test]
    fn test_broadcast_bad_payload() {
        let (world, handler) = test_handler();
        let frame = Frame::new(5, Op::Broadcast.code(), vec![0xFF, 0xFF]);

        let err = handler.handle(Op::Broadcast, &frame).unwrap_err();
        assert!(matches!(err, HandlerError::BadRequest(_)));
        assert!(world.take_broadcasts().is_empty());
    }

    #[test]
    fn test_collaborator_failure() {
        let world = Arc::new(StaticWorld::unloaded());
        let handler = CommandHandler::new(world);

        let err = handler
            .handle(Op::WorldName, &request(Op::WorldName))
            .unwrap_err();
        assert!(matches!(err, HandlerError::Collaborator(CollaboratorError::Unavailable(_))));
        assert!(handler.handle(Op::Status, &request(Op::Status)).is_err());

        // Ops that do not need a world still work.
        assert!(handler.handle(Op::Ping, &request(Op::Ping)).is_ok());
        assert!(handler
            .handle(Op::ListUsers, &request(Op::ListUsers))
            .is_ok());
    }
}
