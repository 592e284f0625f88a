//! Framed connection over a single socket.
//!
//! Reads and writes are split: the dispatch loop owns the receive side
//! exclusively, while sends go through a [`FrameSender`] that any number of
//! tasks may hold. A send writes header and payload as one contiguous buffer
//! under a lock, so frames from concurrent senders never interleave.

use bytes::BytesMut;
use hermodr_protocol::{
    Frame, FrameHeader, FrameSection, ProtocolError, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Reads into `buf` until it is full or the stream ends.
///
/// Returns the number of bytes actually read, which is less than
/// `buf.len()` only at end of stream.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]).await {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Receive side: turns a byte stream into frames.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
    header: [u8; FRAME_HEADER_SIZE],
    payload: BytesMut,
    max_payload: u32,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_payload(reader, MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(reader: R, max_payload: u32) -> Self {
        Self {
            reader,
            header: [0; FRAME_HEADER_SIZE],
            payload: BytesMut::new(),
            max_payload,
        }
    }

    /// Reads exactly one frame.
    ///
    /// A declared length that is negative or above the limit fails with
    /// [`ProtocolError::MalformedFrame`] before any payload byte is read.
    /// A stream that ends early fails with [`ProtocolError::ConnectionClosed`]
    /// naming the section that was cut short.
    pub async fn read_frame(&mut self) -> Result<Frame, ProtocolError> {
        let read = read_full(&mut self.reader, &mut self.header).await?;
        if read < FRAME_HEADER_SIZE {
            return Err(ProtocolError::ConnectionClosed {
                section: FrameSection::Header,
                read,
                expected: FRAME_HEADER_SIZE,
            });
        }

        let header = FrameHeader::decode(&self.header)?;
        let len = header.payload_size(self.max_payload)?;
        if len == 0 {
            return Ok(Frame::empty(header.id, header.op));
        }

        self.payload.clear();
        self.payload.resize(len, 0);
        let read = read_full(&mut self.reader, &mut self.payload[..]).await?;
        if read < len {
            return Err(ProtocolError::ConnectionClosed {
                section: FrameSection::Payload,
                read,
                expected: len,
            });
        }

        Ok(Frame::new(header.id, header.op, self.payload.split().freeze()))
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

struct SendState<W> {
    writer: Option<W>,
    buf: BytesMut,
}

/// Send side of a connection. Cheap to clone; all clones share one lock.
pub struct FrameSender<S> {
    state: Arc<Mutex<SendState<WriteHalf<S>>>>,
    max_payload: u32,
}

impl<S> Clone for FrameSender<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            max_payload: self.max_payload,
        }
    }
}

impl<S: AsyncRead + AsyncWrite> FrameSender<S> {
    fn new(writer: WriteHalf<S>, max_payload: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SendState {
                writer: Some(writer),
                buf: BytesMut::with_capacity(FRAME_HEADER_SIZE),
            })),
            max_payload,
        }
    }

    /// Writes one frame. Concurrent calls are serialized.
    pub async fn send_frame(&self, frame: &Frame) -> Result<(), ProtocolError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let writer = state.writer.as_mut().ok_or(ProtocolError::AlreadyClosed)?;

        state.buf.clear();
        frame.encode_into(&mut state.buf, self.max_payload)?;
        writer.write_all(&state.buf).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Shuts down the write half. Later sends fail with `AlreadyClosed`.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let Some(mut writer) = state.writer.take() {
            let _ = writer.shutdown().await;
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.writer.is_none()
    }
}

/// One client connection.
pub struct Connection<S = TcpStream> {
    id: Uuid,
    peer: SocketAddr,
    reader: FrameReader<ReadHalf<S>>,
    sender: FrameSender<S>,
    max_payload: u32,
    closed: bool,
}

impl<S: AsyncRead + AsyncWrite> Connection<S> {
    pub fn new(stream: S, peer: SocketAddr) -> Self {
        Self::with_max_payload(stream, peer, MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(stream: S, peer: SocketAddr, max_payload: u32) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            id: Uuid::new_v4(),
            peer,
            reader: FrameReader::with_max_payload(read_half, max_payload),
            sender: FrameSender::new(write_half, max_payload),
            max_payload,
            closed: false,
        }
    }

    /// Session id, unique per accepted connection.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Largest payload this connection reads or writes.
    pub fn max_payload(&self) -> u32 {
        self.max_payload
    }

    /// Returns a handle for sending from other tasks.
    pub fn sender(&self) -> FrameSender<S> {
        self.sender.clone()
    }

    /// Reads the next frame. Not meant to be called concurrently; the
    /// `&mut` receiver enforces that.
    pub async fn receive_frame(&mut self) -> Result<Frame, ProtocolError> {
        if self.closed {
            return Err(ProtocolError::AlreadyClosed);
        }
        self.reader.read_frame().await
    }

    pub async fn send_frame(&self, frame: &Frame) -> Result<(), ProtocolError> {
        if self.closed {
            return Err(ProtocolError::AlreadyClosed);
        }
        self.sender.send_frame(frame).await
    }

    /// Closes the connection. Idempotent.
    pub async fn close(&mut self) {
        self.closed = true;
        self.sender.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::collections::HashSet;
    use tokio::io::duplex;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn header(id: i32, op: i32, len: i32) -> Vec<u8> {
        let mut raw = vec![0u8; FRAME_HEADER_SIZE];
        FrameHeader {
            id,
            op,
            payload_len: len,
        }
        .encode_into(&mut raw)
        .unwrap();
        raw
    }

    #[tokio::test]
    async fn test_read_frame_fragmented() {
        let mock = tokio_test::io::Builder::new()
            .read(&header(7, 2, 6)[..5])
            .read(&header(7, 2, 6)[5..])
            .read(b"abc")
            .read(b"def")
            .build();
        let mut reader = FrameReader::new(mock);

        let frame = reader.read_frame().await.unwrap();
        assert_eq!((frame.id, frame.op), (7, 2));
        assert_eq!(frame.payload, Bytes::from_static(b"abcdef"));
    }

    #[tokio::test]
    async fn test_clean_close_between_frames() {
        let mut reader = FrameReader::new(&b""[..]);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionClosed {
                section: FrameSection::Header,
                read: 0,
                expected: 12
            }
        ));
        assert!(err.is_connection_closed());
        assert!(!err.is_truncated_frame());
    }

    #[tokio::test]
    async fn test_close_mid_header() {
        let bytes = header(1, 0, 0);
        let mut reader = FrameReader::new(&bytes[..5]);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionClosed {
                section: FrameSection::Header,
                read: 5,
                ..
            }
        ));
        assert!(err.is_truncated_frame());
    }

    #[tokio::test]
    async fn test_close_mid_payload() {
        let mut bytes = header(1, 2, 10);
        bytes.extend_from_slice(b"abc");
        let mut reader = FrameReader::new(&bytes[..]);

        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ConnectionClosed {
                section: FrameSection::Payload,
                read: 3,
                expected: 10
            }
        ));
        assert!(err.is_truncated_frame());
    }

    #[tokio::test]
    async fn test_negative_length_leaves_payload_unread() {
        let mut bytes = header(1, 2, -1);
        bytes.extend_from_slice(&[9, 9, 9, 9, 9]);
        let mut reader = FrameReader::new(&bytes[..]);

        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { payload_len: -1, .. }));
        assert_eq!(reader.into_inner().len(), 5);
    }

    #[tokio::test]
    async fn test_length_over_limit() {
        let mut bytes = header(1, 2, 100);
        bytes.extend_from_slice(&[0u8; 100]);
        let mut reader = FrameReader::with_max_payload(&bytes[..], 64);

        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedFrame { payload_len: 100, max: 64 }));
        assert_eq!(reader.into_inner().len(), 100);
    }

    #[tokio::test]
    async fn test_send_writes_header_then_payload() {
        let mut expected = header(42, 1, 2);
        expected.extend_from_slice(&[0xAA, 0xBB]);
        let mock = tokio_test::io::Builder::new().write(&expected).build();

        let conn = Connection::new(mock, peer());
        conn.send_frame(&Frame::new(42, 1, vec![0xAA, 0xBB]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_roundtrip_over_duplex() {
        let (client, server) = duplex(64 * 1024);
        let client = Connection::new(client, peer());
        let mut server = Connection::new(server, peer());

        client.send_frame(&Frame::empty(42, 1)).await.unwrap();
        let frame = server.receive_frame().await.unwrap();
        assert_eq!((frame.id, frame.op), (42, 1));
        assert!(frame.payload.is_empty());

        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        let big = Frame::new(-5, 3, payload.clone());
        let sender = client.sender();
        let send = tokio::spawn(async move { sender.send_frame(&big).await });

        let frame = server.receive_frame().await.unwrap();
        send.await.unwrap().unwrap();
        assert_eq!(frame.id, -5);
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (client, server) = duplex(64 * 1024);
        let client = Connection::new(client, peer());
        let mut server = Connection::new(server, peer());

        for id in 1..=5 {
            client
                .send_frame(&Frame::new(id, 0, vec![id as u8]))
                .await
                .unwrap();
        }
        for id in 1..=5 {
            assert_eq!(server.receive_frame().await.unwrap().id, id);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_do_not_interleave() {
        const SENDERS: i32 = 32;
        const SIZE: usize = 1000;

        // A small pipe forces partial writes.
        let (client, server) = duplex(512);
        let client = Connection::new(client, peer());
        let mut server = Connection::new(server, peer());

        let mut tasks = Vec::new();
        for id in 0..SENDERS {
            let sender = client.sender();
            tasks.push(tokio::spawn(async move {
                sender
                    .send_frame(&Frame::new(id, 1, vec![id as u8; SIZE]))
                    .await
            }));
        }

        let mut seen = HashSet::new();
        for _ in 0..SENDERS {
            let frame = server.receive_frame().await.unwrap();
            assert_eq!(frame.payload.len(), SIZE);
            assert!(frame.payload.iter().all(|b| *b == frame.id as u8));
            assert!(seen.insert(frame.id));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(seen.len(), SENDERS as usize);
    }

    #[tokio::test]
    async fn test_send_over_limit_fails_without_writing() {
        let (client, _server) = duplex(1024);
        let client = Connection::with_max_payload(client, peer(), 16);

        let err = client
            .send_frame(&Frame::new(1, 1, vec![0u8; 17]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { size: 17, max: 16 }));

        // The connection is still usable.
        client.send_frame(&Frame::empty(2, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, server) = duplex(1024);
        let mut client = Connection::new(client, peer());
        let mut server = Connection::new(server, peer());
        let sender = client.sender();

        client.close().await;
        client.close().await;
        assert!(client.is_closed());
        assert!(sender.is_closed().await);

        assert!(matches!(
            client.send_frame(&Frame::empty(1, 0)).await,
            Err(ProtocolError::AlreadyClosed)
        ));
        assert!(matches!(
            sender.send_frame(&Frame::empty(1, 0)).await,
            Err(ProtocolError::AlreadyClosed)
        ));
        assert!(matches!(client.receive_frame().await, Err(ProtocolError::AlreadyClosed)));

        // Peer sees end of stream at a frame boundary.
        let err = server.receive_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConnectionClosed { read: 0, .. }));
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let (a, b) = duplex(64);
        let a = Connection::new(a, peer());
        let b = Connection::new(b, peer());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.peer(), peer());
    }
}
