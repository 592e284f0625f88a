//! Pipelined gateway connection.
//!
//! Every request gets a fresh frame id and registers a waiter under it.
//! A single reader task decodes response frames and completes the waiter
//! whose id the frame echoes, so responses may arrive in any order and
//! many requests can share one socket.

use crate::error::ClientError;
use bytes::{Bytes, BytesMut};
use hermodr_protocol::{Frame, FrameDecoder, FRAME_HEADER_SIZE, MAX_PAYLOAD_SIZE};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};

/// Socket read chunk used by the response reader.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;
pub const MIN_READ_BUFFER_SIZE: usize = 1024;
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Where and how to reach the gateway.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub addr: SocketAddr,
    /// Upper bound on TCP connect.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for a response, per request.
    pub request_timeout: Duration,
    /// Clamped to `MIN_READ_BUFFER_SIZE..=MAX_READ_BUFFER_SIZE`.
    pub read_buffer_size: usize,
    /// Largest payload sent or accepted.
    pub max_payload: u32,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_payload(mut self, max_payload: u32) -> Self {
        self.max_payload = max_payload;
        self
    }
}

/// Waiters keyed by the frame id their response will carry.
#[derive(Default)]
struct PendingRequests {
    waiters: Mutex<HashMap<i32, oneshot::Sender<Frame>>>,
}

impl PendingRequests {
    async fn register(&self, id: i32) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        // Ids wrap after 2^32 requests; a stale waiter under the same id
        // would have timed out long before.
        self.waiters.lock().await.insert(id, tx);
        rx
    }

    async fn forget(&self, id: i32) {
        self.waiters.lock().await.remove(&id);
    }

    /// Hands `frame` to its waiter. Returns false if nobody was waiting.
    async fn complete(&self, frame: Frame) -> bool {
        let waiter = self.waiters.lock().await.remove(&frame.id);
        match waiter {
            // The requester may have timed out and dropped its receiver.
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Drops every waiter; their requests fail with `ConnectionClosed`.
    async fn fail_all(&self) -> usize {
        let mut waiters = self.waiters.lock().await;
        let count = waiters.len();
        waiters.clear();
        count
    }

    async fn len(&self) -> usize {
        self.waiters.lock().await.len()
    }
}

/// A connection to a hermodr gateway.
pub struct Connection {
    config: ConnectionConfig,
    writer: Mutex<Option<OwnedWriteHalf>>,
    /// Taken by `read_loop`.
    reader: Mutex<Option<OwnedReadHalf>>,
    pending: PendingRequests,
    next_id: AtomicI32,
    connected: AtomicBool,
}

impl Connection {
    /// Creates an unconnected handle.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            writer: Mutex::new(None),
            reader: Mutex::new(None),
            pending: PendingRequests::default(),
            next_id: AtomicI32::new(1),
            connected: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Opens the TCP connection, bounded by `connect_timeout`.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let addr = self.config.addr;
        tracing::debug!("Dialing gateway at {}", addr);

        let stream = match tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(addr),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!("Dial {} failed: {}", addr, e);
                return Err(ClientError::Io(e));
            }
            Err(_) => {
                tracing::debug!("Dial {} timed out after {:?}", addr, self.config.connect_timeout);
                return Err(ClientError::Timeout);
            }
        };
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        self.reader.lock().await.replace(read_half);
        self.writer.lock().await.replace(write_half);
        self.connected.store(true, Ordering::SeqCst);

        tracing::debug!("Gateway {} connected", addr);
        Ok(())
    }

    /// Sends a request and waits for the frame answering it.
    ///
    /// Error frames are returned as frames; interpreting them is up to the
    /// caller. Requires [`read_loop`](Self::read_loop) to be running.
    pub async fn request(&self, op: i32, payload: Bytes) -> Result<Frame, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = Frame::new(id, op, payload);
        let mut wire = BytesMut::with_capacity(FRAME_HEADER_SIZE + frame.payload.len());
        frame.encode_into(&mut wire, self.config.max_payload)?;

        // Register before writing so a fast response always finds its waiter.
        let response = self.pending.register(id).await;
        if let Err(e) = self.write(&wire).await {
            self.pending.forget(id).await;
            return Err(e);
        }
        tracing::debug!("-> id={} op={} ({} bytes)", id, op, wire.len());

        match tokio::time::timeout(self.config.request_timeout, response).await {
            Ok(Ok(frame)) => {
                tracing::debug!("<- id={} op={}", id, frame.op);
                Ok(frame)
            }
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                tracing::debug!("id={} timed out after {:?}", id, self.config.request_timeout);
                self.pending.forget(id).await;
                Err(ClientError::Timeout)
            }
        }
    }

    async fn write(&self, wire: &[u8]) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        let writer = writer.as_mut().ok_or(ClientError::NotConnected)?;
        writer.write_all(wire).await?;
        Ok(())
    }

    /// Routes response frames to their requests until the server hangs up
    /// or sends something that is not a valid frame. Run it on its own task.
    ///
    /// Requests still waiting when it returns fail with
    /// [`ClientError::ConnectionClosed`].
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;

        let result = self.route_responses(&mut reader).await;

        self.connected.store(false, Ordering::SeqCst);
        let abandoned = self.pending.fail_all().await;
        if abandoned > 0 {
            tracing::debug!("Gateway gone with {} request(s) unanswered", abandoned);
        }
        result
    }

    async fn route_responses(&self, reader: &mut OwnedReadHalf) -> Result<(), ClientError> {
        let mut decoder = FrameDecoder::with_max_payload(self.config.max_payload);
        let mut chunk = vec![0u8; self.config.read_buffer_size];

        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                return Err(ClientError::ConnectionClosed);
            }
            decoder.extend(&chunk[..n]);

            while let Some(frame) = decoder.decode_frame()? {
                let id = frame.id;
                if !self.pending.complete(frame).await {
                    tracing::debug!("Dropping response id={} with no waiter", id);
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Shuts down the write half and fails outstanding requests.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }

        let abandoned = self.pending.fail_all().await;
        tracing::debug!("Connection closed ({} request(s) abandoned)", abandoned);
        Ok(())
    }

    /// Requests sent and not yet answered.
    pub async fn pending_count(&self) -> usize {
        self.pending.len().await
    }
}
