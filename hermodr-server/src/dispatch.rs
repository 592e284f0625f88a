//! Per-connection request/response loop.

use crate::connection::Connection;
use crate::error::HandlerError;
use crate::handler::CommandHandler;
use crate::server::ServerStats;
use crate::shutdown::ShutdownSignal;
use bytes::Bytes;
use hermodr_protocol::{Frame, Op, ProtocolError, ERROR_OP};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Dispatch loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Reading requests and answering them.
    Active,
    /// Shutdown observed; the in-flight response (if any) has been sent.
    Draining,
    /// Connection closed. Terminal.
    Closed,
}

/// Serves one connection until the peer leaves, the transport fails or
/// shutdown is signalled.
///
/// Requests are answered strictly one at a time, in arrival order.
pub struct DispatchLoop<S> {
    conn: Connection<S>,
    handler: Arc<CommandHandler>,
    shutdown: ShutdownSignal,
    stats: Arc<ServerStats>,
    state: DispatchState,
}

impl<S: AsyncRead + AsyncWrite> DispatchLoop<S> {
    pub fn new(
        conn: Connection<S>,
        handler: Arc<CommandHandler>,
        shutdown: ShutdownSignal,
        stats: Arc<ServerStats>,
    ) -> Self {
        Self {
            conn,
            handler,
            shutdown,
            stats,
            state: DispatchState::Active,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Runs the loop to completion. The connection is closed on every exit
    /// path.
    ///
    /// A peer that disconnects between frames is a normal exit and yields
    /// `Ok(())`; a frame cut off part way, a malformed header or an I/O
    /// failure is returned as the error that ended the loop.
    pub async fn run(&mut self) -> Result<(), ProtocolError> {
        let addr = self.conn.peer();
        tracing::info!("Client connected: {} (session {})", addr, self.conn.id());

        let result = match self.serve().await {
            Err(e) if e.is_truncated_frame() => {
                tracing::warn!("[{}] Connection closed mid-frame: {}", addr, e);
                Err(e)
            }
            Err(e) if e.is_connection_closed() => {
                tracing::debug!("[{}] Connection closed by client", addr);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("[{}] Connection error: {}", addr, e);
                Err(e)
            }
            Ok(()) => Ok(()),
        };

        self.conn.close().await;
        self.state = DispatchState::Closed;
        tracing::info!("Client disconnected: {}", addr);
        result
    }

    async fn serve(&mut self) -> Result<(), ProtocolError> {
        let addr = self.conn.peer();
        loop {
            let request = tokio::select! {
                biased;
                _ = self.shutdown.triggered() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    self.state = DispatchState::Draining;
                    return Ok(());
                }
                frame = self.conn.receive_frame() => frame?,
            };

            self.exchange(request).await?;

            if self.shutdown.is_triggered() {
                tracing::debug!("[{}] Shutdown signal received", addr);
                self.state = DispatchState::Draining;
                return Ok(());
            }
        }
    }

    /// Answers one request.
    async fn exchange(&mut self, request: Frame) -> Result<(), ProtocolError> {
        let addr = self.conn.peer();
        let (id, code) = (request.id, request.op);
        self.stats.requests_total.fetch_add(1, Ordering::Relaxed);

        let response = match Op::from_code(code) {
            Some(op) => {
                tracing::debug!(
                    "[{}] Request: {} (id={}, {} bytes)",
                    addr,
                    op,
                    id,
                    request.payload.len()
                );
                match self.resolve(op, request).await {
                    Ok(payload) => Frame::new(id, code, payload),
                    Err(e) => {
                        self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            "[{}] {} failed (id={}, {}): {}",
                            addr,
                            op,
                            id,
                            e.kind(),
                            e
                        );
                        Frame::error(id, &e.to_string())
                    }
                }
            }
            None => {
                tracing::debug!(
                    "[{}] Unknown op {} (id={}), answering with empty payload",
                    addr,
                    code,
                    id
                );
                Frame::empty(id, code)
            }
        };

        let response = self.fit_to_limit(response);
        self.conn.send_frame(&response).await?;
        tracing::debug!(
            "[{}] Response: {} (id={})",
            addr,
            if response.is_error() { "ERROR" } else { "OK" },
            response.id
        );
        Ok(())
    }

    /// Runs the handler on the blocking pool so a slow collaborator only
    /// holds up this connection.
    async fn resolve(&self, op: Op, request: Frame) -> Result<Bytes, HandlerError> {
        let handler = Arc::clone(&self.handler);
        match tokio::task::spawn_blocking(move || handler.handle(op, &request)).await {
            Ok(result) => result,
            Err(e) => Err(HandlerError::Aborted(e.to_string())),
        }
    }

    /// Replaces a response the connection cannot carry with an error frame.
    fn fit_to_limit(&self, response: Frame) -> Frame {
        let max = self.conn.max_payload();
        let err = match response.header(max) {
            Ok(_) => return response,
            Err(e) => e,
        };

        self.stats.errors_total.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            "[{}] Response to id={} not sent: {}",
            self.conn.peer(),
            response.id,
            err
        );
        let error = Frame::error(response.id, &err.to_string());
        if error.header(max).is_ok() {
            error
        } else {
            Frame::empty(response.id, ERROR_OP)
        }
    }
}
