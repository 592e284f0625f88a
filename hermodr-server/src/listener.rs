//! TCP listener producing [`Connection`]s.

use crate::connection::Connection;
use crate::error::{AcceptError, ServerError};
use crate::shutdown::Shutdown;
use hermodr_protocol::MAX_PAYLOAD_SIZE;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

/// Bound TCP endpoint.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
    stop: Shutdown,
    max_payload: u32,
}

impl Listener {
    /// Binds to `addr`. Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let inner = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = inner.local_addr()?;
        debug!("Listener bound to {}", local_addr);

        Ok(Self {
            inner,
            local_addr,
            stop: Shutdown::new(),
            max_payload: MAX_PAYLOAD_SIZE,
        })
    }

    /// Sets the payload limit applied to accepted connections.
    pub fn with_max_payload(mut self, max_payload: u32) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the next client.
    ///
    /// Returns [`AcceptError::Stopped`] once [`stop`](Self::stop) has been
    /// called, including for an accept that was already waiting.
    pub async fn accept(&self) -> Result<Connection<TcpStream>, AcceptError> {
        let mut stopped = self.stop.signal();
        if stopped.is_triggered() {
            return Err(AcceptError::Stopped);
        }

        tokio::select! {
            biased;
            _ = stopped.triggered() => Err(AcceptError::Stopped),
            result = self.inner.accept() => {
                let (stream, peer) = result?;
                stream.set_nodelay(true)?;
                Ok(Connection::with_max_payload(stream, peer, self.max_payload))
            }
        }
    }

    /// Stops accepting. Idempotent.
    pub fn stop(&self) {
        if !self.stop.is_triggered() {
            debug!("Listener on {} stopped", self.local_addr);
        }
        self.stop.trigger();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermodr_protocol::Frame;
    use std::sync::Arc;
    use std::time::Duration;

    async fn local() -> Listener {
        Listener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_bind_picks_port() {
        let listener = local().await;
        assert_ne!(listener.local_addr().port(), 0);
        assert!(!listener.is_stopped());
    }

    #[tokio::test]
    async fn test_bind_in_use() {
        let first = local().await;
        let err = Listener::bind(first.local_addr()).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }

    #[tokio::test]
    async fn test_accept_returns_connection() {
        let listener = local().await;
        let addr = listener.local_addr();

        let client = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let local = stream.local_addr().unwrap();
            let conn = Connection::new(stream, addr);
            conn.send_frame(&Frame::empty(3, 0)).await.unwrap();
            local
        });

        let mut conn = listener.accept().await.unwrap();
        let frame = conn.receive_frame().await.unwrap();
        assert_eq!(frame.id, 3);
        assert_eq!(conn.peer(), client.await.unwrap());
    }

    #[tokio::test]
    async fn test_stop_unblocks_pending_accept() {
        let listener = Arc::new(local().await);
        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.accept().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        listener.stop();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("accept should be released")
            .unwrap();
        assert!(matches!(result, Err(AcceptError::Stopped)));
    }

    #[tokio::test]
    async fn test_accept_after_stop() {
        let listener = local().await;
        listener.stop();
        listener.stop();
        assert!(listener.is_stopped());
        assert!(matches!(listener.accept().await, Err(AcceptError::Stopped)));
    }
}
