// src/server.rs
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::MazurkaResult;
use crate::router::Router;
use crate::worker::WorkerPool;

const DEFAULT_WORKERS: usize = 8;
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);
const SOCKET_BUFFER_SIZE: usize = 262_144;
const LISTEN_BACKLOG: i32 = 2048;

/// The application facade: owns the listener and the worker pool, runs the
/// accept loop. Routes, mounts, and WebSocket endpoints are registered on a
/// [`Router`] and handed to [`Server::serve`].
pub struct Server {
    listener: TcpListener,
    workers: usize,
    read_timeout: Duration,
}

impl Server {
    /// Binds and listens on `port` (all interfaces, backlog 2048, with
    /// `SO_REUSEADDR` and enlarged socket buffers). Port 0 asks the OS for a
    /// free port; see [`Server::local_addr`].
    pub fn bind(port: u16) -> MazurkaResult<Self> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE)?;
        socket.set_send_buffer_size(SOCKET_BUFFER_SIZE)?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;

        Ok(Self {
            listener: socket.into(),
            workers: DEFAULT_WORKERS,
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Number of worker threads serving connections.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Receive timeout applied to each accepted socket; bounds how long an
    /// idle keep-alive connection holds a worker.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> MazurkaResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Starts the pool and accepts until the process exits. Failed accepts
    /// are logged and do not stop the loop.
    pub fn serve(self, router: Router) -> MazurkaResult<()> {
        let addr = self.listener.local_addr()?;
        tracing::info!(%addr, workers = self.workers, "mazurka listening");

        let router = Arc::new(router);
        let pool = WorkerPool::new(self.workers, router, self.read_timeout)?;

        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    tracing::trace!(%peer, "accepted connection");
                    pool.submit(stream);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let server = Server::bind(0).unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_builder_defaults() {
        let server = Server::bind(0).unwrap();
        assert_eq!(server.workers, 8);
        assert_eq!(server.read_timeout, Duration::from_secs(5));

        let server = server.workers(0).read_timeout(Duration::from_secs(1));
        assert_eq!(server.workers, 1);
        assert_eq!(server.read_timeout, Duration::from_secs(1));
    }
}
