// src/worker.rs
use std::collections::VecDeque;
use std::net::TcpStream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::conn;
use crate::error::{MazurkaError, MazurkaResult};
use crate::router::Router;

/// Fixed-size pool of worker threads consuming accepted sockets from a
/// shared queue guarded by a mutex and a condition variable.
///
/// A handler panic is caught and logged; the worker keeps serving.
pub(crate) struct WorkerPool {
    shared: Arc<PoolShared>,
    handles: Vec<thread::JoinHandle<()>>,
}

struct PoolShared {
    queue: Mutex<VecDeque<TcpStream>>,
    available: Condvar,
    shutdown: AtomicBool,
}

impl WorkerPool {
    pub(crate) fn new(
        workers: usize,
        router: Arc<Router>,
        read_timeout: Duration,
    ) -> MazurkaResult<Self> {
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let core_ids = core_affinity::get_core_ids().unwrap_or_default();
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let shared = shared.clone();
            let router = router.clone();
            let core_id = core_ids.get(i % core_ids.len().max(1)).copied();
            let handle = thread::Builder::new()
                .name(format!("mazurka-worker-{}", i))
                .spawn(move || {
                    if let Some(id) = core_id {
                        core_affinity::set_for_current(id);
                    }
                    worker_loop(i, shared, router, read_timeout);
                })
                .map_err(MazurkaError::from)?;
            handles.push(handle);
        }

        Ok(Self { shared, handles })
    }

    /// Appends the socket and wakes one waiting worker. FIFO from the single
    /// accept-loop producer.
    pub(crate) fn submit(&self, stream: TcpStream) {
        let mut queue = self
            .shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        queue.push_back(stream);
        self.shared.available.notify_one();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.available.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(id: usize, shared: Arc<PoolShared>, router: Arc<Router>, read_timeout: Duration) {
    tracing::debug!(worker = id, "worker started");
    loop {
        let stream = {
            let mut queue = shared.queue.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                if let Some(stream) = queue.pop_front() {
                    break stream;
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    tracing::debug!(worker = id, "worker exiting");
                    return;
                }
                queue = shared
                    .available
                    .wait(queue)
                    .unwrap_or_else(|e| e.into_inner());
            }
        };

        let router = router.clone();
        let result = catch_unwind(AssertUnwindSafe(move || {
            conn::handle_connection(stream, router, read_timeout);
        }));
        if result.is_err() {
            tracing::error!(worker = id, "connection handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_pool_serves_submitted_sockets() {
        let mut router = Router::new();
        router
            .get("/", |_| crate::http::Response::text("pooled"))
            .unwrap();
        let pool = WorkerPool::new(2, Arc::new(router), Duration::from_secs(1)).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        pool.submit(server_side);

        client.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        let mut out = String::new();
        client.read_to_string(&mut out).unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.ends_with("pooled"));
    }

    #[test]
    fn test_drop_stops_idle_workers() {
        let pool = WorkerPool::new(4, Arc::new(Router::new()), Duration::from_secs(1)).unwrap();
        drop(pool);
    }
}
