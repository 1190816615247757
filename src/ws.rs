// src/ws.rs
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use sha1::{Digest, Sha1};

use crate::error::{MazurkaError, MazurkaResult};
use crate::frame::{self, Opcode, MAX_CONTROL_PAYLOAD};
use crate::http::RequestContext;

/// Fixed GUID every WebSocket server concatenates with the client key
/// (RFC 6455 §4.2.2).
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the `Sec-WebSocket-Accept` value for a client key.
pub(crate) fn accept_key(key: &str) -> String {
    let mut sha = Sha1::new();
    sha.update(key.as_bytes());
    sha.update(WS_GUID.as_bytes());
    BASE64_STANDARD.encode(sha.finalize())
}

type ConnectFn = dyn Fn(&Arc<WebSocketConnection>) + Send + Sync;
type MessageFn = dyn Fn(&Arc<WebSocketConnection>, &str) + Send + Sync;
type BinaryFn = dyn Fn(&Arc<WebSocketConnection>, &[u8]) + Send + Sync;
type CloseFn = dyn Fn(&Arc<WebSocketConnection>) + Send + Sync;

/// The four optional hooks a WebSocket route may register.
#[derive(Clone, Default)]
pub struct WebSocketCallbacks {
    pub(crate) on_connect: Option<Arc<ConnectFn>>,
    pub(crate) on_message: Option<Arc<MessageFn>>,
    pub(crate) on_binary: Option<Arc<BinaryFn>>,
    pub(crate) on_close: Option<Arc<CloseFn>>,
}

impl WebSocketCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(mut self, f: impl Fn(&Arc<WebSocketConnection>) + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    pub fn on_message(
        mut self,
        f: impl Fn(&Arc<WebSocketConnection>, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    pub fn on_binary(
        mut self,
        f: impl Fn(&Arc<WebSocketConnection>, &[u8]) + Send + Sync + 'static,
    ) -> Self {
        self.on_binary = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(&Arc<WebSocketConnection>) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }
}

/// One upgraded socket. Owned exclusively by its worker thread; handlers on
/// other threads may still send through the shared write half.
///
/// Send errors are not surfaced: a failed write marks the connection closed
/// and later sends become no-ops.
pub struct WebSocketConnection {
    writer: Mutex<TcpStream>,
    open: AtomicBool,
    context: RequestContext,
}

impl WebSocketConnection {
    fn new(stream: TcpStream, context: RequestContext) -> Self {
        Self {
            writer: Mutex::new(stream),
            open: AtomicBool::new(true),
            context,
        }
    }

    /// The request that performed the upgrade, path parameters included.
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn send_text(&self, text: &str) {
        self.send_frame(Opcode::Text, text.as_bytes());
    }

    pub fn send_binary(&self, data: &[u8]) {
        self.send_frame(Opcode::Binary, data);
    }

    pub fn ping(&self, payload: &[u8]) -> MazurkaResult<()> {
        self.send_control(Opcode::Ping, payload)
    }

    pub fn pong(&self, payload: &[u8]) -> MazurkaResult<()> {
        self.send_control(Opcode::Pong, payload)
    }

    /// Sends a CLOSE frame carrying `code` and `reason`, then shuts the
    /// socket down. Idempotent.
    pub fn close(&self, code: u16, reason: &str) {
        let mut payload = Vec::with_capacity(2 + reason.len());
        payload.extend_from_slice(&code.to_be_bytes());
        payload.extend_from_slice(reason.as_bytes());
        payload.truncate(MAX_CONTROL_PAYLOAD);
        self.close_with_payload(&payload);
    }

    /// Echoes the CLOSE we received: same payload bytes, then shutdown.
    pub(crate) fn close_with_payload(&self, payload: &[u8]) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(bytes) = frame::encode_frame(Opcode::Close, payload) {
            let _ = writer.write_all(&bytes);
            let _ = writer.flush();
        }
        let _ = writer.shutdown(Shutdown::Both);
    }

    /// Drops the socket without the closing handshake, for error paths.
    pub(crate) fn abort(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writer.shutdown(Shutdown::Both);
    }

    fn send_control(&self, opcode: Opcode, payload: &[u8]) -> MazurkaResult<()> {
        if payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(MazurkaError::Frame(format!(
                "control frame payload of {} bytes exceeds {}",
                payload.len(),
                MAX_CONTROL_PAYLOAD
            )));
        }
        self.send_frame(opcode, payload);
        Ok(())
    }

    fn send_frame(&self, opcode: Opcode, payload: &[u8]) {
        if !self.is_open() {
            return;
        }
        let bytes = match frame::encode_frame(opcode, payload) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if writer.write_all(&bytes).and_then(|_| writer.flush()).is_err() {
            self.open.store(false, Ordering::Release);
            let _ = writer.shutdown(Shutdown::Both);
        }
    }
}

/// Drives one upgraded socket until it closes.
///
/// Runs on its own thread. `on_close` fires exactly once, whether the loop
/// ends by CLOSE frame, socket error, malformed frame, or a panicking
/// callback.
pub(crate) fn run_websocket(stream: TcpStream, callbacks: WebSocketCallbacks, context: RequestContext) {
    // The HTTP read timeout would tear down idle WebSockets.
    let _ = stream.set_read_timeout(None);

    let mut reader = match stream.try_clone() {
        Ok(reader) => reader,
        Err(e) => {
            tracing::error!(error = %e, "could not split upgraded socket");
            return;
        }
    };
    let conn = Arc::new(WebSocketConnection::new(stream, context));

    let result = catch_unwind(AssertUnwindSafe(|| {
        if let Some(cb) = callbacks.on_connect.as_ref() {
            cb(&conn);
        }
        loop {
            let frame = match frame::read_frame(&mut reader) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(error = %e, "websocket receive failed");
                    break;
                }
            };
            match frame.opcode {
                Opcode::Text => match std::str::from_utf8(&frame.payload) {
                    Ok(text) => {
                        if let Some(cb) = callbacks.on_message.as_ref() {
                            cb(&conn, text);
                        }
                    }
                    Err(_) => break,
                },
                Opcode::Binary => {
                    if let Some(cb) = callbacks.on_binary.as_ref() {
                        cb(&conn, &frame.payload);
                    }
                }
                Opcode::Ping => {
                    let _ = conn.pong(&frame.payload);
                }
                Opcode::Close => {
                    conn.close_with_payload(&frame.payload);
                    break;
                }
                Opcode::Pong | Opcode::Continuation => {}
            }
            if !conn.is_open() {
                break;
            }
        }
    }));
    if result.is_err() {
        tracing::error!("websocket callback panicked");
    }

    conn.abort();
    if let Some(cb) = callbacks.on_close.as_ref() {
        if catch_unwind(AssertUnwindSafe(|| cb(&conn))).is_err() {
            tracing::error!("on_close callback panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_key_rfc_vector() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }
}
