// src/lib.rs
//! mazurka: a small, self-contained HTTP/1.1 application server with
//! built-in RFC 6455 WebSocket support. Blocking I/O on a fixed worker
//! pool; plain TCP only.

pub mod conn;
pub mod error;
pub mod frame;
pub mod http;
pub mod logging;
pub mod parser;
pub mod router;
pub mod server;
pub mod static_files;
pub mod worker;
pub mod writer;
pub mod ws;

// Re-exports for users
pub use error::{MazurkaError, MazurkaResult};
pub use http::{Method, RequestContext, Response, ResponseKind};
pub use logging::{init_logging, init_logging_with_level};
pub use router::Router;
pub use server::Server;
pub use ws::{WebSocketCallbacks, WebSocketConnection};
