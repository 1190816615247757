// src/conn.rs
use std::io::Write;
use std::net::TcpStream;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::http::{Method, RequestContext, Response};
use crate::router::Router;
use crate::static_files;
use crate::writer::write_response;
use crate::{parser, ws};

/// Serves one accepted socket: request/response pairs until keep-alive ends,
/// the peer goes away, or an upgrade hands the socket to a WebSocket worker.
pub(crate) fn handle_connection(mut stream: TcpStream, router: Arc<Router>, read_timeout: Duration) {
    let _ = stream.set_nodelay(true);
    let _ = stream.set_read_timeout(Some(read_timeout));

    loop {
        let mut ctx = match parser::read_request(&mut stream) {
            Ok(ctx) => ctx,
            // Short read or malformed request: drop the connection silently.
            Err(e) => {
                tracing::trace!(error = %e, "connection ended");
                return;
            }
        };
        tracing::debug!(method = ctx.method.as_str(), path = %ctx.path, "request");

        if wants_upgrade(&ctx) {
            match try_upgrade(stream, ctx, &router) {
                UpgradeOutcome::Taken => return,
                UpgradeOutcome::Declined(returned_stream, returned_ctx) => {
                    stream = returned_stream;
                    ctx = returned_ctx;
                }
            }
        }

        let keep_alive_requested = ctx.keep_alive;
        let response = dispatch(&router, &mut ctx);

        match write_response(&mut stream, &response, keep_alive_requested) {
            Ok(true) => continue,
            Ok(false) => return,
            Err(e) => {
                tracing::debug!(error = %e, "response write failed");
                return;
            }
        }
    }
}

fn wants_upgrade(ctx: &RequestContext) -> bool {
    ctx.header("upgrade")
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

enum UpgradeOutcome {
    /// Socket now belongs to a WebSocket worker thread.
    Taken,
    /// No route or no key; continue as a plain HTTP request.
    Declined(TcpStream, RequestContext),
}

/// Completes the RFC 6455 handshake and moves the socket onto a dedicated
/// worker thread. The request context travels with the connection so
/// callbacks can read path parameters.
fn try_upgrade(mut stream: TcpStream, mut ctx: RequestContext, router: &Arc<Router>) -> UpgradeOutcome {
    let callbacks = match router.match_websocket(&mut ctx) {
        Some(route) => route.callbacks.clone(),
        None => return UpgradeOutcome::Declined(stream, ctx),
    };
    let key = match ctx.header("sec-websocket-key") {
        Some(key) => key.trim().to_string(),
        None => return UpgradeOutcome::Declined(stream, ctx),
    };

    let accept = ws::accept_key(&key);
    let handshake = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        accept
    );
    if stream
        .write_all(handshake.as_bytes())
        .and_then(|_| stream.flush())
        .is_err()
    {
        return UpgradeOutcome::Taken;
    }

    let spawned = thread::Builder::new()
        .name("mazurka-ws".to_string())
        .spawn(move || ws::run_websocket(stream, callbacks, ctx));
    if let Err(e) = spawned {
        tracing::error!(error = %e, "could not spawn websocket worker");
    }
    UpgradeOutcome::Taken
}

/// Routes the request; a GET the router misses falls back to the static
/// mount table. A panicking handler turns into a 500 (which in turn forces
/// the connection closed via the keep-alive gate).
fn dispatch(router: &Arc<Router>, ctx: &mut RequestContext) -> Response {
    match catch_unwind(AssertUnwindSafe(|| router.dispatch(ctx))) {
        Ok(Some(response)) => response,
        Ok(None) => {
            if ctx.method == Method::Get {
                static_files::try_serve(router.mounts(), &ctx.path)
            } else {
                Response::not_found()
            }
        }
        Err(_) => {
            tracing::error!(path = %ctx.path, "handler panicked");
            Response::internal_error()
        }
    }
}
