//! Minimal application: a few routes, a static mount, a WebSocket echo.
//!
//! Run with `cargo run --example demo`, then:
//!   curl http://127.0.0.1:8080/
//!   curl http://127.0.0.1:8080/users/42
//!   curl -d hello http://127.0.0.1:8080/api/echo

use mazurka::{Response, Router, Server, WebSocketCallbacks};
use serde::Serialize;

#[derive(Serialize)]
struct SearchReply {
    q: String,
    page: String,
}

fn main() -> mazurka::MazurkaResult<()> {
    mazurka::init_logging();

    let mut router = Router::new();
    router.get("/", |_| Response::html("<h1>mazurka</h1>"))?;
    router.get("/users/:id", |ctx| {
        Response::text(format!("user {}", ctx.params["id"]))
    })?;
    router.get("/search", |ctx| {
        Response::json_value(&SearchReply {
            q: ctx.query.get("q").cloned().unwrap_or_default(),
            page: ctx.query.get("page").cloned().unwrap_or_default(),
        })
    })?;
    router.post("/api/echo", |ctx| Response::text(ctx.body.clone()))?;
    router.get("/old", |_| Response::permanent_redirect("/"))?;
    router.mount("/static", "./public", true)?;

    router.websocket(
        "/ws/echo",
        WebSocketCallbacks::new()
            .on_message(|conn, msg| conn.send_text(msg))
            .on_binary(|conn, data| conn.send_binary(data)),
    )?;

    Server::bind(8080)?.serve(router)
}
