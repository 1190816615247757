//! WebSocket chat room: every text message is broadcast to all connected
//! clients. The server does not serialize handler state, so the room list
//! carries its own lock.

use std::sync::{Arc, Mutex};

use mazurka::{Response, Router, Server, WebSocketCallbacks, WebSocketConnection};

const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<input id="line"><button onclick="send()">send</button>
<pre id="log"></pre>
<script>
const ws = new WebSocket(`ws://${location.host}/ws/chat`);
ws.onmessage = e => log.textContent += e.data + "\n";
function send() { ws.send(line.value); line.value = ""; }
</script>
</body></html>
"#;

type Room = Arc<Mutex<Vec<Arc<WebSocketConnection>>>>;

fn main() -> mazurka::MazurkaResult<()> {
    mazurka::init_logging();

    let room: Room = Arc::new(Mutex::new(Vec::new()));
    let mut router = Router::new();
    router.get("/", |_| Response::html(PAGE))?;

    let on_join = room.clone();
    let on_line = room.clone();
    let on_leave = room.clone();
    router.websocket(
        "/ws/chat",
        WebSocketCallbacks::new()
            .on_connect(move |conn| {
                on_join.lock().unwrap().push(conn.clone());
                conn.send_text("* joined the room");
            })
            .on_message(move |_conn, msg| {
                for peer in on_line.lock().unwrap().iter() {
                    peer.send_text(msg);
                }
            })
            .on_close(move |conn| {
                on_leave.lock().unwrap().retain(|peer| !Arc::ptr_eq(peer, conn));
            }),
    )?;

    Server::bind(8080)?.serve(router)
}
