// src/writer.rs
use std::io::{self, Write};

use crate::http::{status_message, Response, ResponseKind};

/// Serializes one response onto `stream`.
///
/// Returns whether the connection stays open afterwards: the client must
/// have asked for keep-alive and the status must be below 400. Any 4xx/5xx
/// forces `Connection: close`.
pub fn write_response<W: Write>(
    stream: &mut W,
    response: &Response,
    keep_alive_requested: bool,
) -> io::Result<bool> {
    let keep_alive = keep_alive_requested && response.status < 400;
    let redirect = response.kind == ResponseKind::Redirect;

    let mut head = Vec::with_capacity(256);
    write!(
        head,
        "HTTP/1.1 {} {}\r\n",
        response.status,
        status_message(response.status)
    )?;

    if redirect {
        let location = response
            .headers
            .get("Location")
            .map(|v| v.as_str())
            .unwrap_or("");
        write!(head, "Location: {}\r\n", location)?;
        head.extend_from_slice(b"Content-Length: 0\r\n");
    } else {
        let content_type = response
            .headers
            .get("Content-Type")
            .map(|v| v.as_str())
            .unwrap_or_else(|| response.kind.default_content_type());
        write!(head, "Content-Type: {}\r\n", content_type)?;
        write!(head, "Content-Length: {}\r\n", response.body.len())?;
    }

    for (name, value) in &response.headers {
        if name.eq_ignore_ascii_case("content-type")
            || name.eq_ignore_ascii_case("content-length")
            || name.eq_ignore_ascii_case("connection")
            || (redirect && name.eq_ignore_ascii_case("location"))
        {
            continue;
        }
        write!(head, "{}: {}\r\n", name, value)?;
    }

    write!(
        head,
        "Connection: {}\r\n\r\n",
        if keep_alive { "keep-alive" } else { "close" }
    )?;

    stream.write_all(&head)?;
    if !redirect {
        stream.write_all(&response.body)?;
    }
    stream.flush()?;

    Ok(keep_alive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;

    fn render(response: &Response, keep_alive: bool) -> (String, bool) {
        let mut out = Vec::new();
        let keep = write_response(&mut out, response, keep_alive).unwrap();
        (String::from_utf8(out).unwrap(), keep)
    }

    #[test]
    fn test_status_line_and_default_content_type() {
        let (out, keep) = render(&Response::html("<h1>hi</h1>"), false);
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Type: text/html\r\n"));
        assert!(out.contains("Content-Length: 11\r\n"));
        assert!(out.contains("Connection: close\r\n"));
        assert!(out.ends_with("\r\n\r\n<h1>hi</h1>"));
        assert!(!keep);
    }

    #[test]
    fn test_explicit_content_type_wins_and_is_not_duplicated() {
        let resp = Response::blob(vec![0u8]).header("Content-Type", "image/png");
        let (out, _) = render(&resp, false);
        assert_eq!(out.matches("Content-Type:").count(), 1);
        assert!(out.contains("Content-Type: image/png\r\n"));
    }

    #[test]
    fn test_keep_alive_honoured_below_400() {
        let (out, keep) = render(&Response::text("ok"), true);
        assert!(out.contains("Connection: keep-alive\r\n"));
        assert!(keep);
    }

    #[test]
    fn test_error_status_forces_close() {
        let (out, keep) = render(&Response::not_found(), true);
        assert!(out.contains("Connection: close\r\n"));
        assert!(!keep);

        let (out, keep) = render(&Response::internal_error(), true);
        assert!(out.contains("Connection: close\r\n"));
        assert!(!keep);
    }

    #[test]
    fn test_redirect_emits_location_and_no_body() {
        let (out, _) = render(&Response::see_other("/next"), false);
        assert!(out.starts_with("HTTP/1.1 303 See Other\r\nLocation: /next\r\n"));
        assert!(out.contains("Content-Length: 0\r\n"));
        assert_eq!(out.matches("Location:").count(), 1);
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_unknown_status_message() {
        let (out, _) = render(&Response::text("x").with_status(299), false);
        assert!(out.starts_with("HTTP/1.1 299 Unknown\r\n"));
    }

    #[test]
    fn test_additional_headers_are_emitted() {
        let resp = Response::text("ok").header("X-Request-Id", "42");
        let (out, _) = render(&resp, false);
        assert!(out.contains("X-Request-Id: 42\r\n"));
    }
}
