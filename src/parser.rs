// src/parser.rs
use std::collections::HashMap;
use std::io::Read;

use crate::error::{MazurkaError, MazurkaResult};
use crate::http::{Method, RequestContext};

/// Header block must fit in this many bytes. Bodies are not bounded by it;
/// they are read to their declared `Content-Length`.
pub const HEADER_BUF_SIZE: usize = 8192;

/// Reads exactly one HTTP/1.1 request off `stream`.
///
/// Blocks until the `\r\n\r\n` header terminator is seen, then keeps reading
/// until `Content-Length` bytes of body are buffered. EOF or a socket error
/// before that point reports [`MazurkaError::ConnectionClosed`]; the caller
/// drops the connection silently.
pub fn read_request<S: Read>(stream: &mut S) -> MazurkaResult<RequestContext> {
    let mut buf: Vec<u8> = Vec::with_capacity(HEADER_BUF_SIZE);
    let mut chunk = [0u8; HEADER_BUF_SIZE];

    let header_end = loop {
        if let Some(pos) = memchr::memmem::find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() >= HEADER_BUF_SIZE {
            return Err(MazurkaError::Parse(format!(
                "header block exceeds {} bytes",
                HEADER_BUF_SIZE
            )));
        }
        let room = HEADER_BUF_SIZE - buf.len();
        match stream.read(&mut chunk[..room]) {
            Ok(0) | Err(_) => return Err(MazurkaError::ConnectionClosed),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = parse_head(&buf[..header_end - 4])?;

    let mut body = buf[header_end..].to_vec();
    if let Some(expected) = head.content_length {
        while body.len() < expected {
            match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return Err(MazurkaError::ConnectionClosed),
                Ok(n) => body.extend_from_slice(&chunk[..n]),
            }
        }
        body.truncate(expected);
    }

    Ok(RequestContext {
        method: head.method,
        path: head.path,
        params: HashMap::new(),
        query: head.query,
        body: String::from_utf8_lossy(&body).into_owned(),
        headers: head.headers,
        keep_alive: head.keep_alive,
    })
}

pub(crate) struct RequestHead {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: Vec<(String, String)>,
    pub content_length: Option<usize>,
    pub keep_alive: bool,
}

/// Parses the request line and header lines (everything before the blank
/// line, terminator excluded).
pub(crate) fn parse_head(head: &[u8]) -> MazurkaResult<RequestHead> {
    let mut lines = head.split(|&b| b == b'\n').map(|l| l.strip_suffix(b"\r").unwrap_or(l));

    let request_line = lines
        .next()
        .ok_or_else(|| MazurkaError::Parse("empty request".to_string()))?;

    let mut parts = request_line.splitn(3, |&b| b == b' ');
    let method_bytes = parts
        .next()
        .ok_or_else(|| MazurkaError::Parse("missing method".to_string()))?;
    let target = parts
        .next()
        .ok_or_else(|| MazurkaError::Parse("missing request target".to_string()))?;
    let method = Method::from_bytes(method_bytes);

    let target =
        std::str::from_utf8(target).map_err(|_| MazurkaError::Parse("target is not UTF-8".to_string()))?;
    let (path, raw_query) = match target.find('?') {
        Some(idx) => (&target[..idx], &target[idx + 1..]),
        None => (target, ""),
    };

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let colon = match line.iter().position(|&b| b == b':') {
            Some(idx) => idx,
            None => return Err(MazurkaError::Parse("header line without colon".to_string())),
        };
        let name = std::str::from_utf8(&line[..colon])
            .map_err(|_| MazurkaError::Parse("header name is not UTF-8".to_string()))?;
        let value = std::str::from_utf8(&line[colon + 1..])
            .map_err(|_| MazurkaError::Parse("header value is not UTF-8".to_string()))?
            .trim();
        headers.push((name.to_string(), value.to_string()));
    }

    let mut content_length = None;
    let mut keep_alive = false;
    for (name, value) in &headers {
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().ok();
        } else if name.eq_ignore_ascii_case("connection") && value.eq_ignore_ascii_case("keep-alive")
        {
            keep_alive = true;
        }
    }

    Ok(RequestHead {
        method,
        path: path.to_string(),
        query: parse_query(raw_query),
        headers,
        content_length,
        keep_alive,
    })
}

/// Splits `a=1&b=2` into a map. A token without `=` maps to the empty
/// string. Values are left percent-encoded.
fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut query = HashMap::new();
    for token in raw.split('&') {
        if token.is_empty() {
            continue;
        }
        match token.find('=') {
            Some(idx) => query.insert(token[..idx].to_string(), token[idx + 1..].to_string()),
            None => query.insert(token.to_string(), String::new()),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_basic_request() {
        let raw = b"GET /some/path?foo=bar&page=2 HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n";
        let ctx = read_request(&mut Cursor::new(&raw[..])).unwrap();

        assert_eq!(ctx.method, Method::Get);
        assert_eq!(ctx.path, "/some/path");
        assert_eq!(ctx.query.get("foo").unwrap(), "bar");
        assert_eq!(ctx.query.get("page").unwrap(), "2");
        assert_eq!(ctx.header("host"), Some("localhost"));
        assert!(ctx.keep_alive);
        assert!(ctx.body.is_empty());
    }

    #[test]
    fn test_body_read_to_content_length() {
        let raw = b"POST /api/users HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let ctx = read_request(&mut Cursor::new(&raw[..])).unwrap();
        assert_eq!(ctx.method, Method::Post);
        assert_eq!(ctx.body, "hello");
    }

    #[test]
    fn test_body_larger_than_first_read() {
        // Body split across reads: Cursor serves it in one go, so force a
        // reader that trickles bytes.
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
                if self.0.is_empty() {
                    return Ok(0);
                }
                out[0] = self.0[0];
                self.0 = &self.0[1..];
                Ok(1)
            }
        }
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world";
        let ctx = read_request(&mut Trickle(&raw[..])).unwrap();
        assert_eq!(ctx.body, "hello world");
    }

    #[test]
    fn test_short_read_reports_closed() {
        let raw = b"GET /incomplete HTTP/1.1\r\nHost: x\r\n";
        let err = read_request(&mut Cursor::new(&raw[..])).unwrap_err();
        assert!(matches!(err, MazurkaError::ConnectionClosed));
    }

    #[test]
    fn test_oversized_header_block_rejected() {
        let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
        raw.extend(std::iter::repeat(b'a').take(HEADER_BUF_SIZE));
        let err = read_request(&mut Cursor::new(raw)).unwrap_err();
        assert!(matches!(err, MazurkaError::Parse(_)));
    }

    #[test]
    fn test_query_token_without_equals() {
        let q = parse_query("flag&x=1");
        assert_eq!(q.get("flag").unwrap(), "");
        assert_eq!(q.get("x").unwrap(), "1");
    }

    #[test]
    fn test_query_values_stay_percent_encoded() {
        let q = parse_query("q=a%20b");
        assert_eq!(q.get("q").unwrap(), "a%20b");
    }

    #[test]
    fn test_keep_alive_detection_is_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nCONNECTION: Keep-Alive\r\n\r\n";
        let ctx = read_request(&mut Cursor::new(&raw[..])).unwrap();
        assert!(ctx.keep_alive);

        let raw = b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n";
        let ctx = read_request(&mut Cursor::new(&raw[..])).unwrap();
        assert!(!ctx.keep_alive);
    }
}
