// src/http.rs
use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Unknown,
}

impl Method {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"GET" => Method::Get,
            b"POST" => Method::Post,
            b"PUT" => Method::Put,
            b"DELETE" => Method::Delete,
            b"PATCH" => Method::Patch,
            b"HEAD" => Method::Head,
            b"OPTIONS" => Method::Options,
            _ => Method::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Unknown => "UNKNOWN",
        }
    }
}

/// What the body bytes of a [`Response`] are.
///
/// The kind decides the default `Content-Type` the writer emits when the
/// handler did not set one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Html,
    Json,
    Plaintext,
    Blob,
    Redirect,
}

impl ResponseKind {
    pub fn default_content_type(&self) -> &'static str {
        match self {
            ResponseKind::Html => "text/html",
            ResponseKind::Json => "application/json",
            ResponseKind::Plaintext => "text/plain",
            ResponseKind::Blob => "application/octet-stream",
            ResponseKind::Redirect => "text/plain",
        }
    }
}

/// Maps a status code to its reason phrase. Codes outside the table are
/// emitted as `Unknown`.
pub fn status_message(code: u16) -> &'static str {
    match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

pub struct Response {
    pub status: u16,
    pub kind: ResponseKind,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Response {
    pub fn new(status: u16, kind: ResponseKind, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            kind,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::new(200, ResponseKind::Html, body.into())
    }

    pub fn json(body: impl Into<String>) -> Self {
        Self::new(200, ResponseKind::Json, body.into())
    }

    /// Serializes `val` with serde and wraps it as a JSON response.
    /// Serialization failure degrades to a 500 with a JSON error body.
    pub fn json_value<T: Serialize>(val: &T) -> Self {
        match serde_json::to_vec(val) {
            Ok(body) => Self::new(200, ResponseKind::Json, body),
            Err(_) => Self::new(
                500,
                ResponseKind::Json,
                &b"{\"error\":\"serialization failed\"}"[..],
            ),
        }
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200, ResponseKind::Plaintext, body.into())
    }

    pub fn blob(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, ResponseKind::Blob, body)
    }

    /// A redirect carries no body; the target goes in the `Location` header.
    pub fn redirect(location: impl Into<String>, code: u16) -> Self {
        let mut resp = Self::new(code, ResponseKind::Redirect, Vec::new());
        resp.headers.insert("Location".to_string(), location.into());
        resp
    }

    pub fn permanent_redirect(location: impl Into<String>) -> Self {
        Self::redirect(location, 301)
    }

    pub fn temporary_redirect(location: impl Into<String>) -> Self {
        Self::redirect(location, 302)
    }

    pub fn see_other(location: impl Into<String>) -> Self {
        Self::redirect(location, 303)
    }

    pub fn not_found() -> Self {
        Self::new(404, ResponseKind::Plaintext, "404 Not Found")
    }

    pub fn internal_error() -> Self {
        Self::new(500, ResponseKind::Plaintext, "500 Internal Server Error")
    }

    pub fn forbidden() -> Self {
        Self::new(403, ResponseKind::Plaintext, "403 Forbidden")
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Everything a handler gets to see about one request.
///
/// `params` is filled by the router on a successful match; the parser fills
/// the rest. The context lives for a single request and is never shared.
#[derive(Debug)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub keep_alive: bool,
}

impl RequestContext {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpers_set_kind_and_status() {
        let r = Response::html("<p>x</p>");
        assert_eq!(r.status, 200);
        assert_eq!(r.kind, ResponseKind::Html);
        assert_eq!(r.body, b"<p>x</p>");

        let r = Response::blob(vec![1u8, 2, 3]).with_status(201);
        assert_eq!(r.status, 201);
        assert_eq!(r.kind, ResponseKind::Blob);
    }

    #[test]
    fn test_redirect_sets_location_and_empty_body() {
        let r = Response::redirect("/elsewhere", 302);
        assert_eq!(r.status, 302);
        assert_eq!(r.kind, ResponseKind::Redirect);
        assert!(r.body.is_empty());
        assert_eq!(r.headers.get("Location").unwrap(), "/elsewhere");

        assert_eq!(Response::permanent_redirect("/a").status, 301);
        assert_eq!(Response::temporary_redirect("/a").status, 302);
        assert_eq!(Response::see_other("/a").status, 303);
    }

    #[test]
    fn test_status_message_table() {
        assert_eq!(status_message(200), "OK");
        assert_eq!(status_message(308), "Permanent Redirect");
        assert_eq!(status_message(405), "Method Not Allowed");
        assert_eq!(status_message(599), "Unknown");
    }

    #[test]
    fn test_json_value() {
        #[derive(Serialize)]
        struct Msg {
            message: &'static str,
        }
        let r = Response::json_value(&Msg { message: "hi" });
        assert_eq!(r.status, 200);
        assert_eq!(r.body, br#"{"message":"hi"}"#);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let ctx = RequestContext {
            method: Method::Get,
            path: "/".to_string(),
            params: HashMap::new(),
            query: HashMap::new(),
            body: String::new(),
            headers: vec![("Sec-WebSocket-Key".to_string(), "abc".to_string())],
            keep_alive: false,
        };
        assert_eq!(ctx.header("sec-websocket-key"), Some("abc"));
        assert_eq!(ctx.header("missing"), None);
    }
}
