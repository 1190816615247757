// src/router.rs
use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;

use crate::error::{MazurkaError, MazurkaResult};
use crate::http::{Method, RequestContext, Response};
use crate::static_files::StaticMount;
use crate::ws::WebSocketCallbacks;

pub type Handler = Arc<dyn Fn(&RequestContext) -> Response + Send + Sync>;

/// One registered route: the original pattern, its matcher compiled once at
/// registration, and the parameter names in capture order.
#[derive(Clone)]
pub struct RoutePattern {
    pub pattern: String,
    pub method: Method,
    regex: Regex,
    param_names: Vec<String>,
    handler: Handler,
}

#[derive(Clone)]
pub struct WebSocketRoute {
    pub pattern: String,
    regex: Regex,
    param_names: Vec<String>,
    pub(crate) callbacks: WebSocketCallbacks,
}

/// Compiles `/users/:id/posts/:post_id` into an anchored regex with one
/// `([^/]+)` capture per `:name` segment. Literal text is escaped, so a dot
/// in a registered path matches only a dot. Duplicate names are rejected.
fn compile_pattern(pattern: &str) -> MazurkaResult<(Regex, Vec<String>)> {
    let mut source = String::with_capacity(pattern.len() + 8);
    let mut param_names: Vec<String> = Vec::new();
    source.push('^');

    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &pattern[i..];
        if bytes[i] == b':'
            && rest.len() > 1
            && (bytes[i + 1].is_ascii_alphabetic() || bytes[i + 1] == b'_')
        {
            let name_len = rest[1..]
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len() - 1);
            let name = &rest[1..1 + name_len];
            if param_names.iter().any(|n| n == name) {
                return Err(MazurkaError::DuplicateParam {
                    pattern: pattern.to_string(),
                    name: name.to_string(),
                });
            }
            param_names.push(name.to_string());
            source.push_str("([^/]+)");
            i += 1 + name_len;
        } else {
            let ch = rest.chars().next().unwrap_or('\0');
            source.push_str(&regex::escape(&rest[..ch.len_utf8()]));
            i += ch.len_utf8();
        }
    }
    source.push('$');

    let regex = Regex::new(&source).map_err(|e| MazurkaError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    debug_assert_eq!(regex.captures_len(), param_names.len() + 1);
    Ok((regex, param_names))
}

fn capture_params(regex: &Regex, param_names: &[String], path: &str) -> Option<Vec<(String, String)>> {
    let captures = regex.captures(path)?;
    let mut params = Vec::with_capacity(param_names.len());
    for (idx, name) in param_names.iter().enumerate() {
        let value = captures.get(idx + 1).map(|m| m.as_str()).unwrap_or("");
        params.push((name.clone(), value.to_string()));
    }
    Some(params)
}

/// Holds everything the application registers: HTTP routes, WebSocket
/// routes, and static mounts. Immutable once handed to the server.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<RoutePattern>,
    ws_routes: Vec<WebSocketRoute>,
    mounts: Vec<StaticMount>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Fn(&RequestContext) -> Response + Send + Sync + 'static,
    ) -> MazurkaResult<()> {
        let (regex, param_names) = compile_pattern(pattern)?;
        self.routes.push(RoutePattern {
            pattern: pattern.to_string(),
            method,
            regex,
            param_names,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn get(
        &mut self,
        pattern: &str,
        handler: impl Fn(&RequestContext) -> Response + Send + Sync + 'static,
    ) -> MazurkaResult<()> {
        self.route(Method::Get, pattern, handler)
    }

    pub fn post(
        &mut self,
        pattern: &str,
        handler: impl Fn(&RequestContext) -> Response + Send + Sync + 'static,
    ) -> MazurkaResult<()> {
        self.route(Method::Post, pattern, handler)
    }

    pub fn put(
        &mut self,
        pattern: &str,
        handler: impl Fn(&RequestContext) -> Response + Send + Sync + 'static,
    ) -> MazurkaResult<()> {
        self.route(Method::Put, pattern, handler)
    }

    pub fn patch(
        &mut self,
        pattern: &str,
        handler: impl Fn(&RequestContext) -> Response + Send + Sync + 'static,
    ) -> MazurkaResult<()> {
        self.route(Method::Patch, pattern, handler)
    }

    pub fn delete(
        &mut self,
        pattern: &str,
        handler: impl Fn(&RequestContext) -> Response + Send + Sync + 'static,
    ) -> MazurkaResult<()> {
        self.route(Method::Delete, pattern, handler)
    }

    pub fn websocket(&mut self, pattern: &str, callbacks: WebSocketCallbacks) -> MazurkaResult<()> {
        let (regex, param_names) = compile_pattern(pattern)?;
        self.ws_routes.push(WebSocketRoute {
            pattern: pattern.to_string(),
            regex,
            param_names,
            callbacks,
        });
        Ok(())
    }

    /// Registers a static mount: requests under `url_prefix` are served from
    /// `fs_root`. With `list_directories`, directories without an
    /// `index.html` render a generated index.
    pub fn mount(
        &mut self,
        url_prefix: &str,
        fs_root: impl Into<PathBuf>,
        list_directories: bool,
    ) -> MazurkaResult<()> {
        self.mounts
            .push(StaticMount::new(url_prefix, fs_root, list_directories)?);
        Ok(())
    }

    /// First-registered-wins dispatch. Fills `ctx.params` and runs the
    /// handler on a match; `None` means no route claimed the request.
    pub(crate) fn dispatch(&self, ctx: &mut RequestContext) -> Option<Response> {
        for route in &self.routes {
            if route.method != ctx.method {
                continue;
            }
            if let Some(params) = capture_params(&route.regex, &route.param_names, &ctx.path) {
                ctx.params.extend(params);
                return Some((route.handler)(ctx));
            }
        }
        None
    }

    pub(crate) fn match_websocket(&self, ctx: &mut RequestContext) -> Option<&WebSocketRoute> {
        for route in &self.ws_routes {
            if let Some(params) = capture_params(&route.regex, &route.param_names, &ctx.path) {
                ctx.params.extend(params);
                return Some(route);
            }
        }
        None
    }

    pub(crate) fn mounts(&self) -> &[StaticMount] {
        &self.mounts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn ctx(method: Method, path: &str) -> RequestContext {
        RequestContext {
            method,
            path: path.to_string(),
            params: HashMap::new(),
            query: HashMap::new(),
            body: String::new(),
            headers: Vec::new(),
            keep_alive: false,
        }
    }

    #[test]
    fn test_static_route_match() {
        let mut router = Router::new();
        router.get("/hello/world", |_| Response::text("hi")).unwrap();

        assert!(router.dispatch(&mut ctx(Method::Get, "/hello/world")).is_some());
        assert!(router.dispatch(&mut ctx(Method::Get, "/hello")).is_none());
        assert!(router.dispatch(&mut ctx(Method::Post, "/hello/world")).is_none());
    }

    #[test]
    fn test_params_are_extracted_in_order() {
        let mut router = Router::new();
        router
            .get("/users/:id/posts/:post_id", |c| {
                Response::text(format!("{}/{}", c.params["id"], c.params["post_id"]))
            })
            .unwrap();

        let mut c = ctx(Method::Get, "/users/42/posts/abc");
        let resp = router.dispatch(&mut c).unwrap();
        assert_eq!(c.params["id"], "42");
        assert_eq!(c.params["post_id"], "abc");
        assert_eq!(resp.body, b"42/abc");
    }

    #[test]
    fn test_param_count_matches_capture_count() {
        let (regex, names) = compile_pattern("/a/:x/b/:y/:z").unwrap();
        assert_eq!(regex.captures_len() - 1, names.len());
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_param_does_not_cross_segments() {
        let mut router = Router::new();
        router.get("/users/:id", |_| Response::text("u")).unwrap();
        assert!(router.dispatch(&mut ctx(Method::Get, "/users/1/extra")).is_none());
    }

    #[test]
    fn test_literal_dot_is_escaped() {
        let mut router = Router::new();
        router.get("/file.txt", |_| Response::text("f")).unwrap();
        assert!(router.dispatch(&mut ctx(Method::Get, "/file.txt")).is_some());
        assert!(router.dispatch(&mut ctx(Method::Get, "/fileatxt")).is_none());
    }

    #[test]
    fn test_first_registered_wins() {
        let mut router = Router::new();
        router.get("/users/:id", |_| Response::text("first")).unwrap();
        router.get("/users/admin", |_| Response::text("second")).unwrap();

        let resp = router.dispatch(&mut ctx(Method::Get, "/users/admin")).unwrap();
        assert_eq!(resp.body, b"first");
    }

    #[test]
    fn test_duplicate_param_rejected() {
        let mut router = Router::new();
        let err = router.get("/a/:id/b/:id", |_| Response::text("x")).unwrap_err();
        assert!(matches!(err, MazurkaError::DuplicateParam { ref name, .. } if name == "id"));
    }

    #[test]
    fn test_websocket_routes_match_with_params() {
        let mut router = Router::new();
        router
            .websocket("/ws/rooms/:room", WebSocketCallbacks::new())
            .unwrap();

        let mut c = ctx(Method::Get, "/ws/rooms/lobby");
        assert!(router.match_websocket(&mut c).is_some());
        assert_eq!(c.params["room"], "lobby");
        assert!(router.match_websocket(&mut ctx(Method::Get, "/ws")).is_none());
    }
}
