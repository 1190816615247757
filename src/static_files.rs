// src/static_files.rs
use std::fs;
use std::path::PathBuf;

use crate::error::{MazurkaError, MazurkaResult};
use crate::http::{Response, ResponseKind};

/// Maps a URL prefix onto a filesystem root.
#[derive(Clone)]
pub struct StaticMount {
    url_prefix: String,
    fs_root: PathBuf,
    list_directories: bool,
}

impl StaticMount {
    pub(crate) fn new(
        url_prefix: &str,
        fs_root: impl Into<PathBuf>,
        list_directories: bool,
    ) -> MazurkaResult<Self> {
        if !url_prefix.starts_with('/') {
            return Err(MazurkaError::InvalidPattern {
                pattern: url_prefix.to_string(),
                reason: "mount prefix must start with '/'".to_string(),
            });
        }
        let url_prefix = if url_prefix.len() > 1 {
            url_prefix.trim_end_matches('/').to_string()
        } else {
            url_prefix.to_string()
        };
        Ok(Self {
            url_prefix,
            fs_root: fs_root.into(),
            list_directories,
        })
    }
}

/// Resolves `path` against the mount table, in registration order.
///
/// The canonicalized target must stay under the canonicalized root;
/// anything that escapes (e.g. via `..`) is refused with a 403. A path no
/// mount can resolve yields an empty 404.
pub(crate) fn try_serve(mounts: &[StaticMount], path: &str) -> Response {
    for mount in mounts {
        if !path.starts_with(&mount.url_prefix) {
            continue;
        }
        let relative = path[mount.url_prefix.len()..].trim_start_matches('/');
        let full = mount.fs_root.join(relative);

        let normalized_root = match fs::canonicalize(&mount.fs_root) {
            Ok(p) => p,
            Err(_) => continue,
        };
        // Canonicalization fails when the target does not exist; the next
        // mount may still claim the path.
        let normalized = match fs::canonicalize(&full) {
            Ok(p) => p,
            Err(_) => continue,
        };
        if !normalized.starts_with(&normalized_root) {
            tracing::warn!(path, "static request escapes mount root");
            return Response::forbidden();
        }

        if normalized.is_dir() {
            let index = normalized.join("index.html");
            if index.is_file() {
                return match fs::read(&index) {
                    Ok(bytes) => Response::new(200, ResponseKind::Html, bytes),
                    Err(e) => {
                        tracing::error!(error = %e, "static read failed");
                        Response::internal_error()
                    }
                };
            }
            if mount.list_directories {
                return match render_listing(&normalized, path) {
                    Ok(html) => Response::html(html),
                    Err(e) => {
                        tracing::error!(error = %e, "directory listing failed");
                        Response::internal_error()
                    }
                };
            }
            return Response::forbidden();
        }

        return match fs::read(&normalized) {
            Ok(bytes) => {
                Response::new(200, ResponseKind::Blob, bytes).header("Content-Type", content_type(&normalized))
            }
            Err(e) => {
                tracing::error!(error = %e, "static read failed");
                Response::internal_error()
            }
        };
    }
    Response::new(404, ResponseKind::Plaintext, "")
}

/// Content type from the lowercased file extension; unknown extensions fall
/// back to application/octet-stream.
fn content_type(path: &std::path::Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    mime_guess::from_ext(&ext)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// One page of links for the directory's immediate children, sub-directories
/// suffixed with `/`.
fn render_listing(dir: &std::path::Path, url_path: &str) -> std::io::Result<String> {
    let mut entries: Vec<(String, bool)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type()?.is_dir();
        entries.push((name, is_dir));
    }
    entries.sort();

    let base = url_path.trim_end_matches('/');
    let mut html = String::with_capacity(256 + entries.len() * 64);
    html.push_str("<!DOCTYPE html>\n<html><head><title>Index of ");
    html.push_str(&escape_html(url_path));
    html.push_str("</title></head><body>\n<h1>Index of ");
    html.push_str(&escape_html(url_path));
    html.push_str("</h1>\n<ul>\n<li><a href=\"../\">..</a></li>\n");
    for (name, is_dir) in &entries {
        let suffix = if *is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<li><a href=\"{base}/{href}{suffix}\">{label}{suffix}</a></li>\n",
            href = escape_html(name),
            label = escape_html(name),
        ));
    }
    html.push_str("</ul>\n</body></html>\n");
    Ok(html)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
