//! Read-only file serving for the output root.
//!
//! Resolution for `GET /some/path`:
//!
//! 1. percent-decode the path; any `..` segment or backslash → 404
//! 2. a directory resolves to its `index.html`
//! 3. a missing path is retried with `.html` appended
//! 4. anything still unreadable → 404
//!
//! Paths under `/api/` are never served from disk, and neither are the
//! quarantine directory and the data file. In live mode the site is
//! regenerated before every read so template edits show up immediately.

use crate::layout;
use crate::server::AppState;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub async fn serve(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if uri.path().starts_with("/api/") {
        return not_found();
    }
    let Some(relative) = relative_path(uri.path()) else {
        return not_found();
    };
    if layout::is_private(&relative) {
        debug!(path = %uri.path(), "refusing to serve server state");
        return not_found();
    }

    if state.site.is_live() {
        let gallery = state.gallery.lock().await;
        if let Err(e) = state.site.regenerate(&gallery).await {
            error!(error = %e, "live regeneration failed");
        }
    }

    let Some(path) = resolve(&state.layout.root, &relative).await else {
        debug!(path = %uri.path(), "not found");
        return not_found();
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mut response = bytes.into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type(&path)),
            );
            response
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable");
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 Not Found").into_response()
}

/// Turn a request path into a relative filesystem path, refusing anything
/// that could step outside the root.
fn relative_path(request_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode(request_path)?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains(['\\', '\0']) => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

async fn resolve(root: &Path, relative: &Path) -> Option<PathBuf> {
    let path = root.join(relative);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => Some(path.join("index.html")),
        Ok(_) => Some(path),
        Err(_) => {
            let mut with_ext = path.into_os_string();
            with_ext.push(".html");
            Some(PathBuf::from(with_ext))
        }
    }
}

/// Decode `%XX` escapes. Returns `None` for malformed escapes or invalid UTF-8.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}
