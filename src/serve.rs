//! Preview server for the build output.
//!
//! A small `tiny_http` server for local development:
//!
//! - Static file serving from the build output directory
//! - Automatic `index.html` resolution for directories
//! - File watching and auto-rebuild (via `watch` module)
//! - Graceful shutdown on Ctrl+C
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          ▼                       ▼
//!    Serve files             Rebuild into staging,
//!    from <output>           swap into <output>
//! ```
//!
//! The output directory is only ever replaced whole, so a request never sees
//! a half-written build.

use crate::{
    config::{SiteConfig, cfg},
    log,
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    io::Cursor,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Serve the output directory until Ctrl+C, rebuilding on change when
/// watching is enabled.
pub fn serve_site() -> Result<()> {
    let c = cfg();
    let interface: IpAddr = c
        .serve
        .interface
        .parse()
        .with_context(|| format!("[serve.interface] `{}` is not an IP address", c.serve.interface))?;

    let (server, addr) = try_bind_port(interface, c.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if c.serve.watch {
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking() {
                log!("watch"; "{err}");
            }
        });
    }

    for request in server.incoming_requests() {
        // Re-load config on each request to pick up hot-reloaded changes
        if let Err(e) = handle_request(request, &cfg()) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map_or_else(|| "no attempt made".to_owned(), |e| e.to_string())
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// Handle a single HTTP request.
fn handle_request(request: Request, config: &SiteConfig) -> Result<()> {
    match resolve_request_path(&config.build.output, request.url()) {
        Some(path) => serve_file(request, &path),
        None => serve_not_found(request),
    }
}

/// Map a request URL to a file under `serve_root`.
///
/// Resolution order: exact file, then `index.html` inside a directory, then
/// `<path>.html` so `/about` finds `about.html`.
fn resolve_request_path(serve_root: &Path, url: &str) -> Option<PathBuf> {
    // Strip query string and fragment before decoding
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let decoded = urlencoding::decode(path).ok()?;
    let request_path = decoded.trim_matches('/');

    // Reject anything that could climb out of the output directory
    if Path::new(request_path)
        .components()
        .any(|c| !matches!(c, std::path::Component::Normal(_)))
    {
        return None;
    }

    let local_path = serve_root.join(request_path);
    if local_path.is_file() {
        return Some(local_path);
    }
    if local_path.is_dir() {
        let index = local_path.join("index.html");
        return index.is_file().then_some(index);
    }
    let html = serve_root.join(format!("{request_path}.html"));
    html.is_file().then_some(html)
}

// ============================================================================
// Response Helpers
// ============================================================================

fn content_type_header(value: &str) -> Result<Header> {
    Header::from_bytes("Content-Type", value).map_err(|()| anyhow!("invalid header value: {value}"))
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = Response::from_data(content).with_header(content_type_header(guess_content_type(path))?);
    request.respond(response)?;
    Ok(())
}

/// Serve 404 Not Found response.
fn serve_not_found(request: Request) -> Result<()> {
    const BODY: &str = "404 Not Found";
    let response = Response::new(
        StatusCode(404),
        vec![content_type_header("text/plain; charset=utf-8")?],
        Cursor::new(BODY),
        Some(BODY.len()),
        None,
    );
    request.respond(response)?;
    Ok(())
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json" | "map") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("home.html"), "<p>home</p>").unwrap();
        fs::create_dir_all(root.join("blog")).unwrap();
        fs::write(root.join("blog/index.html"), "<p>blog</p>").unwrap();
        fs::create_dir_all(root.join("static/js")).unwrap();
        fs::write(root.join("static/js/my page.js"), "").unwrap();
        dir
    }

    #[test]
    fn test_resolve_exact_file() {
        let dir = output();
        assert_eq!(
            resolve_request_path(dir.path(), "/home.html?t=1"),
            Some(dir.path().join("home.html"))
        );
    }

    #[test]
    fn test_resolve_directory_index() {
        let dir = output();
        assert_eq!(
            resolve_request_path(dir.path(), "/blog/"),
            Some(dir.path().join("blog/index.html"))
        );
        assert_eq!(resolve_request_path(dir.path(), "/static/"), None);
    }

    #[test]
    fn test_resolve_extensionless_page() {
        let dir = output();
        assert_eq!(
            resolve_request_path(dir.path(), "/home"),
            Some(dir.path().join("home.html"))
        );
    }

    #[test]
    fn test_resolve_decodes_url() {
        let dir = output();
        assert_eq!(
            resolve_request_path(dir.path(), "/static/js/my%20page.js"),
            Some(dir.path().join("static/js/my page.js"))
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = output();
        assert_eq!(resolve_request_path(dir.path(), "/../etc/passwd"), None);
        assert_eq!(resolve_request_path(dir.path(), "/blog/%2e%2e/home.html"), None);
    }

    #[test]
    fn test_resolve_missing() {
        let dir = output();
        assert_eq!(resolve_request_path(dir.path(), "/nope.html"), None);
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.HTML")), "text/html; charset=utf-8");
        assert_eq!(
            guess_content_type(Path::new("static/js/home.bundle.js")),
            "application/javascript; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("static/imgs/logo.png")), "image/png");
        assert_eq!(guess_content_type(Path::new("LICENSE")), "application/octet-stream");
    }
}
