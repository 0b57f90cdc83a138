//! Static file server for browsing a finished mirror
//!
//! A minimal HTTP/1.1 server over a Tokio `TcpListener`. Each request path
//! is mapped through [`Link`], so nothing outside the served directory is
//! reachable. Directories resolve to their `index.html`. Every response
//! closes the connection.

use crate::{Link, MirrorError};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Default port of the mirror server
pub const DEFAULT_PORT: u16 = 8000;

/// Upper bound on the request head we read
const MAX_REQUEST: usize = 8192;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves one directory tree over HTTP
pub struct MirrorServer {
    root: Arc<PathBuf>,
    listener: TcpListener,
}

impl MirrorServer {
    /// Binds a server for `root` on `addr`
    ///
    /// # Arguments
    ///
    /// * `root` - Directory whose files are served
    /// * `addr` - Address to listen on; port 0 picks a free port
    ///
    /// # Returns
    ///
    /// * `Ok(MirrorServer)` - Bound and ready to accept
    /// * `Err(MirrorError)` - The address could not be bound
    pub async fn bind(root: impl Into<PathBuf>, addr: SocketAddr) -> Result<Self, MirrorError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            root: Arc::new(root.into()),
            listener,
        })
    }

    /// Returns the address the server listens on
    pub fn local_addr(&self) -> Result<SocketAddr, MirrorError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `cancel` fires
    ///
    /// Each connection is handled on its own task. Connections still being
    /// answered when `cancel` fires are left to finish.
    pub async fn run(self, cancel: &CancellationToken) -> Result<(), MirrorError> {
        tracing::info!(
            "Serving {} on http://{}",
            self.root.display(),
            self.listener.local_addr()?
        );

        loop {
            let (stream, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted?,
            };

            let root = Arc::clone(&self.root);
            tokio::spawn(async move {
                if let Err(e) = handle(stream, &root).await {
                    tracing::debug!(%peer, "connection failed: {}", e);
                }
            });
        }

        tracing::info!("Mirror server stopped");
        Ok(())
    }
}

/// Outcome of mapping a request onto the served tree
#[derive(Debug, PartialEq, Eq)]
enum Target {
    File(PathBuf),
    BadRequest,
}

async fn handle(mut stream: TcpStream, root: &Path) -> io::Result<()> {
    let mut buf = vec![0u8; MAX_REQUEST];
    let n = match tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf)).await {
        Ok(read) => read?,
        Err(_) => return Ok(()),
    };
    if n == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buf[..n]);
    let Some((method, path)) = parse_request_line(&request) else {
        return respond(&mut stream, "400 Bad Request", "text/plain", b"bad request", false).await;
    };

    let head_only = method.eq_ignore_ascii_case("HEAD");
    if !head_only && !method.eq_ignore_ascii_case("GET") {
        return respond(
            &mut stream,
            "405 Method Not Allowed",
            "text/plain",
            b"method not allowed",
            head_only,
        )
        .await;
    }

    let file = match resolve(root, path) {
        Target::File(file) => file,
        Target::BadRequest => {
            return respond(&mut stream, "400 Bad Request", "text/plain", b"bad request", head_only)
                .await;
        }
    };

    let file = match tokio::fs::metadata(&file).await {
        Ok(meta) if meta.is_dir() => file.join("index.html"),
        _ => file,
    };

    match tokio::fs::read(&file).await {
        Ok(body) => {
            tracing::debug!("{} {} -> 200", method, path);
            respond(&mut stream, "200 OK", content_type(&file), &body, head_only).await
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} {} -> 404", method, path);
            respond(&mut stream, "404 Not Found", "text/plain", b"not found", head_only).await
        }
        Err(e) => {
            tracing::warn!("failed to read {}: {}", file.display(), e);
            respond(
                &mut stream,
                "500 Internal Server Error",
                "text/plain",
                b"internal error",
                head_only,
            )
            .await
        }
    }
}

/// Returns the method and the path of the request line
fn parse_request_line(request: &str) -> Option<(&str, &str)> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?;
    let path = target.split(['?', '#']).next().unwrap_or(target);
    if !path.starts_with('/') {
        return None;
    }
    Some((method, path))
}

/// Maps a request path onto a file below `root`
fn resolve(root: &Path, path: &str) -> Target {
    let relative = path.trim_start_matches('/');
    if relative.is_empty() {
        return Target::File(root.join("index.html"));
    }

    let relative = match relative.strip_suffix('/') {
        Some(dir) => format!("{}/index.html", dir),
        None => relative.to_string(),
    };

    match Link::new(relative) {
        Ok(link) => Target::File(root.join(link.as_str())),
        Err(_) => Target::BadRequest,
    }
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        _ => "application/octet-stream",
    }
}

async fn respond(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
    head_only: bool,
) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    if !head_only {
        stream.write_all(body).await?;
    }
    stream.shutdown().await
}
