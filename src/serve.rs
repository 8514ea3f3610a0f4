//! Live preview server.
//!
//! Serves the output tree over local HTTP and pushes reload signals to
//! connected browsers over a WebSocket at `/__livereload`. HTML responses
//! get a small reload client injected before `</body>`. The server runs on
//! its own thread with a current-thread tokio runtime so the watch loop
//! stays synchronous; the only shared state is the broadcast reload
//! channel.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Reload client injected into every served HTML page.
const RELOAD_CLIENT: &str = "<script>\n(function () {\n  var proto = location.protocol === \"https:\" ? \"wss://\" : \"ws://\";\n  function connect() {\n    var ws = new WebSocket(proto + location.host + \"/__livereload\");\n    ws.onmessage = function (msg) { if (msg.data === \"reload\") location.reload(); };\n    ws.onclose = function () { setTimeout(connect, 1000); };\n  }\n  connect();\n})();\n</script>";

/// Handle for pushing reload signals to connected preview clients.
///
/// Cheap to clone; the watcher sends from its synchronous loop while the
/// server fans out to WebSocket subscribers.
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    tx: broadcast::Sender<()>,
}

impl ReloadHandle {
    /// Create a fresh reload channel.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Signal every connected client to refresh. Returns the number of
    /// clients reached (zero when nobody is connected).
    pub fn send(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct AppState {
    root: Arc<PathBuf>,
    reload: ReloadHandle,
}

/// Start the preview server on a background thread.
pub fn spawn(root: PathBuf, port: u16, reload: ReloadHandle) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(error = %e, "failed to start preview server runtime");
                return;
            }
        };
        if let Err(e) = runtime.block_on(run(root, port, reload)) {
            tracing::error!(error = %e, "preview server exited");
        }
    })
}

/// Serve the output tree on `127.0.0.1:<port>` until the process exits.
pub async fn run(root: PathBuf, port: u16, reload: ReloadHandle) -> Result<(), std::io::Error> {
    let state = AppState { root: Arc::new(root), reload };
    let app = Router::new()
        .route("/__livereload", get(livereload))
        .fallback(serve_asset)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    println!("Serving preview on http://127.0.0.1:{}/", port);
    axum::serve(listener, app).await
}

async fn livereload(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| notify_client(socket, state.reload.subscribe()))
}

/// Per-client loop: forward reload signals until the socket closes.
/// Connection chatter stays at debug level.
async fn notify_client(mut socket: WebSocket, mut events: broadcast::Receiver<()>) {
    tracing::debug!("live-reload client connected");
    loop {
        match events.recv().await {
            Ok(()) => {
                if socket.send(Message::Text("reload".into())).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
    tracing::debug!("live-reload client disconnected");
}

async fn serve_asset(State(state): State<AppState>, uri: Uri) -> Response {
    match load_asset(&state.root, uri.path()) {
        Some((body, content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Resolve a request path under the output root. Rejects traversal;
/// directories fall through to their `index.html`.
fn resolve_request_path(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for part in uri_path.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return None;
        }
        path.push(part);
    }
    if path.is_dir() {
        path.push("index.html");
    }
    Some(path)
}

fn load_asset(root: &Path, uri_path: &str) -> Option<(Vec<u8>, &'static str)> {
    let path = resolve_request_path(root, uri_path)?;
    let bytes = fs::read(&path).ok()?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    if ext == "html" {
        let html = String::from_utf8_lossy(&bytes);
        return Some((inject_reload_client(&html).into_bytes(), "text/html; charset=utf-8"));
    }
    Some((bytes, content_type(&ext)))
}

/// Insert the reload client before `</body>`, or append when no closing
/// body tag exists.
fn inject_reload_client(html: &str) -> String {
    if let Some(at) = html.rfind("</body>") {
        let mut out = String::with_capacity(html.len() + RELOAD_CLIENT.len());
        out.push_str(&html[..at]);
        out.push_str(RELOAD_CLIENT);
        out.push('\n');
        out.push_str(&html[at..]);
        out
    } else {
        format!("{}{}\n", html, RELOAD_CLIENT)
    }
}

fn content_type(ext: &str) -> &'static str {
    match ext {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" | "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain; charset=utf-8",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_request_path_basic() {
        let root = Path::new("/dist");
        assert_eq!(
            resolve_request_path(root, "/assets/css/style.css"),
            Some(PathBuf::from("/dist/assets/css/style.css"))
        );
    }

    #[test]
    fn test_resolve_request_path_rejects_traversal() {
        assert_eq!(resolve_request_path(Path::new("/dist"), "/../etc/passwd"), None);
        assert_eq!(resolve_request_path(Path::new("/dist"), "/a/../../b"), None);
    }

    #[test]
    fn test_resolve_request_path_directory_index() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("pages")).unwrap();
        let resolved = resolve_request_path(temp.path(), "/pages").unwrap();
        assert_eq!(resolved, temp.path().join("pages/index.html"));
    }

    #[test]
    fn test_inject_reload_client_before_body_close() {
        let html = "<html><body><h1>hi</h1></body></html>";
        let injected = inject_reload_client(html);
        assert!(injected.contains("__livereload"));
        assert!(injected.find("__livereload").unwrap() < injected.find("</body>").unwrap());
    }

    #[test]
    fn test_inject_reload_client_no_body_tag() {
        let injected = inject_reload_client("<p>fragment</p>");
        assert!(injected.starts_with("<p>fragment</p>"));
        assert!(injected.contains("__livereload"));
    }

    #[test]
    fn test_load_asset_injects_html_only() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<body></body>").unwrap();
        fs::write(temp.path().join("style.css"), "body { margin: 0; }").unwrap();

        let (html, ct) = load_asset(temp.path(), "/").unwrap();
        assert_eq!(ct, "text/html; charset=utf-8");
        assert!(String::from_utf8(html).unwrap().contains("__livereload"));

        let (css, ct) = load_asset(temp.path(), "/style.css").unwrap();
        assert_eq!(ct, "text/css; charset=utf-8");
        assert!(!String::from_utf8(css).unwrap().contains("__livereload"));
    }

    #[test]
    fn test_load_asset_missing() {
        let temp = TempDir::new().unwrap();
        assert!(load_asset(temp.path(), "/nope.css").is_none());
    }

    #[test]
    fn test_content_type_table() {
        assert_eq!(content_type("css"), "text/css; charset=utf-8");
        assert_eq!(content_type("webp"), "image/webp");
        assert_eq!(content_type("bin"), "application/octet-stream");
    }

    #[test]
    fn test_reload_handle_counts_subscribers() {
        let handle = ReloadHandle::new();
        assert_eq!(handle.send(), 0);
        let mut rx = handle.subscribe();
        assert_eq!(handle.send(), 1);
        assert!(rx.try_recv().is_ok());
    }
}
