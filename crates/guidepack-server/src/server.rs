//! Development server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use tokio::sync::{mpsc, RwLock};

use guidepack_bundle::{BundleConfig, Bundler};

use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{inject_script, reload_client_script, ReloadHub, ReloadMessage};

/// Path of the live reload WebSocket endpoint.
pub const RELOAD_PATH: &str = "/__reload";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Bundle settings
    pub bundle: BundleConfig,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            bundle: BundleConfig::default(),
            port: 7777,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}: {1}")]
    InvalidAddress(String, String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    bundler: Bundler,
    hub: ReloadHub,
    /// Most recent successful bundle
    page: Option<String>,
    /// Error from the most recent rebuild, if it failed
    error: Option<String>,
}

type SharedState = Arc<RwLock<ServerState>>;

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Start the development server.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr_text = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = addr_text
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ServerError::InvalidAddress(addr_text.clone(), e.to_string())
            })?;

        let bundler = Bundler::new(self.config.bundle.clone());
        let state = Arc::new(RwLock::new(ServerState {
            bundler,
            hub: ReloadHub::new(),
            page: None,
            error: None,
        }));

        rebuild(&state).await;

        let guide_dir = self.config.bundle.guide_dir.clone();
        let output_path = state.read().await.bundler.output_path();
        let (watcher, rx) = FileWatcher::new(&[guide_dir], vec![output_path])
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            rebuild_on_change(state_clone, rx).await;
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(state);

        tracing::info!("Starting dev server at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route(RELOAD_PATH, get(ws_handler))
        .with_state(state)
}

/// Re-run the bundler and notify clients.
///
/// A failed rebuild keeps serving the previous page.
async fn rebuild(state: &SharedState) {
    let bundler = state.read().await.bundler.clone();

    let result = match tokio::task::spawn_blocking(move || bundler.render()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(e) => Err(format!("bundler task failed: {}", e)),
    };

    let mut state = state.write().await;
    match result {
        Ok(rendered) => {
            tracing::info!(
                "Rebuilt guide ({} bytes, {} images)",
                rendered.html.len(),
                rendered.images
            );
            state.page = Some(rendered.html);
            state.error = None;
            state.hub.send(ReloadMessage::Reload);
        }
        Err(message) => {
            tracing::error!("Rebuild failed: {}", message);
            state.error = Some(message.clone());
            state.hub.send(ReloadMessage::BuildError { message });
        }
    }
}

/// Rebuild once per batch of watch events until the channel closes.
async fn rebuild_on_change(state: SharedState, mut rx: mpsc::Receiver<WatchEvent>) {
    while let Some(event) = rx.recv().await {
        log_watch_event(&event);
        while let Ok(more) = rx.try_recv() {
            log_watch_event(&more);
        }

        rebuild(&state).await;
    }
}

fn log_watch_event(event: &WatchEvent) {
    match event {
        WatchEvent::SourceModified(path) => tracing::info!("Source modified: {}", path.display()),
        WatchEvent::AssetModified(path) => tracing::info!("Asset modified: {}", path.display()),
        WatchEvent::Created(path) => tracing::debug!("Created: {}", path.display()),
        WatchEvent::Deleted(path) => tracing::debug!("Deleted: {}", path.display()),
    }
}

/// Handler for the bundled page.
async fn index_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    let script = reload_client_script(RELOAD_PATH);

    match (&state.page, &state.error) {
        (Some(page), _) => (StatusCode::OK, Html(inject_script(page, &script))),
        (None, Some(error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(inject_script(&error_page(error), &script)),
        ),
        (None, None) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Html(inject_script(&error_page("Bundle not built yet"), &script)),
        ),
    }
}

/// Minimal page shown when no bundle is available.
fn error_page(message: &str) -> String {
    let escaped = message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>guidepack: build failed</title>
  <style>
    body {{ font-family: system-ui, sans-serif; max-width: 800px; margin: 2rem auto; padding: 0 1rem; }}
    pre {{ background: #fdecea; padding: 1rem; border-radius: 0.5rem; white-space: pre-wrap; }}
  </style>
</head>
<body>
  <h1>Build failed</h1>
  <pre>{}</pre>
</body>
</html>"#,
        escaped
    )
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: SharedState) {
    let mut rx = {
        let state = state.read().await;
        state.hub.subscribe()
    };

    if !send_message(&mut socket, &ReloadMessage::Connected).await {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if !send_message(&mut socket, &msg).await {
            break;
        }
    }
}

/// Send a message, returning whether the socket is still usable.
async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_guide(dir: &Path) {
        fs::create_dir_all(dir.join("css")).unwrap();
        fs::create_dir_all(dir.join("js")).unwrap();
        fs::write(
            dir.join("index.html"),
            "<html><head><link href=\"css/css.css\"></head><body><script src=\"js/app.js\"></script></body></html>",
        )
        .unwrap();
        fs::write(dir.join("css/css.css"), "p { color: red; }").unwrap();
        fs::write(dir.join("js/app.js"), "const csvContent = `Key,Avatar`;").unwrap();
    }

    fn shared_state(guide: &Path) -> SharedState {
        Arc::new(RwLock::new(ServerState {
            bundler: Bundler::new(BundleConfig {
                guide_dir: guide.to_path_buf(),
                output: Some(guide.join("out.html")),
                ..Default::default()
            }),
            hub: ReloadHub::new(),
            page: None,
            error: None,
        }))
    }

    #[test]
    fn creates_server_with_default_config() {
        let server = DevServer::new(DevServerConfig::default());
        assert_eq!(server.config.port, 7777);
    }

    #[tokio::test]
    async fn rebuild_stores_page_and_broadcasts_reload() {
        let temp = tempdir().unwrap();
        write_guide(temp.path());
        let state = shared_state(temp.path());
        let mut rx = state.read().await.hub.subscribe();

        rebuild(&state).await;

        let guard = state.read().await;
        assert!(guard.page.as_deref().unwrap().contains("<style>p{color:red}</style>"));
        assert!(guard.error.is_none());
        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn failed_rebuild_keeps_previous_page() {
        let temp = tempdir().unwrap();
        write_guide(temp.path());
        let state = shared_state(temp.path());
        rebuild(&state).await;

        fs::write(temp.path().join("js/app.js"), "console.log(1);").unwrap();
        let mut rx = state.read().await.hub.subscribe();
        rebuild(&state).await;

        let guard = state.read().await;
        assert!(guard.page.is_some());
        assert!(guard.error.as_deref().unwrap().contains("csvContent"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            ReloadMessage::BuildError { .. }
        ));
    }

    #[tokio::test]
    async fn rapid_edits_serve_latest_content() {
        let temp = tempdir().unwrap();
        write_guide(temp.path());
        let state = shared_state(temp.path());
        rebuild(&state).await;

        let (watcher, rx) =
            FileWatcher::new(&[temp.path().to_path_buf()], vec![temp.path().join("out.html")])
                .unwrap();
        let mut reloads = state.read().await.hub.subscribe();
        tokio::spawn(rebuild_on_change(Arc::clone(&state), rx));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let css = temp.path().join("css/css.css");
        fs::write(&css, "p { color: blue; }").unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        fs::write(&css, "p { color: green; }").unwrap();

        let latest = tokio::time::timeout(Duration::from_secs(3), async {
            while reloads.recv().await.is_ok() {
                let page = state.read().await.page.clone();
                if page.as_deref().is_some_and(|p| p.contains("p{color:green}")) {
                    return page;
                }
            }
            None
        })
        .await;

        drop(watcher);

        let page = latest
            .expect("latest edit was never served")
            .expect("reload hub closed");
        assert!(page.contains("<style>p{color:green}</style>"));
    }

    #[test]
    fn error_page_escapes_markup() {
        let page = error_page("bad <tag> & more");

        assert!(page.contains("bad &lt;tag&gt; &amp; more"));
    }
}
